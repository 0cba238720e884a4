use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use domain::{format_timestamp, NewTodo, Todo, TodoId, TodoPatch};
use serde::Serialize;
use shared::AppError;
use tracing::info;

use crate::{error::ApiError, state::AppState};

const CREATE_FAILED: &str = "Failed to create todo";
const LIST_FAILED: &str = "Failed to get todos";
const UPDATE_FAILED: &str = "Failed to update todo";
const DELETE_FAILED: &str = "Failed to delete todo";

#[derive(Debug, Serialize)]
struct HealthBody {
    /// サービスの簡易ステータス
    status: &'static str,
}

/// 削除完了などの確認メッセージ
#[derive(Debug, Serialize)]
pub struct MessageBody {
    pub message: &'static str,
}

/// ヘルスチェック用ハンドラ
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthBody { status: "ok" }))
}

/// POST /todos
/// - ID は ULID を採用（クライアント指定の id は無視）
/// - title / description はトリムして保存
pub async fn create_todo(
    State(state): State<AppState>,
    payload: Result<Json<NewTodo>, JsonRejection>,
) -> Result<(StatusCode, Json<Todo>), ApiError> {
    let Json(input) = payload.map_err(|e| state.error(CREATE_FAILED, invalid_body(e)))?;

    let todo = input
        .into_todo(TodoId::new(), Utc::now())
        .map_err(|e| state.error(CREATE_FAILED, e))?;

    info!(todo_id = %todo.id, "Creating todo");
    let created = state
        .repo
        .create(todo)
        .await
        .map_err(|e| state.error(CREATE_FAILED, e))?;

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /todos（createdAt の降順、ページングなし）
pub async fn list_todos(State(state): State<AppState>) -> Result<Json<Vec<Todo>>, ApiError> {
    let todos = state
        .repo
        .list()
        .await
        .map_err(|e| state.error(LIST_FAILED, e))?;

    Ok(Json(todos))
}

/// PUT /todos/:id（指定されたフィールドのみ更新）
pub async fn update_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TodoPatch>, JsonRejection>,
) -> Result<Json<Todo>, ApiError> {
    let Json(patch) = payload.map_err(|e| state.error(UPDATE_FAILED, invalid_body(e)))?;
    let patch = patch
        .normalize()
        .map_err(|e| state.error(UPDATE_FAILED, e))?;

    let id = TodoId::from_string(id);
    let updated = state
        .repo
        .update(&id, &patch, format_timestamp(Utc::now()))
        .await
        .map_err(|e| state.error(UPDATE_FAILED, e))?;

    Ok(Json(updated))
}

/// DELETE /todos/:id（物理削除）
pub async fn delete_todo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>, ApiError> {
    let id = TodoId::from_string(id);
    state
        .repo
        .delete(&id)
        .await
        .map_err(|e| state.error(DELETE_FAILED, e))?;

    info!(todo_id = %id, "Todo removed");
    Ok(Json(MessageBody {
        message: "Todo deleted successfully",
    }))
}

/// JSON ボディのパース失敗を入力エラーとして扱う
pub(crate) fn invalid_body(rejection: JsonRejection) -> AppError {
    AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
}
