use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::{AppError, ErrorResponse, ErrorSeverity};
use thiserror::Error;

/// ハンドラー境界で返すエラー
///
/// 失敗した操作の要約とエミュレーターモードかどうかを保持し、
/// `{error, details?, stack?}` の JSON に変換する。
#[derive(Debug, Error)]
#[error("{action}: {source}")]
pub struct ApiError {
    action: &'static str,
    source: AppError,
    expose_stack: bool,
}

impl ApiError {
    pub fn new(action: &'static str, source: impl Into<AppError>, expose_stack: bool) -> Self {
        Self {
            action,
            source: source.into(),
            expose_stack,
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.source.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match self.source.severity() {
            ErrorSeverity::Warning => {
                tracing::warn!(status = status.as_u16(), action = self.action, error = %self.source, "Request rejected");
            }
            ErrorSeverity::Error => {
                tracing::error!(status = status.as_u16(), action = self.action, error = ?self.source, "Request failed");
            }
        }

        let body = ErrorResponse::from_app_error(&self.source, self.action, self.expose_stack);
        (status, Json(body)).into_response()
    }
}
