use crate::models::{attr, item_to_todo, todo_to_item};
use crate::DynamoDbClient;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use domain::{sort_newest_first, Todo, TodoId, TodoPatch};
use shared::AppError;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// ToDo コレクションへの操作
#[async_trait]
pub trait TodoRepository: Send + Sync {
    /// 新しい ToDo を保存して保存後の内容を返す
    async fn create(&self, todo: Todo) -> Result<Todo, AppError>;

    /// 全件を `createdAt` の降順で返す
    async fn list(&self) -> Result<Vec<Todo>, AppError>;

    /// 指定フィールドのみ更新する。存在しなければ `AppError::NotFound`。
    async fn update(
        &self,
        id: &TodoId,
        patch: &TodoPatch,
        updated_at: String,
    ) -> Result<Todo, AppError>;

    /// 物理削除する。存在しなければ `AppError::NotFound`。
    async fn delete(&self, id: &TodoId) -> Result<(), AppError>;
}

/// ハッシュキー `id` の単一テーブルに ToDo を保存するリポジトリ
pub struct DynamoTodoRepository {
    db: DynamoDbClient,
}

impl DynamoTodoRepository {
    pub fn new(db: DynamoDbClient) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TodoRepository for DynamoTodoRepository {
    async fn create(&self, todo: Todo) -> Result<Todo, AppError> {
        let result = self
            .db
            .client()
            .put_item()
            .table_name(self.db.table_name())
            .set_item(Some(todo_to_item(&todo)))
            .condition_expression("attribute_not_exists(#id)")
            .expression_attribute_names("#id", attr::ID)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(todo_id = %todo.id, "Todo created");
                Ok(todo)
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Err(AppError::Internal(format!("Todo id already exists: {}", todo.id)))
            }
            Err(e) => Err(self.db.convert_error(e)),
        }
    }

    async fn list(&self) -> Result<Vec<Todo>, AppError> {
        let mut todos = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .db
                .client()
                .scan()
                .table_name(self.db.table_name())
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| self.db.convert_error(e))?;

            for item in output.items.unwrap_or_default() {
                match item_to_todo(&item) {
                    Ok(todo) => todos.push(todo),
                    Err(e) => {
                        warn!(error = %e, "Skipping malformed todo item");
                        continue;
                    }
                }
            }

            match output.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        sort_newest_first(&mut todos);
        debug!("Todo一覧取得完了: {} 件", todos.len());
        Ok(todos)
    }

    async fn update(
        &self,
        id: &TodoId,
        patch: &TodoPatch,
        updated_at: String,
    ) -> Result<Todo, AppError> {
        let mut sets = Vec::new();
        let mut names = HashMap::from([("#id".to_string(), attr::ID.to_string())]);
        let mut values = HashMap::new();

        let mut set = |name: &str, value: AttributeValue| {
            let placeholder = format!("#{name}");
            let value_key = format!(":{name}");
            sets.push(format!("{placeholder} = {value_key}"));
            names.insert(placeholder, name.to_string());
            values.insert(value_key, value);
        };

        if let Some(title) = &patch.title {
            set(attr::TITLE, AttributeValue::S(title.clone()));
        }
        if let Some(description) = &patch.description {
            set(attr::DESCRIPTION, AttributeValue::S(description.clone()));
        }
        if let Some(completed) = patch.completed {
            set(attr::COMPLETED, AttributeValue::Bool(completed));
        }
        if let Some(category) = &patch.category {
            set(attr::CATEGORY, AttributeValue::S(category.clone()));
        }
        if let Some(is_urgent) = patch.is_urgent {
            set(attr::IS_URGENT, AttributeValue::Bool(is_urgent));
        }
        if let Some(due_date) = &patch.due_date {
            set(attr::DUE_DATE, AttributeValue::S(due_date.clone()));
        }
        set(attr::UPDATED_AT, AttributeValue::S(updated_at));

        let result = self
            .db
            .client()
            .update_item()
            .table_name(self.db.table_name())
            .key(attr::ID, AttributeValue::S(id.as_str().to_string()))
            .update_expression(format!("SET {}", sets.join(", ")))
            .condition_expression("attribute_exists(#id)")
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .return_values(ReturnValue::AllNew)
            .send()
            .await;

        match result {
            Ok(output) => {
                let item = output.attributes.ok_or_else(AppError::todo_not_found)?;
                info!(todo_id = %id, "Todo updated");
                item_to_todo(&item)
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Err(AppError::todo_not_found())
            }
            Err(e) => Err(self.db.convert_error(e)),
        }
    }

    async fn delete(&self, id: &TodoId) -> Result<(), AppError> {
        let result = self
            .db
            .client()
            .delete_item()
            .table_name(self.db.table_name())
            .key(attr::ID, AttributeValue::S(id.as_str().to_string()))
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", attr::ID)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(todo_id = %id, "Todo deleted");
                Ok(())
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_conditional_check_failed_exception()) =>
            {
                Err(AppError::todo_not_found())
            }
            Err(e) => Err(self.db.convert_error(e)),
        }
    }
}
