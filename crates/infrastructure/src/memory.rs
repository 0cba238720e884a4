use crate::TodoRepository;
use async_trait::async_trait;
use domain::{sort_newest_first, Todo, TodoId, TodoPatch};
use shared::AppError;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// 簡易な InMemory 実装（開発/テスト用）
#[derive(Default)]
pub struct InMemoryTodoRepository {
    todos: RwLock<HashMap<TodoId, Todo>>,
}

impl InMemoryTodoRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().map(|todos| todos.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<TodoId, Todo>>, AppError> {
        self.todos
            .read()
            .map_err(|_| AppError::Internal("todo store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<TodoId, Todo>>, AppError> {
        self.todos
            .write()
            .map_err(|_| AppError::Internal("todo store lock poisoned".to_string()))
    }
}

#[async_trait]
impl TodoRepository for InMemoryTodoRepository {
    async fn create(&self, todo: Todo) -> Result<Todo, AppError> {
        let mut todos = self.write()?;
        if todos.contains_key(&todo.id) {
            return Err(AppError::Internal(format!("Todo id already exists: {}", todo.id)));
        }
        todos.insert(todo.id.clone(), todo.clone());
        Ok(todo)
    }

    async fn list(&self) -> Result<Vec<Todo>, AppError> {
        let mut todos: Vec<Todo> = self.read()?.values().cloned().collect();
        sort_newest_first(&mut todos);
        Ok(todos)
    }

    async fn update(
        &self,
        id: &TodoId,
        patch: &TodoPatch,
        updated_at: String,
    ) -> Result<Todo, AppError> {
        let mut todos = self.write()?;
        let todo = todos.get_mut(id).ok_or_else(AppError::todo_not_found)?;
        todo.apply(patch, updated_at);
        Ok(todo.clone())
    }

    async fn delete(&self, id: &TodoId) -> Result<(), AppError> {
        self.write()?
            .remove(id)
            .map(|_| ())
            .ok_or_else(AppError::todo_not_found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use domain::NewTodo;

    fn new_todo(title: &str, created_at: &str) -> Todo {
        NewTodo {
            title: Some(title.to_string()),
            created_at: Some(created_at.to_string()),
            ..Default::default()
        }
        .into_todo(TodoId::new(), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_returns_newest_first() {
        let repo = InMemoryTodoRepository::new();
        repo.create(new_todo("old", "2024-01-01T00:00:00Z")).await.unwrap();
        repo.create(new_todo("new", "2024-03-01T00:00:00Z")).await.unwrap();
        repo.create(new_todo("mid", "2024-02-01T00:00:00Z")).await.unwrap();

        let titles: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();

        assert_eq!(titles, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_not_found_and_changes_nothing() {
        let repo = InMemoryTodoRepository::new();
        let existing = repo.create(new_todo("keep", "2024-01-01T00:00:00Z")).await.unwrap();
        let patch = TodoPatch {
            completed: Some(true),
            ..Default::default()
        };

        let err = repo
            .update(&TodoId::new(), &patch, "2024-01-02T00:00:00.000Z".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(repo.list().await.unwrap(), vec![existing]);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let repo = InMemoryTodoRepository::new();
        let todo = repo.create(new_todo("once", "2024-01-01T00:00:00Z")).await.unwrap();

        repo.delete(&todo.id).await.unwrap();
        let err = repo.delete(&todo.id).await.unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_id() {
        let repo = InMemoryTodoRepository::new();
        let todo = new_todo("dup", "2024-01-01T00:00:00Z");
        repo.create(todo.clone()).await.unwrap();

        let err = repo.create(todo).await.unwrap_err();

        assert!(matches!(err, AppError::Internal(_)));
        assert_eq!(repo.len(), 1);
    }
}
