use crate::errors::DomainError;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// ToDo の識別子（サーバー側で ULID を採番）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(String);

impl TodoId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 保存される ToDo ドキュメント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_urgent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Todo {
    /// 部分更新を適用する。`patch` に含まれないフィールドは変更しない。
    pub fn apply(&mut self, patch: &TodoPatch, updated_at: String) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(category) = &patch.category {
            self.category = Some(category.clone());
        }
        if let Some(is_urgent) = patch.is_urgent {
            self.is_urgent = Some(is_urgent);
        }
        if let Some(due_date) = &patch.due_date {
            self.due_date = Some(due_date.clone());
        }
        self.updated_at = Some(updated_at);
    }
}

/// POST /todos のリクエストボディ
///
/// クライアントが `id` を送ってきても無視し、サーバー側で採番する。
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTodo {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub category: Option<String>,
    pub is_urgent: Option<bool>,
    pub due_date: Option<String>,
    pub created_at: Option<String>,
}

impl NewTodo {
    /// 入力を検証・正規化して保存用の `Todo` を組み立てる
    pub fn into_todo(self, id: TodoId, now: DateTime<Utc>) -> Result<Todo, DomainError> {
        let title = self
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(DomainError::TitleRequired)?
            .to_string();

        let created_at = match self.created_at.as_deref() {
            Some(raw) => normalize_timestamp(raw)?,
            None => format_timestamp(now),
        };

        Ok(Todo {
            id,
            title,
            description: self
                .description
                .map(|d| d.trim().to_string())
                .unwrap_or_default(),
            completed: self.completed.unwrap_or(false),
            category: self.category,
            is_urgent: self.is_urgent,
            due_date: self.due_date,
            created_at,
            updated_at: None,
        })
    }
}

/// PUT /todos/:id のリクエストボディ（指定されたフィールドのみ更新）
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub category: Option<String>,
    pub is_urgent: Option<bool>,
    pub due_date: Option<String>,
}

impl TodoPatch {
    /// テキスト項目をトリムする。タイトルを空にする更新は拒否する。
    pub fn normalize(mut self) -> Result<Self, DomainError> {
        if let Some(title) = self.title.take() {
            let trimmed = title.trim();
            if trimmed.is_empty() {
                return Err(DomainError::EmptyTitle);
            }
            self.title = Some(trimmed.to_string());
        }
        self.description = self.description.map(|d| d.trim().to_string());
        Ok(self)
    }
}

/// JavaScript の `toISOString()` と同じ UTC ミリ秒精度の形式
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// クライアント指定のタイムスタンプを UTC ミリ秒精度に揃える
///
/// RFC 3339 を優先し、オフセットのない ISO 8601 日時（例: `2024-05-01T09:30:00.000`）は
/// UTC とみなす。
pub fn normalize_timestamp(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(dt) => Ok(format_timestamp(dt.with_timezone(&Utc))),
        Err(e) => NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| format_timestamp(naive.and_utc()))
            .map_err(|_| DomainError::InvalidTimestamp(format!("{raw}: {e}"))),
    }
}

/// `createdAt` の降順（新しい順）に並べ替える
pub fn sort_newest_first(todos: &mut [Todo]) {
    todos.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.as_str().cmp(a.id.as_str()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_todo_id_new_generates_ulid() {
        // Act: 新しいTodoIdを生成
        let todo_id = TodoId::new();

        // Assert: 26文字の ULID として解釈できる
        assert_eq!(todo_id.as_str().len(), 26);
        assert!(ulid::Ulid::from_string(todo_id.as_str()).is_ok());
    }

    #[test]
    fn test_new_todo_trims_and_applies_defaults() {
        // Arrange
        let input = NewTodo {
            title: Some("  Buy milk  ".to_string()),
            description: Some("  2 liters ".to_string()),
            ..Default::default()
        };

        // Act
        let todo = input.into_todo(TodoId::new(), fixed_now()).unwrap();

        // Assert
        assert_eq!(todo.title, "Buy milk");
        assert_eq!(todo.description, "2 liters");
        assert!(!todo.completed);
        assert_eq!(todo.created_at, "2024-05-01T09:30:00.000Z");
        assert!(todo.updated_at.is_none());
    }

    #[test]
    fn test_new_todo_without_description_defaults_to_empty() {
        let input = NewTodo {
            title: Some("Task".to_string()),
            ..Default::default()
        };

        let todo = input.into_todo(TodoId::new(), fixed_now()).unwrap();

        assert_eq!(todo.description, "");
    }

    #[test]
    fn test_new_todo_requires_title() {
        for title in [None, Some(""), Some("   ")] {
            let input = NewTodo {
                title: title.map(str::to_string),
                ..Default::default()
            };

            let err = input.into_todo(TodoId::new(), fixed_now()).unwrap_err();

            assert_eq!(err, DomainError::TitleRequired);
        }
    }

    #[test]
    fn test_new_todo_keeps_passthrough_fields() {
        let input = NewTodo {
            title: Some("Report".to_string()),
            completed: Some(true),
            category: Some("work".to_string()),
            is_urgent: Some(true),
            due_date: Some("2024-06-01".to_string()),
            ..Default::default()
        };

        let todo = input.into_todo(TodoId::new(), fixed_now()).unwrap();

        assert!(todo.completed);
        assert_eq!(todo.category.as_deref(), Some("work"));
        assert_eq!(todo.is_urgent, Some(true));
        assert_eq!(todo.due_date.as_deref(), Some("2024-06-01"));
    }

    #[test]
    fn test_client_created_at_is_normalized_to_utc() {
        let input = NewTodo {
            title: Some("Task".to_string()),
            created_at: Some("2024-05-01T18:30:00+09:00".to_string()),
            ..Default::default()
        };

        let todo = input.into_todo(TodoId::new(), fixed_now()).unwrap();

        assert_eq!(todo.created_at, "2024-05-01T09:30:00.000Z");
    }

    #[test]
    fn test_created_at_without_offset_is_treated_as_utc() {
        for (raw, expected) in [
            ("2024-05-01T09:30:00.123", "2024-05-01T09:30:00.123Z"),
            ("2024-05-01T09:30:00", "2024-05-01T09:30:00.000Z"),
        ] {
            let input = NewTodo {
                title: Some("Task".to_string()),
                created_at: Some(raw.to_string()),
                ..Default::default()
            };

            let todo = input.into_todo(TodoId::new(), fixed_now()).unwrap();

            assert_eq!(todo.created_at, expected, "{raw}");
        }
    }

    #[test]
    fn test_invalid_created_at_is_rejected() {
        let input = NewTodo {
            title: Some("Task".to_string()),
            created_at: Some("yesterday".to_string()),
            ..Default::default()
        };

        let err = input.into_todo(TodoId::new(), fixed_now()).unwrap_err();

        assert!(matches!(err, DomainError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_patch_only_changes_supplied_fields() {
        // Arrange: 既存のToDo
        let mut todo = NewTodo {
            title: Some("Task".to_string()),
            description: Some("desc".to_string()),
            category: Some("home".to_string()),
            ..Default::default()
        }
        .into_todo(TodoId::new(), fixed_now())
        .unwrap();
        let before = todo.clone();
        let patch = TodoPatch {
            completed: Some(true),
            ..Default::default()
        };

        // Act
        todo.apply(&patch, "2024-05-02T00:00:00.000Z".to_string());

        // Assert: completed と updatedAt 以外は変わらない
        assert!(todo.completed);
        assert_eq!(todo.updated_at.as_deref(), Some("2024-05-02T00:00:00.000Z"));
        assert_eq!(todo.title, before.title);
        assert_eq!(todo.description, before.description);
        assert_eq!(todo.category, before.category);
        assert_eq!(todo.created_at, before.created_at);
    }

    #[test]
    fn test_patch_normalize_trims_and_rejects_blank_title() {
        let patch = TodoPatch {
            title: Some("  New  ".to_string()),
            description: Some(" d ".to_string()),
            ..Default::default()
        }
        .normalize()
        .unwrap();
        assert_eq!(patch.title.as_deref(), Some("New"));
        assert_eq!(patch.description.as_deref(), Some("d"));

        let err = TodoPatch {
            title: Some("  ".to_string()),
            ..Default::default()
        }
        .normalize()
        .unwrap_err();
        assert_eq!(err, DomainError::EmptyTitle);
    }

    #[test]
    fn test_todo_serializes_camel_case_and_omits_absent_fields() {
        let todo = NewTodo {
            title: Some("Task".to_string()),
            is_urgent: Some(false),
            ..Default::default()
        }
        .into_todo(TodoId::from_string("t1".to_string()), fixed_now())
        .unwrap();

        let json = serde_json::to_value(&todo).unwrap();

        assert_eq!(json["id"], "t1");
        assert_eq!(json["isUrgent"], false);
        assert_eq!(json["createdAt"], "2024-05-01T09:30:00.000Z");
        assert!(json.get("dueDate").is_none());
        assert!(json.get("updatedAt").is_none());
    }

    #[test]
    fn test_sort_newest_first() {
        let mut todos: Vec<Todo> = ["2024-01-01T00:00:00.000Z", "2024-03-01T00:00:00.000Z", "2024-02-01T00:00:00.000Z"]
            .iter()
            .map(|created_at| {
                NewTodo {
                    title: Some(created_at.to_string()),
                    created_at: Some(created_at.to_string()),
                    ..Default::default()
                }
                .into_todo(TodoId::new(), fixed_now())
                .unwrap()
            })
            .collect();

        sort_newest_first(&mut todos);

        let order: Vec<&str> = todos.iter().map(|t| t.created_at.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "2024-03-01T00:00:00.000Z",
                "2024-02-01T00:00:00.000Z",
                "2024-01-01T00:00:00.000Z"
            ]
        );
    }

    // プロパティベーステスト: 保存されるタイトルは常にトリム済みで空にならない
    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn stored_title_is_trimmed_and_non_empty(title in "\\s{0,4}[a-zA-Z0-9あ-ん]{1,32}\\s{0,4}") {
                let todo = NewTodo { title: Some(title.clone()), ..Default::default() }
                    .into_todo(TodoId::new(), Utc::now())
                    .unwrap();
                prop_assert_eq!(todo.title.as_str(), title.trim());
                prop_assert!(!todo.title.is_empty());
            }

            #[test]
            fn whitespace_only_title_is_rejected(title in "\\s{0,8}") {
                let result = NewTodo { title: Some(title), ..Default::default() }
                    .into_todo(TodoId::new(), Utc::now());
                prop_assert_eq!(result.unwrap_err(), DomainError::TitleRequired);
            }
        }
    }
}
