use aws_sdk_dynamodb::types::AttributeValue;
use domain::{Todo, TodoId};
use shared::AppError;
use std::collections::HashMap;

/// DynamoDB テーブル上の属性名（ドキュメントの JSON 表現と同じ camelCase）
pub mod attr {
    pub const ID: &str = "id";
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const COMPLETED: &str = "completed";
    pub const CATEGORY: &str = "category";
    pub const IS_URGENT: &str = "isUrgent";
    pub const DUE_DATE: &str = "dueDate";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
}

/// Todo を DynamoDB AttributeValue マップに変換
pub fn todo_to_item(todo: &Todo) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();

    item.insert(attr::ID.to_string(), AttributeValue::S(todo.id.as_str().to_string()));
    item.insert(attr::TITLE.to_string(), AttributeValue::S(todo.title.clone()));
    item.insert(
        attr::DESCRIPTION.to_string(),
        AttributeValue::S(todo.description.clone()),
    );
    item.insert(attr::COMPLETED.to_string(), AttributeValue::Bool(todo.completed));

    if let Some(category) = &todo.category {
        item.insert(attr::CATEGORY.to_string(), AttributeValue::S(category.clone()));
    }
    if let Some(is_urgent) = todo.is_urgent {
        item.insert(attr::IS_URGENT.to_string(), AttributeValue::Bool(is_urgent));
    }
    if let Some(due_date) = &todo.due_date {
        item.insert(attr::DUE_DATE.to_string(), AttributeValue::S(due_date.clone()));
    }

    item.insert(
        attr::CREATED_AT.to_string(),
        AttributeValue::S(todo.created_at.clone()),
    );
    if let Some(updated_at) = &todo.updated_at {
        item.insert(attr::UPDATED_AT.to_string(), AttributeValue::S(updated_at.clone()));
    }

    item
}

/// DynamoDB AttributeValue マップから Todo を復元
pub fn item_to_todo(item: &HashMap<String, AttributeValue>) -> Result<Todo, AppError> {
    Ok(Todo {
        id: TodoId::from_string(required_s(item, attr::ID)?),
        title: required_s(item, attr::TITLE)?,
        description: optional_s(item, attr::DESCRIPTION).unwrap_or_default(),
        completed: optional_bool(item, attr::COMPLETED).unwrap_or(false),
        category: optional_s(item, attr::CATEGORY),
        is_urgent: optional_bool(item, attr::IS_URGENT),
        due_date: optional_s(item, attr::DUE_DATE),
        created_at: required_s(item, attr::CREATED_AT)?,
        updated_at: optional_s(item, attr::UPDATED_AT),
    })
}

fn required_s(item: &HashMap<String, AttributeValue>, name: &str) -> Result<String, AppError> {
    optional_s(item, name)
        .ok_or_else(|| AppError::Serialization(format!("Missing or non-string attribute: {name}")))
}

fn optional_s(item: &HashMap<String, AttributeValue>, name: &str) -> Option<String> {
    item.get(name).and_then(|v| v.as_s().ok()).cloned()
}

fn optional_bool(item: &HashMap<String, AttributeValue>, name: &str) -> Option<bool> {
    item.get(name).and_then(|v| v.as_bool().ok()).copied()
}
