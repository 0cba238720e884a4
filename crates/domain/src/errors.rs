use thiserror::Error;

/// 入力値の検証で発生するドメインエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("Title is required")]
    TitleRequired,

    #[error("Title cannot be empty")]
    EmptyTitle,

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
