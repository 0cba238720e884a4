use serde::{Deserialize, Serialize};
use thiserror::Error;

/// アプリケーション全体で使用されるエラー型
#[derive(Debug, Clone, Error)]
pub enum AppError {
    // ドメインエラー
    #[error("{0}")]
    Domain(#[from] domain::DomainError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    // 外部サービスエラー（転送先のステータスをそのまま返す）
    #[error("Upstream responded with status {status}")]
    Upstream {
        status: u16,
        body: serde_json::Value,
    },

    #[error("Network error: {0}")]
    Network(String),

    // インフラストラクチャエラー
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// エラーの重要度（ログレベルの判定に使う）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Warning,
    Error,
}

impl AppError {
    pub fn todo_not_found() -> Self {
        AppError::NotFound("Todo not found".to_string())
    }

    /// HTTPステータスコードを取得
    pub fn http_status_code(&self) -> u16 {
        match self {
            AppError::Domain(_) | AppError::Validation(_) => 400,
            AppError::Forbidden(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::Upstream { status, .. } => *status,
            AppError::Network(_) => 502,
            AppError::DynamoDb(_)
            | AppError::Serialization(_)
            | AppError::Configuration(_)
            | AppError::Internal(_) => 500,
        }
    }

    /// 呼び出し側の入力に起因するエラーかどうか
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Domain(_)
                | AppError::Validation(_)
                | AppError::Forbidden(_)
                | AppError::NotFound(_)
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        if self.http_status_code() < 500 {
            ErrorSeverity::Warning
        } else {
            ErrorSeverity::Error
        }
    }
}

/// 標準化されたエラーレスポンス `{error, details?, stack?}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// ユーザー向けメッセージ
    pub error: String,
    /// 詳細情報
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    /// デバッグ情報（エミュレーターモードのみ）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorResponse {
    /// AppErrorからErrorResponseを作成
    ///
    /// `action` は失敗した操作の要約（例: "Failed to create todo"）。
    /// クライアント起因のエラーではエラー自身のメッセージを使う。
    pub fn from_app_error(error: &AppError, action: &str, include_stack: bool) -> Self {
        if error.is_client_error() {
            return Self {
                error: error.to_string(),
                details: None,
                stack: None,
            };
        }

        match error {
            AppError::Upstream { body, .. } => Self {
                error: "Upstream request failed".to_string(),
                details: Some(body.clone()),
                stack: None,
            },
            AppError::Network(message) => Self {
                error: "Failed to reach upstream".to_string(),
                details: Some(serde_json::Value::String(message.clone())),
                stack: include_stack.then(|| format!("{error:?}")),
            },
            _ => Self {
                error: action.to_string(),
                details: Some(serde_json::Value::String(error.to_string())),
                stack: include_stack.then(|| format!("{error:?}")),
            },
        }
    }
}
