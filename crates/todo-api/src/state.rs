use std::{sync::Arc, time::Duration};

use infrastructure::{DynamoDbClient, DynamoTodoRepository, InMemoryTodoRepository, TodoRepository};
use shared::{AppError, Config, StoreBackend};
use tracing::info;

use crate::error::ApiError;

/// アプリケーションの共有状態（各ハンドラーに注入される）
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn TodoRepository>,
    pub http: reqwest::Client,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(repo: Arc<dyn TodoRepository>, config: Config) -> Result<Self, AppError> {
        // 許可リストは最初の転送先にしか適用できないため、リダイレクトは追わない
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            repo,
            http,
            config: Arc::new(config),
        })
    }

    /// 設定に従ってリポジトリを選択して状態を組み立てる
    pub async fn from_config(config: Config) -> Result<Self, AppError> {
        let repo: Arc<dyn TodoRepository> = match config.store_backend {
            StoreBackend::DynamoDb => {
                info!(table = %config.todos_table, "Using DynamoDB todo store");
                let db = DynamoDbClient::new(&config).await;
                Arc::new(DynamoTodoRepository::new(db))
            }
            StoreBackend::Memory => {
                info!("Using in-memory todo store");
                Arc::new(InMemoryTodoRepository::new())
            }
        };

        Self::new(repo, config)
    }

    /// 失敗した操作名を付けて ApiError を作る
    pub fn error(&self, action: &'static str, source: impl Into<AppError>) -> ApiError {
        ApiError::new(action, source, self.config.emulator)
    }
}
