use aws_config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use aws_sdk_dynamodb::Client;
use shared::{AppError, Config};
use tracing::info;

#[derive(Clone)]
pub struct DynamoDbClient {
    client: Client,
    table_name: String,
}

impl DynamoDbClient {
    pub async fn new(config: &Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.aws_region.clone()));

        // エミュレーター（DynamoDB Local）向けの接続先と固定認証情報
        if let Some(endpoint) = &config.dynamodb_endpoint {
            info!(endpoint = %endpoint, "DynamoDB endpoint overridden");
            loader = loader.endpoint_url(endpoint);
        }
        if config.emulator {
            loader = loader.credentials_provider(Credentials::new(
                "local",
                "local",
                None,
                None,
                "todo-emulator",
            ));
        }

        let aws_config = loader.load().await;

        Self {
            client: Client::new(&aws_config),
            table_name: config.todos_table.clone(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// SDK エラーを AppError に変換
    pub fn convert_error<E, R>(&self, error: SdkError<E, R>) -> AppError
    where
        E: std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        AppError::DynamoDb(DisplayErrorContext(&error).to_string())
    }
}
