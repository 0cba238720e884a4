//! todo-api バイナリのエントリポイント
//! Lambda 上では lambda_http で、ローカルでは HTTP サーバとして起動します。

use shared::{init_tracing, Config};
use todo_api::{app, AppState};

#[tokio::main]
async fn main() -> Result<(), lambda_http::Error> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let config = Config::from_env()?;
    let port = config.port;
    tracing::info!(
        environment = %config.environment,
        emulator = config.emulator,
        store = ?config.store_backend,
        allowed_proxy_hosts = config.proxy_allowed_hosts.len(),
        "configuration loaded"
    );

    let router = app(AppState::from_config(config).await?);

    // Lambda ランタイム上で動いているかは AWS_LAMBDA_RUNTIME_API の有無で判定
    if std::env::var("AWS_LAMBDA_RUNTIME_API").is_ok() {
        tracing::info!("starting on lambda runtime");
        return lambda_http::run(router).await;
    }

    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server starting");

    axum::serve(listener, router).await?;
    Ok(())
}
