use std::env;

use crate::errors::AppError;

/// ToDo の保存先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    DynamoDb,
    Memory,
}

impl StoreBackend {
    fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dynamodb" => Ok(StoreBackend::DynamoDb),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::Configuration(format!(
                "TODO_STORE must be 'dynamodb' or 'memory', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub todos_table: String,
    pub environment: String,
    pub aws_region: String,
    /// ローカルエミュレーターモード。接続先とエラー詳細の出力が変わる。
    pub emulator: bool,
    pub dynamodb_endpoint: Option<String>,
    pub store_backend: StoreBackend,
    /// アップロードプロキシの転送先として許可する `host` または `host:port`（小文字）
    pub proxy_allowed_hosts: Vec<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意の参照関数から設定を組み立てる（テスト用に環境変数を差し替え可能）
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let emulator = lookup("TODO_EMULATOR")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);

        let dynamodb_endpoint = lookup("DYNAMODB_ENDPOINT")
            .filter(|v| !v.trim().is_empty())
            .or_else(|| emulator.then(|| "http://localhost:8000".to_string()));

        let store_backend = match lookup("TODO_STORE") {
            Some(value) => StoreBackend::parse(&value)?,
            None => StoreBackend::DynamoDb,
        };

        let proxy_allowed_hosts = lookup("PROXY_ALLOWED_HOSTS")
            .map(|hosts| {
                hosts
                    .split(',')
                    .map(|h| h.trim().to_ascii_lowercase())
                    .filter(|h| !h.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let port = match lookup("PORT") {
            Some(value) => value.trim().parse().map_err(|_| {
                AppError::Configuration(format!("PORT must be a valid u16, got '{value}'"))
            })?,
            None => 3000,
        };

        Ok(Config {
            todos_table: lookup("TODOS_TABLE").unwrap_or_else(|| "todos".to_string()),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "dev".to_string()),
            aws_region: lookup("AWS_REGION").unwrap_or_else(|| "ap-northeast-1".to_string()),
            emulator,
            dynamodb_endpoint,
            store_backend,
            proxy_allowed_hosts,
            port,
        })
    }

    /// 転送先が許可リストに含まれるか判定する
    ///
    /// `port` は URL に明示されたポート（スキームの既定ポートなら `None`）。
    /// ポートなしのエントリは既定ポートにのみ一致する。
    pub fn is_proxy_host_allowed(&self, host: &str, port: Option<u16>) -> bool {
        let host = strip_brackets(host).to_ascii_lowercase();
        self.proxy_allowed_hosts.iter().any(|entry| {
            let (allowed_host, allowed_port) = split_host_port(entry);
            allowed_host == host && allowed_port == port
        })
    }
}

fn strip_brackets(host: &str) -> &str {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// `host`、`host:port`、`::1`、`[::1]:port` を分解する
fn split_host_port(entry: &str) -> (&str, Option<u16>) {
    if let Some(rest) = entry.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((host, tail)) => (host, tail.strip_prefix(':').and_then(|p| p.parse().ok())),
            None => (entry, None),
        };
    }

    match entry.split_once(':') {
        // コロンが複数あれば括弧なしの IPv6 アドレス
        Some((host, port)) if !port.contains(':') => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (entry, None),
        },
        _ => (entry, None),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}
