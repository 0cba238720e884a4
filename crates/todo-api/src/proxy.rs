//! ファイルアップロードの中継エンドポイント
//!
//! base64 のファイルをデコードして multipart/form-data に包み、
//! 呼び出し元が指定した `urlEndpoint` へ POST する。
//! 転送先は `PROXY_ALLOWED_HOSTS` に登録されたホストに限る。

use std::collections::BTreeMap;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    multipart::{Form, Part},
    Url,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{AppError, Config};
use tracing::info;

use crate::{error::ApiError, handlers::invalid_body, state::AppState};

const PROXY_FAILED: &str = "Failed to proxy upload";
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// multipart が付け直すため、呼び出し元からは引き継がないヘッダー
const HOP_HEADERS: [&str; 3] = ["content-type", "content-length", "host"];

/// POST /stripeProxy のリクエストボディ
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,
    #[serde(default)]
    pub url_endpoint: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    /// base64 エンコードされたファイル本体
    #[serde(default, skip_serializing)]
    pub file: Option<String>,
    #[serde(default, skip_serializing)]
    pub mime_type: Option<String>,
}

/// ファイルがない場合に受け取った内容をそのまま返す
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EchoBody<'a> {
    message: &'static str,
    #[serde(flatten)]
    request: &'a ProxyRequest,
}

/// 転送用に検証済みのアップロード
#[derive(Debug)]
pub struct Upload {
    pub url: Url,
    pub headers: HeaderMap,
    pub query: Vec<(String, String)>,
    pub file: Vec<u8>,
    pub mime_type: String,
}

impl Upload {
    /// リクエストを検証して転送内容を組み立てる
    pub fn prepare(request: &ProxyRequest, file: &str, config: &Config) -> Result<Self, AppError> {
        let url = destination(request.url_endpoint.as_deref(), config)?;
        let file = decode_file(file)?;

        Ok(Upload {
            url,
            headers: forwarded_headers(&request.headers)?,
            query: query_pairs(&request.params),
            file,
            mime_type: request
                .mime_type
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
        })
    }

    fn into_form(self) -> Result<(Url, HeaderMap, Vec<(String, String)>, Form), AppError> {
        let part = Part::bytes(self.file)
            .file_name("file")
            .mime_str(&self.mime_type)
            .map_err(|e| AppError::Validation(format!("Invalid mimeType: {e}")))?;

        Ok((self.url, self.headers, self.query, Form::new().part("file", part)))
    }
}

/// POST /stripeProxy
pub async fn stripe_proxy(
    State(state): State<AppState>,
    payload: Result<Json<ProxyRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| state.error(PROXY_FAILED, invalid_body(e)))?;

    let Some(file) = request.file.as_deref().filter(|f| !f.trim().is_empty()) else {
        info!(url_endpoint = ?request.url_endpoint, "Upload proxy called without file");
        let echo = EchoBody {
            message: "No file provided",
            request: &request,
        };
        return Ok((StatusCode::OK, Json(echo)).into_response());
    };

    let upload =
        Upload::prepare(&request, file, &state.config).map_err(|e| state.error(PROXY_FAILED, e))?;

    forward(&state.http, upload)
        .await
        .map_err(|e| state.error(PROXY_FAILED, e))
}

/// multipart で転送し、転送先のステータスと本文を返す
pub async fn forward(client: &reqwest::Client, upload: Upload) -> Result<Response, AppError> {
    let file_size = upload.file.len();
    let (url, headers, query, form) = upload.into_form()?;

    info!(
        host = url.host_str().unwrap_or_default(),
        path = url.path(),
        file_size,
        "Forwarding upload"
    );

    let upstream = client
        .post(url)
        .headers(headers)
        .query(&query)
        .multipart(form)
        .send()
        .await
        .map_err(|e| AppError::Network(e.to_string()))?;

    let status = upstream.status();
    let content_type = upstream.headers().get(header::CONTENT_TYPE).cloned();
    let bytes = upstream
        .bytes()
        .await
        .map_err(|e| AppError::Network(e.to_string()))?;

    info!(status = status.as_u16(), "Upstream responded");

    if !status.is_success() {
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        return Err(AppError::Upstream {
            status: status.as_u16(),
            body,
        });
    }

    let mut response = Response::builder()
        .status(StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK));
    if let Some(content_type) = content_type {
        response = response.header(header::CONTENT_TYPE, content_type);
    }
    response
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// 転送先 URL を検証する（http/https かつ許可リストにあるホストのみ）
fn destination(url_endpoint: Option<&str>, config: &Config) -> Result<Url, AppError> {
    let raw = url_endpoint
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::Validation("urlEndpoint is required".to_string()))?;

    let url = Url::parse(raw)
        .map_err(|e| AppError::Validation(format!("Invalid urlEndpoint: {e}")))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation(format!(
            "Unsupported urlEndpoint scheme: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or_else(|| AppError::Validation("urlEndpoint has no host".to_string()))?;

    if !config.is_proxy_host_allowed(host, url.port()) {
        return Err(AppError::Forbidden(format!(
            "Destination host is not allowed: {host}"
        )));
    }

    Ok(url)
}

fn decode_file(file: &str) -> Result<Vec<u8>, AppError> {
    STANDARD
        .decode(file.trim())
        .map_err(|e| AppError::Validation(format!("Invalid base64 file: {e}")))
}

fn forwarded_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, AppError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        if HOP_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::Validation(format!("Invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::Validation(format!("Invalid value for header '{name}': {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// クエリ文字列用に値を文字列化する（文字列はそのまま、それ以外は JSON 表現）
fn query_pairs(params: &serde_json::Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}
