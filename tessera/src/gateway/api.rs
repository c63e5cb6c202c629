use super::error::{GatewayError, Result};
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// A decoded 2xx response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// JSON body, or the raw text as a JSON string when the body is not JSON.
    pub body: Value,
}

/// Client for the Callback-Emitting Service.
///
/// Every call is bounded by the configured timeout; a timeout surfaces as
/// [`GatewayError::Request`] like any other transport failure.
#[derive(Debug, Clone)]
pub struct HttpApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Client)?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// POST a JSON body to `path`, relative to the base URL.
    pub async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let url = join(&self.base_url, path)?;
        debug!(url = %url, "POST");
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|source| GatewayError::Request {
                url: url.to_string(),
                source,
            })?;
        read_response(url, response).await
    }

    /// GET `path`, relative to the base URL, with query parameters.
    pub async fn get_json<Q: Serialize + ?Sized>(&self, path: &str, query: &Q) -> Result<ApiResponse> {
        let url = join(&self.base_url, path)?;
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .await
            .map_err(|source| GatewayError::Request {
                url: url.to_string(),
                source,
            })?;
        read_response(url, response).await
    }
}

async fn read_response(url: Url, response: reqwest::Response) -> Result<ApiResponse> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|source| GatewayError::Request {
            url: url.to_string(),
            source,
        })?;

    if !status.is_success() {
        return Err(GatewayError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: text,
        });
    }

    let body = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap_or(Value::String(text))
    };
    Ok(ApiResponse {
        status: status.as_u16(),
        body,
    })
}

pub(crate) fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw).map_err(|e| GatewayError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    // Url::join replaces the last segment unless the base ends with '/'.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| GatewayError::InvalidUrl {
            url: format!("{base}{path}"),
            reason: e.to_string(),
        })
}
