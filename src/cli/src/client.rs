//! HTTP client for communicating with the Warden API server.

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// API response wrapper matching the server's ApiResponse format.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[allow(dead_code)]
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// A non-2xx answer from the server.
#[derive(Debug, thiserror::Error)]
#[error("{code} ({status}): {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
}

impl ApiError {
    /// Build from a response body, falling back to the raw text when the body
    /// is not the server's error envelope.
    fn from_body(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => Self {
                status,
                code: envelope.error.code,
                message: envelope.error.message,
            },
            Err(_) => Self {
                status,
                code: "HTTP_ERROR".to_string(),
                message: if body.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body.to_string()
                },
            },
        }
    }
}

/// HTTP client for the Warden API.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        label: &str,
    ) -> Result<ApiResponse<T>> {
        let resp = builder
            .send()
            .await
            .with_context(|| format!("{} failed", label))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_body(status, &body).into());
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", label))
    }

    async fn data<T: DeserializeOwned>(&self, builder: RequestBuilder, label: &str) -> Result<T> {
        self.send::<T>(builder, label)
            .await?
            .data
            .ok_or_else(|| anyhow::anyhow!("API returned success but no data"))
    }

    async fn message(&self, builder: RequestBuilder, label: &str) -> Result<String> {
        let resp = self.send::<serde_json::Value>(builder, label).await?;
        Ok(resp.message.unwrap_or_else(|| "OK".to_string()))
    }

    /// Perform a GET request and deserialize the response data.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.data(self.request(Method::GET, path), &format!("GET {}", path))
            .await
    }

    /// Perform a POST request with a JSON body and deserialize the response data.
    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.data(
            self.request(Method::POST, path).json(body),
            &format!("POST {}", path),
        )
        .await
    }

    /// Perform a POST request whose response carries only a message.
    pub async fn post_for_message<B: Serialize>(&self, path: &str, body: &B) -> Result<String> {
        self.message(
            self.request(Method::POST, path).json(body),
            &format!("POST {}", path),
        )
        .await
    }

    /// Perform a DELETE request and return the server's message.
    pub async fn delete(&self, path: &str) -> Result<String> {
        self.message(self.request(Method::DELETE, path), &format!("DELETE {}", path))
            .await
    }

    /// Perform a raw GET request and return the full JSON value (for health endpoint).
    pub async fn get_raw(&self, path: &str) -> Result<serde_json::Value> {
        let label = format!("GET {}", path);
        let resp = self
            .request(Method::GET, path)
            .send()
            .await
            .with_context(|| format!("{} failed", label))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_body(status, &body).into());
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_envelope_is_parsed() {
        let body = r#"{"success":false,"error":{"code":"FORBIDDEN","numeric_code":4001,"message":"Permission denied","timestamp":"2024-01-01T00:00:00Z"}}"#;
        let err = ApiError::from_body(StatusCode::FORBIDDEN, body);

        assert_eq!(err.code, "FORBIDDEN");
        assert_eq!(err.message, "Permission denied");
        assert_eq!(err.to_string(), "FORBIDDEN (403 Forbidden): Permission denied");
    }

    #[test]
    fn test_non_envelope_body_falls_back() {
        let err = ApiError::from_body(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.code, "HTTP_ERROR");
        assert_eq!(err.message, "upstream down");

        let err = ApiError::from_body(StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.message, "Bad Gateway");
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ApiClient::new("http://localhost:8080/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080");
    }
}
