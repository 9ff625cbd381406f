//! HTTP client for the project management service.
//!
//! Every tool goes through [`BackendClient::send`], which owns the URL
//! layout, auth headers and the mapping from transport/HTTP failures to
//! [`ToolError`]s.

use devpilot_config::BackendConfig;
use devpilot_core::error::ToolError;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    api_prefix: String,
    auth_token: Option<String>,
    user_id: Option<String>,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_prefix: "/api/agent".into(),
            auth_token: None,
            user_id: None,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        let mut client = Self::new(&config.base_url)
            .with_api_prefix(&config.api_prefix)
            .with_timeout(Duration::from_secs(config.timeout_secs));
        client.auth_token = config.auth_token.clone();
        client.user_id = config.user_id.clone();
        client
    }

    pub fn with_api_prefix(mut self, prefix: &str) -> Self {
        let trimmed = prefix.trim_matches('/');
        self.api_prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.api_prefix, path)
    }

    /// Perform exactly one request and decode the JSON response.
    ///
    /// An empty 2xx body decodes to `{"status": <code>}`; a non-JSON body
    /// decodes to a string value.
    pub async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ToolError> {
        let url = self.url(path);
        debug!(%method, %url, "Calling project service");

        let mut request = self.http.request(method, &url).timeout(self.timeout);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        if let Some(user_id) = &self.user_id {
            request = request.header("X-User-ID", user_id);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(ToolError::Remote {
                status: Some(status.as_u16()),
                message: describe_failure(status, &text),
            });
        }

        if text.trim().is_empty() {
            return Ok(json!({ "status": status.as_u16() }));
        }

        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    pub async fn get(&self, path: &str) -> Result<Value, ToolError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ToolError> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, ToolError> {
        self.send(Method::PUT, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value, ToolError> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ToolError> {
        self.send(Method::DELETE, path, None).await
    }

    fn transport_error(&self, e: reqwest::Error) -> ToolError {
        if e.is_timeout() {
            ToolError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else if e.is_connect() {
            ToolError::Remote {
                status: None,
                message: format!("could not connect to the project service at {}", self.base_url),
            }
        } else {
            ToolError::Remote {
                status: None,
                message: format!("request to the project service failed: {e}"),
            }
        }
    }
}

/// Build a readable message from an error response, preferring the
/// backend's own `message`/`error` field.
fn describe_failure(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error", "detail"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().chars().take(200).collect());

    let reason = status.canonical_reason().unwrap_or("error");
    if detail.is_empty() {
        format!("HTTP {} {reason}", status.as_u16())
    } else {
        format!("HTTP {} {reason}: {detail}", status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_prefix_and_path() {
        let client = BackendClient::new("http://localhost:8080/");
        assert_eq!(client.url("/projects/3"), "http://localhost:8080/api/agent/projects/3");

        let bare = BackendClient::new("http://pm").with_api_prefix("");
        assert_eq!(bare.url("/tasks/all"), "http://pm/tasks/all");

        let custom = BackendClient::new("http://pm").with_api_prefix("api/v2/");
        assert_eq!(custom.url("/tasks/all"), "http://pm/api/v2/tasks/all");
    }

    #[test]
    fn from_config_copies_settings() {
        let config = BackendConfig {
            base_url: "https://pm.example.com".into(),
            api_prefix: "/api/agent".into(),
            auth_token: Some("jwt".into()),
            user_id: Some("7".into()),
            timeout_secs: 3,
        };
        let client = BackendClient::from_config(&config);
        assert_eq!(client.timeout(), Duration::from_secs(3));
        assert_eq!(client.auth_token.as_deref(), Some("jwt"));
        assert_eq!(client.user_id.as_deref(), Some("7"));
    }

    #[test]
    fn failure_description_prefers_backend_message() {
        let msg = describe_failure(StatusCode::NOT_FOUND, r#"{"message":"Project 9 not found"}"#);
        assert_eq!(msg, "HTTP 404 Not Found: Project 9 not found");

        let plain = describe_failure(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(plain, "HTTP 500 Internal Server Error");
    }
}
