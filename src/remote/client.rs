//! HTTP JSON client for the ERP backend.

use std::path::Path;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ApiSettings;
use crate::error::{Error, Result};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client bound to one backend.
///
/// Cheap to clone: the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client with the default timeout and no token.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Create a client from resolved settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            token: settings.api_token.clone(),
        })
    }

    /// Attach a bearer token to every request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.url(path);
        debug!(%method, %url, "API request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET a JSON resource.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure, non-2xx status, or a body
    /// that does not match `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.request(Method::GET, path).send().await?;
        read_json(response).await
    }

    /// GET a JSON resource with query parameters.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::get_json`].
    pub async fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T> {
        let response = self.request(Method::GET, path).query(query).send().await?;
        read_json(response).await
    }

    /// POST a JSON body.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::get_json`].
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(Method::POST, path).json(body).send().await?;
        read_json(response).await
    }

    /// PATCH a JSON body.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::get_json`].
    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.request(Method::PATCH, path).json(body).send().await?;
        read_json(response).await
    }

    /// Upload a file as `multipart/form-data` under the `file` part.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the request fails.
    pub async fn upload_file<T: DeserializeOwned>(
        &self,
        path: &str,
        file_path: &Path,
        fields: &[(&str, String)],
    ) -> Result<T> {
        if !file_path.exists() {
            return Err(Error::FileNotFound {
                path: file_path.to_path_buf(),
            });
        }

        let bytes = std::fs::read(file_path)?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        let mut form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));
        for (name, value) in fields {
            form = form.text((*name).to_string(), value.clone());
        }

        let response = self
            .request(Method::POST, path)
            .multipart(form)
            .send()
            .await?;
        read_json(response).await
    }

    /// GET raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error on network failure or non-2xx status.
    pub async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let response = self.request(Method::GET, path).send().await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        message: error_message(&body, status.canonical_reason().unwrap_or("request failed")),
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = check_status(response).await?;
    let text = response.text().await?;

    // 204 and empty 200 bodies decode as JSON null.
    if text.trim().is_empty() {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Human-readable message from an error body.
///
/// Takes the first of `detail`, `message`, `error` from a JSON object,
/// otherwise the raw body, otherwise `fallback`.
#[must_use]
pub fn error_message(body: &str, fallback: &str) -> String {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "message", "error"] {
            match obj.get(key) {
                Some(Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }

    let body = body.trim();
    if body.is_empty() {
        fallback.to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_detail() {
        let body = r#"{"message":"generic","detail":"Partner not found."}"#;
        assert_eq!(error_message(body, "x"), "Partner not found.");
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(error_message(r#"{"error":"bad token"}"#, "x"), "bad token");
        assert_eq!(
            error_message(r#"{"error":{"code":7}}"#, "x"),
            r#"{"code":7}"#
        );
        assert_eq!(error_message("Bad Gateway", "x"), "Bad Gateway");
        assert_eq!(error_message("  ", "Internal Server Error"), "Internal Server Error");
        assert_eq!(error_message(r#"{"other":1}"#, "x"), r#"{"other":1}"#);
    }

    #[test]
    fn test_url_joining() {
        let client = ApiClient::new("http://localhost:8000/api/");
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(client.url("/partners/1/"), "http://localhost:8000/api/partners/1/");
        assert_eq!(client.url("exports/"), "http://localhost:8000/api/exports/");
    }
}
