//! Common utilities for the IPAM API client
//!
//! Provides the authenticated HTTP wrapper shared by every resource.

pub mod query;

use crate::error::IpamError;
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// HTTP client wrapper with bearer authentication
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    pub fn new(client: Client, base_url: String, token: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a full URL from a path
    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.build_url(path))
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
    }

    /// Send a request and hand back the body of a 2xx response.
    async fn execute(&self, method: Method, path: &str, builder: RequestBuilder) -> Result<String, IpamError> {
        let response = builder.send().await.map_err(IpamError::Http)?;
        let status = response.status();
        let body = response.text().await.map_err(IpamError::Http)?;

        if !status.is_success() {
            debug!("{} {} failed: {}", method, path, status);
            return Err(IpamError::from_response(method.as_str(), path, status.as_u16(), &body));
        }

        Ok(body)
    }

    fn decode<T: DeserializeOwned>(path: &str, body: &str) -> Result<T, IpamError> {
        serde_json::from_str(body).map_err(|e| IpamError::Decode {
            path: path.to_string(),
            message: format!(
                "{} - Response (first 500 chars): {}",
                e,
                body.chars().take(500).collect::<String>()
            ),
        })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, IpamError> {
        debug!("GET {}", path);
        let body = self.execute(Method::GET, path, self.request(Method::GET, path)).await?;
        Self::decode(path, &body)
    }

    /// Make a POST request with a JSON body
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, IpamError> {
        debug!("POST {} with body: {}", path, serde_json::to_string(body).unwrap_or_default());
        let builder = self.request(Method::POST, path).json(body);
        let text = self.execute(Method::POST, path, builder).await?;
        Self::decode(path, &text)
    }

    /// Make a PUT request with a JSON body
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, IpamError> {
        debug!("PUT {} with body: {}", path, serde_json::to_string(body).unwrap_or_default());
        let builder = self.request(Method::PUT, path).json(body);
        let text = self.execute(Method::PUT, path, builder).await?;
        Self::decode(path, &text)
    }

    /// Make a DELETE request; any 2xx (including 204) is success.
    pub async fn delete(&self, path: &str) -> Result<(), IpamError> {
        debug!("DELETE {}", path);
        self.execute(Method::DELETE, path, self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    /// Build query string from filters
    pub fn build_query_string(filters: &[(&str, String)]) -> String {
        filters
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Append a query string to `path` when there is anything to send
    pub fn with_query(path: &str, filters: &[(&str, String)]) -> String {
        if filters.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, Self::build_query_string(filters))
        }
    }
}

/// Escape a resource ID for use as a single path segment
pub fn path_segment(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}
