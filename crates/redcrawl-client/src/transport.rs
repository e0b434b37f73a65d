//! HTTP transport.
//!
//! `Transport` is the seam between the authenticated client and the wire.
//! `ReqwestTransport` is the production implementation; tests substitute a
//! scripted fake.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::pagination::Pagination;

/// Request body variants used by the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

/// Outgoing API request, relative to the configured base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub(crate) retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a query parameter only when a value is present.
    pub fn with_optional_query<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with_query(key, v),
            None => self,
        }
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.query.extend(pagination.query_pairs());
        self
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> ClientResult<Self> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn with_form(mut self, fields: &[(&str, &str)]) -> Self {
        self.body = RequestBody::Form(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    /// Whether this request is already the one refresh-driven retry.
    pub fn is_retry(&self) -> bool {
        self.retried
    }
}

/// Raw API response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> ClientResult<T> {
        serde_json::from_slice(&self.body).map_err(ClientError::from)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// Chunked response body of a streaming request.
pub type ByteStream = BoxStream<'static, ClientResult<Vec<u8>>>;

/// Wire-level transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return the response whatever its status.
    async fn send(&self, request: &ApiRequest) -> ClientResult<ApiResponse>;

    /// Open a long-lived server-push response. Non-success statuses are
    /// returned as errors.
    async fn open_stream(&self, path: &str, query: &[(String, String)]) -> ClientResult<ByteStream>;
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    stream_client: reqwest::Client,
    config: ClientConfig,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        // The live stream never completes, so it must not inherit the request timeout.
        let stream_client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            stream_client,
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> ClientResult<ApiResponse> {
        let url = self.config.endpoint(&request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Form(fields) => builder.form(fields),
        };

        tracing::debug!(method = %request.method, url = %url, "Sending request");

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        tracing::debug!(method = %request.method, url = %url, status = status.as_u16(), "Response received");

        Ok(ApiResponse { status, body })
    }

    async fn open_stream(&self, path: &str, query: &[(String, String)]) -> ClientResult<ByteStream> {
        let url = self.config.endpoint(path);
        let response = self
            .stream_client
            .get(&url)
            .header(ACCEPT, HeaderValue::from_static("text/event-stream"))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
            return Err(ClientError::from_status(status, &body));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(ClientError::from))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let request = ApiRequest::get("/scheduling/outbox")
            .with_optional_query("status", Some("PENDING"))
            .with_optional_query::<String>("unused", None)
            .with_pagination(Pagination::limit_offset(20, 40));

        assert_eq!(request.method, Method::GET);
        assert_eq!(
            request.query,
            vec![
                ("status".to_string(), "PENDING".to_string()),
                ("limit".to_string(), "20".to_string()),
                ("offset".to_string(), "40".to_string()),
            ]
        );
        assert!(!request.is_retry());
    }

    #[test]
    fn test_form_and_json_bodies() {
        let request = ApiRequest::post("/auth/token").with_form(&[("username", "ops"), ("password", "pw")]);
        assert_eq!(
            request.body,
            RequestBody::Form(vec![
                ("username".to_string(), "ops".to_string()),
                ("password".to_string(), "pw".to_string()),
            ])
        );

        let request = ApiRequest::post("/scheduling/tick")
            .with_json(&serde_json::json!({"batch_size": 100}))
            .unwrap();
        assert_eq!(request.body, RequestBody::Json(serde_json::json!({"batch_size": 100})));
    }

    #[test]
    fn test_response_json_decode_error() {
        let response = ApiResponse::new(StatusCode::OK, "not json");
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
        assert_eq!(response.text(), "not json");
    }

    #[test]
    fn test_transport_creation() {
        let config = ClientConfig::new("http://localhost:8000/").unwrap();
        let transport = ReqwestTransport::new(&config).unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8000");
    }
}
