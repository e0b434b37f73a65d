//! Crawl sources.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::client::ApiClient;
use crate::error::ClientResult;
use crate::pagination::{Page, Pagination};
use crate::transport::ApiRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Html,
    Api,
    Pdf,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Html => "html",
            SourceKind::Api => "api",
            SourceKind::Pdf => "pdf",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(SourceKind::Html),
            "api" => Ok(SourceKind::Api),
            "pdf" => Ok(SourceKind::Pdf),
            other => Err(format!("Unknown source kind '{}' (expected html, api or pdf)", other)),
        }
    }
}

/// How the crawler treats robots.txt for a source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotsMode {
    #[default]
    Allow,
    Disallow,
    Custom,
}

impl RobotsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RobotsMode::Allow => "allow",
            RobotsMode::Disallow => "disallow",
            RobotsMode::Custom => "custom",
        }
    }
}

impl fmt::Display for RobotsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for RobotsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(RobotsMode::Allow),
            "disallow" => Ok(RobotsMode::Disallow),
            "custom" => Ok(RobotsMode::Custom),
            other => Err(format!(
                "Unknown robots mode '{}' (expected allow, disallow or custom)",
                other
            )),
        }
    }
}

fn default_rate_limit() -> u32 {
    60
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub kind: SourceKind,
    pub base_url: String,
    #[serde(default)]
    pub auth_ref: Option<String>,
    #[serde(default)]
    pub robots_mode: RobotsMode,
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Validated body for `POST /sources/`. Built by [`crate::forms::SourceForm`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateSource {
    pub name: String,
    pub kind: SourceKind,
    pub base_url: String,
    pub auth_ref: Option<String>,
    pub robots_mode: RobotsMode,
    pub rate_limit: u32,
    pub enabled: bool,
}

/// Validated body for `PUT /sources/{id}`; absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UpdateSource {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<SourceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub robots_mode: Option<RobotsMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

pub struct SourcesApi<'a> {
    client: &'a ApiClient,
}

impl<'a> SourcesApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, page: Pagination) -> ClientResult<Page<Source>> {
        self.client
            .list(ApiRequest::get("/sources/").with_pagination(page))
            .await
    }

    pub async fn get(&self, id: i64) -> ClientResult<Source> {
        self.client
            .execute_json(ApiRequest::get(format!("/sources/{}", id)))
            .await
    }

    pub async fn create(&self, source: &CreateSource) -> ClientResult<Source> {
        let request = ApiRequest::post("/sources/").with_json(source)?;
        let created: Source = self.client.execute_json(request).await?;
        tracing::info!(source_id = created.id, name = %created.name, "Source created");
        Ok(created)
    }

    pub async fn update(&self, id: i64, patch: &UpdateSource) -> ClientResult<Source> {
        let request = ApiRequest::put(format!("/sources/{}", id)).with_json(patch)?;
        self.client.execute_json(request).await
    }

    pub async fn delete(&self, id: i64) -> ClientResult<()> {
        self.client
            .execute(ApiRequest::delete(format!("/sources/{}", id)))
            .await?;
        tracing::info!(source_id = id, "Source deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use crate::tokens::MemoryTokenStore;
    use crate::transport::RequestBody;
    use crate::ClientError;
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;

    fn client(transport: Arc<FakeTransport>) -> ApiClient {
        ApiClient::new(transport, Arc::new(MemoryTokenStore::with_tokens("acc", "ref")))
    }

    #[test]
    fn test_source_defaults_when_fields_missing() {
        let source: Source = serde_json::from_value(json!({
            "id": 1,
            "name": "EU Official Journal",
            "kind": "html",
            "base_url": "https://eur-lex.europa.eu"
        }))
        .unwrap();
        assert_eq!(source.robots_mode, RobotsMode::Allow);
        assert_eq!(source.rate_limit, 60);
        assert!(source.enabled);
        assert_eq!(source.auth_ref, None);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("PDF".parse::<SourceKind>().unwrap(), SourceKind::Pdf);
        assert!("rss".parse::<SourceKind>().is_err());
        assert_eq!("custom".parse::<RobotsMode>().unwrap(), RobotsMode::Custom);
    }

    #[test]
    fn test_update_serializes_only_supplied_fields() {
        let patch = UpdateSource {
            rate_limit: Some(120),
            enabled: Some(false),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({"rate_limit": 120, "enabled": false})
        );
    }

    #[tokio::test]
    async fn test_list_sends_limit_offset() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(
            Method::GET,
            "/sources/",
            200,
            json!([{"id": 1, "name": "a", "kind": "api", "base_url": "https://a.example"}]),
        );

        let page = client(transport.clone())
            .sources()
            .list(Pagination::limit_offset(100, 0))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page.total, None);
        assert_eq!(
            transport.requests()[0].query,
            vec![
                ("limit".to_string(), "100".to_string()),
                ("offset".to_string(), "0".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_create_and_delete() {
        let transport = Arc::new(FakeTransport::new());
        transport
            .respond(
                Method::POST,
                "/sources/",
                201,
                json!({"id": 9, "name": "n", "kind": "pdf", "base_url": "https://n.example", "rate_limit": 30}),
            )
            .respond(Method::DELETE, "/sources/9", 204, serde_json::Value::Null);
        let client = client(transport.clone());

        let created = client
            .sources()
            .create(&CreateSource {
                name: "n".to_string(),
                kind: SourceKind::Pdf,
                base_url: "https://n.example".to_string(),
                auth_ref: None,
                robots_mode: RobotsMode::Allow,
                rate_limit: 30,
                enabled: true,
            })
            .await
            .unwrap();
        assert_eq!(created.id, 9);
        assert!(matches!(
            &transport.requests()[0].body,
            RequestBody::Json(body) if body["kind"] == "pdf" && body["auth_ref"].is_null()
        ));

        client.sources().delete(9).await.unwrap();
        assert_eq!(transport.count(Method::DELETE, "/sources/9"), 1);
    }

    #[tokio::test]
    async fn test_get_missing_source() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(Method::GET, "/sources/404", 404, json!({"detail": "Source with id 404 not found"}));

        let err = client(transport).sources().get(404).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(ref m) if m == "Source with id 404 not found"));
    }
}
