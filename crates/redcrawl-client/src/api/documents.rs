//! Crawled documents, their versions and the audit trail behind each version.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::client::ApiClient;
use crate::error::ClientResult;
use crate::pagination::{Page, Pagination};
use crate::transport::ApiRequest;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub source_id: i64,
    pub source_url: String,
    #[serde(default)]
    pub published_date: Option<String>,
    pub language: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVersion {
    pub id: i64,
    pub document_id: i64,
    pub parsed_uri: String,
    #[serde(default)]
    pub diff_uri: Option<String>,
    pub content_hash: String,
    pub created_at: String,
}

/// A document with all of its versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    #[serde(default)]
    pub versions: Vec<DocumentVersion>,
    #[serde(default)]
    pub version_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionTable {
    #[serde(rename = "type")]
    pub kind: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A heading-delimited section of a parsed page (levels 1-4 for H1-H4).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsedSection {
    pub id: i64,
    pub heading: String,
    pub level: u32,
    pub text: String,
    pub byte_offset_start: u64,
    pub byte_offset_end: u64,
    pub sha256: String,
    pub tables: Vec<SectionTable>,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub source_url: String,
    #[serde(default)]
    pub published_date: Option<String>,
    pub language: String,
    pub fetch_timestamp: String,
    #[serde(default)]
    pub sections: Vec<ParsedSection>,
}

impl ParsedDocument {
    pub fn total_bytes(&self) -> u64 {
        self.sections
            .iter()
            .map(|s| s.byte_offset_end.saturating_sub(s.byte_offset_start))
            .sum()
    }
}

/// One step of the pipeline that produced a document version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrailEvent {
    #[serde(deserialize_with = "string_or_number")]
    pub event_id: String,
    pub event_type: String,
    pub status: String,
    pub timestamp: String,
    #[serde(default)]
    pub run_id: Option<i64>,
    #[serde(default)]
    pub run_kind: Option<String>,
    #[serde(default)]
    pub version_id: Option<i64>,
    #[serde(default)]
    pub parsed_uri: Option<String>,
    #[serde(default)]
    pub diff_uri: Option<String>,
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub artifact_ids: Vec<String>,
    #[serde(default)]
    pub artifact_uris: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl AuditTrailEvent {
    /// `versioning.result` -> `Versioning Result`.
    pub fn title(&self) -> String {
        self.event_type
            .split('.')
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }

    pub fn timeline_status(&self) -> TimelineStatus {
        TimelineStatus::from_status(&self.status)
    }
}

/// How an audit event is marked on the version timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineStatus {
    Success,
    Warning,
    Pending,
    Done,
}

impl TimelineStatus {
    pub fn from_status(status: &str) -> Self {
        match status {
            "COMPLETED" | "PUBLISHED" => TimelineStatus::Success,
            "FAILED" => TimelineStatus::Warning,
            "PENDING" | "RUNNING" => TimelineStatus::Pending,
            _ => TimelineStatus::Done,
        }
    }
}

impl fmt::Display for TimelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimelineStatus::Success => "success",
            TimelineStatus::Warning => "warning",
            TimelineStatus::Pending => "pending",
            TimelineStatus::Done => "done",
        };
        f.pad(s)
    }
}

#[derive(Debug, Default, Deserialize)]
struct AuditTrail {
    #[serde(default)]
    events: Vec<AuditTrailEvent>,
}

/// Optional filters for the document listing.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    pub source_id: Option<i64>,
    pub language: Option<String>,
}

pub struct DocumentsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> DocumentsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, page: Pagination, filter: &DocumentFilter) -> ClientResult<Page<Document>> {
        let request = ApiRequest::get("/documents")
            .with_pagination(page)
            .with_optional_query("source_id", filter.source_id)
            .with_optional_query("language", filter.language.as_deref());
        self.client.list(request).await
    }

    pub async fn list_with_versions(&self, page: Pagination) -> ClientResult<Page<DocumentDetail>> {
        self.client
            .list(ApiRequest::get("/documents/with-versions").with_pagination(page))
            .await
    }

    pub async fn get(&self, id: i64) -> ClientResult<Document> {
        self.client
            .execute_json(ApiRequest::get(format!("/documents/{}", id)))
            .await
    }

    pub async fn versions(&self, id: i64) -> ClientResult<DocumentDetail> {
        self.client
            .execute_json(ApiRequest::get(format!("/documents/{}/versions", id)))
            .await
    }

    pub async fn by_url(&self, source_url: &str) -> ClientResult<Document> {
        let path = format!("/documents/by-url/{}", encode_path_segment(source_url));
        self.client.execute_json(ApiRequest::get(path)).await
    }

    pub async fn parsed(&self, id: i64, version_id: i64) -> ClientResult<ParsedDocument> {
        self.client
            .execute_json(ApiRequest::get(format!(
                "/documents/{}/versions/{}/parsed",
                id, version_id
            )))
            .await
    }

    /// Pipeline events for one version, oldest first as delivered.
    pub async fn audit_trail(&self, id: i64, version_id: i64) -> ClientResult<Vec<AuditTrailEvent>> {
        let trail: AuditTrail = self
            .client
            .execute_json(ApiRequest::get(format!(
                "/documents/{}/versions/{}/audit-trail",
                id, version_id
            )))
            .await?;
        Ok(trail.events)
    }
}

/// Event ids are opaque; some pipeline stages emit them as integers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn encode_path_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
