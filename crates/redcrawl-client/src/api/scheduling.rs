//! Scheduler control: batch triggers, runs and the outbox.

use serde::{Deserialize, Serialize};

use crate::client::ApiClient;
use crate::error::ClientResult;
use crate::pagination::{Page, Pagination};
use crate::transport::ApiRequest;

pub const DEFAULT_TICK_BATCH: u32 = 100;
pub const DEFAULT_COMPUTE_NEXT_BATCH: u32 = 500;
pub const DEFAULT_DISPATCH_BATCH: u32 = 200;

/// Largest batch the backend accepts.
pub const MAX_BATCH: u32 = 5000;

/// One execution of a subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    #[serde(default)]
    pub subscription_id: Option<i64>,
    pub run_kind: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
    pub status: String,
}

/// Pending or delivered outbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: i64,
    #[serde(default)]
    pub created_at: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub status: String,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickResult {
    pub processed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeNextResult {
    pub updated: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub published: u64,
}

pub struct SchedulingApi<'a> {
    client: &'a ApiClient,
}

impl<'a> SchedulingApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Create runs for subscriptions that are due.
    pub async fn tick(&self, batch_size: u32) -> ClientResult<TickResult> {
        let result: TickResult = self.batch("/scheduling/tick", batch_size).await?;
        tracing::info!(processed = result.processed, "Scheduler tick");
        Ok(result)
    }

    /// Recompute next run times from the cron schedules.
    pub async fn compute_next(&self, batch_size: u32) -> ClientResult<ComputeNextResult> {
        let result: ComputeNextResult = self.batch("/scheduling/compute-next", batch_size).await?;
        tracing::info!(updated = result.updated, "Next run times computed");
        Ok(result)
    }

    /// Publish pending outbox entries.
    pub async fn dispatch_outbox(&self, batch_size: u32) -> ClientResult<DispatchResult> {
        let result: DispatchResult = self.batch("/scheduling/outbox/dispatch", batch_size).await?;
        tracing::info!(published = result.published, "Outbox dispatched");
        Ok(result)
    }

    pub async fn runs(&self, page: Pagination) -> ClientResult<Page<Run>> {
        self.client
            .list(ApiRequest::get("/scheduling/runs").with_pagination(page))
            .await
    }

    pub async fn outbox(&self, status: Option<&str>, page: Pagination) -> ClientResult<Page<OutboxEntry>> {
        let request = ApiRequest::get("/scheduling/outbox")
            .with_optional_query("status", status)
            .with_pagination(page);
        self.client.list(request).await
    }

    async fn batch<T: serde::de::DeserializeOwned>(&self, path: &str, batch_size: u32) -> ClientResult<T> {
        let request =
            ApiRequest::post(path).with_json(&serde_json::json!({ "batch_size": batch_size }))?;
        self.client.execute_json(request).await
    }
}
