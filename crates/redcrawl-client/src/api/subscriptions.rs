//! Monitoring subscriptions: a source, a jurisdiction and a cron schedule.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::client::ApiClient;
use crate::error::ClientResult;
use crate::pagination::{Page, Pagination};
use crate::transport::ApiRequest;

const BASE_PATH: &str = "/scheduling/subscriptions";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    #[default]
    Active,
    Disabled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            "DISABLED" => Ok(SubscriptionStatus::Disabled),
            other => Err(format!("Unknown status '{}' (expected ACTIVE or DISABLED)", other)),
        }
    }
}

/// List form of a subscription.
///
/// `status` stays a string: the backend may report states this client does
/// not know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: i64,
    pub schedule: String,
    #[serde(default)]
    pub last_run_at: Option<String>,
    #[serde(default)]
    pub next_run_at: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionDetail {
    pub id: i64,
    pub source_id: i64,
    pub jurisdiction: String,
    #[serde(default)]
    pub selectors: serde_json::Map<String, serde_json::Value>,
    pub schedule: String,
    #[serde(default)]
    pub last_run_at: Option<String>,
    #[serde(default)]
    pub next_run_at: Option<String>,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Validated body for subscription creation. Built by
/// [`crate::forms::SubscriptionForm`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateSubscription {
    pub source_id: i64,
    pub jurisdiction: String,
    pub selectors: serde_json::Map<String, serde_json::Value>,
    pub schedule: String,
    pub status: SubscriptionStatus,
}

pub struct SubscriptionsApi<'a> {
    client: &'a ApiClient,
}

impl<'a> SubscriptionsApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, status: Option<&str>, page: Pagination) -> ClientResult<Page<Subscription>> {
        let request = ApiRequest::get(BASE_PATH)
            .with_optional_query("status", status)
            .with_pagination(page);
        self.client.list(request).await
    }

    pub async fn get(&self, id: i64) -> ClientResult<SubscriptionDetail> {
        self.client
            .execute_json(ApiRequest::get(format!("{}/{}", BASE_PATH, id)))
            .await
    }

    pub async fn create(&self, subscription: &CreateSubscription) -> ClientResult<Subscription> {
        let request = ApiRequest::post(BASE_PATH).with_json(subscription)?;
        let created: Subscription = self.client.execute_json(request).await?;
        tracing::info!(subscription_id = created.id, schedule = %created.schedule, "Subscription created");
        Ok(created)
    }

    pub async fn enable(&self, id: i64) -> ClientResult<Subscription> {
        self.set_status(id, "enable", SubscriptionStatus::Active).await
    }

    pub async fn disable(&self, id: i64) -> ClientResult<Subscription> {
        self.set_status(id, "disable", SubscriptionStatus::Disabled).await
    }

    /// Trigger an immediate run outside the schedule.
    pub async fn run_now(&self, id: i64) -> ClientResult<serde_json::Value> {
        let response = self
            .client
            .execute(ApiRequest::post(format!("{}/{}/run", BASE_PATH, id)))
            .await?;
        if response.body.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        response.json()
    }

    async fn set_status(
        &self,
        id: i64,
        action: &str,
        status: SubscriptionStatus,
    ) -> ClientResult<Subscription> {
        let request = ApiRequest::post(format!("{}/{}/{}", BASE_PATH, id, action))
            .with_json(&serde_json::json!({ "status": status }))?;
        let updated: Subscription = self.client.execute_json(request).await?;
        tracing::info!(subscription_id = id, status = %updated.status, "Subscription status changed");
        Ok(updated)
    }
}
