//! Typed calls for the backend resources the operator works with.
//!
//! Each resource is reached through a short-lived handle borrowed from the
//! [`ApiClient`], e.g. `client.sources().list(page)`. All calls go through
//! [`ApiClient::execute`] and share its credential handling.

pub mod auth;
pub mod documents;
pub mod scheduling;
pub mod sources;
pub mod subscriptions;

use serde::de::DeserializeOwned;

use crate::client::ApiClient;
use crate::error::ClientResult;
use crate::pagination::{Listing, Page};
use crate::transport::ApiRequest;

pub use auth::{AuthApi, RegisterRequest, User};
pub use documents::{
    AuditTrailEvent, Document, DocumentDetail, DocumentFilter, DocumentVersion, DocumentsApi,
    ParsedDocument, ParsedSection, SectionTable, TimelineStatus,
};
pub use scheduling::{
    ComputeNextResult, DispatchResult, OutboxEntry, Run, SchedulingApi, TickResult,
};
pub use sources::{CreateSource, RobotsMode, Source, SourceKind, SourcesApi, UpdateSource};
pub use subscriptions::{
    CreateSubscription, Subscription, SubscriptionDetail, SubscriptionStatus, SubscriptionsApi,
};

impl ApiClient {
    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(self)
    }

    pub fn sources(&self) -> SourcesApi<'_> {
        SourcesApi::new(self)
    }

    pub fn subscriptions(&self) -> SubscriptionsApi<'_> {
        SubscriptionsApi::new(self)
    }

    pub fn scheduling(&self) -> SchedulingApi<'_> {
        SchedulingApi::new(self)
    }

    pub fn documents(&self) -> DocumentsApi<'_> {
        DocumentsApi::new(self)
    }

    /// Execute a listing request and normalize whichever shape comes back.
    pub(crate) async fn list<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<Page<T>> {
        let listing: Listing<T> = self.execute_json(request).await?;
        Ok(listing.into())
    }
}

/// Generic `{"message": ...}` acknowledgement.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub message: String,
}
