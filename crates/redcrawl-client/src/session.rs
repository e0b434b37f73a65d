//! Signed-in operator session.
//!
//! Tracks who is logged in, derived from `/auth/me`, and whether that lookup
//! is still pending. Surfaces gate themselves on [`Session::guard`].

use std::sync::Arc;
use tokio::sync::{watch, OnceCell};

use crate::api::auth::User;
use crate::client::ApiClient;
use crate::error::ClientResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<User>,
    /// True until the initial user lookup has settled.
    pub loading: bool,
}

/// Outcome of the route guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Initial lookup still running; show a placeholder.
    Pending,
    /// Settled with nobody signed in.
    RedirectToLogin,
    Allow(User),
}

pub struct Session {
    client: Arc<ApiClient>,
    state: watch::Sender<SessionState>,
    started: OnceCell<()>,
}

impl Session {
    pub fn new(client: Arc<ApiClient>) -> Self {
        let (state, _) = watch::channel(SessionState {
            user: None,
            loading: true,
        });
        Self {
            client,
            state,
            started: OnceCell::new(),
        }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// Run the initial user lookup. Later calls wait for the first one and
    /// return without fetching again.
    pub async fn start(&self) {
        self.started
            .get_or_init(|| async {
                self.state.send_modify(|s| s.loading = true);
                self.refresh_me().await;
                self.state.send_modify(|s| s.loading = false);
            })
            .await;
    }

    /// Re-fetch the current user. Any failure leaves nobody signed in.
    pub async fn refresh_me(&self) -> Option<User> {
        let user = match self.client.auth().me().await {
            Ok(user) => {
                tracing::debug!(user = %user.username, "Session user loaded");
                Some(user)
            }
            Err(e) => {
                tracing::debug!(error = %e, "No session user");
                None
            }
        };
        self.state.send_modify(|s| s.user = user.clone());
        user
    }

    /// Exchange credentials, persist the new pair and load the user.
    ///
    /// Errors from the credential exchange are returned; a failed user
    /// lookup afterwards is not an error and yields `None`.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Option<User>> {
        let pair = self.client.auth().issue_token(username, password).await?;
        self.client
            .tokens()
            .set_tokens(&pair.access_token, &pair.refresh_token);
        tracing::info!(username = %username, "Logged in");
        Ok(self.refresh_me().await)
    }

    /// Forget the credentials locally. No backend call is made.
    pub fn logout(&self) {
        self.client.tokens().clear_tokens();
        self.state.send_modify(|s| s.user = None);
        tracing::info!("Logged out");
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn guard(&self) -> RouteDecision {
        let state = self.state.borrow();
        match (&state.user, state.loading) {
            (_, true) => RouteDecision::Pending,
            (None, false) => RouteDecision::RedirectToLogin,
            (Some(user), false) => RouteDecision::Allow(user.clone()),
        }
    }
}
