//! Live observability stream.
//!
//! Subscribes to `GET /observability/stream?token=<access token>`, a
//! server-sent event channel where every message is a complete snapshot of
//! the outbox and the most recent runs. Each parseable message replaces the
//! held snapshot wholesale. The channel is opened once; after an error or a
//! close it stays disconnected.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::scheduling::{OutboxEntry, Run};
use crate::client::ApiClient;
use crate::sse::SseDecoder;
use crate::tokens::TokenStore;
use crate::transport::Transport;

pub const STREAM_PATH: &str = "/observability/stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
        };
        f.pad(s)
    }
}

/// Server-pushed view of the outbox and recent runs.
///
/// The server sends `{"error": "..."}` when it fails to build a snapshot;
/// that decodes as empty lists with `error` set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    #[serde(default)]
    pub outbox: Vec<OutboxEntry>,
    #[serde(default)]
    pub runs: Vec<Run>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Input to the connection state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Opened,
    Message(String),
    Failed(String),
    Closed,
}

/// Connection status plus the latest snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveView {
    pub status: ConnectionState,
    pub snapshot: LiveSnapshot,
    /// Messages dropped because they did not parse.
    pub malformed: u64,
}

impl LiveView {
    fn connecting() -> Self {
        Self {
            status: ConnectionState::Connecting,
            snapshot: LiveSnapshot::default(),
            malformed: 0,
        }
    }

    fn disconnected() -> Self {
        Self {
            status: ConnectionState::Disconnected,
            ..Self::connecting()
        }
    }

    /// Advance the state machine. Returns whether the view changed.
    pub fn apply(&mut self, event: LiveEvent) -> bool {
        if self.status == ConnectionState::Disconnected {
            return false;
        }

        match event {
            LiveEvent::Opened => {
                let changed = self.status != ConnectionState::Connected;
                self.status = ConnectionState::Connected;
                changed
            }
            LiveEvent::Message(data) => match serde_json::from_str::<LiveSnapshot>(&data) {
                Ok(snapshot) => {
                    self.snapshot = snapshot;
                    true
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Dropping malformed live message");
                    self.malformed += 1;
                    true
                }
            },
            LiveEvent::Failed(reason) => {
                tracing::warn!(reason = %reason, "Live stream disconnected");
                self.status = ConnectionState::Disconnected;
                true
            }
            LiveEvent::Closed => {
                tracing::debug!("Live stream closed");
                self.status = ConnectionState::Disconnected;
                true
            }
        }
    }
}

/// Handle on one live channel. Dropping it stops the reader.
pub struct LiveStream {
    view: Arc<watch::Sender<LiveView>>,
    task: Option<JoinHandle<()>>,
}

impl LiveStream {
    /// Open the channel with the currently stored access token.
    ///
    /// Without a token nothing is opened and the stream reports
    /// `Disconnected` straight away. Must be called within a Tokio runtime.
    pub fn open(transport: Arc<dyn Transport>, tokens: &dyn TokenStore) -> Self {
        let token = tokens.access_token();
        if token.is_empty() {
            tracing::info!("No access token, live stream not opened");
            let (view, _) = watch::channel(LiveView::disconnected());
            return Self {
                view: Arc::new(view),
                task: None,
            };
        }

        let (view, _) = watch::channel(LiveView::connecting());
        let view = Arc::new(view);
        let task = tokio::spawn(pump(transport, token, view.clone()));

        Self {
            view,
            task: Some(task),
        }
    }

    /// Open the channel using a client's transport and credentials.
    pub fn from_client(client: &ApiClient) -> Self {
        Self::open(client.transport().clone(), client.tokens().as_ref())
    }

    pub fn status(&self) -> ConnectionState {
        self.view.borrow().status
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        self.view.borrow().snapshot.clone()
    }

    pub fn view(&self) -> LiveView {
        self.view.borrow().clone()
    }

    /// Receiver notified on every status or snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<LiveView> {
        self.view.subscribe()
    }

    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.view.send_if_modified(|view| view.apply(LiveEvent::Closed));
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn pump(transport: Arc<dyn Transport>, token: String, view: Arc<watch::Sender<LiveView>>) {
    let query = vec![("token".to_string(), token)];
    tracing::info!(path = %format!("{}?token=***", STREAM_PATH), "Opening live stream");

    let mut body = match transport.open_stream(STREAM_PATH, &query).await {
        Ok(body) => body,
        Err(e) => {
            view.send_if_modified(|v| v.apply(LiveEvent::Failed(e.to_string())));
            return;
        }
    };
    view.send_if_modified(|v| v.apply(LiveEvent::Opened));

    let mut decoder = SseDecoder::new();
    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                view.send_if_modified(|v| v.apply(LiveEvent::Failed(e.to_string())));
                return;
            }
        };

        for event in decoder.feed(&bytes) {
            if !event.is_message() {
                tracing::debug!(event = %event.event, "Ignoring named live event");
                continue;
            }
            view.send_if_modified(|v| v.apply(LiveEvent::Message(event.data)));
        }
    }

    view.send_if_modified(|v| v.apply(LiveEvent::Failed("stream ended by server".to_string())));
}
