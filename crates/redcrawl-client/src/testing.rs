//! Scripted fakes shared by unit tests.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Method, StatusCode};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::client::LoginRedirect;
use crate::error::{ClientError, ClientResult};
use crate::transport::{ApiRequest, ApiResponse, ByteStream, Transport};

/// Pauses a route until the test releases it.
#[derive(Clone, Default)]
pub(crate) struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

enum StreamScript {
    Chunks { chunks: Vec<Vec<u8>>, hold_open: bool },
    Fail { status: u16, message: String },
}

/// Transport answering from per-route queues of canned responses.
#[derive(Default)]
pub(crate) struct FakeTransport {
    routes: Mutex<HashMap<String, VecDeque<ApiResponse>>>,
    gates: Mutex<HashMap<String, Gate>>,
    requests: Mutex<Vec<ApiRequest>>,
    stream: Mutex<Option<StreamScript>>,
    stream_queries: Mutex<Vec<Vec<(String, String)>>>,
}

fn route_key(method: &Method, path: &str) -> String {
    format!("{} {}", method, path)
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next matching request.
    pub fn respond(&self, method: Method, path: &str, status: u16, body: serde_json::Value) -> &Self {
        let status = StatusCode::from_u16(status).expect("valid status");
        let body = if body.is_null() {
            Vec::new()
        } else {
            serde_json::to_vec(&body).expect("serializable body")
        };
        self.routes
            .lock()
            .unwrap()
            .entry(route_key(&method, path))
            .or_default()
            .push_back(ApiResponse::new(status, body));
        self
    }

    /// Hold requests on a route until `Gate::release` is notified.
    pub fn gate(&self, method: Method, path: &str) -> Gate {
        let gate = Gate::default();
        self.gates
            .lock()
            .unwrap()
            .insert(route_key(&method, path), gate.clone());
        gate
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn stream_chunks(&self, chunks: &[&str], hold_open: bool) {
        *self.stream.lock().unwrap() = Some(StreamScript::Chunks {
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
            hold_open,
        });
    }

    pub fn stream_failure(&self, status: u16, message: &str) {
        *self.stream.lock().unwrap() = Some(StreamScript::Fail {
            status,
            message: message.to_string(),
        });
    }

    pub fn stream_queries(&self) -> Vec<Vec<(String, String)>> {
        self.stream_queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: &ApiRequest) -> ClientResult<ApiResponse> {
        let key = route_key(&request.method, &request.path);
        self.requests.lock().unwrap().push(request.clone());

        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let next = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());

        next.ok_or_else(|| ClientError::Transport(format!("no scripted response for {}", key)))
    }

    async fn open_stream(&self, _path: &str, query: &[(String, String)]) -> ClientResult<ByteStream> {
        self.stream_queries.lock().unwrap().push(query.to_vec());

        match self.stream.lock().unwrap().take() {
            Some(StreamScript::Chunks { chunks, hold_open }) => {
                let body = stream::iter(chunks.into_iter().map(Ok));
                if hold_open {
                    Ok(body.chain(stream::pending()).boxed())
                } else {
                    Ok(body.boxed())
                }
            }
            Some(StreamScript::Fail { status, message }) => Err(ClientError::from_status(
                StatusCode::from_u16(status).expect("valid status"),
                message.as_bytes(),
            )),
            None => Err(ClientError::Transport("connection refused".to_string())),
        }
    }
}

/// Counts login redirects.
#[derive(Default)]
pub(crate) struct RecordingRedirect {
    count: AtomicUsize,
}

impl RecordingRedirect {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl LoginRedirect for RecordingRedirect {
    fn redirect_to_login(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
