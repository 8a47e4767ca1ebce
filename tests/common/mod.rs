//! Shared utilities for integration testing: an in-process matching server.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};

use collector_bridge::config::{BridgeConfig, RetryConfig, ServerConfig};

#[derive(Clone)]
struct MockState {
    roles: Arc<Vec<u64>>,
    scanned: Arc<Vec<String>>,
    has_matches: Arc<AtomicBool>,
    fail_scan_cv: Arc<AtomicBool>,
    fail_scanned_references: Arc<AtomicBool>,
    scan_calls: Arc<AtomicUsize>,
    sockets: Arc<AtomicUsize>,
    last_authorization: Arc<Mutex<Option<String>>>,
    scanned_bodies: Arc<Mutex<Vec<Value>>>,
    commands: broadcast::Sender<String>,
    disconnects: broadcast::Sender<()>,
    answers: mpsc::UnboundedSender<String>,
}

/// A matching server answering the REST routes and the command socket.
pub struct MockUpstream {
    address: SocketAddr,
    state: MockState,
    answers: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl MockUpstream {
    /// Start a server whose key carries the scraper role.
    pub async fn start() -> Self {
        Self::start_with(vec![1], Vec::new()).await
    }

    /// Start a server with the given key roles and already scanned references.
    pub async fn start_with(roles: Vec<u64>, scanned: Vec<String>) -> Self {
        let (commands, _) = broadcast::channel(16);
        let (disconnects, _) = broadcast::channel(4);
        let (answers_tx, answers_rx) = mpsc::unbounded_channel();
        let state = MockState {
            roles: Arc::new(roles),
            scanned: Arc::new(scanned),
            has_matches: Arc::new(AtomicBool::new(false)),
            fail_scan_cv: Arc::new(AtomicBool::new(false)),
            fail_scanned_references: Arc::new(AtomicBool::new(false)),
            scan_calls: Arc::new(AtomicUsize::new(0)),
            sockets: Arc::new(AtomicUsize::new(0)),
            last_authorization: Arc::new(Mutex::new(None)),
            scanned_bodies: Arc::new(Mutex::new(Vec::new())),
            commands,
            disconnects,
            answers: answers_tx,
        };

        let app = Router::new()
            .route("/api/v1/health", get(|| async { Json(true) }))
            .route("/api/v1/auth/keyinfo", get(key_info))
            .route("/api/v1/scraper/scannedReferenceNrs/since/days/{days}", get(scanned_references))
            .route("/api/v1/scraper/scanCV", post(scan_cv))
            .route("/api/v1/scraper/ws", get(socket))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            address,
            state,
            answers: tokio::sync::Mutex::new(answers_rx),
        }
    }

    pub fn location(&self) -> String {
        format!("http://{}", self.address)
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            server_location: self.location(),
            api_key_id: "key-id".to_string(),
            api_key: "key-secret".to_string(),
        }
    }

    pub fn set_has_matches(&self, has_matches: bool) {
        self.state.has_matches.store(has_matches, Ordering::SeqCst);
    }

    /// Answer scanCV with a 500 from now on.
    pub fn set_fail_scan_cv(&self, fail: bool) {
        self.state.fail_scan_cv.store(fail, Ordering::SeqCst);
    }

    /// Answer the scanned references route with a 500 from now on.
    pub fn set_fail_scanned_references(&self, fail: bool) {
        self.state.fail_scanned_references.store(fail, Ordering::SeqCst);
    }

    /// Close every connected socket from the server side.
    pub fn drop_sockets(&self) {
        let _ = self.state.disconnects.send(());
    }

    pub fn scan_calls(&self) -> usize {
        self.state.scan_calls.load(Ordering::SeqCst)
    }

    pub fn scanned_bodies(&self) -> Vec<Value> {
        self.state.scanned_bodies.lock().unwrap().clone()
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.state.last_authorization.lock().unwrap().clone()
    }

    /// Push a command frame to every connected socket.
    pub fn send_command(&self, frame: &str) {
        self.state.commands.send(frame.to_string()).unwrap();
    }

    /// Wait until at least `count` sockets have connected.
    pub async fn wait_for_socket(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while self.state.sockets.load(Ordering::SeqCst) < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("bridge never connected its socket");
    }

    /// Next frame the bridge wrote to a socket.
    pub async fn next_answer(&self) -> String {
        let mut answers = self.answers.lock().await;
        tokio::time::timeout(Duration::from_secs(10), answers.recv())
            .await
            .expect("no answer arrived")
            .expect("answer channel closed")
    }

    /// Next frame written within `wait`, if any.
    pub async fn try_next_answer(&self, wait: Duration) -> Option<String> {
        let mut answers = self.answers.lock().await;
        tokio::time::timeout(wait, answers.recv()).await.ok().flatten()
    }
}

async fn key_info(State(state): State<MockState>, headers: HeaderMap) -> Json<Value> {
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    *state.last_authorization.lock().unwrap() = authorization;

    let roles: Vec<Value> = state.roles.iter().map(|role| json!({ "role": role })).collect();
    Json(json!({ "roles": roles }))
}

async fn scanned_references(State(state): State<MockState>, Path(_days): Path<u32>) -> Response {
    if state.fail_scanned_references.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "database offline" }))).into_response();
    }
    Json(state.scanned.as_ref().clone()).into_response()
}

async fn scan_cv(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.scan_calls.fetch_add(1, Ordering::SeqCst);
    if state.fail_scan_cv.load(Ordering::SeqCst) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "scan failed" }))).into_response();
    }
    state.scanned_bodies.lock().unwrap().push(body);
    Json(json!({ "hasMatches": state.has_matches.load(Ordering::SeqCst) })).into_response()
}

async fn socket(State(state): State<MockState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| relay(state, socket))
}

async fn relay(state: MockState, mut socket: WebSocket) {
    let mut commands = state.commands.subscribe();
    let mut disconnects = state.disconnects.subscribe();
    state.sockets.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Ok(frame) => {
                    if socket.send(Message::Text(frame.into())).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            _ = disconnects.recv() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let _ = state.answers.send(text.as_str().to_string());
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

/// Configuration pointing at `primary` (and `alternatives`) with a quick retry budget.
pub fn upstream_config(primary: &MockUpstream, alternatives: &[&MockUpstream]) -> BridgeConfig {
    let mut config = BridgeConfig {
        primary_server: Some(primary.server_config()),
        alternative_servers: alternatives.iter().map(|mock| mock.server_config()).collect(),
        retries: RetryConfig {
            max_retries: 0,
            step_secs: 0,
            request_timeout_secs: 5,
        },
        ..Default::default()
    };
    config.bridge.poll_timeout_secs = 5;
    config
}

/// Configuration running without any upstream.
pub fn mock_mode_config() -> BridgeConfig {
    let mut config = BridgeConfig {
        mock_mode: true,
        ..Default::default()
    };
    config.bridge.poll_timeout_secs = 1;
    config
}
