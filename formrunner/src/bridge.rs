//! WebSocket bridge to the browser extension.
//!
//! The extension connects as a client; every eval request carries a UUID and
//! the matching `EvalResult` completes the waiting caller.

use std::{collections::HashMap, net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::ActuatorError;

pub const DEFAULT_BRIDGE_ADDR: &str = "127.0.0.1:17373";
pub(crate) const NOT_FOUND_MARKER: &str = "NOT_FOUND:";

type BridgeResult = Result<serde_json::Value, String>;
type PendingMap = HashMap<String, oneshot::Sender<BridgeResult>>;
type Pending = Arc<Mutex<PendingMap>>;
type Clients = Arc<Mutex<Vec<Client>>>;

#[derive(Debug, Serialize, Deserialize)]
struct EvalRequest {
    id: String,
    action: String,
    code: String,
    #[serde(default)]
    await_promise: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum BridgeIncoming {
    EvalResult {
        id: String,
        ok: bool,
        result: Option<serde_json::Value>,
        error: Option<String>,
    },
    Typed(TypedIncoming),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum TypedIncoming {
    #[serde(rename = "hello")]
    Hello { from: Option<String> },
    #[serde(rename = "pong")]
    Pong,
}

struct Client {
    sender: mpsc::UnboundedSender<Message>,
}

pub struct BrowserBridge {
    server_task: JoinHandle<()>,
    local_addr: SocketAddr,
    clients: Clients,
    pending: Pending,
}

impl BrowserBridge {
    /// Bind the listener and start accepting extension connections.
    pub async fn start(addr: &str) -> std::io::Result<BrowserBridge> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("Browser bridge listening on {}", local_addr);

        let clients: Clients = Arc::new(Mutex::new(Vec::new()));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let clients_clone = clients.clone();
        let pending_clone = pending.clone();

        let server_task = tokio::spawn(async move {
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("ws accept error: {}", e);
                        continue;
                    }
                };
                debug!(%peer, "Incoming bridge connection");
                tokio::spawn(serve_client(
                    stream,
                    clients_clone.clone(),
                    pending_clone.clone(),
                ));
            }
        });

        Ok(BrowserBridge {
            server_task,
            local_addr,
            clients,
            pending,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub async fn is_client_connected(&self) -> bool {
        !self.clients.lock().await.is_empty()
    }

    /// Poll until an extension client is connected or `timeout` elapses.
    pub async fn wait_for_client(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_client_connected().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Evaluate `code` in the active tab and return its result.
    pub async fn eval(
        &self,
        code: &str,
        timeout: Duration,
    ) -> Result<serde_json::Value, ActuatorError> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel::<BridgeResult>();
        let req = EvalRequest {
            id: id.clone(),
            action: "eval".into(),
            code: code.to_string(),
            await_promise: true,
        };
        let payload = serde_json::to_string(&req)
            .map_err(|e| ActuatorError::Bridge(format!("bridge serialize: {e}")))?;

        self.pending.lock().await.insert(id.clone(), tx);
        let sent = {
            let clients = self.clients.lock().await;
            debug!(clients = clients.len(), preview = %payload.chars().take(120).collect::<String>(), "Sending eval to extension");
            clients
                .first()
                .map(|c| c.sender.send(Message::Text(payload)).is_ok())
                .unwrap_or(false)
        };
        if !sent {
            self.pending.lock().await.remove(&id);
            return Err(ActuatorError::Bridge(
                "no browser extension client connected".into(),
            ));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(Ok(val))) => Ok(val),
            Ok(Ok(Err(err))) => Err(classify_eval_error(err)),
            Ok(Err(_canceled)) => Err(ActuatorError::Bridge(
                "extension disconnected before replying".into(),
            )),
            Err(_elapsed) => {
                self.pending.lock().await.remove(&id);
                warn!("Bridge timed out waiting for EvalResult (id={})", id);
                Err(ActuatorError::Timeout(format!(
                    "no reply within {} ms",
                    timeout.as_millis()
                )))
            }
        }
    }
}

impl Drop for BrowserBridge {
    fn drop(&mut self) {
        self.server_task.abort();
    }
}

/// Page scripts throw `"NOT_FOUND: <id>"` for a missing element; the
/// extension may wrap the message, so the marker is searched anywhere.
fn classify_eval_error(err: String) -> ActuatorError {
    match err.find(NOT_FOUND_MARKER) {
        Some(pos) => {
            ActuatorError::ElementNotFound(err[pos + NOT_FOUND_MARKER.len()..].trim().to_string())
        }
        None => ActuatorError::Rejected(err),
    }
}

async fn serve_client(stream: tokio::net::TcpStream, clients: Clients, pending: Pending) {
    let ws_stream = match accept_async(stream).await {
        Ok(s) => s,
        Err(e) => {
            warn!("ws handshake error: {}", e);
            return;
        }
    };
    let (mut sink, mut stream) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = sink.send(msg).await {
                warn!("ws send error: {}", e);
                break;
            }
        }
    });

    clients.lock().await.push(Client { sender: tx.clone() });

    while let Some(Ok(msg)) = stream.next().await {
        if !msg.is_text() {
            continue;
        }
        let txt = msg.into_text().unwrap_or_default();
        match serde_json::from_str::<BridgeIncoming>(&txt) {
            Ok(BridgeIncoming::EvalResult {
                id,
                ok,
                result,
                error,
            }) => {
                if !ok {
                    let head: String = error
                        .as_deref()
                        .unwrap_or("unknown error")
                        .chars()
                        .take(400)
                        .collect();
                    error!(id = %id, error = %head, "Bridge received EvalResult error");
                }
                if let Some(tx) = pending.lock().await.remove(&id) {
                    let _ = tx.send(if ok {
                        Ok(result.unwrap_or(serde_json::Value::Null))
                    } else {
                        Err(error.unwrap_or_else(|| "unknown error".into()))
                    });
                }
            }
            Ok(BridgeIncoming::Typed(TypedIncoming::Hello { from })) => {
                info!(from = ?from, "Extension connected");
            }
            Ok(BridgeIncoming::Typed(TypedIncoming::Pong)) => {}
            Err(e) => warn!("Invalid incoming JSON: {}", e),
        }
    }

    writer.abort();
    clients
        .lock()
        .await
        .retain(|c| !c.sender.same_channel(&tx));
    debug!("Extension client disconnected");
}
