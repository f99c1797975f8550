//! WebSocket streaming channel
//!
//! Each connection gets a session id and an event queue drained by a writer
//! task. Output produced by an execution is routed through the registry, so
//! once the session is gone any late output is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::core::{ExecutionRequest, OutputEvent};
use crate::runner::{OutputCallback, ScriptRunner};

/// Live sessions and their event senders
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, mpsc::UnboundedSender<OutputEvent>>>,
}

impl SessionRegistry {
    /// Open a session; events sent to it arrive on the returned receiver
    pub fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<OutputEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.lock().insert(id, tx);
        (id, rx)
    }

    /// Queue `event` for session `id`. Returns false if the session is gone.
    pub fn send(&self, id: Uuid, event: OutputEvent) -> bool {
        match self.lock().get(&id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn remove(&self, id: Uuid) {
        self.lock().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, mpsc::UnboundedSender<OutputEvent>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (id, mut events) = state.sessions.register();
    info!("WebSocket session opened: {}", id);

    let (mut sink, mut frames) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if sink.send(Message::Text(event.to_frame().into())).await.is_err() {
                break;
            }
            if event.kind.is_terminal() {
                debug!("Session {} finished a request with {}", id, event.kind);
            }
        }
    });

    state.sessions.send(id, OutputEvent::connection());

    while let Some(frame) = frames.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_frame(state.runner.as_ref(), &state.sessions, id, text.as_str()).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket session {} failed: {}", id, e);
                break;
            }
        }
    }

    state.sessions.remove(id);
    writer.abort();
    info!("WebSocket session closed: {}", id);
}

/// Execute one request frame for session `id`.
///
/// Emits `start`, each output chunk, then exactly one `result` or `error`.
/// A frame that is not a valid request yields a single `error`.
pub async fn handle_frame(
    runner: &dyn ScriptRunner,
    sessions: &Arc<SessionRegistry>,
    id: Uuid,
    text: &str,
) {
    let request: ExecutionRequest = match serde_json::from_str(text) {
        Ok(request) => request,
        Err(e) => {
            debug!("Session {} sent an invalid request: {}", id, e);
            sessions.send(id, OutputEvent::error(format!("Invalid request: {}", e)));
            return;
        }
    };

    sessions.send(id, OutputEvent::start());

    let registry = sessions.clone();
    let callback: OutputCallback = Arc::new(move |chunk: String| {
        if !registry.send(id, OutputEvent::output(chunk)) {
            debug!("Dropping output for closed session {}", id);
        }
    });

    let terminal = match runner.execute_async(request, Some(callback)).await {
        Ok(result) => OutputEvent::result(result),
        Err(e) => OutputEvent::error(format!("Execution failed: {}", e)),
    };
    sessions.send(id, terminal);
}
