//! Events pushed over the streaming channel

use serde::{Deserialize, Serialize};
use std::fmt;

use super::request::ExecutionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connection,
    Start,
    Output,
    Result,
    Error,
}

impl EventKind {
    /// `result` and `error` end an execution's event sequence
    pub fn is_terminal(self) -> bool {
        matches!(self, EventKind::Result | EventKind::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Connection => "connection",
            EventKind::Start => "start",
            EventKind::Output => "output",
            EventKind::Result => "result",
            EventKind::Error => "error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub kind: EventKind,
    pub message: String,
    pub payload: Option<ExecutionResult>,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl OutputEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            payload: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn connection() -> Self {
        Self::new(EventKind::Connection, "Connected to script execution service")
    }

    pub fn start() -> Self {
        Self::new(EventKind::Start, "Script execution started")
    }

    pub fn output(chunk: impl Into<String>) -> Self {
        Self::new(EventKind::Output, chunk)
    }

    pub fn result(result: ExecutionResult) -> Self {
        Self {
            payload: Some(result),
            ..Self::new(EventKind::Result, "Script execution completed")
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventKind::Error, message)
    }

    /// Encode as a text frame.
    ///
    /// Never fails: an unencodable event is replaced by a fixed error frame.
    pub fn to_frame(&self) -> String {
        match serde_json::to_string(self) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Failed to serialize {} event: {}", self.kind, e);
                fallback_frame(self.timestamp)
            }
        }
    }
}

fn fallback_frame(timestamp: i64) -> String {
    format!(
        r#"{{"kind":"error","message":"Failed to serialize message","payload":null,"timestamp":{}}}"#,
        timestamp
    )
}
