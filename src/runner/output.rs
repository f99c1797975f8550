//! Output multiplexer
//!
//! Collects everything a script prints into a transcript and forwards
//! incremental chunks to an optional callback on line or size boundaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Pending bytes that force a flush even without a newline
pub const FLUSH_THRESHOLD: usize = 100;

/// Receives each flushed chunk
pub type OutputCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Default)]
struct Buffers {
    /// Everything written before close
    transcript: String,
    /// Written since the last flush
    pending: String,
}

/// Buffering sink attached to an engine context as stdout and stderr
pub struct OutputMultiplexer {
    buffers: Mutex<Buffers>,
    callback: Option<OutputCallback>,
    closed: AtomicBool,
}

impl OutputMultiplexer {
    pub fn new(callback: Option<OutputCallback>) -> Self {
        Self {
            buffers: Mutex::new(Buffers::default()),
            callback,
            closed: AtomicBool::new(false),
        }
    }

    /// Append text; dropped silently after close
    pub fn write(&self, text: &str) {
        if text.is_empty() || self.is_closed() {
            return;
        }

        let mut buffers = self.lock();
        buffers.transcript.push_str(text);
        buffers.pending.push_str(text);

        if text.contains('\n') || buffers.pending.len() > FLUSH_THRESHOLD {
            self.flush_locked(&mut buffers);
        }
    }

    /// Push pending text to the callback
    pub fn flush(&self) {
        let mut buffers = self.lock();
        self.flush_locked(&mut buffers);
    }

    /// Flush the remainder and stop accepting writes. Only the first call
    /// has an effect.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.flush();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Complete transcript, including already flushed chunks
    pub fn transcript(&self) -> String {
        self.lock().transcript.clone()
    }

    fn flush_locked(&self, buffers: &mut Buffers) {
        if buffers.pending.is_empty() {
            return;
        }
        let chunk = std::mem::take(&mut buffers.pending);
        // Called under the lock so chunks reach the callback in write order
        if let Some(callback) = &self.callback {
            callback(chunk);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Buffers> {
        // A panicking callback must not take the transcript down with it
        self.buffers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for OutputMultiplexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputMultiplexer")
            .field("has_callback", &self.callback.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}
