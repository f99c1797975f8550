//! Runner module - Execution orchestration
//!
//! This module drives one script execution from request to result:
//! - Resolves the language and maps the profile to grants
//! - Builds a fresh engine context with output attached
//! - Injects the timer shim, evaluates, invokes the entry function
//! - Converts the value and assembles the result with timing and output
//!
//! The runner module does NOT:
//! - Interpret language semantics (the engine does)
//! - Enforce time or memory ceilings
//! - Know about HTTP or WebSocket framing

pub mod convert;
pub mod output;
pub mod shim;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::core::{ExecutionRequest, ExecutionResult, PortableValue};
use crate::engine::{CapabilityGrants, EngineContext, ScriptEngine};
use crate::error::ScriptError;
use crate::languages::{LanguageCatalog, LanguageEntry};

pub use output::{OutputCallback, OutputMultiplexer};

/// Lifecycle stages of one execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStage {
    Created,
    ContextBuilt,
    ShimInjected,
    Evaluated,
    FunctionInvoked,
    Converted,
    Completed,
    Failed,
}

impl fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStage::Created => "created",
            ExecutionStage::ContextBuilt => "context_built",
            ExecutionStage::ShimInjected => "shim_injected",
            ExecutionStage::Evaluated => "evaluated",
            ExecutionStage::FunctionInvoked => "function_invoked",
            ExecutionStage::Converted => "converted",
            ExecutionStage::Completed => "completed",
            ExecutionStage::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Asynchronous execution seam used by the transports
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run `request` off the async runtime.
    ///
    /// Script failures come back as a failed `ExecutionResult`; `Err` is
    /// reserved for the pool itself failing.
    async fn execute_async(
        &self,
        request: ExecutionRequest,
        callback: Option<OutputCallback>,
    ) -> Result<ExecutionResult, ScriptError>;

    fn catalog(&self) -> &LanguageCatalog;

    fn engine_name(&self) -> &str;

    fn engine_version(&self) -> &str;
}

/// Drives executions against one engine
#[derive(Clone)]
pub struct ExecutionOrchestrator {
    engine: Arc<dyn ScriptEngine>,
    catalog: Arc<LanguageCatalog>,
    permits: Arc<Semaphore>,
}

impl ExecutionOrchestrator {
    pub fn new(
        engine: Arc<dyn ScriptEngine>,
        catalog: Arc<LanguageCatalog>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            engine,
            catalog,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Run `request` on the calling thread
    pub fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        self.execute_with_output(request, None)
    }

    /// Run `request` on the calling thread, streaming output to `callback`
    pub fn execute_with_output(
        &self,
        request: &ExecutionRequest,
        callback: Option<OutputCallback>,
    ) -> ExecutionResult {
        let started = Instant::now();
        let output = Arc::new(OutputMultiplexer::new(callback.clone()));

        let outcome = self.run(request, &output);

        output.close();
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let max_ms = request.permissions().max_execution_time;
        if elapsed_ms > max_ms {
            warn!(
                "Execution took {}ms, over the advisory limit of {}ms",
                elapsed_ms, max_ms
            );
        }

        match outcome {
            Ok(value) => {
                debug!("Execution stage: {} ({}ms)", ExecutionStage::Completed, elapsed_ms);
                ExecutionResult::success(value, output.transcript(), elapsed_ms)
            }
            Err(e) => {
                let message = failure_message(&e);
                debug!(
                    "Execution stage: {} ({}): {}",
                    ExecutionStage::Failed,
                    e.kind(),
                    message
                );
                if let Some(callback) = &callback {
                    callback(format!("ERROR: {}", message));
                }
                ExecutionResult::error(message, output.transcript(), elapsed_ms)
            }
        }
    }

    fn run(
        &self,
        request: &ExecutionRequest,
        output: &Arc<OutputMultiplexer>,
    ) -> Result<PortableValue, ScriptError> {
        debug!(
            "Execution stage: {} (language={})",
            ExecutionStage::Created,
            request.language
        );

        let entry = self.catalog.resolve(&request.language).ok_or_else(|| {
            ScriptError::UnsupportedLanguage {
                language: request.language.clone(),
                available: self.catalog.languages(),
            }
        })?;

        let grants = CapabilityGrants::from_profile(&request.permissions());
        let mut ctx = self.engine.create_context(&grants, output.clone())?;
        debug!("Execution stage: {}", ExecutionStage::ContextBuilt);

        let result = run_in_context(ctx.as_mut(), entry, request);
        ctx.dispose();
        result
    }
}

fn run_in_context(
    ctx: &mut dyn EngineContext,
    entry: &LanguageEntry,
    request: &ExecutionRequest,
) -> Result<PortableValue, ScriptError> {
    let language = entry.id.as_str();

    if entry.timer_shim {
        let outcome = shim::inject_timer_shim(ctx, language);
        debug!("Execution stage: {} ({:?})", ExecutionStage::ShimInjected, outcome);
    }

    let mut value = ctx.eval(language, &request.script)?;
    debug!("Execution stage: {}", ExecutionStage::Evaluated);

    if let Some(name) = request.entry_function() {
        let function = ctx
            .lookup_member(language, name)?
            .filter(|member| ctx.can_execute(*member))
            .ok_or_else(|| ScriptError::EntryFunction(name.to_string()))?;
        value = ctx.invoke(function, &request.arguments)?;
        debug!(
            "Execution stage: {} ({}, {} args)",
            ExecutionStage::FunctionInvoked,
            name,
            request.arguments.len()
        );
    }

    let portable = convert::convert_value(ctx, value)?;
    debug!("Execution stage: {}", ExecutionStage::Converted);
    Ok(portable)
}

/// Message reported for a failure; the kind name when the message is blank
fn failure_message(err: &ScriptError) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        err.kind().to_string()
    } else {
        message
    }
}

#[async_trait]
impl ScriptRunner for ExecutionOrchestrator {
    async fn execute_async(
        &self,
        request: ExecutionRequest,
        callback: Option<OutputCallback>,
    ) -> Result<ExecutionResult, ScriptError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ScriptError::Internal(anyhow::anyhow!("Worker pool closed: {}", e)))?;

        let orchestrator = self.clone();
        let task_callback = callback.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            orchestrator.execute_with_output(&request, task_callback)
        });

        match handle.await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("Execution task failed: {}", e);
                let message = format!("Execution task failed: {}", e);
                if let Some(callback) = &callback {
                    callback(format!("ERROR: {}", message));
                }
                Err(ScriptError::Internal(anyhow::anyhow!(message)))
            }
        }
    }

    fn catalog(&self) -> &LanguageCatalog {
        &self.catalog
    }

    fn engine_name(&self) -> &str {
        self.engine.name()
    }

    fn engine_version(&self) -> &str {
        self.engine.version()
    }
}
