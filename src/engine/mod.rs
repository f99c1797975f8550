//! Engine module - Boundary to the embedded execution engine
//!
//! This module defines what the runner needs from an engine:
//! - A capability-scoped context with output attached
//! - Evaluation of source text in a language
//! - Member lookup and positional invocation
//! - A shape view of native values for conversion
//!
//! The engine module does NOT:
//! - Decide which grants a profile maps to (see `capabilities`)
//! - Measure time or assemble results
//! - Know about transports

pub mod boa;
pub mod capabilities;

use std::sync::Arc;

use crate::error::ScriptError;
use crate::runner::output::OutputMultiplexer;

pub use boa::BoaEngine;
pub use capabilities::{
    CapabilityGrants, EnvironmentAccess, HostAccess, HostClassLookup, IoAccess,
};

/// Opaque reference to a value living inside an engine context.
///
/// Only meaningful for the context that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueHandle(pub usize);

/// Shape of a native value as seen by the converter
#[derive(Debug, Clone, PartialEq)]
pub enum NativeShape {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    /// Indexable sequence of this length; elements via `EngineContext::element`
    Sequence(usize),
    /// Anything else, already rendered as text
    Structured(String),
}

/// Embedded polyglot engine
pub trait ScriptEngine: Send + Sync {
    /// Engine name for diagnostics
    fn name(&self) -> &str;

    /// Engine version for diagnostics
    fn version(&self) -> &str;

    /// Native language ids this engine evaluates
    fn languages(&self) -> Vec<String>;

    /// Build a fresh context honouring `grants`, writing stdout and stderr
    /// into `output`
    fn create_context(
        &self,
        grants: &CapabilityGrants,
        output: Arc<OutputMultiplexer>,
    ) -> Result<Box<dyn EngineContext>, ScriptError>;
}

/// One isolated evaluation context. Never shared between executions.
pub trait EngineContext {
    fn eval(&mut self, language: &str, source: &str) -> Result<ValueHandle, ScriptError>;

    /// Top-level binding `name`, or `None` when it does not exist
    fn lookup_member(
        &mut self,
        language: &str,
        name: &str,
    ) -> Result<Option<ValueHandle>, ScriptError>;

    fn can_execute(&self, value: ValueHandle) -> bool;

    fn invoke(
        &mut self,
        callable: ValueHandle,
        args: &[serde_json::Value],
    ) -> Result<ValueHandle, ScriptError>;

    fn inspect(&mut self, value: ValueHandle) -> Result<NativeShape, ScriptError>;

    /// Element `index` of a value inspected as a sequence
    fn element(&mut self, sequence: ValueHandle, index: usize) -> Result<ValueHandle, ScriptError>;

    /// Whether both handles refer to the same engine value (identity for
    /// objects)
    fn same_value(&self, a: ValueHandle, b: ValueHandle) -> bool;

    /// Release the context and everything it holds
    fn dispose(self: Box<Self>);
}
