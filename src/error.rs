//! Failure taxonomy for script execution

/// Errors raised while running a script.
///
/// Every variant except `Internal` is contained in a failed `ExecutionResult`;
/// none of them crosses the orchestration boundary as a protocol fault.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Requested language is not in the catalog
    #[error("Language '{language}' is not supported. Available languages: {}", .available.join(", "))]
    UnsupportedLanguage {
        language: String,
        available: Vec<String>,
    },
    /// Syntax or runtime failure reported by the engine
    #[error("{message}")]
    Evaluation { kind: String, message: String },
    /// Entry member missing or not callable
    #[error("Function '{0}' not found or not executable")]
    EntryFunction(String),
    /// Timer polyfill could not be installed (logged, never surfaced)
    #[error("Shim injection failed: {0}")]
    ShimInjection(String),
    /// Engine could not build a context for the grants
    #[error("Failed to create execution context: {0}")]
    ContextBuild(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ScriptError {
    /// Evaluation failure; an empty message is replaced by the kind name
    pub fn evaluation(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let kind = kind.into();
        let message = message.into();
        let message = if message.trim().is_empty() {
            kind.clone()
        } else {
            message
        };
        ScriptError::Evaluation { kind, message }
    }

    /// Short machine-readable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            ScriptError::UnsupportedLanguage { .. } => "UnsupportedLanguage",
            ScriptError::Evaluation { .. } => "EvaluationError",
            ScriptError::EntryFunction(_) => "EntryFunctionError",
            ScriptError::ShimInjection(_) => "ShimInjectionFailure",
            ScriptError::ContextBuild(_) => "ContextBuildError",
            ScriptError::Internal(_) => "UnexpectedInternalError",
        }
    }
}
