//! Request and result records exchanged with callers

use serde::{Deserialize, Deserializer, Serialize};

use super::permissions::PermissionProfile;
use super::value::PortableValue;

pub const DEFAULT_LANGUAGE: &str = "js";

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// `null` behaves like a missing key
fn language_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_language))
}

/// `null` behaves like a missing key
fn arguments_or_empty<'de, D>(deserializer: D) -> Result<Vec<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Script submitted for execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub script: String,
    #[serde(default = "default_language", deserialize_with = "language_or_default")]
    pub language: String,
    /// Member invoked after the script's top-level definitions run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_function: Option<String>,
    /// Sandbox preset when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionProfile>,
    /// Positional arguments for the entry function
    #[serde(default, alias = "args", deserialize_with = "arguments_or_empty")]
    pub arguments: Vec<serde_json::Value>,
}

impl ExecutionRequest {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            language: default_language(),
            entry_function: None,
            permissions: None,
            arguments: Vec::new(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_entry_function(
        mut self,
        name: impl Into<String>,
        arguments: impl IntoIterator<Item = serde_json::Value>,
    ) -> Self {
        self.entry_function = Some(name.into());
        self.arguments = arguments.into_iter().collect();
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionProfile) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Entry function name, treating an empty string as unset
    pub fn entry_function(&self) -> Option<&str> {
        self.entry_function.as_deref().filter(|name| !name.is_empty())
    }

    /// Effective profile for this request
    pub fn permissions(&self) -> PermissionProfile {
        self.permissions.unwrap_or_else(PermissionProfile::sandbox)
    }
}

/// Outcome of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub value: Option<PortableValue>,
    pub error: Option<String>,
    /// Full transcript of everything the script printed
    pub output: String,
    pub execution_time_ms: u64,
    /// Always 0: the engine does not report memory usage
    pub memory_used_bytes: u64,
}

impl ExecutionResult {
    pub fn success(value: PortableValue, output: String, execution_time_ms: u64) -> Self {
        Self {
            success: true,
            value: Some(value),
            error: None,
            output,
            execution_time_ms,
            memory_used_bytes: 0,
        }
    }

    pub fn error(error: impl Into<String>, output: String, execution_time_ms: u64) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(error.into()),
            output,
            execution_time_ms,
            memory_used_bytes: 0,
        }
    }
}
