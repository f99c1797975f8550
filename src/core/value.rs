use serde::{Deserialize, Serialize};

/// Language-independent result value.
///
/// Serialized as the plain JSON value it represents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortableValue {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    List(Vec<PortableValue>),
}

impl From<bool> for PortableValue {
    fn from(value: bool) -> Self {
        PortableValue::Bool(value)
    }
}

impl From<i32> for PortableValue {
    fn from(value: i32) -> Self {
        PortableValue::Int(value)
    }
}

impl From<&str> for PortableValue {
    fn from(value: &str) -> Self {
        PortableValue::String(value.to_string())
    }
}
