//! Core data model shared by the runner, the engine adapters and the server

pub mod event;
pub mod permissions;
pub mod request;
pub mod value;

pub use event::{EventKind, OutputEvent};
pub use permissions::PermissionProfile;
pub use request::{ExecutionRequest, ExecutionResult};
pub use value::PortableValue;
