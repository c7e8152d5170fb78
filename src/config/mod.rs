//! Declarative configuration: raw types, YAML discovery, validation and lookup.

pub mod types;
pub mod loader;
pub mod validator;
pub mod resolved;

pub use types::*;
pub use loader::*;
pub use validator::*;
pub use resolved::*;
