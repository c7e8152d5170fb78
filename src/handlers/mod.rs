//! HTTP handlers for configured REST routes.

pub mod rest;
pub use rest::*;
