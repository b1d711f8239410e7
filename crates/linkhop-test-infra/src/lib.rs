//! Shared test infrastructure: in-process doubles for the capability
//! traits and disposable containers for integration tests.

pub mod doubles;
pub mod error;
pub mod postgres;
pub mod redis;

pub use error::{Result, TestInfraError};
