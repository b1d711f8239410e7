//! The linkhop application: backend wiring, configuration and telemetry.
//!
//! The `linkhop` binary is a thin shell over [`App`]; the end-to-end tests
//! drive the same type against in-process backends.

pub mod app;
pub mod config;
pub mod telemetry;

pub use app::{App, AppError, AppOptions};
pub use config::{Cli, Command, Settings};
