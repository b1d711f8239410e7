//! URL shortening: validation, code reservation and the durable write.
//!
//! Core types are re-exported from `linkhop_core`.

pub mod error;
pub mod service;
pub mod shortener;

pub use error::{Result, ShortenerError};
pub use service::ShortenerService;
pub use shortener::Shortener;
