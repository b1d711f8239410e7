//! Short-code generation with collision avoidance.
//!
//! A [`Generator`] is a pure candidate source. [`CodeGenerator`] pairs one
//! with a [`MembershipFilter`](linkhop_core::MembershipFilter) and keeps
//! drawing candidates until the filter accepts a reservation or the attempt
//! limit is reached.

pub mod error;
pub mod random;
pub mod reserve;

pub use error::{GenerateError, InvalidConfig};
pub use random::{RandomGenerator, RandomGeneratorConfig, ALPHANUMERIC, DEFAULT_CODE_LENGTH};
pub use reserve::{CodeGenerator, DEFAULT_MAX_ATTEMPTS};

use linkhop_core::ShortCode;

/// Trait for generating candidate short codes.
///
/// Implementations are pure generators that don't interact with storage or
/// the filter; uniqueness is settled by the caller.
pub trait Generator: Send + Sync + 'static {
    type Output: Into<ShortCode>;

    /// Draws the next candidate.
    fn generate(&self) -> Self::Output;
}
