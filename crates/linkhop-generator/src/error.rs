use linkhop_core::{Canceled, FilterError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GenerateError {
    /// Every attempt collided. The code length or alphabet should be
    /// widened; this is a capacity problem, not a transient one.
    #[error("code space exhausted after {attempts} attempts")]
    CodeSpaceExhausted { attempts: usize },
    #[error(transparent)]
    FilterUnavailable(#[from] FilterError),
    #[error(transparent)]
    Canceled(#[from] Canceled),
}

/// Rejected generator settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid generator config: {0}")]
pub struct InvalidConfig(pub String);
