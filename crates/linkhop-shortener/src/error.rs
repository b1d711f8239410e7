use linkhop_core::{Canceled, FilterError, StorageError};
use linkhop_generator::GenerateError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// No unused code was found within the attempt limit.
    #[error("code space exhausted after {attempts} attempts")]
    CodeSpaceExhausted { attempts: usize },
    #[error("membership filter unavailable: {0}")]
    FilterUnavailable(FilterError),
    #[error("store unavailable: {0}")]
    StoreUnavailable(StorageError),
    #[error(transparent)]
    Canceled(#[from] Canceled),
}

impl From<GenerateError> for ShortenerError {
    fn from(value: GenerateError) -> Self {
        match value {
            GenerateError::CodeSpaceExhausted { attempts } => Self::CodeSpaceExhausted { attempts },
            GenerateError::FilterUnavailable(e) => Self::FilterUnavailable(e),
            GenerateError::Canceled(e) => Self::Canceled(e),
        }
    }
}
