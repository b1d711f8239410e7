use crate::error::GenerateError;
use crate::Generator;
use linkhop_core::{MembershipFilter, RequestContext, ShortCode};
use tracing::{debug, warn};

/// One initial draw plus four retries.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Draws candidates from `G` and reserves them in `F`.
///
/// A code returned by [`CodeGenerator::generate`] was never handed out by
/// this filter before. The store's uniqueness constraint stays the final
/// arbiter when the filter is shared or was not warmed.
#[derive(Debug)]
pub struct CodeGenerator<G, F> {
    source: G,
    filter: F,
    max_attempts: usize,
}

impl<G, F> CodeGenerator<G, F>
where
    G: Generator,
    F: MembershipFilter,
{
    pub fn new(source: G, filter: F) -> Self {
        Self::with_max_attempts(source, filter, DEFAULT_MAX_ATTEMPTS)
    }

    /// `max_attempts` below one is treated as one.
    pub fn with_max_attempts(source: G, filter: F, max_attempts: usize) -> Self {
        Self {
            source,
            filter,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn filter(&self) -> &F {
        &self.filter
    }

    /// Returns a freshly reserved code.
    ///
    /// # Errors
    ///
    /// - `CodeSpaceExhausted` when every attempt drew a code the filter
    ///   reports as taken
    /// - `FilterUnavailable` on the first filter error; no further draws
    ///   are made
    /// - `Canceled` if `ctx` ends first
    pub async fn generate(&self, ctx: &RequestContext) -> Result<ShortCode, GenerateError> {
        for attempt in 1..=self.max_attempts {
            let code: ShortCode = self.source.generate().into();

            match ctx.run(self.filter.reserve(&code)).await? {
                Ok(true) => {
                    debug!(code = %code, attempt, "Reserved short code");
                    return Ok(code);
                }
                Ok(false) => {
                    debug!(code = %code, attempt, "Candidate already taken, drawing again");
                }
                Err(e) => {
                    warn!(code = %code, attempt, error = %e, "Filter failed while reserving code");
                    return Err(GenerateError::FilterUnavailable(e));
                }
            }
        }

        warn!(
            attempts = self.max_attempts,
            "Exhausted attempts to reserve a short code"
        );
        Err(GenerateError::CodeSpaceExhausted {
            attempts: self.max_attempts,
        })
    }
}
