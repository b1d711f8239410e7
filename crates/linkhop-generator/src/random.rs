use crate::error::InvalidConfig;
use crate::Generator;
use linkhop_core::{ShortCode, MAX_LENGTH, MIN_LENGTH};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use typed_builder::TypedBuilder;

/// `[A-Za-z0-9]`.
pub const ALPHANUMERIC: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated codes.
pub const DEFAULT_CODE_LENGTH: usize = 6;

#[derive(Debug, Clone, TypedBuilder)]
pub struct RandomGeneratorConfig {
    #[builder(default = DEFAULT_CODE_LENGTH)]
    pub length: usize,
    #[builder(default = ALPHANUMERIC.to_string(), setter(into))]
    pub alphabet: String,
    /// Fixed seed for reproducible sequences. Entropy-seeded when unset.
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
}

impl Default for RandomGeneratorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Draws codes of a fixed length uniformly from an alphabet.
///
/// With the defaults the code space is 62^6 (about 5.7e10) codes.
#[derive(Debug)]
pub struct RandomGenerator {
    alphabet: Vec<char>,
    length: usize,
    rng: Mutex<StdRng>,
}

impl RandomGenerator {
    /// A generator for 6-character alphanumeric codes.
    pub fn new() -> Self {
        Self::from_parts(ALPHANUMERIC.chars().collect(), DEFAULT_CODE_LENGTH, None)
    }

    /// Builds a generator from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`] when the length falls outside
    /// [`MIN_LENGTH`]..=[`MAX_LENGTH`], or the alphabet is empty, repeats a
    /// character or contains characters that are not ASCII alphanumeric.
    pub fn with_config(config: RandomGeneratorConfig) -> Result<Self, InvalidConfig> {
        if !(MIN_LENGTH..=MAX_LENGTH).contains(&config.length) {
            return Err(InvalidConfig(format!(
                "code length must be between {MIN_LENGTH} and {MAX_LENGTH}, got {}",
                config.length
            )));
        }
        if config.alphabet.is_empty() {
            return Err(InvalidConfig("alphabet must not be empty".to_string()));
        }
        if !config.alphabet.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(InvalidConfig(format!(
                "alphabet must be ASCII alphanumeric: '{}'",
                config.alphabet
            )));
        }

        let alphabet: Vec<char> = config.alphabet.chars().collect();
        let distinct: HashSet<char> = alphabet.iter().copied().collect();
        if distinct.len() != alphabet.len() {
            return Err(InvalidConfig(format!(
                "alphabet must not repeat characters: '{}'",
                config.alphabet
            )));
        }

        Ok(Self::from_parts(alphabet, config.length, config.seed))
    }

    fn from_parts(alphabet: Vec<char>, length: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            alphabet,
            length,
            rng: Mutex::new(rng),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Total number of distinct codes this generator can produce.
    pub fn code_space(&self) -> u128 {
        (self.alphabet.len() as u128).saturating_pow(self.length as u32)
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    type Output = ShortCode;

    fn generate(&self) -> ShortCode {
        let mut rng = self.rng.lock();
        let code: String = (0..self.length)
            .map(|_| self.alphabet[rng.gen_range(0..self.alphabet.len())])
            .collect();
        ShortCode::new_unchecked(code)
    }
}
