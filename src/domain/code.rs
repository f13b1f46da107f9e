//! Transaction code candidates.
//!
//! Codes look like `KNT-7QF2M0ZK1D`: a fixed prefix, a dash and a suffix
//! drawn uniformly from `A-Z0-9`. Candidates are not guaranteed unique; the
//! ledger store is the authority on that.

use rand::Rng;

pub const DEFAULT_CODE_PREFIX: &str = "KNT";
pub const DEFAULT_CODE_LENGTH: usize = 10;
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Draws suffixes from the thread-local CSPRNG, so concurrent callers never
/// share a seed.
#[derive(Debug, Clone)]
pub struct RandomCodeGenerator {
    prefix: String,
    length: usize,
}

impl RandomCodeGenerator {
    pub fn new(prefix: impl Into<String>, length: usize) -> Self {
        Self {
            prefix: prefix.into(),
            length,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// True when `code` has this generator's prefix and suffix shape.
    pub fn matches_format(&self, code: &str) -> bool {
        let Some(suffix) = code
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
        else {
            return false;
        };

        suffix.len() == self.length && suffix.bytes().all(|b| CODE_ALPHABET.contains(&b))
    }
}

impl Default for RandomCodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_PREFIX, DEFAULT_CODE_LENGTH)
    }
}

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..self.length)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();

        format!("{}-{}", self.prefix, suffix)
    }
}
