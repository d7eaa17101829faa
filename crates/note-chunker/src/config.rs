use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};

/// Default chunk bound in characters.
pub const DEFAULT_MAX_CHUNK_CHARS: usize = 6_000;

/// Configuration for text chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk length in characters (hard limit)
    pub max_chunk_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }
}

impl ChunkerConfig {
    pub const fn with_max_chunk_chars(max_chunk_chars: usize) -> Self {
        Self { max_chunk_chars }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_chars == 0 {
            return Err(ChunkerError::invalid_config("max_chunk_chars must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = ChunkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_chunk_chars, 6_000);
    }

    #[test]
    fn test_zero_bound_rejected() {
        let err = ChunkerConfig::with_max_chunk_chars(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, ChunkerError::InvalidConfig(_)));
    }
}
