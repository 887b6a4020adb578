//! Run configuration.
//!
//! Passed to the engine at construction; nothing inside the reconciliation
//! path reads the process environment.

use crate::error::{EngineError, Result};
use crate::parser::DEFAULT_DELIMITER;

/// Default number of records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Default actor stamped on audit records.
pub const DEFAULT_ACTOR: &str = "system";

/// Default number of records between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Tunables for one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Records read, classified and written together.
    pub batch_size: usize,

    /// Single-byte field delimiter.
    pub delimiter: u8,

    /// Identity recorded as `processedBy` on audit records.
    pub actor: String,

    /// Whether header column names must match, not just their count.
    pub validate_header_names: bool,

    /// Log progress every this many processed records (0 disables).
    pub progress_interval: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        ReconcileConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            delimiter: DEFAULT_DELIMITER,
            actor: DEFAULT_ACTOR.to_string(),
            validate_header_names: true,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ReconcileConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn with_header_name_validation(mut self, enabled: bool) -> Self {
        self.validate_header_names = enabled;
        self
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EngineError::InvalidConfig(
                "batch size must be greater than zero".to_string(),
            ));
        }
        if !self.delimiter.is_ascii() || self.delimiter.is_ascii_whitespace() {
            return Err(EngineError::InvalidConfig(format!(
                "delimiter must be a visible ASCII character, got byte {}",
                self.delimiter
            )));
        }
        if self.actor.trim().is_empty() {
            return Err(EngineError::InvalidConfig("actor must not be empty".to_string()));
        }
        Ok(())
    }
}
