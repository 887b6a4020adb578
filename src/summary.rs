//! Run counters and the end-of-run summary handed to operators.

use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Counters owned by the engine for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Successfully parsed records taken from the file.
    pub processed: u64,
    pub inserted: u64,
    pub updated: u64,
    /// Stored timestamp equal to the file's, skipped by the pre-pass.
    pub skipped_unchanged: u64,
    /// Timestamp differed but no attribute did.
    pub skipped_no_change: u64,
    /// Earlier occurrences of an id repeated later in the same batch.
    pub superseded: u64,
    /// Records whose write failed.
    pub errored: u64,
    /// Lines that could not be parsed.
    pub parse_errors: u64,
    /// Audit entries that could not be written after a successful primary write.
    pub audit_failures: u64,
    pub new_creditors: u64,
    pub new_debtors: u64,
}

impl RunStats {
    /// Records that needed no write.
    pub fn skipped(&self) -> u64 {
        self.skipped_unchanged + self.skipped_no_change
    }

    /// Records the run dealt with successfully, written or not.
    pub fn succeeded(&self) -> u64 {
        self.inserted + self.updated + self.skipped() + self.superseded
    }

    /// Record-level and line-level failures together.
    pub fn total_errors(&self) -> u64 {
        self.errored + self.parse_errors
    }
}

/// Run-level success signal derived from the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No errors of any kind.
    Clean,
    /// Some errors, but at least one record succeeded.
    Partial,
    /// Errors and nothing succeeded.
    Failed,
}

impl RunOutcome {
    /// Process exit status for this outcome. Partial runs exit 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Clean | RunOutcome::Partial => 0,
            RunOutcome::Failed => 1,
        }
    }
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Correlation id stamped on every audit record of the run.
    pub batch_id: Uuid,
    pub source_file: String,
    pub stats: RunStats,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn outcome(&self) -> RunOutcome {
        if self.stats.total_errors() == 0 {
            RunOutcome::Clean
        } else if self.stats.succeeded() > 0 {
            RunOutcome::Partial
        } else {
            RunOutcome::Failed
        }
    }

    /// Processed records per second.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.stats.processed as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        writeln!(f, "Reconciliation of {} complete", self.source_file)?;
        writeln!(f, "  Batch id:          {}", self.batch_id)?;
        writeln!(f, "  Total processed:   {}", s.processed)?;
        writeln!(f, "  Inserted:          {}", s.inserted)?;
        writeln!(f, "  Updated:           {}", s.updated)?;
        writeln!(
            f,
            "  Skipped:           {} ({} by timestamp, {} no field change)",
            s.skipped(),
            s.skipped_unchanged,
            s.skipped_no_change
        )?;
        if s.superseded > 0 {
            writeln!(f, "  Superseded:        {}", s.superseded)?;
        }
        writeln!(f, "  Errored:           {}", s.errored)?;
        writeln!(f, "  Parse errors:      {}", s.parse_errors)?;
        if s.audit_failures > 0 {
            writeln!(f, "  Audit failures:    {}", s.audit_failures)?;
        }
        writeln!(f, "  New creditors:     {}", s.new_creditors)?;
        writeln!(f, "  New debtors:       {}", s.new_debtors)?;
        writeln!(f, "  Duration:          {} ms", self.elapsed.as_millis())?;
        write!(f, "  Throughput:        {:.0} records/sec", self.throughput())
    }
}
