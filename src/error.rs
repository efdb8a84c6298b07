use std::fmt;

use chrono::NaiveDate;
use thiserror::Error;

use crate::data::model::Column;

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Recoverable conditions raised by the filter and analytics engines.
///
/// Neither variant is fatal for the application: the dashboard reports
/// them per section and keeps rendering everything else.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A column required by a computation is absent from the source schema.
    #[error("no column '{column}' in the loaded dataset")]
    MissingColumn { column: Column },

    /// The requested date range starts after it ends.
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// A section was computed over zero rows.
///
/// This is informational only: the section still holds a well-defined
/// empty (or zero / "no data") result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyResultWarning {
    pub section: &'static str,
}

impl fmt::Display for EmptyResultWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: no rows match the current filters", self.section)
    }
}
