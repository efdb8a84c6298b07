//! Reductions over a filtered [`RowSet`](crate::data::model::RowSet).
//!
//! ```text
//!   RowSet ──┬── aggregate   group sums / means / counts, top-N, running totals
//!            ├── basket      sub-category co-occurrence matrix
//!            └── kpi         headline metrics
//! ```
//!
//! Every entry point checks its required columns against the RowSet's
//! schema first and returns [`PipelineError::MissingColumn`](crate::error::PipelineError)
//! before reading any row. Zero input rows is never an error.

pub mod aggregate;
pub mod basket;
pub mod kpi;
