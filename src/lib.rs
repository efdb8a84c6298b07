//! Filtering and aggregation pipeline behind the sales dashboard.
//!
//! Loader → filter → { aggregate, basket, kpi } → presentation. Every
//! stage is a pure function of the loaded [`data::model::Dataset`] and the
//! current [`data::filter::FilterCriteria`]; [`dashboard::DashboardView`]
//! runs one full pass.

pub mod analytics;
pub mod dashboard;
pub mod data;
pub mod error;

pub use dashboard::{DashboardConfig, DashboardView};
pub use data::filter::{Facet, FilterCriteria};
pub use data::model::{Column, Dataset, Record, RowSet, Schema};
pub use error::{EmptyResultWarning, PipelineError};
