/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .xlsx / .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Dataset (schema checked, Year derived)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  Vec<Record>, schema, facet indices
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  date range → { geography, category } RowSets
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod filter;
