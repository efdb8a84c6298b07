use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::data::model::{Column, RowSet};
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Market-basket co-occurrence of sub-categories
// ---------------------------------------------------------------------------

/// Square matrix over sub-categories: `counts[i][j]` is the number of
/// distinct orders containing both `labels[i]` and `labels[j]`.
/// Symmetric, with a zero diagonal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoOccurrenceMatrix {
    labels: Vec<String>,
    counts: Vec<Vec<u32>>,
}

impl CoOccurrenceMatrix {
    /// Sub-category labels in ascending order; row and column index space.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn rows(&self) -> &[Vec<u32>] {
        &self.counts
    }

    pub fn cell(&self, i: usize, j: usize) -> u32 {
        self.counts[i][j]
    }

    /// Look up a cell by labels. `None` if either label is unknown.
    pub fn get(&self, a: &str, b: &str) -> Option<u32> {
        let i = self.index_of(a)?;
        let j = self.index_of(b)?;
        Some(self.counts[i][j])
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels
            .binary_search_by(|l| l.as_str().cmp(label))
            .ok()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Largest off-diagonal count (0 for an empty matrix).
    pub fn max_count(&self) -> u32 {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }
}

/// Count, for every pair of sub-categories, the orders containing both.
///
/// Line items are reduced to presence per order before pairing, so an
/// order with three chairs and one table adds exactly 1 to Chairs×Tables.
pub fn co_occurrence(rows: &RowSet<'_>) -> Result<CoOccurrenceMatrix, PipelineError> {
    rows.schema().require(&[Column::OrderId, Column::SubCategory])?;

    let labels: Vec<String> = rows
        .iter()
        .map(|r| r.sub_category.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index: BTreeMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();

    // order → set of sub-category indices present in it
    let mut baskets: BTreeMap<&str, BTreeSet<usize>> = BTreeMap::new();
    for r in rows.iter() {
        let idx = index[r.sub_category.as_str()];
        baskets.entry(r.order_id.as_str()).or_default().insert(idx);
    }

    let n = labels.len();
    let mut counts = vec![vec![0u32; n]; n];
    for items in baskets.values() {
        let items: Vec<usize> = items.iter().copied().collect();
        for (pos, &i) in items.iter().enumerate() {
            for &j in &items[pos + 1..] {
                counts[i][j] += 1;
                counts[j][i] += 1;
            }
        }
    }
    for (i, row) in counts.iter_mut().enumerate() {
        row[i] = 0;
    }

    log::debug!(
        "co-occurrence over {} orders and {} sub-categories",
        baskets.len(),
        n
    );

    Ok(CoOccurrenceMatrix { labels, counts })
}
