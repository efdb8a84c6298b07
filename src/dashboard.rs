use serde::Serialize;

use crate::analytics::aggregate::{
    cumulative, group_sum, group_sums, quantity_histogram, scatter_points, top_n,
    AggregationResult, CumulativePoint, Dimension, GroupKey, ScatterPoint, ValueField,
};
use crate::analytics::basket::{co_occurrence, CoOccurrenceMatrix};
use crate::analytics::kpi::{compute_kpis, KpiSet};
use crate::data::filter::{apply, FacetOptions, FilterCriteria};
use crate::data::model::{Dataset, RowSet};
use crate::error::{EmptyResultWarning, PipelineError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// How many products the "top products" charts show.
    pub top_n: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self { top_n: 5 }
    }
}

// ---------------------------------------------------------------------------
// One evaluation cycle
// ---------------------------------------------------------------------------

/// A section's output, or the reason it could not be computed.
pub type Section<T> = Result<T, PipelineError>;

/// Sales and profit summed for one year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrendPoint {
    pub year: i32,
    pub sales: f64,
    pub profit: f64,
}

/// Sizes of the derived RowSets, for the status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCounts {
    pub base: usize,
    pub date: usize,
    pub geography: Option<usize>,
    pub category: Option<usize>,
}

/// Everything the presentation layer renders for one filter state.
///
/// Sections are wired to specific RowSets: region and market use the
/// geography subset, category uses the category subset, everything else
/// uses the date-filtered baseline.
#[derive(Debug, Clone)]
pub struct DashboardView {
    pub row_counts: RowCounts,
    pub options: FacetOptions,
    pub kpis: Section<KpiSet>,
    pub sales_by_year: Section<AggregationResult>,
    pub sales_by_region: Section<AggregationResult>,
    pub sales_by_category: Section<AggregationResult>,
    pub sales_by_segment: Section<AggregationResult>,
    pub sales_by_market: Section<AggregationResult>,
    pub cumulative_sales: Section<Vec<CumulativePoint>>,
    pub top_profit_products: Section<Vec<(GroupKey, f64)>>,
    pub top_sales_products: Section<Vec<(GroupKey, f64)>>,
    pub sales_profit_points: Section<Vec<ScatterPoint>>,
    pub yearly_trend: Section<Vec<TrendPoint>>,
    pub co_occurrence: Section<CoOccurrenceMatrix>,
    pub quantity_histogram: Section<Vec<(u32, usize)>>,
    pub warnings: Vec<EmptyResultWarning>,
}

impl DashboardView {
    /// Run the filter engine and every downstream engine once.
    ///
    /// Fails only when no RowSet can be derived at all (invalid date
    /// range). Per-section failures are kept in the section.
    pub fn evaluate(
        dataset: &Dataset,
        criteria: &FilterCriteria,
        config: &DashboardConfig,
    ) -> Result<Self, PipelineError> {
        let base = dataset.rows();
        let sets = apply(&base, criteria)?;
        let date = &sets.date;
        let geography = sets.geography.as_ref().map_err(Clone::clone);
        let category = sets.category.as_ref().map_err(Clone::clone);

        let mut warnings = Vec::new();
        if date.is_empty() {
            warnings.push(EmptyResultWarning {
                section: "Sales overview",
            });
        }
        if matches!(geography, Ok(rows) if rows.is_empty()) {
            warnings.push(EmptyResultWarning {
                section: "Sales by region and market",
            });
        }
        if matches!(category, Ok(rows) if rows.is_empty()) {
            warnings.push(EmptyResultWarning {
                section: "Sales by category",
            });
        }
        for w in &warnings {
            log::warn!("{w}");
        }

        let view = DashboardView {
            row_counts: RowCounts {
                base: base.len(),
                date: date.len(),
                geography: geography.as_ref().ok().map(|r| r.len()),
                category: category.as_ref().ok().map(|r| r.len()),
            },
            options: FacetOptions::collect(dataset, date),
            kpis: compute_kpis(date),
            sales_by_year: group_sum(date, &[Dimension::Year], ValueField::Sales),
            sales_by_region: geography
                .clone()
                .and_then(|rows| group_sum(rows, &[Dimension::Region], ValueField::Sales)),
            sales_by_category: category
                .clone()
                .and_then(|rows| group_sum(rows, &[Dimension::Category], ValueField::Sales)),
            sales_by_segment: group_sum(date, &[Dimension::Segment], ValueField::Sales),
            sales_by_market: geography
                .clone()
                .and_then(|rows| group_sum(rows, &[Dimension::Market], ValueField::Sales)),
            cumulative_sales: cumulative(date, ValueField::Sales),
            top_profit_products: top_n(
                date,
                &[Dimension::ProductName],
                ValueField::Profit,
                config.top_n,
                true,
            ),
            top_sales_products: top_n(
                date,
                &[Dimension::ProductName],
                ValueField::Sales,
                config.top_n,
                true,
            ),
            sales_profit_points: scatter_points(date),
            yearly_trend: yearly_trend(date),
            co_occurrence: co_occurrence(date),
            quantity_histogram: quantity_histogram(date),
            warnings,
        };

        for (section, err) in view.failures() {
            log::warn!("{section} skipped: {err}");
        }
        log::debug!(
            "evaluated dashboard: {} of {} rows in date range",
            view.row_counts.date,
            view.row_counts.base
        );
        Ok(view)
    }

    /// Sections that could not be computed, with the reason.
    pub fn failures(&self) -> Vec<(&'static str, &PipelineError)> {
        let sections: [(&'static str, Option<&PipelineError>); 13] = [
            ("KPIs", self.kpis.as_ref().err()),
            ("Sales by year", self.sales_by_year.as_ref().err()),
            ("Sales by region", self.sales_by_region.as_ref().err()),
            ("Sales by category", self.sales_by_category.as_ref().err()),
            ("Sales by segment", self.sales_by_segment.as_ref().err()),
            ("Sales by market", self.sales_by_market.as_ref().err()),
            ("Cumulative sales", self.cumulative_sales.as_ref().err()),
            ("Top profitable products", self.top_profit_products.as_ref().err()),
            ("Top sold products", self.top_sales_products.as_ref().err()),
            ("Sales and profit correlation", self.sales_profit_points.as_ref().err()),
            ("Sales and profit trend", self.yearly_trend.as_ref().err()),
            ("Sub-category co-occurrence", self.co_occurrence.as_ref().err()),
            ("Order sizes", self.quantity_histogram.as_ref().err()),
        ];
        sections
            .into_iter()
            .filter_map(|(name, err)| err.map(|e| (name, e)))
            .collect()
    }
}

fn yearly_trend(rows: &RowSet<'_>) -> Section<Vec<TrendPoint>> {
    let sums = group_sums(rows, &[Dimension::Year], &[ValueField::Sales, ValueField::Profit])?;
    let (sales, profit) = (&sums[0], &sums[1]);
    Ok(sales
        .iter()
        .filter_map(|(key, s)| {
            let year = key.as_year()?;
            Some(TrendPoint {
                year,
                sales: s,
                profit: profit.get(key).unwrap_or(0.0),
            })
        })
        .collect())
}
