use std::collections::BTreeSet;
use std::path::Path;

use chrono::NaiveDate;

use rusty_sales::data::filter::{Facet, FacetOptions, FilterCriteria};
use rusty_sales::data::loader::{load_file, LoadOptions};
use rusty_sales::{DashboardConfig, DashboardView, Dataset};

// ---------------------------------------------------------------------------
// Widget selections
// ---------------------------------------------------------------------------

/// The four multi-select facets in the side panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetKind {
    Country,
    Region,
    Category,
    SubCategory,
}

impl FacetKind {
    pub fn label(self) -> &'static str {
        match self {
            FacetKind::Country => "Country",
            FacetKind::Region => "Region",
            FacetKind::Category => "Category",
            FacetKind::SubCategory => "Sub-Category",
        }
    }
}

/// Raw widget values. An empty set means nothing is selected, which the
/// filter engine treats as "no constraint".
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub countries: BTreeSet<String>,
    pub regions: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub sub_categories: BTreeSet<String>,
}

impl Selection {
    pub fn values(&self, kind: FacetKind) -> &BTreeSet<String> {
        match kind {
            FacetKind::Country => &self.countries,
            FacetKind::Region => &self.regions,
            FacetKind::Category => &self.categories,
            FacetKind::SubCategory => &self.sub_categories,
        }
    }

    fn values_mut(&mut self, kind: FacetKind) -> &mut BTreeSet<String> {
        match kind {
            FacetKind::Country => &mut self.countries,
            FacetKind::Region => &mut self.regions,
            FacetKind::Category => &mut self.categories,
            FacetKind::SubCategory => &mut self.sub_categories,
        }
    }

    /// Drop category and sub-category values the date range no longer
    /// offers. Returns whether anything was dropped.
    pub fn retain_available(&mut self, options: &FacetOptions) -> bool {
        let before = self.categories.len() + self.sub_categories.len();
        self.categories.retain(|v| options.categories.contains(v));
        self.sub_categories.retain(|v| options.sub_categories.contains(v));
        before != self.categories.len() + self.sub_categories.len()
    }

    pub fn criteria(&self) -> FilterCriteria {
        FilterCriteria {
            date_start: self.start,
            date_end: self.end,
            countries: Facet::from_selection(self.countries.iter().cloned()),
            regions: Facet::from_selection(self.regions.iter().cloned()),
            categories: Facet::from_selection(self.categories.iter().cloned()),
            sub_categories: Facet::from_selection(self.sub_categories.iter().cloned()),
        }
    }
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The full UI state, independent of rendering.
pub struct AppState {
    /// Loaded dataset (None until user loads a file).
    pub dataset: Option<Dataset>,

    /// Current filter widget values.
    pub selection: Selection,

    /// Output of the last evaluation cycle.
    pub view: Option<DashboardView>,

    pub config: DashboardConfig,
    pub load_options: LoadOptions,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl AppState {
    pub fn new(config: DashboardConfig, load_options: LoadOptions) -> Self {
        Self {
            dataset: None,
            selection: Selection::default(),
            view: None,
            config,
            load_options,
            status_message: None,
        }
    }

    /// Ingest a newly loaded dataset and reset the filters to its defaults.
    pub fn set_dataset(&mut self, dataset: Dataset) {
        let defaults = FilterCriteria::for_dataset(&dataset);
        self.selection = Selection {
            start: defaults.date_start,
            end: defaults.date_end,
            ..Selection::default()
        };
        self.dataset = Some(dataset);
        self.status_message = None;
        self.refresh();
    }

    /// Load a file picked in the UI. Failures are shown, not fatal.
    pub fn open(&mut self, path: &Path) {
        match load_file(path, &self.load_options) {
            Ok(dataset) => self.set_dataset(dataset),
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Re-run the whole pipeline for the current selection.
    ///
    /// Category options depend only on the date range, so one extra pass
    /// after pruning stale selections is enough.
    pub fn refresh(&mut self) {
        let Some(ds) = &self.dataset else {
            return;
        };
        let mut result = DashboardView::evaluate(ds, &self.selection.criteria(), &self.config);
        if let Ok(view) = &result {
            if self.selection.retain_available(&view.options) {
                log::debug!("dropped category selections outside the date range");
                result = DashboardView::evaluate(ds, &self.selection.criteria(), &self.config);
            }
        }
        match result {
            Ok(view) => {
                self.view = Some(view);
                self.status_message = None;
            }
            Err(e) => {
                log::warn!("{e}");
                self.view = None;
                self.status_message = Some(e.to_string());
            }
        }
    }

    pub fn set_date_range(&mut self, start: NaiveDate, end: NaiveDate) {
        self.selection.start = start;
        self.selection.end = end;
        self.refresh();
    }

    /// Toggle a single value in a facet's selection.
    pub fn toggle_filter_value(&mut self, kind: FacetKind, value: &str) {
        let selected = self.selection.values_mut(kind);
        if !selected.remove(value) {
            selected.insert(value.to_string());
        }
        self.refresh();
    }

    /// Clear a facet's selection, which lifts its constraint.
    pub fn select_none(&mut self, kind: FacetKind) {
        self.selection.values_mut(kind).clear();
        self.refresh();
    }

    /// Selectable values for a facet, from the last evaluation.
    pub fn options(&self, kind: FacetKind) -> BTreeSet<String> {
        let Some(view) = &self.view else {
            return BTreeSet::new();
        };
        let opts = &view.options;
        match kind {
            FacetKind::Country => opts.countries.clone(),
            FacetKind::Region => opts.regions.clone(),
            FacetKind::Category => opts.categories.clone(),
            FacetKind::SubCategory => opts.sub_categories.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rusty_sales::{Record, Schema};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn state() -> AppState {
        let rec = |id: &str, date, sub: &str| Record {
            category: "Furniture".into(),
            sub_category: sub.into(),
            sales: 10.0,
            ..Record::new(id, date)
        };
        let ds = Dataset::from_records(
            vec![
                rec("1", day(2012, 3, 1), "Chairs"),
                rec("2", day(2013, 3, 1), "Tables"),
            ],
            Schema::full(),
        );
        let mut state = AppState::new(DashboardConfig::default(), LoadOptions::default());
        state.set_dataset(ds);
        state
    }

    #[test]
    fn date_change_drops_unlisted_sub_categories() {
        let mut state = state();
        state.toggle_filter_value(FacetKind::SubCategory, "Tables");
        state.toggle_filter_value(FacetKind::SubCategory, "Chairs");
        assert_eq!(state.selection.sub_categories.len(), 2);

        state.set_date_range(day(2012, 1, 1), day(2012, 12, 31));
        assert_eq!(
            state.selection.sub_categories.iter().cloned().collect::<Vec<_>>(),
            vec!["Chairs".to_string()]
        );
        assert!(state.options(FacetKind::SubCategory).contains("Chairs"));
        let view = state.view.as_ref().unwrap();
        assert_eq!(view.row_counts.category, Some(1));
    }

    #[test]
    fn dropping_the_last_value_lifts_the_constraint() {
        let mut state = state();
        state.toggle_filter_value(FacetKind::SubCategory, "Tables");
        state.set_date_range(day(2012, 1, 1), day(2012, 12, 31));

        assert!(state.selection.sub_categories.is_empty());
        assert!(state.selection.criteria().sub_categories.is_unconstrained());
        assert_eq!(state.view.as_ref().unwrap().row_counts.category, Some(1));
    }

    #[test]
    fn reversed_range_clears_the_view() {
        let mut state = state();
        state.set_date_range(day(2013, 1, 1), day(2012, 1, 1));
        assert!(state.view.is_none());
        assert!(state.status_message.is_some());
    }
}
