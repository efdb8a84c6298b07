use std::collections::BTreeSet;

use chrono::NaiveDate;

use super::model::{Column, Dataset, Record, RowSet};
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Facet: one filter dimension, either unconstrained or an include-set
// ---------------------------------------------------------------------------

/// Selection state of a single facet.
///
/// `Unconstrained` admits every value. An empty widget selection maps to
/// `Unconstrained`, never to an empty `Include` set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Facet {
    #[default]
    Unconstrained,
    Include(BTreeSet<String>),
}

impl Facet {
    /// Build a facet from a multi-select widget's current values.
    pub fn from_selection<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if set.is_empty() {
            Facet::Unconstrained
        } else {
            Facet::Include(set)
        }
    }

    pub fn admits(&self, value: &str) -> bool {
        match self {
            Facet::Unconstrained => true,
            Facet::Include(set) => set.contains(value),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self, Facet::Unconstrained)
    }
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// Inclusive calendar-day range. Construction rejects `start > end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, PipelineError> {
        if start > end {
            return Err(PipelineError::InvalidRange { start, end });
        }
        Ok(DateRange { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Everything the user selected in the filter panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    pub date_start: NaiveDate,
    pub date_end: NaiveDate,
    pub countries: Facet,
    pub regions: Facet,
    pub categories: Facet,
    pub sub_categories: Facet,
}

impl FilterCriteria {
    /// Unconstrained criteria over an explicit date range.
    pub fn between(date_start: NaiveDate, date_end: NaiveDate) -> Self {
        FilterCriteria {
            date_start,
            date_end,
            countries: Facet::Unconstrained,
            regions: Facet::Unconstrained,
            categories: Facet::Unconstrained,
            sub_categories: Facet::Unconstrained,
        }
    }

    /// Widget defaults: the dataset's full date span, every facet open.
    /// An empty dataset gets the single day `NaiveDate::default()`.
    pub fn for_dataset(dataset: &Dataset) -> Self {
        let (start, end) = dataset
            .date_bounds()
            .unwrap_or((NaiveDate::default(), NaiveDate::default()));
        FilterCriteria::between(start, end)
    }

    pub fn date_range(&self) -> Result<DateRange, PipelineError> {
        DateRange::new(self.date_start, self.date_end)
    }

    fn admits_geography(&self, rec: &Record) -> bool {
        self.countries.admits(&rec.country) && self.regions.admits(&rec.region)
    }

    fn admits_category(&self, rec: &Record) -> bool {
        self.categories.admits(&rec.category) && self.sub_categories.admits(&rec.sub_category)
    }
}

// ---------------------------------------------------------------------------
// Individual filters
// ---------------------------------------------------------------------------

/// Keep records with `range.start() <= order_date <= range.end()`.
pub fn filter_by_date<'a>(rows: &RowSet<'a>, range: DateRange) -> RowSet<'a> {
    rows.filter(|r| range.contains(r.order_date))
}

/// Keep records whose country AND region pass their facets.
///
/// A constrained facet on a column the source lacks cannot be honoured
/// and is reported as [`PipelineError::MissingColumn`].
pub fn filter_by_geography<'a>(
    rows: &RowSet<'a>,
    criteria: &FilterCriteria,
) -> Result<RowSet<'a>, PipelineError> {
    require_constrained(rows, &criteria.countries, Column::Country)?;
    require_constrained(rows, &criteria.regions, Column::Region)?;
    Ok(rows.filter(|r| criteria.admits_geography(r)))
}

/// Keep records whose category AND sub-category pass their facets.
pub fn filter_by_category<'a>(
    rows: &RowSet<'a>,
    criteria: &FilterCriteria,
) -> Result<RowSet<'a>, PipelineError> {
    require_constrained(rows, &criteria.categories, Column::Category)?;
    require_constrained(rows, &criteria.sub_categories, Column::SubCategory)?;
    Ok(rows.filter(|r| criteria.admits_category(r)))
}

fn require_constrained(rows: &RowSet<'_>, facet: &Facet, column: Column) -> Result<(), PipelineError> {
    if facet.is_unconstrained() {
        Ok(())
    } else {
        rows.schema().require(&[column])
    }
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// The derived RowSets the dashboard sections are wired to.
///
/// `geography` and `category` are each filtered from `date`. They are
/// NOT narrowed by one another: a category chart ignores the geography
/// selection and a geography chart ignores the category selection.
#[derive(Debug, Clone)]
pub struct FilteredRowSets<'a> {
    pub date: RowSet<'a>,
    pub geography: Result<RowSet<'a>, PipelineError>,
    pub category: Result<RowSet<'a>, PipelineError>,
}

/// Apply the date filter, then derive the geography and category subsets
/// from that same baseline.
pub fn apply<'a>(
    base: &RowSet<'a>,
    criteria: &FilterCriteria,
) -> Result<FilteredRowSets<'a>, PipelineError> {
    let range = criteria.date_range()?;
    let date = filter_by_date(base, range);
    let geography = filter_by_geography(&date, criteria);
    let category = filter_by_category(&date, criteria);
    Ok(FilteredRowSets {
        date,
        geography,
        category,
    })
}

// ---------------------------------------------------------------------------
// Widget options
// ---------------------------------------------------------------------------

/// Selectable values for each multi-select facet.
///
/// Countries and regions list the whole dataset; categories and
/// sub-categories list only what the date-filtered rows contain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetOptions {
    pub countries: BTreeSet<String>,
    pub regions: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    pub sub_categories: BTreeSet<String>,
}

impl FacetOptions {
    pub fn collect(dataset: &Dataset, date_filtered: &RowSet<'_>) -> Self {
        let schema = dataset.schema();
        let mut categories = BTreeSet::new();
        let mut sub_categories = BTreeSet::new();
        for r in date_filtered.iter() {
            if schema.contains(Column::Category) {
                categories.insert(r.category.clone());
            }
            if schema.contains(Column::SubCategory) {
                sub_categories.insert(r.sub_category.clone());
            }
        }
        FacetOptions {
            countries: dataset.countries.clone(),
            regions: dataset.regions.clone(),
            categories,
            sub_categories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Schema;
    use pretty_assertions::assert_eq;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rec(id: &str, date: NaiveDate, country: &str, region: &str, cat: &str, sub: &str) -> Record {
        Record {
            country: country.into(),
            region: region.into(),
            category: cat.into(),
            sub_category: sub.into(),
            ..Record::new(id, date)
        }
    }

    fn sample() -> Dataset {
        Dataset::from_records(
            vec![
                rec("1", day(2012, 1, 1), "USA", "East", "Furniture", "Chairs"),
                rec("2", day(2012, 6, 15), "France", "Central", "Technology", "Phones"),
                rec("3", day(2013, 3, 3), "USA", "West", "Furniture", "Tables"),
                rec("4", day(2014, 12, 31), "Chile", "South", "Office Supplies", "Paper"),
            ],
            Schema::full(),
        )
    }

    fn ids(rows: &RowSet<'_>) -> Vec<String> {
        rows.iter().map(|r| r.order_id.clone()).collect()
    }

    #[test]
    fn empty_selection_is_unconstrained() {
        assert_eq!(Facet::from_selection(Vec::<String>::new()), Facet::Unconstrained);
        assert!(Facet::Unconstrained.admits("anything"));
        let f = Facet::from_selection(["USA"]);
        assert!(f.admits("USA"));
        assert!(!f.admits("France"));
    }

    #[test]
    fn date_filter_is_inclusive_on_both_ends() {
        let ds = sample();
        let range = DateRange::new(day(2012, 1, 1), day(2013, 3, 3)).unwrap();
        assert_eq!(ids(&filter_by_date(&ds.rows(), range)), vec!["1", "2", "3"]);
    }

    #[test]
    fn reversed_range_is_rejected() {
        let ds = sample();
        let criteria = FilterCriteria::between(day(2014, 1, 1), day(2012, 1, 1));
        let err = apply(&ds.rows(), &criteria).unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidRange {
                start: day(2014, 1, 1),
                end: day(2012, 1, 1)
            }
        );
    }

    #[test]
    fn country_only_selection_keeps_matching_rows() {
        let ds = sample();
        let mut criteria = FilterCriteria::for_dataset(&ds);
        criteria.countries = Facet::from_selection(["USA"]);
        let sets = apply(&ds.rows(), &criteria).unwrap();
        assert_eq!(ids(&sets.geography.unwrap()), vec!["1", "3"]);
    }

    #[test]
    fn geography_facets_are_conjunctive() {
        let ds = sample();
        let mut criteria = FilterCriteria::for_dataset(&ds);
        criteria.countries = Facet::from_selection(["USA"]);
        criteria.regions = Facet::from_selection(["West", "Central"]);
        let sets = apply(&ds.rows(), &criteria).unwrap();
        assert_eq!(ids(&sets.geography.unwrap()), vec!["3"]);
    }

    #[test]
    fn geography_and_category_are_not_chained() {
        let ds = sample();
        let mut criteria = FilterCriteria::for_dataset(&ds);
        criteria.countries = Facet::from_selection(["France"]);
        criteria.categories = Facet::from_selection(["Furniture"]);
        let sets = apply(&ds.rows(), &criteria).unwrap();

        // Each subset is derived from the full date baseline only.
        assert_eq!(ids(&sets.date), vec!["1", "2", "3", "4"]);
        assert_eq!(ids(&sets.geography.unwrap()), vec!["2"]);
        assert_eq!(ids(&sets.category.unwrap()), vec!["1", "3"]);
    }

    #[test]
    fn category_subset_starts_from_date_baseline() {
        let ds = sample();
        let mut criteria = FilterCriteria::between(day(2013, 1, 1), day(2014, 12, 31));
        criteria.categories = Facet::from_selection(["Furniture"]);
        let sets = apply(&ds.rows(), &criteria).unwrap();
        assert_eq!(ids(&sets.category.unwrap()), vec!["3"]);
    }

    #[test]
    fn constrained_facet_on_missing_column_is_reported() {
        let records = sample().records().to_vec();
        let ds = Dataset::from_records(records, Schema::full().without(Column::Region));
        let mut criteria = FilterCriteria::for_dataset(&ds);
        let sets = apply(&ds.rows(), &criteria).unwrap();
        assert_eq!(sets.geography.unwrap().len(), 4);

        criteria.regions = Facet::from_selection(["East"]);
        let sets = apply(&ds.rows(), &criteria).unwrap();
        assert_eq!(
            sets.geography.unwrap_err(),
            PipelineError::MissingColumn {
                column: Column::Region
            }
        );
        assert!(sets.category.is_ok());
    }

    #[test]
    fn category_options_follow_the_date_filter() {
        let ds = sample();
        let criteria = FilterCriteria::between(day(2012, 1, 1), day(2012, 12, 31));
        let sets = apply(&ds.rows(), &criteria).unwrap();
        let opts = FacetOptions::collect(&ds, &sets.date);
        assert_eq!(opts.countries.len(), 3);
        assert_eq!(
            opts.categories.into_iter().collect::<Vec<_>>(),
            vec!["Furniture".to_string(), "Technology".to_string()]
        );
        assert_eq!(opts.sub_categories.len(), 2);
    }
}
