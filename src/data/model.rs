use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Column – the fixed source schema
// ---------------------------------------------------------------------------

/// One column of the source sales table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Column {
    OrderId,
    OrderDate,
    Country,
    Region,
    Market,
    Category,
    SubCategory,
    Segment,
    ProductName,
    Sales,
    Profit,
    Quantity,
}

impl Column {
    pub const ALL: [Column; 12] = [
        Column::OrderId,
        Column::OrderDate,
        Column::Country,
        Column::Region,
        Column::Market,
        Column::Category,
        Column::SubCategory,
        Column::Segment,
        Column::ProductName,
        Column::Sales,
        Column::Profit,
        Column::Quantity,
    ];

    /// Header as written in the source spreadsheet.
    pub fn header(self) -> &'static str {
        match self {
            Column::OrderId => "Order ID",
            Column::OrderDate => "Order Date",
            Column::Country => "Country",
            Column::Region => "Region",
            Column::Market => "Market",
            Column::Category => "Category",
            Column::SubCategory => "Sub-Category",
            Column::Segment => "Segment",
            Column::ProductName => "Product Name",
            Column::Sales => "Sales",
            Column::Profit => "Profit",
            Column::Quantity => "Quantity",
        }
    }

    /// Match a header loosely: case-insensitive, and ` `, `-`, `_` are
    /// interchangeable (`sub_category` matches `Sub-Category`).
    pub fn from_header(header: &str) -> Option<Column> {
        let wanted = normalize_header(header);
        Column::ALL
            .into_iter()
            .find(|c| normalize_header(c.header()) == wanted)
    }
}

fn normalize_header(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

// ---------------------------------------------------------------------------
// Schema – which columns the source actually provided
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    present: BTreeSet<Column>,
}

impl Schema {
    /// Schema with every column present.
    pub fn full() -> Self {
        Column::ALL.into_iter().collect()
    }

    pub fn contains(&self, column: Column) -> bool {
        self.present.contains(&column)
    }

    /// Columns of the fixed schema the source did not provide.
    pub fn missing(&self) -> Vec<Column> {
        Column::ALL
            .into_iter()
            .filter(|c| !self.present.contains(c))
            .collect()
    }

    /// Fail with [`PipelineError::MissingColumn`] for the first absent column.
    pub fn require(&self, columns: &[Column]) -> Result<(), PipelineError> {
        match columns.iter().find(|c| !self.present.contains(c)) {
            Some(&column) => Err(PipelineError::MissingColumn { column }),
            None => Ok(()),
        }
    }

    pub fn without(mut self, column: Column) -> Self {
        self.present.remove(&column);
        self
    }
}

impl FromIterator<Column> for Schema {
    fn from_iter<I: IntoIterator<Item = Column>>(iter: I) -> Self {
        Schema {
            present: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Record – one sales transaction line
// ---------------------------------------------------------------------------

/// One line item of an order. Several records may share an `order_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub order_id: String,
    pub order_date: NaiveDate,
    /// Calendar year of `order_date`, derived when the dataset is built.
    pub year: i32,
    pub country: String,
    pub region: String,
    pub market: String,
    pub category: String,
    pub sub_category: String,
    pub segment: String,
    pub product_name: String,
    pub sales: f64,
    pub profit: f64,
    pub quantity: u32,
}

impl Record {
    /// A record with empty text fields, zero sales/profit and quantity 1.
    /// Intended as the base of a struct-update expression.
    pub fn new(order_id: impl Into<String>, order_date: NaiveDate) -> Self {
        Record {
            order_id: order_id.into(),
            order_date,
            year: order_date.year(),
            country: String::new(),
            region: String::new(),
            market: String::new(),
            category: String::new(),
            sub_category: String::new(),
            segment: String::new(),
            product_name: String::new(),
            sales: 0.0,
            profit: 0.0,
            quantity: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset – the loaded base table
// ---------------------------------------------------------------------------

/// The full loaded table with pre-computed facet indices.
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<Record>,
    schema: Schema,
    /// Sorted distinct countries (for the geography widgets).
    pub countries: BTreeSet<String>,
    /// Sorted distinct regions.
    pub regions: BTreeSet<String>,
}

impl Dataset {
    /// Build the dataset, deriving `year` for every record.
    pub fn from_records(mut records: Vec<Record>, schema: Schema) -> Self {
        let mut countries = BTreeSet::new();
        let mut regions = BTreeSet::new();

        for rec in &mut records {
            rec.year = rec.order_date.year();
            if schema.contains(Column::Country) {
                countries.insert(rec.country.clone());
            }
            if schema.contains(Column::Region) {
                regions.insert(rec.region.clone());
            }
        }

        Dataset {
            records,
            schema,
            countries,
            regions,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// The base RowSet: every record, in load order.
    pub fn rows(&self) -> RowSet<'_> {
        RowSet {
            schema: &self.schema,
            rows: self.records.iter().collect(),
        }
    }

    /// Earliest and latest order date, or `None` for an empty dataset.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.records.first()?.order_date;
        Some(self.records.iter().fold((first, first), |(lo, hi), r| {
            (lo.min(r.order_date), hi.max(r.order_date))
        }))
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// RowSet – a borrowed selection of records
// ---------------------------------------------------------------------------

/// An immutable selection of records from a [`Dataset`].
///
/// Filtering produces a new `RowSet` pointing at the same records, so a
/// derived set is always a subset of its parent with every field intact.
#[derive(Debug, Clone)]
pub struct RowSet<'a> {
    schema: &'a Schema,
    rows: Vec<&'a Record>,
}

impl<'a> RowSet<'a> {
    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + '_ {
        self.rows.iter().copied()
    }

    /// Keep the records matching `pred`, preserving order.
    pub fn filter(&self, mut pred: impl FnMut(&Record) -> bool) -> RowSet<'a> {
        RowSet {
            schema: self.schema,
            rows: self.rows.iter().copied().filter(|r| pred(*r)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn header_matching_is_loose() {
        assert_eq!(Column::from_header("Sub-Category"), Some(Column::SubCategory));
        assert_eq!(Column::from_header(" sub_category "), Some(Column::SubCategory));
        assert_eq!(Column::from_header("ORDER ID"), Some(Column::OrderId));
        assert_eq!(Column::from_header("product-name"), Some(Column::ProductName));
        assert_eq!(Column::from_header("Discount"), None);
    }

    #[test]
    fn require_reports_first_missing_column() {
        let schema = Schema::full().without(Column::Profit).without(Column::OrderId);
        assert_eq!(schema.require(&[Column::Sales]), Ok(()));
        assert_eq!(
            schema.require(&[Column::Sales, Column::OrderId, Column::Profit]),
            Err(PipelineError::MissingColumn {
                column: Column::OrderId
            })
        );
        assert_eq!(schema.missing(), vec![Column::OrderId, Column::Profit]);
    }

    #[test]
    fn year_is_derived_at_build_time() {
        let mut rec = Record::new("A-1", day(2014, 3, 9));
        rec.year = 1999;
        let ds = Dataset::from_records(vec![rec], Schema::full());
        assert_eq!(ds.records()[0].year, 2014);
    }

    #[test]
    fn date_bounds_and_facet_indices() {
        let ds = Dataset::from_records(
            vec![
                Record {
                    country: "France".into(),
                    region: "Central".into(),
                    ..Record::new("1", day(2013, 5, 1))
                },
                Record {
                    country: "Chile".into(),
                    region: "South".into(),
                    ..Record::new("2", day(2011, 1, 7))
                },
                Record {
                    country: "France".into(),
                    region: "Central".into(),
                    ..Record::new("3", day(2014, 12, 31))
                },
            ],
            Schema::full(),
        );
        assert_eq!(ds.date_bounds(), Some((day(2011, 1, 7), day(2014, 12, 31))));
        assert_eq!(
            ds.countries.iter().cloned().collect::<Vec<_>>(),
            vec!["Chile".to_string(), "France".to_string()]
        );
        assert_eq!(ds.regions.len(), 2);
        assert_eq!(Dataset::from_records(Vec::new(), Schema::full()).date_bounds(), None);
    }

    #[test]
    fn filtered_rowset_borrows_the_same_records() {
        let ds = Dataset::from_records(
            vec![
                Record::new("1", day(2012, 1, 1)),
                Record::new("2", day(2012, 1, 2)),
            ],
            Schema::full(),
        );
        let all = ds.rows();
        let kept = all.filter(|r| r.order_id == "2");
        assert_eq!(kept.len(), 1);
        let kept_rec = kept.iter().next().unwrap();
        assert!(std::ptr::eq(kept_rec, &ds.records()[1]));
    }
}
