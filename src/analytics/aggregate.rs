use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::data::model::{Column, Record, RowSet};
use crate::error::PipelineError;

// ---------------------------------------------------------------------------
// Grouping dimensions and value fields
// ---------------------------------------------------------------------------

/// A column a RowSet can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dimension {
    Year,
    Country,
    Region,
    Market,
    Category,
    SubCategory,
    Segment,
    ProductName,
}

impl Dimension {
    /// Source column backing the dimension. `Year` is derived from the
    /// order date.
    pub fn column(self) -> Column {
        match self {
            Dimension::Year => Column::OrderDate,
            Dimension::Country => Column::Country,
            Dimension::Region => Column::Region,
            Dimension::Market => Column::Market,
            Dimension::Category => Column::Category,
            Dimension::SubCategory => Column::SubCategory,
            Dimension::Segment => Column::Segment,
            Dimension::ProductName => Column::ProductName,
        }
    }

    fn project(self, rec: &Record) -> KeyValue {
        match self {
            Dimension::Year => KeyValue::Year(rec.year),
            Dimension::Country => KeyValue::Text(rec.country.clone()),
            Dimension::Region => KeyValue::Text(rec.region.clone()),
            Dimension::Market => KeyValue::Text(rec.market.clone()),
            Dimension::Category => KeyValue::Text(rec.category.clone()),
            Dimension::SubCategory => KeyValue::Text(rec.sub_category.clone()),
            Dimension::Segment => KeyValue::Text(rec.segment.clone()),
            Dimension::ProductName => KeyValue::Text(rec.product_name.clone()),
        }
    }
}

/// A numeric column that can be reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueField {
    Sales,
    Profit,
    Quantity,
}

impl ValueField {
    pub fn column(self) -> Column {
        match self {
            ValueField::Sales => Column::Sales,
            ValueField::Profit => Column::Profit,
            ValueField::Quantity => Column::Quantity,
        }
    }

    pub fn get(self, rec: &Record) -> f64 {
        match self {
            ValueField::Sales => rec.sales,
            ValueField::Profit => rec.profit,
            ValueField::Quantity => f64::from(rec.quantity),
        }
    }
}

// ---------------------------------------------------------------------------
// Group keys
// ---------------------------------------------------------------------------

/// One component of a group key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum KeyValue {
    Year(i32),
    Text(String),
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Year(y) => write!(f, "{y}"),
            KeyValue::Text(s) => f.write_str(s),
        }
    }
}

/// The key of one group: one value per grouping dimension, in order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey(pub Vec<KeyValue>);

impl GroupKey {
    pub fn text(s: impl Into<String>) -> Self {
        GroupKey(vec![KeyValue::Text(s.into())])
    }

    pub fn year(y: i32) -> Self {
        GroupKey(vec![KeyValue::Year(y)])
    }

    /// The year of a single-dimension `Year` key.
    pub fn as_year(&self) -> Option<i32> {
        match self.0.as_slice() {
            [KeyValue::Year(y)] => Some(*y),
            _ => None,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" / ")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

fn key_of(rec: &Record, dims: &[Dimension]) -> GroupKey {
    GroupKey(dims.iter().map(|d| d.project(rec)).collect())
}

fn require(rows: &RowSet<'_>, dims: &[Dimension], fields: &[ValueField]) -> Result<(), PipelineError> {
    let columns: Vec<Column> = dims
        .iter()
        .map(|d| d.column())
        .chain(fields.iter().map(|f| f.column()))
        .collect();
    rows.schema().require(&columns)
}

// ---------------------------------------------------------------------------
// AggregationResult
// ---------------------------------------------------------------------------

/// Group key → reduced value. Iterates in ascending key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationResult {
    groups: BTreeMap<GroupKey, f64>,
}

impl AggregationResult {
    pub fn get(&self, key: &GroupKey) -> Option<f64> {
        self.groups.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, f64)> + '_ {
        self.groups.iter().map(|(k, v)| (k, *v))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Sum of all group values.
    pub fn total(&self) -> f64 {
        self.groups.values().sum()
    }

    /// Groups ordered by value; ties keep ascending key order.
    pub fn sorted_by_value(&self, descending: bool) -> Vec<(GroupKey, f64)> {
        let mut entries: Vec<(GroupKey, f64)> =
            self.groups.iter().map(|(k, v)| (k.clone(), *v)).collect();
        if descending {
            entries.sort_by(|a, b| b.1.total_cmp(&a.1));
        } else {
            entries.sort_by(|a, b| a.1.total_cmp(&b.1));
        }
        entries
    }
}

impl FromIterator<(GroupKey, f64)> for AggregationResult {
    fn from_iter<I: IntoIterator<Item = (GroupKey, f64)>>(iter: I) -> Self {
        AggregationResult {
            groups: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Grouped reductions
// ---------------------------------------------------------------------------

/// Sum `field` per group.
pub fn group_sum(
    rows: &RowSet<'_>,
    dims: &[Dimension],
    field: ValueField,
) -> Result<AggregationResult, PipelineError> {
    require(rows, dims, &[field])?;
    let mut groups: BTreeMap<GroupKey, f64> = BTreeMap::new();
    for rec in rows.iter() {
        *groups.entry(key_of(rec, dims)).or_insert(0.0) += field.get(rec);
    }
    Ok(AggregationResult { groups })
}

/// Arithmetic mean of `field` per group.
pub fn group_mean(
    rows: &RowSet<'_>,
    dims: &[Dimension],
    field: ValueField,
) -> Result<AggregationResult, PipelineError> {
    require(rows, dims, &[field])?;
    let mut acc: BTreeMap<GroupKey, (f64, usize)> = BTreeMap::new();
    for rec in rows.iter() {
        let (sum, n) = acc.entry(key_of(rec, dims)).or_insert((0.0, 0));
        *sum += field.get(rec);
        *n += 1;
    }
    Ok(acc
        .into_iter()
        .map(|(k, (sum, n))| (k, sum / n as f64))
        .collect())
}

/// Number of rows per group.
pub fn group_count(rows: &RowSet<'_>, dims: &[Dimension]) -> Result<AggregationResult, PipelineError> {
    require(rows, dims, &[])?;
    let mut groups: BTreeMap<GroupKey, f64> = BTreeMap::new();
    for rec in rows.iter() {
        *groups.entry(key_of(rec, dims)).or_insert(0.0) += 1.0;
    }
    Ok(AggregationResult { groups })
}

/// Sum several fields per group in one pass. `result[i]` holds `fields[i]`.
pub fn group_sums(
    rows: &RowSet<'_>,
    dims: &[Dimension],
    fields: &[ValueField],
) -> Result<Vec<AggregationResult>, PipelineError> {
    require(rows, dims, fields)?;
    let mut out = vec![BTreeMap::<GroupKey, f64>::new(); fields.len()];
    for rec in rows.iter() {
        let key = key_of(rec, dims);
        for (groups, field) in out.iter_mut().zip(fields) {
            *groups.entry(key.clone()).or_insert(0.0) += field.get(rec);
        }
    }
    Ok(out
        .into_iter()
        .map(|groups| AggregationResult { groups })
        .collect())
}

/// The `n` groups with the largest (or smallest) summed `field`.
///
/// Returns every group when fewer than `n` exist.
pub fn top_n(
    rows: &RowSet<'_>,
    dims: &[Dimension],
    field: ValueField,
    n: usize,
    descending: bool,
) -> Result<Vec<(GroupKey, f64)>, PipelineError> {
    let sums = group_sum(rows, dims, field)?;
    let mut sorted = sums.sorted_by_value(descending);
    sorted.truncate(n);
    Ok(sorted)
}

// ---------------------------------------------------------------------------
// Row-level projections
// ---------------------------------------------------------------------------

/// One step of a running total over date-ordered rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CumulativePoint {
    pub date: NaiveDate,
    pub value: f64,
    pub running_total: f64,
}

/// Prefix sum of `field` over the rows sorted by order date.
/// Rows sharing a date keep their RowSet order.
pub fn cumulative(rows: &RowSet<'_>, field: ValueField) -> Result<Vec<CumulativePoint>, PipelineError> {
    rows.schema().require(&[Column::OrderDate, field.column()])?;
    let mut ordered: Vec<&Record> = rows.iter().collect();
    ordered.sort_by_key(|r| r.order_date);

    let mut running_total = 0.0;
    Ok(ordered
        .into_iter()
        .map(|r| {
            let value = field.get(r);
            running_total += value;
            CumulativePoint {
                date: r.order_date,
                value,
                running_total,
            }
        })
        .collect())
}

/// Widest quantity span that is zero-filled.
const HISTOGRAM_DENSE_SPAN: u32 = 1_000;

/// Frequency of each quantity, ascending.
///
/// Quantities from 1 to the largest seen are zero-filled while that span
/// is at most `HISTOGRAM_DENSE_SPAN` or the number of rows; wider spans
/// list only the quantities that occur.
pub fn quantity_histogram(rows: &RowSet<'_>) -> Result<Vec<(u32, usize)>, PipelineError> {
    rows.schema().require(&[Column::Quantity])?;
    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    for r in rows.iter() {
        *counts.entry(r.quantity).or_insert(0) += 1;
    }

    let max = counts.keys().next_back().copied().unwrap_or(0);
    let within_rows = usize::try_from(max).map_or(false, |span| span <= rows.len());
    if max <= HISTOGRAM_DENSE_SPAN || within_rows {
        Ok((1..=max)
            .map(|q| (q, counts.get(&q).copied().unwrap_or(0)))
            .collect())
    } else {
        Ok(counts.into_iter().collect())
    }
}

/// Per-record sales, profit and quantity for the correlation plots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub sales: f64,
    pub profit: f64,
    pub quantity: u32,
}

pub fn scatter_points(rows: &RowSet<'_>) -> Result<Vec<ScatterPoint>, PipelineError> {
    rows.schema()
        .require(&[Column::Sales, Column::Profit, Column::Quantity])?;
    Ok(rows
        .iter()
        .map(|r| ScatterPoint {
            sales: r.sales,
            profit: r.profit,
            quantity: r.quantity,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Dataset, Schema};
    use pretty_assertions::assert_eq;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn line(order: &str, date: NaiveDate, sub: &str, product: &str, sales: f64, profit: f64) -> Record {
        Record {
            sub_category: sub.into(),
            product_name: product.into(),
            region: "Central".into(),
            sales,
            profit,
            ..Record::new(order, date)
        }
    }

    fn chairs_and_tables() -> Dataset {
        Dataset::from_records(
            vec![
                line("1", day(2012, 2, 1), "Chairs", "Chair A", 100.0, 10.0),
                line("1", day(2012, 2, 1), "Tables", "Table B", 50.0, -5.0),
                line("2", day(2013, 7, 4), "Chairs", "Chair C", 30.0, 3.0),
            ],
            Schema::full(),
        )
    }

    #[test]
    fn sums_by_sub_category() {
        let ds = chairs_and_tables();
        let sums = group_sum(&ds.rows(), &[Dimension::SubCategory], ValueField::Sales).unwrap();
        assert_eq!(sums.get(&GroupKey::text("Chairs")), Some(130.0));
        assert_eq!(sums.get(&GroupKey::text("Tables")), Some(50.0));
        assert_eq!(sums.len(), 2);
        assert_eq!(sums.total(), 180.0);
    }

    #[test]
    fn sums_by_derived_year() {
        let ds = chairs_and_tables();
        let sums = group_sum(&ds.rows(), &[Dimension::Year], ValueField::Sales).unwrap();
        let keys: Vec<Option<i32>> = sums.iter().map(|(k, _)| k.as_year()).collect();
        assert_eq!(keys, vec![Some(2012), Some(2013)]);
        assert_eq!(sums.get(&GroupKey::year(2012)), Some(150.0));
    }

    #[test]
    fn composite_keys_group_on_every_dimension() {
        let ds = chairs_and_tables();
        let sums = group_sum(
            &ds.rows(),
            &[Dimension::Year, Dimension::SubCategory],
            ValueField::Profit,
        )
        .unwrap();
        assert_eq!(sums.len(), 3);
        let key = GroupKey(vec![KeyValue::Year(2012), KeyValue::Text("Tables".into())]);
        assert_eq!(sums.get(&key), Some(-5.0));
        assert_eq!(key.to_string(), "2012 / Tables");
    }

    #[test]
    fn mean_and_count() {
        let ds = chairs_and_tables();
        let means = group_mean(&ds.rows(), &[Dimension::SubCategory], ValueField::Sales).unwrap();
        assert_eq!(means.get(&GroupKey::text("Chairs")), Some(65.0));
        let counts = group_count(&ds.rows(), &[Dimension::SubCategory]).unwrap();
        assert_eq!(counts.get(&GroupKey::text("Chairs")), Some(2.0));
    }

    #[test]
    fn multi_field_sums_share_keys() {
        let ds = chairs_and_tables();
        let out = group_sums(
            &ds.rows(),
            &[Dimension::Year],
            &[ValueField::Sales, ValueField::Profit],
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get(&GroupKey::year(2012)), Some(150.0));
        assert_eq!(out[1].get(&GroupKey::year(2012)), Some(5.0));
    }

    #[test]
    fn empty_rowset_gives_empty_results() {
        let ds = Dataset::from_records(Vec::new(), Schema::full());
        let rows = ds.rows();
        assert!(group_sum(&rows, &[Dimension::Region], ValueField::Sales).unwrap().is_empty());
        assert!(group_mean(&rows, &[Dimension::Region], ValueField::Sales).unwrap().is_empty());
        assert!(top_n(&rows, &[Dimension::ProductName], ValueField::Profit, 5, true)
            .unwrap()
            .is_empty());
        assert!(cumulative(&rows, ValueField::Sales).unwrap().is_empty());
        assert!(quantity_histogram(&rows).unwrap().is_empty());
    }

    #[test]
    fn top_n_sorts_descending_and_keeps_ties_in_key_order() {
        let ds = Dataset::from_records(
            vec![
                line("1", day(2012, 1, 1), "", "Delta", 10.0, 0.0),
                line("2", day(2012, 1, 1), "", "Alpha", 10.0, 0.0),
                line("3", day(2012, 1, 1), "", "Gamma", 40.0, 0.0),
                line("4", day(2012, 1, 1), "", "Beta", 5.0, 0.0),
            ],
            Schema::full(),
        );
        let top = top_n(&ds.rows(), &[Dimension::ProductName], ValueField::Sales, 3, true).unwrap();
        let labels: Vec<String> = top.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(labels, vec!["Gamma", "Alpha", "Delta"]);

        let bottom = top_n(&ds.rows(), &[Dimension::ProductName], ValueField::Sales, 1, false).unwrap();
        assert_eq!(bottom, vec![(GroupKey::text("Beta"), 5.0)]);

        let all = top_n(&ds.rows(), &[Dimension::ProductName], ValueField::Sales, 10, true).unwrap();
        assert_eq!(all.len(), 4);
    }

    #[test]
    fn cumulative_orders_by_date_then_row_order() {
        let ds = Dataset::from_records(
            vec![
                line("1", day(2012, 3, 1), "", "", 5.0, 0.0),
                line("2", day(2012, 1, 1), "", "", 1.0, 0.0),
                line("3", day(2012, 3, 1), "", "", 7.0, 0.0),
            ],
            Schema::full(),
        );
        let points = cumulative(&ds.rows(), ValueField::Sales).unwrap();
        let values: Vec<(f64, f64)> = points.iter().map(|p| (p.value, p.running_total)).collect();
        assert_eq!(values, vec![(1.0, 1.0), (5.0, 6.0), (7.0, 13.0)]);
    }

    #[test]
    fn histogram_is_zero_filled() {
        let ds = Dataset::from_records(
            vec![
                Record { quantity: 3, ..Record::new("1", day(2012, 1, 1)) },
                Record { quantity: 1, ..Record::new("2", day(2012, 1, 1)) },
                Record { quantity: 3, ..Record::new("3", day(2012, 1, 1)) },
            ],
            Schema::full(),
        );
        assert_eq!(quantity_histogram(&ds.rows()).unwrap(), vec![(1, 1), (2, 0), (3, 2)]);
    }

    #[test]
    fn huge_quantity_gives_sparse_histogram() {
        let ds = Dataset::from_records(
            vec![
                Record { quantity: 2, ..Record::new("1", day(2012, 1, 1)) },
                Record { quantity: 2_000_000_000, ..Record::new("2", day(2012, 1, 1)) },
                Record { quantity: 2, ..Record::new("3", day(2012, 1, 1)) },
            ],
            Schema::full(),
        );
        assert_eq!(
            quantity_histogram(&ds.rows()).unwrap(),
            vec![(2, 2), (2_000_000_000, 1)]
        );
    }

    #[test]
    fn missing_value_column_is_reported() {
        let records = chairs_and_tables().records().to_vec();
        let ds = Dataset::from_records(records, Schema::full().without(Column::Profit));
        let err = group_sum(&ds.rows(), &[Dimension::Year], ValueField::Profit).unwrap_err();
        assert_eq!(err, PipelineError::MissingColumn { column: Column::Profit });
        assert!(group_sum(&ds.rows(), &[Dimension::Year], ValueField::Sales).is_ok());
        assert!(scatter_points(&ds.rows()).is_err());
    }
}
