use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray};
use arrow::datatypes::{
    DataType, Date32Type, Date64Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    TimeUnit, TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt32Type, UInt64Type,
};
use calamine::{open_workbook_auto, Data, DataType as _, Reader};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Column, Dataset, Record, Schema};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Options that only some formats use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Worksheet to read from a spreadsheet. Defaults to the first sheet.
    pub sheet: Option<String>,
}

/// Load a sales dataset from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.xlsx` / `.xlsm` / `.xls` / `.ods` – first row is the header
/// * `.csv`     – header row, one record per line
/// * `.json`    – `[{ "Order ID": ..., "Order Date": ..., ... }, ...]`
/// * `.parquet` – one column per field, dates as Date32 or Timestamp
///
/// "Order Date" is mandatory. Any other missing column is recorded in the
/// dataset schema and reported by the computations that need it.
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let dataset = match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_spreadsheet(path, options),
        "parquet" | "pq" => load_parquet(path),
        "json" => load_json(path),
        "csv" => load_csv(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::info!(
        "Loaded {} records from {} (missing columns: {:?})",
        dataset.len(),
        path.display(),
        dataset.schema().missing()
    );
    Ok(dataset)
}

// ---------------------------------------------------------------------------
// Cells and header mapping shared by every format
// ---------------------------------------------------------------------------

/// A single cell as read from any source format.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
}

static EMPTY: Cell = Cell::Empty;

/// Source header position of each known column.
#[derive(Debug)]
struct ColumnMap {
    index: BTreeMap<Column, usize>,
}

impl ColumnMap {
    fn from_headers<S: AsRef<str>>(headers: &[S]) -> Result<Self> {
        let mut index = BTreeMap::new();
        for (i, h) in headers.iter().enumerate() {
            if let Some(col) = Column::from_header(h.as_ref()) {
                index.entry(col).or_insert(i);
            }
        }
        if !index.contains_key(&Column::OrderDate) {
            bail!("missing required column '{}'", Column::OrderDate);
        }
        for col in Column::ALL {
            if !index.contains_key(&col) {
                log::warn!("column '{col}' not found; sections using it will be skipped");
            }
        }
        Ok(ColumnMap { index })
    }

    fn schema(&self) -> Schema {
        self.index.keys().copied().collect()
    }

    fn position(&self, column: Column) -> Option<usize> {
        self.index.get(&column).copied()
    }

    fn cell<'c>(&self, cells: &'c [Cell], column: Column) -> Option<&'c Cell> {
        let idx = self.position(column)?;
        Some(cells.get(idx).unwrap_or(&EMPTY))
    }

    /// Convert one row of cells into a record. `row` is the 1-based row
    /// number used in error messages.
    fn record(&self, row: usize, cells: &[Cell]) -> Result<Record> {
        let text = |column: Column| -> String {
            match self.cell(cells, column) {
                None | Some(Cell::Empty) => String::new(),
                Some(Cell::Text(s)) => s.trim().to_string(),
                Some(Cell::Number(n)) => number_to_text(*n),
                Some(Cell::Date(d)) => d.to_string(),
            }
        };
        let number = |column: Column| -> Result<Option<f64>> {
            match self.cell(cells, column) {
                None => Ok(None),
                Some(Cell::Empty) => bail!("Row {row}: empty '{column}'"),
                Some(Cell::Number(n)) => finite(row, column, *n).map(Some),
                Some(Cell::Text(s)) => {
                    let n = s.trim().parse::<f64>().with_context(|| {
                        format!("Row {row}: '{column}' value '{s}' is not a number")
                    })?;
                    finite(row, column, n).map(Some)
                }
                Some(Cell::Date(d)) => bail!("Row {row}: '{column}' holds a date ({d})"),
            }
        };

        let order_date = match self.cell(cells, Column::OrderDate) {
            Some(cell) => cell_to_date(cell)
                .with_context(|| format!("Row {row}: invalid '{}'", Column::OrderDate))?,
            None => bail!("missing required column '{}'", Column::OrderDate),
        };

        let sales = number(Column::Sales)?.unwrap_or(0.0);
        if sales < 0.0 {
            bail!("Row {row}: negative '{}' ({sales})", Column::Sales);
        }
        let quantity = match number(Column::Quantity)? {
            None => 1,
            Some(q) if q >= 1.0 && q.fract() == 0.0 && q <= f64::from(u32::MAX) => q as u32,
            Some(q) => bail!("Row {row}: '{}' must be a positive integer, got {q}", Column::Quantity),
        };

        Ok(Record {
            order_id: text(Column::OrderId),
            country: text(Column::Country),
            region: text(Column::Region),
            market: text(Column::Market),
            category: text(Column::Category),
            sub_category: text(Column::SubCategory),
            segment: text(Column::Segment),
            product_name: text(Column::ProductName),
            sales,
            profit: number(Column::Profit)?.unwrap_or(0.0),
            quantity,
            ..Record::new(String::new(), order_date)
        })
    }
}

fn finite(row: usize, column: Column, n: f64) -> Result<f64> {
    if !n.is_finite() {
        bail!("Row {row}: '{column}' is not a finite number ({n})");
    }
    Ok(n)
}

/// Integral numbers print without a fractional part (`1234`, not `1234.0`).
fn number_to_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn cell_to_date(cell: &Cell) -> Result<NaiveDate> {
    match cell {
        Cell::Date(d) => Ok(*d),
        Cell::Text(s) => parse_date(s),
        // pandas `to_json` writes datetimes as epoch milliseconds
        Cell::Number(ms) => DateTime::from_timestamp_millis(*ms as i64)
            .map(|dt| dt.date_naive())
            .with_context(|| format!("timestamp {ms} out of range")),
        Cell::Empty => bail!("empty date"),
    }
}

/// Parse a calendar date, dropping any time-of-day component.
fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y", "%d.%m.%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }
    bail!("'{s}' is not a recognised date")
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

/// First row of the sheet is the header; every following non-blank row is
/// a record.
fn load_spreadsheet(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    let mut workbook = open_workbook_auto(path).context("opening workbook")?;
    let sheet = match &options.sheet {
        Some(name) => name.clone(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .context("workbook has no sheets")?,
    };
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("reading sheet '{sheet}'"))?;

    // 1-based sheet row of the header
    let header_row = range.start().map_or(1, |(r, _)| r as usize + 1);
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .context("sheet is empty")?
        .iter()
        .map(|c| c.to_string())
        .collect();
    let columns = ColumnMap::from_headers(&headers)?;
    let date_col = columns.position(Column::OrderDate);

    let mut records = Vec::new();
    for (row_no, row) in rows.enumerate() {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let cells: Vec<Cell> = row
            .iter()
            .enumerate()
            .map(|(i, value)| {
                if Some(i) == date_col {
                    spreadsheet_date_cell(value)
                } else {
                    spreadsheet_cell(value)
                }
            })
            .collect();
        records.push(columns.record(header_row + 1 + row_no, &cells)?);
    }

    Ok(Dataset::from_records(records, columns.schema()))
}

fn spreadsheet_cell(value: &Data) -> Cell {
    match value {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::DateTime(_) | Data::DateTimeIso(_) => {
            value.as_date().map(Cell::Date).unwrap_or(Cell::Empty)
        }
        Data::Error(_) => Cell::Empty,
        other => Cell::Text(other.to_string()),
    }
}

/// Order Date cells: plain numbers are Excel serial days, not epoch
/// milliseconds.
fn spreadsheet_date_cell(value: &Data) -> Cell {
    match value {
        Data::Float(_) | Data::Int(_) => value
            .as_date()
            .map(Cell::Date)
            .unwrap_or_else(|| spreadsheet_cell(value)),
        _ => spreadsheet_cell(value),
    }
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   {
///     "Order ID": "CA-2012-124891",
///     "Order Date": 1343692800000,
///     "Country": "United States",
///     "Sales": 2309.65,
///     ...
///   },
///   ...
/// ]
/// ```
fn load_json(path: &Path) -> Result<Dataset> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let headers: Vec<String> = records
        .iter()
        .filter_map(|r| r.as_object())
        .flat_map(|obj| obj.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut out = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        let cells: Vec<Cell> = headers
            .iter()
            .map(|h| obj.get(h).map(json_cell).unwrap_or(Cell::Empty))
            .collect();
        out.push(columns.record(i + 1, &cells)?);
    }

    Ok(Dataset::from_records(out, columns.schema()))
}

fn json_cell(val: &JsonValue) -> Cell {
    match val {
        JsonValue::Null => Cell::Empty,
        JsonValue::String(s) => Cell::Text(s.clone()),
        JsonValue::Number(n) => n
            .as_f64()
            .map(Cell::Number)
            .unwrap_or_else(|| Cell::Text(n.to_string())),
        other => Cell::Text(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout:  header row with column names, one record per line.
/// Columns not in the sales schema are ignored.
fn load_csv(path: &Path) -> Result<Dataset> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut records = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        // header is line 1
        let record = result.with_context(|| format!("CSV row {}", row_no + 2))?;
        let line = record
            .position()
            .map_or(row_no + 2, |p| p.line() as usize);
        let cells: Vec<Cell> = record
            .iter()
            .map(|v| {
                if v.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(v.to_string())
                }
            })
            .collect();
        records.push(columns.record(line, &cells)?);
    }

    Ok(Dataset::from_records(records, columns.schema()))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file with one column per sales field.
///
/// Text columns may be Utf8 or LargeUtf8, numeric columns any integer or
/// float type, and "Order Date" Date32, Date64, Timestamp or text.
///
/// Works with files written by both **Pandas** (`df.to_parquet()`) and
/// **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<Dataset> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let columns = ColumnMap::from_headers(&headers)?;
    let reader = builder.build().context("building parquet reader")?;

    let mut records = Vec::new();
    let mut row_no = 1;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            let cells: Vec<Cell> = batch
                .columns()
                .iter()
                .map(|col| arrow_cell(col, row))
                .collect();
            records.push(columns.record(row_no, &cells)?);
            row_no += 1;
        }
    }

    Ok(Dataset::from_records(records, columns.schema()))
}

// -- Parquet / Arrow helpers --

/// Extract a single cell from an Arrow column at a given row.
fn arrow_cell(col: &Arc<dyn Array>, row: usize) -> Cell {
    if col.is_null(row) {
        return Cell::Empty;
    }
    let cell = match col.data_type() {
        DataType::Utf8 => col.as_string_opt::<i32>().map(|a| Cell::Text(a.value(row).to_string())),
        DataType::LargeUtf8 => col.as_string_opt::<i64>().map(|a| Cell::Text(a.value(row).to_string())),
        DataType::Int16 => col.as_primitive_opt::<Int16Type>().map(|a| Cell::Number(a.value(row) as f64)),
        DataType::Int32 => col.as_primitive_opt::<Int32Type>().map(|a| Cell::Number(a.value(row) as f64)),
        DataType::Int64 => col.as_primitive_opt::<Int64Type>().map(|a| Cell::Number(a.value(row) as f64)),
        DataType::UInt32 => col.as_primitive_opt::<UInt32Type>().map(|a| Cell::Number(a.value(row) as f64)),
        DataType::UInt64 => col.as_primitive_opt::<UInt64Type>().map(|a| Cell::Number(a.value(row) as f64)),
        DataType::Float32 => col.as_primitive_opt::<Float32Type>().map(|a| Cell::Number(a.value(row) as f64)),
        DataType::Float64 => col.as_primitive_opt::<Float64Type>().map(|a| Cell::Number(a.value(row))),
        DataType::Date32 => col
            .as_primitive_opt::<Date32Type>()
            .and_then(|a| a.value_as_date(row))
            .map(Cell::Date),
        DataType::Date64 => col
            .as_primitive_opt::<Date64Type>()
            .and_then(|a| a.value_as_date(row))
            .map(Cell::Date),
        DataType::Timestamp(unit, _) => timestamp_date(col, *unit, row).map(Cell::Date),
        DataType::Boolean => col.as_boolean_opt().map(|a| Cell::Text(a.value(row).to_string())),
        other => Some(Cell::Text(format!("{other:?}"))),
    };
    cell.unwrap_or(Cell::Empty)
}

fn timestamp_date(col: &Arc<dyn Array>, unit: TimeUnit, row: usize) -> Option<NaiveDate> {
    let dt = match unit {
        TimeUnit::Second => col.as_primitive_opt::<TimestampSecondType>()?.value_as_datetime(row),
        TimeUnit::Millisecond => col
            .as_primitive_opt::<TimestampMillisecondType>()?
            .value_as_datetime(row),
        TimeUnit::Microsecond => col
            .as_primitive_opt::<TimestampMicrosecondType>()?
            .value_as_datetime(row),
        TimeUnit::Nanosecond => col
            .as_primitive_opt::<TimestampNanosecondType>()?
            .value_as_datetime(row),
    };
    dt.map(|dt| dt.date())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_common_date_layouts() {
        assert_eq!(parse_date("2014-11-11").unwrap(), day(2014, 11, 11));
        assert_eq!(parse_date("11/23/2013").unwrap(), day(2013, 11, 23));
        assert_eq!(parse_date("31-07-2012").unwrap(), day(2012, 7, 31));
        assert_eq!(parse_date("2012-07-31 23:59:59").unwrap(), day(2012, 7, 31));
        assert_eq!(parse_date("2012-07-31T08:00:00.000").unwrap(), day(2012, 7, 31));
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn epoch_millis_become_calendar_days() {
        // 2012-07-31T00:00:00Z
        assert_eq!(cell_to_date(&Cell::Number(1_343_692_800_000.0)).unwrap(), day(2012, 7, 31));
    }

    #[test]
    fn order_date_is_mandatory() {
        let err = ColumnMap::from_headers(&["Order ID", "Sales"]).unwrap_err();
        assert!(err.to_string().contains("Order Date"));
    }

    #[test]
    fn absent_columns_are_left_out_of_the_schema() {
        let map = ColumnMap::from_headers(&["order_date", "Sales", "Discount"]).unwrap();
        let schema = map.schema();
        assert!(schema.contains(Column::Sales));
        assert!(!schema.contains(Column::Profit));

        let rec = map
            .record(0, &[Cell::Text("2013-01-02".into()), Cell::Number(12.5), Cell::Number(0.2)])
            .unwrap();
        assert_eq!(rec.order_date, day(2013, 1, 2));
        assert_eq!(rec.sales, 12.5);
        assert_eq!(rec.profit, 0.0);
        assert_eq!(rec.quantity, 1);
    }

    #[test]
    fn numeric_order_ids_print_as_integers() {
        let map = ColumnMap::from_headers(&["Order ID", "Order Date", "Quantity"]).unwrap();
        let rec = map
            .record(0, &[Cell::Number(4512.0), Cell::Date(day(2011, 2, 3)), Cell::Number(3.0)])
            .unwrap();
        assert_eq!(rec.order_id, "4512");
        assert_eq!(rec.quantity, 3);
        assert_eq!(rec.year, 2011);
    }

    #[test]
    fn rejects_unclean_values() {
        let map = ColumnMap::from_headers(&["Order Date", "Sales", "Quantity"]).unwrap();
        let date = Cell::Text("2013-01-02".into());
        assert!(map
            .record(4, &[date.clone(), Cell::Number(-1.0), Cell::Number(1.0)])
            .is_err());
        assert!(map
            .record(4, &[date.clone(), Cell::Number(1.0), Cell::Number(2.5)])
            .is_err());
        assert!(map
            .record(4, &[date.clone(), Cell::Text("n/a".into()), Cell::Number(1.0)])
            .is_err());
        assert!(map.record(4, &[date, Cell::Empty, Cell::Number(1.0)]).is_err());
    }

    #[test]
    fn rejects_non_finite_numbers() {
        let map = ColumnMap::from_headers(&["Order Date", "Sales", "Profit"]).unwrap();
        let date = Cell::Text("2013-01-02".into());
        for bad in ["NaN", "inf", "-inf"] {
            let err = map
                .record(7, &[date.clone(), Cell::Number(1.0), Cell::Text(bad.into())])
                .unwrap_err();
            assert!(err.to_string().contains("Row 7: 'Profit' is not a finite number"));
        }
        assert!(map
            .record(7, &[date, Cell::Number(f64::NAN), Cell::Number(1.0)])
            .is_err());
    }

    #[test]
    fn spreadsheet_numbers_in_the_date_column_are_serial_days() {
        assert_eq!(spreadsheet_date_cell(&Data::Float(41000.0)), Cell::Date(day(2012, 4, 1)));
        assert_eq!(spreadsheet_date_cell(&Data::Int(41121)), Cell::Date(day(2012, 7, 31)));
        assert_eq!(spreadsheet_cell(&Data::Float(41000.0)), Cell::Number(41000.0));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = load_file(Path::new("sales.txt"), &LoadOptions::default()).unwrap_err();
        assert!(format!("{err:#}").contains("Unsupported file extension"));
    }
}
