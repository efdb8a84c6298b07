use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::print_batches;
use chrono::{Duration, NaiveDate};
use parquet::arrow::ArrowWriter;
use serde::Serialize;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len())]
    }
}

/// One generated line item, in the column layout of the source workbook.
#[derive(Debug, Serialize)]
struct Row {
    #[serde(rename = "Order ID")]
    order_id: String,
    #[serde(rename = "Order Date")]
    order_date: NaiveDate,
    #[serde(rename = "Country")]
    country: &'static str,
    #[serde(rename = "Region")]
    region: &'static str,
    #[serde(rename = "Market")]
    market: &'static str,
    #[serde(rename = "Category")]
    category: &'static str,
    #[serde(rename = "Sub-Category")]
    sub_category: &'static str,
    #[serde(rename = "Segment")]
    segment: &'static str,
    #[serde(rename = "Product Name")]
    product_name: String,
    #[serde(rename = "Sales")]
    sales: f64,
    #[serde(rename = "Profit")]
    profit: f64,
    #[serde(rename = "Quantity")]
    quantity: i64,
}

// (market, country, regions)
const GEOGRAPHY: &[(&str, &str, &[&str])] = &[
    ("US", "United States", &["East", "West", "Central", "South"]),
    ("EU", "France", &["Central"]),
    ("EU", "Germany", &["Central"]),
    ("EU", "United Kingdom", &["North"]),
    ("LATAM", "Brazil", &["South"]),
    ("LATAM", "Mexico", &["Central America"]),
    ("APAC", "Australia", &["Oceania"]),
    ("APAC", "India", &["Central Asia"]),
    ("Africa", "Nigeria", &["Western Africa"]),
];

// (category, sub-category, base price)
const PRODUCTS: &[(&str, &str, f64)] = &[
    ("Furniture", "Chairs", 320.0),
    ("Furniture", "Tables", 610.0),
    ("Furniture", "Bookcases", 480.0),
    ("Furniture", "Furnishings", 75.0),
    ("Office Supplies", "Paper", 18.0),
    ("Office Supplies", "Binders", 24.0),
    ("Office Supplies", "Storage", 140.0),
    ("Office Supplies", "Art", 22.0),
    ("Technology", "Phones", 410.0),
    ("Technology", "Copiers", 900.0),
    ("Technology", "Machines", 750.0),
    ("Technology", "Accessories", 95.0),
];

const SEGMENTS: &[&str] = &["Consumer", "Corporate", "Home Office"];
const BRANDS: &[&str] = &["Acme", "Globex", "Initech", "Umbrella", "Hooli"];

fn generate(rng: &mut SimpleRng, n_orders: usize) -> Vec<Row> {
    let first_day = NaiveDate::from_ymd_opt(2011, 1, 1).unwrap_or_default();
    let mut rows = Vec::new();

    for order_no in 0..n_orders {
        let &(market, country, regions) = rng.pick(GEOGRAPHY);
        let region = *rng.pick(regions);
        let segment = *rng.pick(SEGMENTS);
        let order_date = first_day + Duration::days(rng.below(4 * 365) as i64);
        let order_id = format!("{market}-{}-{:05}", order_date.format("%Y"), 10_000 + order_no);

        let n_items = 1 + rng.below(4);
        for _ in 0..n_items {
            let &(category, sub_category, price) = rng.pick(PRODUCTS);
            let brand = *rng.pick(BRANDS);
            let quantity = 1 + rng.below(9) as i64;
            let unit_price = price * (0.6 + 0.8 * rng.next_f64());
            let sales = (unit_price * quantity as f64 * 100.0).round() / 100.0;
            let margin = -0.25 + 0.55 * rng.next_f64();
            let profit = (sales * margin * 100.0).round() / 100.0;

            rows.push(Row {
                order_id: order_id.clone(),
                order_date,
                country,
                region,
                market,
                category,
                sub_category,
                segment,
                product_name: format!("{brand} {sub_category}"),
                sales,
                profit,
                quantity,
            });
        }
    }
    rows
}

fn text_column(rows: &[Row], field: impl Fn(&Row) -> &str) -> StringArray {
    StringArray::from(rows.iter().map(field).collect::<Vec<_>>())
}

fn to_batch(rows: &[Row]) -> Result<RecordBatch> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    let days: Vec<i32> = rows
        .iter()
        .map(|r| (r.order_date - epoch).num_days() as i32)
        .collect();

    let schema = Arc::new(Schema::new(vec![
        Field::new("Order ID", DataType::Utf8, false),
        Field::new("Order Date", DataType::Date32, false),
        Field::new("Country", DataType::Utf8, false),
        Field::new("Region", DataType::Utf8, false),
        Field::new("Market", DataType::Utf8, false),
        Field::new("Category", DataType::Utf8, false),
        Field::new("Sub-Category", DataType::Utf8, false),
        Field::new("Segment", DataType::Utf8, false),
        Field::new("Product Name", DataType::Utf8, false),
        Field::new("Sales", DataType::Float64, false),
        Field::new("Profit", DataType::Float64, false),
        Field::new("Quantity", DataType::Int64, false),
    ]));

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(text_column(rows, |r| r.order_id.as_str())),
            Arc::new(Date32Array::from(days)),
            Arc::new(text_column(rows, |r| r.country)),
            Arc::new(text_column(rows, |r| r.region)),
            Arc::new(text_column(rows, |r| r.market)),
            Arc::new(text_column(rows, |r| r.category)),
            Arc::new(text_column(rows, |r| r.sub_category)),
            Arc::new(text_column(rows, |r| r.segment)),
            Arc::new(text_column(rows, |r| r.product_name.as_str())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.sales).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.profit).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.quantity).collect::<Vec<_>>())),
        ],
    )
    .context("building record batch")
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let rows = generate(&mut rng, 1500);

    // Write Parquet
    let batch = to_batch(&rows)?;
    let parquet_path = "sample_sales.parquet";
    let file = std::fs::File::create(parquet_path).context("creating parquet output")?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None).context("creating writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing writer")?;

    // Write CSV
    let csv_path = "sample_sales.csv";
    let mut csv_writer = csv::Writer::from_path(csv_path).context("creating CSV output")?;
    for row in &rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;

    print_batches(&[batch.slice(0, batch.num_rows().min(5))]).context("printing preview")?;
    println!("Wrote {} line items to {parquet_path} and {csv_path}", rows.len());
    Ok(())
}
