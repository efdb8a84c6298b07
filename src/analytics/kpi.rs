use std::collections::HashSet;

use serde::Serialize;

use crate::data::model::{Column, RowSet};
use crate::error::PipelineError;

/// Headline metrics for a RowSet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiSet {
    pub total_sales_millions: f64,
    /// Mean profit per line item; `None` when there are no rows.
    pub average_profit: Option<f64>,
    /// Number of distinct order ids.
    pub total_orders: usize,
}

impl KpiSet {
    /// `$1,234.57M`
    pub fn total_sales_label(&self) -> String {
        format!("${}M", with_thousands(self.total_sales_millions))
    }

    /// `$12.34`, or `no data`.
    pub fn average_profit_label(&self) -> String {
        match self.average_profit {
            Some(p) if p < 0.0 => format!("-${}", with_thousands(-p)),
            Some(p) => format!("${}", with_thousands(p)),
            None => "no data".to_string(),
        }
    }
}

pub fn compute_kpis(rows: &RowSet<'_>) -> Result<KpiSet, PipelineError> {
    rows.schema()
        .require(&[Column::Sales, Column::Profit, Column::OrderId])?;

    let mut sales = 0.0;
    let mut profit = 0.0;
    let mut orders: HashSet<&str> = HashSet::new();
    for r in rows.iter() {
        sales += r.sales;
        profit += r.profit;
        orders.insert(r.order_id.as_str());
    }

    let n = rows.len();
    Ok(KpiSet {
        total_sales_millions: sales / 1_000_000.0,
        average_profit: (n > 0).then(|| profit / n as f64),
        total_orders: orders.len(),
    })
}

/// Two decimals with `,` thousands separators.
fn with_thousands(value: f64) -> String {
    let fixed = format!("{value:.2}");
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(d) => ("-", d),
        None => ("", int_part),
    };
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{frac}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Dataset, Record, Schema};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn sale(order: &str, sales: f64, profit: f64) -> Record {
        Record {
            sales,
            profit,
            ..Record::new(order, NaiveDate::from_ymd_opt(2014, 6, 1).unwrap())
        }
    }

    #[test]
    fn totals_and_distinct_orders() {
        let ds = Dataset::from_records(
            vec![
                sale("CA-1", 1_500_000.0, 20.0),
                sale("CA-1", 500_000.0, -10.0),
                sale("CA-2", 250_000.0, 50.0),
            ],
            Schema::full(),
        );
        let k = compute_kpis(&ds.rows()).unwrap();
        assert_eq!(k.total_sales_millions, 2.25);
        assert_eq!(k.average_profit, Some(20.0));
        assert_eq!(k.total_orders, 2);
        assert_eq!(k.total_sales_label(), "$2.25M");
        assert_eq!(k.average_profit_label(), "$20.00");
    }

    #[test]
    fn empty_rowset_reports_no_data() {
        let ds = Dataset::from_records(Vec::new(), Schema::full());
        let k = compute_kpis(&ds.rows()).unwrap();
        assert_eq!(
            k,
            KpiSet {
                total_sales_millions: 0.0,
                average_profit: None,
                total_orders: 0,
            }
        );
        assert_eq!(k.average_profit_label(), "no data");
    }

    #[test]
    fn missing_sales_column_is_recoverable() {
        let ds = Dataset::from_records(
            vec![sale("CA-1", 1.0, 1.0)],
            Schema::full().without(Column::Sales),
        );
        assert_eq!(
            compute_kpis(&ds.rows()).unwrap_err(),
            PipelineError::MissingColumn {
                column: Column::Sales
            }
        );
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(with_thousands(0.0), "0.00");
        assert_eq!(with_thousands(999.999), "1,000.00");
        assert_eq!(with_thousands(1234567.891), "1,234,567.89");
        assert_eq!(with_thousands(-4321.5), "-4,321.50");
    }

    #[test]
    fn negative_average_profit_label() {
        let k = KpiSet {
            total_sales_millions: 0.0,
            average_profit: Some(-12.5),
            total_orders: 1,
        };
        assert_eq!(k.average_profit_label(), "-$12.50");
    }
}
