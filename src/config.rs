use std::path::PathBuf;

use clap::Parser;

use rusty_sales::data::loader::LoadOptions;
use rusty_sales::DashboardConfig;

/// Interactive sales analytics dashboard.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Dataset to open at startup (.xlsx, .csv, .json, .parquet).
    pub path: Option<PathBuf>,

    /// Number of products in the "top products" charts.
    #[arg(long, default_value_t = 5)]
    pub top_n: usize,

    /// Worksheet to read from a spreadsheet (default: first sheet).
    #[arg(long)]
    pub sheet: Option<String>,
}

impl Args {
    pub fn dashboard_config(&self) -> DashboardConfig {
        DashboardConfig { top_n: self.top_n }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            sheet: self.sheet.clone(),
        }
    }
}
