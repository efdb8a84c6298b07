mod app;
mod color;
mod config;
mod state;
mod ui;

use anyhow::{anyhow, Context};
use clap::Parser;
use eframe::egui;

use app::SalesDashboardApp;
use config::Args;
use state::AppState;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut state = AppState::new(args.dashboard_config(), args.load_options());
    if let Some(path) = &args.path {
        let dataset = rusty_sales::data::loader::load_file(path, &state.load_options)
            .with_context(|| format!("cannot start with {}", path.display()))?;
        state.set_dataset(dataset);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_min_inner_size([800.0, 500.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Rusty Sales – Sales Dashboard",
        options,
        Box::new(move |_cc| Ok(Box::new(SalesDashboardApp { state }))),
    )
    .map_err(|e| anyhow!("{e}"))
}
