use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::DatePickerButton;

use crate::state::{AppState, FacetKind};

// ---------------------------------------------------------------------------
// Left side panel – filter widgets
// ---------------------------------------------------------------------------

/// Render the left filter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    if state.dataset.is_none() {
        ui.label("No dataset loaded.");
        return;
    }

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Date range ----
            ui.strong("Date Filter");
            let (mut start, mut end) = (state.selection.start, state.selection.end);
            egui::Grid::new("date_filter").num_columns(2).show(ui, |ui: &mut Ui| {
                ui.label("Start date");
                ui.add(DatePickerButton::new(&mut start).id_salt("start_date"));
                ui.end_row();
                ui.label("End date");
                ui.add(DatePickerButton::new(&mut end).id_salt("end_date"));
                ui.end_row();
            });
            if (start, end) != (state.selection.start, state.selection.end) {
                state.set_date_range(start, end);
            }
            ui.separator();

            // ---- Geography and category multi-selects ----
            ui.strong("Geographic Filters");
            facet_list(ui, state, FacetKind::Country);
            facet_list(ui, state, FacetKind::Region);
            ui.separator();

            ui.strong("Category Filters");
            facet_list(ui, state, FacetKind::Category);
            facet_list(ui, state, FacetKind::SubCategory);
        });
}

/// One collapsible multi-select. Nothing ticked means no constraint.
fn facet_list(ui: &mut Ui, state: &mut AppState, kind: FacetKind) {
    let options = state.options(kind);
    let selected = state.selection.values(kind).clone();

    let n_selected = selected.len();
    let header_text = if n_selected == 0 {
        format!("{}  (all)", kind.label())
    } else {
        format!("{}  ({n_selected}/{})", kind.label(), options.len())
    };

    egui::CollapsingHeader::new(RichText::new(header_text).strong())
        .id_salt(kind.label())
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            if ui.small_button("Clear").clicked() {
                state.select_none(kind);
            }

            for value in &options {
                let mut checked = selected.contains(value);
                if ui.checkbox(&mut checked, value.as_str()).changed() {
                    state.toggle_filter_value(kind, value);
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(view) = &state.view {
            let counts = view.row_counts;
            ui.label(format!(
                "{} rows loaded, {} in date range",
                counts.base, counts.date
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open sales data")
        .add_filter(
            "Supported files",
            &["xlsx", "xlsm", "xls", "ods", "csv", "json", "parquet", "pq"],
        )
        .add_filter("Spreadsheet", &["xlsx", "xlsm", "xls", "ods"])
        .add_filter("CSV", &["csv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_file();

    if let Some(path) = file {
        state.open(&path);
    }
}
