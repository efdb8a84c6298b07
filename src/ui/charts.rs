use std::collections::BTreeMap;

use chrono::Datelike;
use eframe::egui::{self, Align2, Color32, FontId, RichText, ScrollArea, Sense, Ui};
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints, Points};

use rusty_sales::analytics::aggregate::{AggregationResult, GroupKey, ScatterPoint};
use rusty_sales::analytics::basket::CoOccurrenceMatrix;
use rusty_sales::dashboard::Section;
use rusty_sales::DashboardView;

use crate::color::{heat_color, ColorMap};
use crate::state::AppState;

const CHART_HEIGHT: f32 = 260.0;
const PROFIT_SIZE_STEPS: u8 = 4;

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

/// Render KPIs and every chart for the current evaluation.
pub fn dashboard(ui: &mut Ui, state: &AppState) {
    let Some(view) = &state.view else {
        ui.centered_and_justified(|ui: &mut Ui| {
            let hint = if state.dataset.is_some() {
                "Adjust the date filter to show data"
            } else {
                "Open a file to view the dashboard  (File → Open…)"
            };
            ui.heading(hint);
        });
        return;
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for warning in &view.warnings {
                ui.colored_label(Color32::YELLOW, warning.to_string());
            }

            ui.heading("Sales Overview");
            kpi_row(ui, view);
            ui.add_space(8.0);

            ui.columns(3, |cols| {
                section(&mut cols[0], "Sales Trend Over the Years", &view.sales_by_year, |ui, r| {
                    year_line(ui, "sales_by_year", &[("Sales", r)]);
                });
                section(&mut cols[1], "Sales by Category", &view.sales_by_category, |ui, r| {
                    group_bars(ui, "sales_by_category", r);
                });
                section(&mut cols[2], "Sales Distribution by Region", &view.sales_by_region, |ui, r| {
                    group_bars(ui, "sales_by_region", r);
                });
            });
            ui.columns(2, |cols| {
                section(&mut cols[0], "Sales across Segments", &view.sales_by_segment, |ui, r| {
                    group_bars(ui, "sales_by_segment", r);
                });
                section(&mut cols[1], "Sales across Markets", &view.sales_by_market, |ui, r| {
                    group_bars(ui, "sales_by_market", r);
                });
            });
            section(ui, "Cumulative Sales Over Time", &view.cumulative_sales, |ui, points| {
                let series: PlotPoints = points
                    .iter()
                    .map(|p| [fractional_year(p.date), p.running_total])
                    .collect();
                Plot::new("cumulative_sales")
                    .height(CHART_HEIGHT)
                    .x_axis_label("Year")
                    .y_axis_label("Total Sales")
                    .show(ui, |plot_ui| {
                        plot_ui.line(Line::new(series).name("Cumulative Sales").fill(0.0).width(2.0));
                    });
            });

            ui.separator();
            ui.heading("Sales and Profit Analysis");
            ui.columns(2, |cols| {
                section(&mut cols[0], "Top Profitable Products", &view.top_profit_products, |ui, top| {
                    ranked_bars(ui, "top_profit", top, Color32::from_rgb(255, 165, 0));
                });
                section(&mut cols[1], "Top Sold Products", &view.top_sales_products, |ui, top| {
                    ranked_bars(ui, "top_sales", top, Color32::LIGHT_GREEN);
                });
            });
            ui.columns(2, |cols| {
                section(&mut cols[0], "Sales and Profit Correlation", &view.sales_profit_points, |ui, pts| {
                    let series: PlotPoints = pts.iter().map(|p| [p.sales, p.profit]).collect();
                    Plot::new("sales_profit")
                        .height(CHART_HEIGHT)
                        .x_axis_label("Sales")
                        .y_axis_label("Profit ($)")
                        .show(ui, |plot_ui| {
                            plot_ui.points(Points::new(series).radius(2.0).color(Color32::from_rgb(218, 112, 214)));
                        });
                });
                section(&mut cols[1], "Sales and Profit Trends over the Years", &view.yearly_trend, |ui, trend| {
                    let sales: PlotPoints = trend.iter().map(|t| [t.year as f64, t.sales]).collect();
                    let profit: PlotPoints = trend.iter().map(|t| [t.year as f64, t.profit]).collect();
                    Plot::new("yearly_trend")
                        .height(CHART_HEIGHT)
                        .legend(Legend::default())
                        .show(ui, |plot_ui| {
                            plot_ui.line(Line::new(sales).name("Sales").width(2.0));
                            plot_ui.line(Line::new(profit).name("Profit").width(2.0));
                        });
                });
            });

            ui.separator();
            ui.heading("Product Analysis and Insights");
            section(ui, "Co-occurrence of Sub-Categories", &view.co_occurrence, heatmap);
            section(ui, "Relationship Between Sales, Quantity, and Profit", &view.sales_profit_points, |ui, pts| {
                Plot::new("sales_quantity")
                    .height(CHART_HEIGHT)
                    .x_axis_label("Sales ($)")
                    .y_axis_label("Quantity Sold")
                    .legend(Legend::default())
                    .show(ui, |plot_ui| {
                        for ((gain, step), points) in profit_markers(pts) {
                            let (name, color) = if gain {
                                ("Profit", Color32::from_rgb(60, 179, 113))
                            } else {
                                ("Loss", Color32::from_rgb(220, 20, 60))
                            };
                            plot_ui.points(
                                Points::new(PlotPoints::new(points))
                                    .radius(1.5 + 1.5 * f32::from(step))
                                    .color(color)
                                    .name(name),
                            );
                        }
                    });
            });
            section(ui, "Distribution of Order Sizes", &view.quantity_histogram, |ui, hist| {
                let bars: Vec<Bar> = hist
                    .iter()
                    .map(|&(q, n)| Bar::new(q as f64, n as f64).width(0.9))
                    .collect();
                Plot::new("order_sizes")
                    .height(CHART_HEIGHT)
                    .x_axis_label("Quantity Per Order")
                    .y_axis_label("Frequency")
                    .show(ui, |plot_ui| {
                        plot_ui.bar_chart(BarChart::new(bars).color(Color32::from_rgb(123, 104, 238)));
                    });
            });
        });
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

/// Title plus either the chart or the reason it was skipped.
fn section<T>(ui: &mut Ui, title: &str, data: &Section<T>, render: impl FnOnce(&mut Ui, &T)) {
    ui.group(|ui: &mut Ui| {
        ui.strong(title);
        match data {
            Ok(value) => render(ui, value),
            Err(e) => {
                ui.colored_label(Color32::RED, e.to_string());
            }
        }
    });
}

fn kpi_row(ui: &mut Ui, view: &DashboardView) {
    let kpis = match &view.kpis {
        Ok(k) => k,
        Err(e) => {
            ui.colored_label(Color32::RED, e.to_string());
            return;
        }
    };
    ui.columns(3, |cols| {
        metric(&mut cols[0], "Total Sales", &kpis.total_sales_label());
        metric(&mut cols[1], "Average profit", &kpis.average_profit_label());
        metric(&mut cols[2], "Total Orders", &kpis.total_orders.to_string());
    });
}

fn metric(ui: &mut Ui, label: &str, value: &str) {
    ui.vertical(|ui: &mut Ui| {
        ui.label(label);
        ui.label(RichText::new(value).size(28.0).strong());
    });
}

/// One coloured bar per group, labelled through the legend.
fn group_bars(ui: &mut Ui, id: &str, result: &AggregationResult) {
    let colors = ColorMap::new(result.iter().map(|(k, _)| k.to_string()));
    Plot::new(id)
        .height(CHART_HEIGHT)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            for (i, (key, value)) in result.iter().enumerate() {
                let label = key.to_string();
                let bar = Bar::new(i as f64, value).width(0.7);
                plot_ui.bar_chart(
                    BarChart::new(vec![bar])
                        .name(&label)
                        .color(colors.color_for(&label)),
                );
            }
        });
}

fn ranked_bars(ui: &mut Ui, id: &str, ranked: &[(GroupKey, f64)], color: Color32) {
    Plot::new(id)
        .height(CHART_HEIGHT)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            for (i, (key, value)) in ranked.iter().enumerate() {
                let bar = Bar::new(i as f64, *value).width(0.7);
                plot_ui.bar_chart(BarChart::new(vec![bar]).name(key.to_string()).color(color));
            }
        });
}

fn year_line(ui: &mut Ui, id: &str, series: &[(&str, &AggregationResult)]) {
    Plot::new(id)
        .height(CHART_HEIGHT)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            for (name, result) in series {
                let points: PlotPoints = result
                    .iter()
                    .filter_map(|(k, v)| Some([k.as_year()? as f64, v]))
                    .collect();
                plot_ui.line(Line::new(points).name(*name).width(3.0));
            }
        });
}

fn heatmap(ui: &mut Ui, matrix: &CoOccurrenceMatrix) {
    if matrix.is_empty() {
        ui.label("No orders in range.");
        return;
    }
    let max = matrix.max_count().max(1) as f32;
    let cell_size = egui::vec2(34.0, 20.0);

    ScrollArea::horizontal().id_salt("co_occurrence_scroll").show(ui, |ui: &mut Ui| {
        egui::Grid::new("co_occurrence")
            .spacing([2.0, 2.0])
            .show(ui, |ui: &mut Ui| {
                ui.label("");
                for label in matrix.labels() {
                    ui.label(RichText::new(label).small());
                }
                ui.end_row();

                for (i, label) in matrix.labels().iter().enumerate() {
                    ui.label(RichText::new(label).small());
                    for j in 0..matrix.len() {
                        let count = matrix.cell(i, j);
                        let (rect, _) = ui.allocate_exact_size(cell_size, Sense::hover());
                        ui.painter().rect_filled(rect, 2.0, heat_color(count as f32 / max));
                        ui.painter().text(
                            rect.center(),
                            Align2::CENTER_CENTER,
                            count.to_string(),
                            FontId::monospace(10.0),
                            Color32::BLACK,
                        );
                    }
                    ui.end_row();
                }
            });
    });
}

/// Sales/quantity points keyed by (profit >= 0, size step), where the step
/// grows with |profit| relative to the largest |profit| shown.
fn profit_markers(pts: &[ScatterPoint]) -> BTreeMap<(bool, u8), Vec<[f64; 2]>> {
    let max_abs = pts.iter().map(|p| p.profit.abs()).fold(0.0, f64::max);
    let top = f64::from(PROFIT_SIZE_STEPS - 1);
    let mut groups: BTreeMap<(bool, u8), Vec<[f64; 2]>> = BTreeMap::new();
    for p in pts {
        let step = if max_abs > 0.0 {
            ((p.profit.abs() / max_abs).sqrt() * top).round() as u8
        } else {
            0
        };
        groups
            .entry((p.profit >= 0.0, step))
            .or_default()
            .push([p.sales, f64::from(p.quantity)]);
    }
    groups
}

fn fractional_year(date: chrono::NaiveDate) -> f64 {
    date.year() as f64 + date.ordinal0() as f64 / 365.25
}
