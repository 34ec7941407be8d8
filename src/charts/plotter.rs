//! Chart Plotter Module
//! Draws the dashboard's maps, bar chart and tables using egui_plot.

use crate::data::{
    CollisionRecord, GeoPoint, HeatmapView, MinuteHistogram, StreetRanking, VictimClass,
};
use crate::stats::{HexBin, HexScale, StatsCalculator};
use egui::{Color32, RichText, ScrollArea, Stroke};
use egui_plot::{Bar, BarChart, Plot, PlotPoints, Points, Polygon};

pub const ACCENT_COLOR: Color32 = Color32::from_rgb(100, 149, 237); // Cornflower
pub const POINT_COLOR: Color32 = Color32::from_rgb(231, 76, 60); // Red

const MAP_HEIGHT: f32 = 420.0;
const CHART_HEIGHT: f32 = 400.0;
/// Assumed map width in pixels when deriving the initial view from zoom.
const MAP_VIEW_WIDTH_PX: f64 = 800.0;
/// Web-Mercator ground resolution at zoom 0 on the equator.
const METERS_PER_PIXEL_Z0: f64 = 156_543.033_92;

/// Fixed style of the extruded density layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HexagonLayerConfig {
    pub zoom: f64,
    pub pitch_deg: f64,
    pub elevation_scale: f64,
    pub elevation_range: (f64, f64),
    pub radius_m: f64,
    pub extruded: bool,
}

impl Default for HexagonLayerConfig {
    fn default() -> Self {
        Self {
            zoom: 15.0,
            pitch_deg: 50.0,
            elevation_scale: 4.0,
            elevation_range: (0.0, 1000.0),
            radius_m: 200.0,
            extruded: true,
        }
    }
}

impl HexagonLayerConfig {
    pub fn scale(&self) -> HexScale {
        HexScale {
            radius_m: self.radius_m,
            elevation_range: self.elevation_range,
            elevation_scale: self.elevation_scale,
        }
    }

    /// Ground metres covered by one pixel at `latitude`.
    pub fn meters_per_pixel(&self, latitude: f64) -> f64 {
        METERS_PER_PIXEL_Z0 * latitude.to_radians().cos() / 2f64.powf(self.zoom)
    }

    /// Project a ground offset and height into the tilted view plane.
    pub fn project(&self, x: f64, y: f64, z: f64) -> [f64; 2] {
        let pitch = self.pitch_deg.to_radians();
        [x, y * pitch.cos() + z * pitch.sin()]
    }
}

/// Creates the dashboard visualizations using egui_plot.
pub struct ChartPlotter;

impl ChartPlotter {
    /// Scatter map of collision locations.
    pub fn draw_point_map(ui: &mut egui::Ui, points: &[GeoPoint]) {
        let mean_lat = StatsCalculator::mean(
            &points.iter().map(|p| p.latitude).collect::<Vec<_>>(),
        )
        .unwrap_or(40.7);
        let aspect = (1.0 / mean_lat.to_radians().cos()) as f32;

        let series: PlotPoints = points.iter().map(|p| [p.longitude, p.latitude]).collect();

        Plot::new("threshold_point_map")
            .height(MAP_HEIGHT)
            .data_aspect(aspect)
            .x_axis_label("Longitude")
            .y_axis_label("Latitude")
            .show(ui, |plot_ui| {
                plot_ui.points(
                    Points::new(series)
                        .radius(2.0)
                        .color(POINT_COLOR.gamma_multiply(0.7))
                        .name("Collisions"),
                );
            });
    }

    /// Extruded hexagon density map seen from the south at the layer pitch.
    pub fn draw_hexagon_map(ui: &mut egui::Ui, view: &HeatmapView, layer: &HexagonLayerConfig) {
        let half_span = MAP_VIEW_WIDTH_PX / 2.0 * layer.meters_per_pixel(view.center.latitude);

        // Far rows first so nearer prisms are painted over them
        let mut bins: Vec<&HexBin> = view.bins.iter().collect();
        bins.sort_by(|a, b| b.center.latitude.total_cmp(&a.center.latitude));

        if let Some((first, last)) = view.time_range() {
            ui.label(
                RichText::new(format!(
                    "{} samples in {} cells, {} to {}",
                    view.samples.len(),
                    view.bins.len(),
                    first.format("%Y-%m-%d %H:%M"),
                    last.format("%Y-%m-%d %H:%M")
                ))
                .color(Color32::GRAY),
            );
        }

        Plot::new(format!("hexagon_map_{}", view.hour))
            .height(MAP_HEIGHT)
            .data_aspect(1.0)
            .include_x(-half_span)
            .include_x(half_span)
            .include_y(-half_span * 0.6)
            .include_y(half_span * 0.6)
            .show_axes([false, false])
            .show_grid(false)
            .show(ui, |plot_ui| {
                for bin in bins {
                    let base: Vec<(f64, f64)> = bin
                        .corners
                        .iter()
                        .map(|c| StatsCalculator::local_meters(*c, view.center))
                        .collect();
                    let height = if layer.extruded { bin.elevation } else { 0.0 };
                    let [r, g, b] = bin.color;
                    let top_color = Color32::from_rgb(r, g, b);

                    if height > 0.0 {
                        let wall_color = top_color.gamma_multiply(0.6);
                        for i in 0..base.len() {
                            let (x0, y0) = base[i];
                            let (x1, y1) = base[(i + 1) % base.len()];
                            let wall = vec![
                                layer.project(x0, y0, 0.0),
                                layer.project(x1, y1, 0.0),
                                layer.project(x1, y1, height),
                                layer.project(x0, y0, height),
                            ];
                            plot_ui.polygon(
                                Polygon::new(PlotPoints::new(wall))
                                    .fill_color(wall_color)
                                    .stroke(Stroke::new(0.5, wall_color)),
                            );
                        }
                    }

                    let top: Vec<[f64; 2]> = base
                        .iter()
                        .map(|&(x, y)| layer.project(x, y, height))
                        .collect();
                    plot_ui.polygon(
                        Polygon::new(PlotPoints::new(top))
                            .fill_color(top_color)
                            .stroke(Stroke::new(0.5, Color32::from_gray(90)))
                            .name(format!("{} collisions", bin.count)),
                    );
                }
            });
    }

    /// Bar chart of collisions per minute.
    pub fn draw_minute_histogram(ui: &mut egui::Ui, histogram: &MinuteHistogram) {
        let bars: Vec<Bar> = histogram
            .buckets
            .iter()
            .map(|b| {
                Bar::new(b.minute as f64, b.crashes as f64)
                    .width(0.8)
                    .fill(ACCENT_COLOR)
            })
            .collect();

        Plot::new(format!("minute_histogram_{}", histogram.hour))
            .height(CHART_HEIGHT)
            .allow_scroll(false)
            .include_x(-0.5)
            .include_x(59.5)
            .include_y(0.0)
            .x_axis_label("minute")
            .y_axis_label("crashes")
            .show(ui, |plot_ui| {
                plot_ui.bar_chart(
                    BarChart::new(bars)
                        .name("crashes")
                        .element_formatter(Box::new(|bar, _chart| {
                            format!("minute={}\ncrashes={}", bar.argument, bar.value)
                        })),
                );
            });
    }

    /// Ranked streets for one victim class.
    pub fn draw_street_table(ui: &mut egui::Ui, class: VictimClass, ranking: &[StreetRanking]) {
        egui::Grid::new("street_ranking")
            .striped(true)
            .min_col_width(60.0)
            .show(ui, |ui| {
                ui.label(RichText::new("#").strong());
                ui.label(RichText::new("on_street_name").strong());
                ui.label(RichText::new(class.column_name()).strong());
                ui.end_row();

                for (rank, row) in ranking.iter().enumerate() {
                    ui.label(format!("{}", rank + 1));
                    ui.label(&row.street);
                    ui.label(row.injured.to_string());
                    ui.end_row();
                }
            });
    }

    /// Virtualized dump of the given records.
    pub fn draw_raw_table(ui: &mut egui::Ui, records: &[CollisionRecord]) {
        const WIDTHS: [f32; 8] = [140.0, 80.0, 80.0, 60.0, 60.0, 60.0, 60.0, 220.0];
        const HEADERS: [&str; 8] = [
            "date/time",
            "latitude",
            "longitude",
            "persons",
            "pedestrians",
            "motorists",
            "cyclists",
            "on_street_name",
        ];
        let row_height = ui.text_style_height(&egui::TextStyle::Body) + 4.0;

        ui.horizontal(|ui| {
            for (header, width) in HEADERS.iter().zip(WIDTHS) {
                ui.add_sized(
                    [width, row_height],
                    egui::Label::new(RichText::new(*header).strong()),
                );
            }
        });
        ui.separator();

        ScrollArea::vertical()
            .id_salt("raw_data")
            .max_height(320.0)
            .auto_shrink([false, true])
            .show_rows(ui, row_height, records.len(), |ui, range| {
                for record in &records[range] {
                    let cells = [
                        record.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                        format!("{:.5}", record.latitude),
                        format!("{:.5}", record.longitude),
                        record
                            .injured_persons
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        record.injured_pedestrians.to_string(),
                        record.injured_motorists.to_string(),
                        record
                            .injured_cyclists
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        record.on_street_name.clone().unwrap_or_default(),
                    ];
                    ui.horizontal(|ui| {
                        for (cell, width) in cells.iter().zip(WIDTHS) {
                            ui.add_sized([width, row_height], egui::Label::new(cell));
                        }
                    });
                }
            });
    }
}
