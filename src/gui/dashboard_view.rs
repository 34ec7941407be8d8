//! Dashboard View Widget
//! Central scrollable panel: point map, hexagon map, minute chart, street
//! ranking and the optional raw-data table.

use crate::charts::{ChartPlotter, HexagonLayerConfig};
use crate::data::{
    hour_caption, minute_caption, CollisionTable, CollisionViews, GeoPoint, HeatmapView,
    HourSubset, MinuteHistogram, StreetRanking, VictimClass, ViewError,
};
use crate::gui::FilterSettings;
use egui::{Color32, RichText, ScrollArea};

const SECTION_SPACING: f32 = 20.0;

/// All derived views for one set of widget values.
pub struct DashboardViews {
    pub threshold: u32,
    pub points: Vec<GeoPoint>,
    pub hour_subset: HourSubset,
    pub heatmap: Result<HeatmapView, ViewError>,
    pub histogram: MinuteHistogram,
    pub victim_class: VictimClass,
    pub ranking: Result<Vec<StreetRanking>, ViewError>,
}

impl DashboardViews {
    /// Recompute every view from the untouched table.
    pub fn compute(
        table: &CollisionTable,
        filters: &FilterSettings,
        layer: &HexagonLayerConfig,
    ) -> Self {
        let hour_subset = CollisionViews::hour_subset(table.records(), filters.hour);
        Self {
            threshold: filters.injury_threshold,
            points: CollisionViews::threshold_points(table, filters.injury_threshold),
            heatmap: CollisionViews::heatmap(&hour_subset, layer.scale()),
            histogram: CollisionViews::minute_histogram(&hour_subset, filters.hour),
            victim_class: filters.victim_class,
            ranking: CollisionViews::top_streets(table, filters.victim_class),
            hour_subset,
        }
    }
}

/// Scrollable dashboard body.
#[derive(Default)]
pub struct DashboardView {
    pub views: Option<DashboardViews>,
    pub layer: HexagonLayerConfig,
}

impl DashboardView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.views = None;
    }

    pub fn update(&mut self, table: &CollisionTable, filters: &FilterSettings) {
        self.views = Some(DashboardViews::compute(table, filters, &self.layer));
    }

    pub fn histogram(&self) -> Option<&MinuteHistogram> {
        self.views.as_ref().map(|v| &v.histogram)
    }

    /// Draw the dashboard
    pub fn show(&self, ui: &mut egui::Ui, show_raw_data: bool) {
        let Some(views) = &self.views else {
            ui.centered_and_justified(|ui| {
                ui.label(RichText::new("No Data").size(20.0));
            });
            return;
        };

        ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.heading(RichText::new("Motor Vehicle Collisions in New York City").size(26.0));
                ui.label("Visualize and analyze motor vehicle collisions in New York City");
                ui.add_space(SECTION_SPACING);

                Self::section(ui, "Where are the most people injured in NYC?");
                ui.label(
                    RichText::new(format!(
                        "{} collisions with at least {} injured",
                        views.points.len(),
                        views.threshold
                    ))
                    .color(Color32::GRAY),
                );
                ChartPlotter::draw_point_map(ui, &views.points);
                ui.add_space(SECTION_SPACING);

                Self::section(ui, "How many collisions occur during a given time of day?");
                ui.label(hour_caption(views.hour_subset.hour));
                let hour_count = format!("{} collisions in this hour", views.hour_subset.len());
                ui.label(RichText::new(hour_count).color(Color32::GRAY));
                match &views.heatmap {
                    Ok(heatmap) => ChartPlotter::draw_hexagon_map(ui, heatmap, &self.layer),
                    Err(e) => Self::notice(ui, &e.to_string()),
                }
                ui.add_space(SECTION_SPACING);

                ui.label(
                    RichText::new(minute_caption(views.histogram.hour))
                        .size(16.0)
                        .strong(),
                );
                ui.label(
                    RichText::new(format!("{} crashes", views.histogram.total()))
                        .color(Color32::GRAY),
                );
                ChartPlotter::draw_minute_histogram(ui, &views.histogram);
                ui.add_space(SECTION_SPACING);

                Self::section(ui, "Top 5 dangerous streets by affected class of people");
                match &views.ranking {
                    Ok(ranking) if ranking.is_empty() => {
                        let class = views.victim_class.label().to_lowercase();
                        Self::notice(ui, &format!("No injured {} recorded", class))
                    }
                    Ok(ranking) => ChartPlotter::draw_street_table(ui, views.victim_class, ranking),
                    Err(e) => Self::notice(ui, &e.to_string()),
                }
                ui.add_space(SECTION_SPACING);

                if show_raw_data {
                    ui.label(RichText::new("Raw Data").size(16.0).strong());
                    if views.hour_subset.is_empty() {
                        Self::notice(ui, "No rows in the selected hour");
                    } else {
                        ChartPlotter::draw_raw_table(ui, &views.hour_subset.records);
                    }
                }
            });
    }

    fn section(ui: &mut egui::Ui, title: &str) {
        ui.label(RichText::new(title).size(20.0).strong());
        ui.add_space(6.0);
    }

    fn notice(ui: &mut egui::Ui, message: &str) {
        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(12.0)
            .show(ui, |ui| {
                ui.label(RichText::new(message).color(Color32::from_rgb(243, 156, 18)));
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CollisionRecord;
    use chrono::NaiveDate;

    fn table(has_cyclists: bool) -> CollisionTable {
        let records = (0..48u32)
            .map(|i| CollisionRecord {
                timestamp: NaiveDate::from_ymd_opt(2022, 1, 1)
                    .unwrap()
                    .and_hms_opt(i % 12, i % 60, 0)
                    .unwrap(),
                latitude: 40.7 + i as f64 * 0.001,
                longitude: -73.9,
                injured_persons: Some(i % 4),
                injured_pedestrians: i % 2,
                injured_motorists: i % 3,
                injured_cyclists: has_cyclists.then_some(i % 2),
                on_street_name: Some(format!("STREET {}", i)),
            })
            .collect();
        CollisionTable::new(records, has_cyclists, 100)
    }

    #[test]
    fn computes_every_view() {
        let filters = FilterSettings {
            injury_threshold: 2,
            hour: 3,
            ..FilterSettings::default()
        };
        let views = DashboardViews::compute(&table(true), &filters, &HexagonLayerConfig::default());

        assert_eq!(views.points.len(), 24);
        assert_eq!(views.hour_subset.len(), 4);
        assert!(views.heatmap.is_ok());
        assert_eq!(views.histogram.total(), 4);
        assert_eq!(views.ranking.unwrap().len(), 5);
    }

    #[test]
    fn empty_hour_and_missing_cyclists_stay_local() {
        let filters = FilterSettings {
            hour: 20,
            victim_class: VictimClass::Cyclists,
            ..FilterSettings::default()
        };
        let views =
            DashboardViews::compute(&table(false), &filters, &HexagonLayerConfig::default());

        assert_eq!(views.heatmap.unwrap_err(), ViewError::EmptySelection { hour: 20 });
        assert_eq!(
            views.ranking.unwrap_err(),
            ViewError::MissingField {
                class: VictimClass::Cyclists
            }
        );
        assert_eq!(views.histogram.buckets.len(), 60);
        assert_eq!(views.points.len(), 48);
    }
}
