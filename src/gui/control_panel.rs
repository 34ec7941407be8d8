//! Control Panel Widget
//! Left side panel with the data source and filter widgets.

use crate::config::{DashboardConfig, MAX_HOUR, MAX_INJURY_THRESHOLD};
use crate::data::VictimClass;
use egui::{Color32, ComboBox, RichText, Slider};
use std::path::PathBuf;

/// Widget values that parameterize the derived views.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSettings {
    pub injury_threshold: u32,
    pub hour: u32,
    pub victim_class: VictimClass,
    pub show_raw_data: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            injury_threshold: 0,
            hour: 0,
            victim_class: VictimClass::Pedestrians,
            show_raw_data: false,
        }
    }
}

/// Left side control panel with source selection and filter widgets.
pub struct ControlPanel {
    pub filters: FilterSettings,
    pub csv_path: PathBuf,
    pub row_limit: usize,
    pub loaded_rows: Option<usize>,
    pub status: String,
    pub is_loading: bool,
    pub export_enabled: bool,
}

impl ControlPanel {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            filters: FilterSettings {
                injury_threshold: config.initial_threshold,
                hour: config.initial_hour,
                ..FilterSettings::default()
            },
            csv_path: config.data_path.clone(),
            row_limit: config.row_limit,
            loaded_rows: None,
            status: "Ready".to_string(),
            is_loading: false,
            export_enabled: false,
        }
    }

    /// Draw the control panel
    pub fn show(&mut self, ui: &mut egui::Ui) -> ControlPanelAction {
        let mut action = ControlPanelAction::None;
        let before = self.filters.clone();

        // Title
        ui.vertical_centered(|ui| {
            ui.add_space(5.0);
            ui.label(
                RichText::new("💥 Collision Explorer")
                    .size(22.0)
                    .color(Color32::from_rgb(100, 149, 237)),
            );
            ui.label(
                RichText::new("Motor Vehicle Collisions in New York City")
                    .size(11.0)
                    .color(Color32::GRAY),
            );
        });
        ui.add_space(10.0);
        ui.separator();
        ui.add_space(5.0);

        // ===== Data Source Section =====
        ui.label(RichText::new("📁 Data Source").size(14.0).strong());
        ui.add_space(5.0);

        egui::Frame::none()
            .fill(ui.visuals().widgets.noninteractive.bg_fill)
            .rounding(5.0)
            .inner_margin(8.0)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    let file_name = self
                        .csv_path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| "No file selected".to_string());
                    ui.label(RichText::new(file_name).size(12.0));

                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.add_enabled_ui(!self.is_loading, |ui| {
                            if ui.button("📂 Browse").clicked() {
                                action = ControlPanelAction::BrowseCsv;
                            }
                        });
                    });
                });

                ui.horizontal(|ui| {
                    ui.label("Rows to read:");
                    ui.add(
                        egui::DragValue::new(&mut self.row_limit)
                            .range(1..=usize::MAX)
                            .speed(1000.0),
                    );
                    ui.add_enabled_ui(!self.is_loading, |ui| {
                        if ui.button("⟳ Reload").clicked() {
                            action = ControlPanelAction::Reload;
                        }
                    });
                });

                if let Some(rows) = self.loaded_rows {
                    ui.label(
                        RichText::new(format!("{} geo-located collisions", rows))
                            .size(11.0)
                            .color(Color32::GRAY),
                    );
                }
            });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Filters Section =====
        ui.label(RichText::new("🔧 Filters").size(14.0).strong());
        ui.add_space(8.0);

        ui.label("Number of persons injured in vehicle collisions");
        ui.add(Slider::new(
            &mut self.filters.injury_threshold,
            0..=MAX_INJURY_THRESHOLD,
        ));
        ui.add_space(8.0);

        ui.label("Hour to look at");
        ui.add(Slider::new(&mut self.filters.hour, 0..=MAX_HOUR));
        ui.add_space(8.0);

        ui.horizontal(|ui| {
            ui.label("Affected type of people:");
            ComboBox::from_id_salt("victim_class")
                .width(130.0)
                .selected_text(self.filters.victim_class.label())
                .show_ui(ui, |ui| {
                    for class in VictimClass::ALL {
                        ui.selectable_value(&mut self.filters.victim_class, class, class.label());
                    }
                });
        });
        ui.add_space(8.0);

        ui.checkbox(&mut self.filters.show_raw_data, "Show Raw Data");

        if self.filters != before {
            action = ControlPanelAction::FiltersChanged;
        }

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Export =====
        ui.vertical_centered(|ui| {
            ui.add_enabled_ui(self.export_enabled, |ui| {
                let label = RichText::new("📄 Export histogram PNG").size(14.0);
                let button = egui::Button::new(label).min_size(egui::vec2(200.0, 30.0));
                if ui.add(button).clicked() {
                    action = ControlPanelAction::ExportHistogram;
                }
            });
        });

        ui.add_space(15.0);
        ui.separator();
        ui.add_space(10.0);

        // ===== Status =====
        if self.is_loading {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(RichText::new(&self.status).size(11.0));
            });
        } else {
            let status_color = if self.status.contains("Error") {
                Color32::from_rgb(220, 53, 69)
            } else if self.status.starts_with("Loaded") || self.status.starts_with("Exported") {
                Color32::from_rgb(40, 167, 69)
            } else {
                Color32::GRAY
            };
            ui.label(RichText::new(&self.status).size(11.0).color(status_color));
        }

        action
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }
}

/// Actions triggered by control panel
#[derive(Debug, Clone, PartialEq)]
pub enum ControlPanelAction {
    None,
    BrowseCsv,
    Reload,
    FiltersChanged,
    ExportHistogram,
}
