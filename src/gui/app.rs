//! Collision Explorer Main Application
//! Main window with control panel and dashboard view.

use crate::charts::{ImageOptions, StaticChartRenderer};
use crate::config::DashboardConfig;
use crate::data::{CollisionTable, LoadCache, SourceFingerprint};
use crate::gui::{ControlPanel, ControlPanelAction, DashboardView};
use egui::SidePanel;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver};
use std::thread;
use tracing::{error, info, warn};

/// CSV loading result from background thread
enum LoadResult {
    Progress(String),
    Complete {
        row_limit: usize,
        table: CollisionTable,
        fingerprint: SourceFingerprint,
    },
    Error(String),
}

/// Main application window.
pub struct CollisionExplorerApp {
    cache: LoadCache,
    table: Option<CollisionTable>,
    control_panel: ControlPanel,
    dashboard: DashboardView,

    // Async CSV loading
    load_rx: Option<Receiver<LoadResult>>,
}

impl CollisionExplorerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: DashboardConfig) -> Self {
        let mut app = Self {
            cache: LoadCache::new(config.data_path.clone()),
            table: None,
            control_panel: ControlPanel::new(&config),
            dashboard: DashboardView::new(),
            load_rx: None,
        };
        app.request_load();
        app
    }

    /// Serve the current row limit from the cache or start a background read.
    fn request_load(&mut self) {
        let row_limit = self.control_panel.row_limit;

        if let Some(table) = self.cache.get(row_limit) {
            info!(row_limit, "using cached collision table");
            self.load_rx = None;
            self.control_panel.is_loading = false;
            self.install_table(table);
            return;
        }

        let path: PathBuf = self.cache.source().to_path_buf();
        self.control_panel.is_loading = true;
        self.control_panel
            .set_status(format!("Loading {} rows...", row_limit));

        // Replacing the receiver discards any load still in flight
        let (tx, rx) = channel();
        self.load_rx = Some(rx);

        thread::spawn(move || {
            let _ = tx.send(LoadResult::Progress("Reading CSV file...".to_string()));

            let _ = match LoadCache::read_source(&path, row_limit) {
                Ok((fingerprint, table)) => tx.send(LoadResult::Complete {
                    row_limit,
                    table,
                    fingerprint,
                }),
                Err(e) => tx.send(LoadResult::Error(e.to_string())),
            };
        });
    }

    /// Check for CSV loading results
    fn check_load_results(&mut self) {
        let rx = self.load_rx.take();
        if let Some(rx) = rx {
            let mut should_keep_receiver = true;

            while let Ok(result) = rx.try_recv() {
                match result {
                    LoadResult::Progress(status) => {
                        self.control_panel.set_status(status);
                    }
                    LoadResult::Complete {
                        row_limit,
                        table,
                        fingerprint,
                    } => {
                        let table = self.cache.complete_load(row_limit, fingerprint, table);
                        self.control_panel.is_loading = false;
                        self.install_table(table);
                        should_keep_receiver = false;
                    }
                    LoadResult::Error(e) => {
                        error!(error = %e, "failed to load collision data");
                        self.control_panel.set_status(format!("Error: {}", e));
                        self.control_panel.is_loading = false;
                        should_keep_receiver = false;
                    }
                }
            }

            if should_keep_receiver {
                self.load_rx = Some(rx);
            }
        }
    }

    fn install_table(&mut self, table: CollisionTable) {
        if table.is_empty() {
            warn!(row_limit = table.row_limit(), "no geo-located collisions in loaded rows");
        }
        self.control_panel.loaded_rows = Some(table.len());
        self.control_panel.set_status(format!(
            "Loaded {} collisions from {} rows",
            table.len(),
            table.row_limit()
        ));
        self.control_panel.export_enabled = true;
        self.dashboard.update(&table, &self.control_panel.filters);
        self.table = Some(table);
    }

    fn handle_filters_changed(&mut self) {
        if let Some(table) = &self.table {
            self.dashboard.update(table, &self.control_panel.filters);
        }
    }

    /// Pick another CSV; switching sources drops every cached table.
    fn handle_browse_csv(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("CSV Files", &["csv"])
            .pick_file()
        {
            info!(path = %path.display(), "switching data source");
            self.cache.set_source(path.clone());
            self.control_panel.csv_path = path;
            self.control_panel.loaded_rows = None;
            self.control_panel.export_enabled = false;
            self.table = None;
            self.dashboard.clear();
            self.request_load();
        }
    }

    /// Save the current minute histogram as PNG and open it.
    fn handle_export_histogram(&mut self) {
        let Some(histogram) = self.dashboard.histogram() else {
            self.control_panel.set_status("No chart to export");
            return;
        };

        let output_path = match rfd::FileDialog::new()
            .add_filter("PNG Image", &["png"])
            .set_file_name(format!("collisions_by_minute_{:02}h.png", histogram.hour))
            .save_file()
        {
            Some(path) => path,
            None => return, // User cancelled
        };

        let result = StaticChartRenderer::render_minute_histogram_png(
            histogram,
            ImageOptions::default(),
        )
        .map_err(|e| e.to_string())
        .and_then(|bytes| std::fs::write(&output_path, bytes).map_err(|e| e.to_string()));

        match result {
            Ok(()) => {
                info!(path = %output_path.display(), "exported minute histogram");
                self.control_panel
                    .set_status(format!("Exported {}", output_path.display()));
                if let Err(e) = open::that(&output_path) {
                    warn!(error = %e, "could not open exported image");
                }
            }
            Err(e) => {
                error!(error = %e, "histogram export failed");
                self.control_panel.set_status(format!("Error: {}", e));
            }
        }
    }
}

impl eframe::App for CollisionExplorerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Check for background results
        self.check_load_results();

        // Request repaint while loading
        if self.control_panel.is_loading {
            ctx.request_repaint();
        }

        // Left panel - Control Panel
        SidePanel::left("control_panel")
            .min_width(300.0)
            .max_width(350.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    let action = self.control_panel.show(ui);

                    match action {
                        ControlPanelAction::BrowseCsv => self.handle_browse_csv(),
                        ControlPanelAction::Reload => self.request_load(),
                        ControlPanelAction::FiltersChanged => self.handle_filters_changed(),
                        ControlPanelAction::ExportHistogram => self.handle_export_histogram(),
                        ControlPanelAction::None => {}
                    }
                });
            });

        // Central panel - Dashboard
        let show_raw_data = self.control_panel.filters.show_raw_data;
        egui::CentralPanel::default().show(ctx, |ui| {
            self.dashboard.show(ui, show_raw_data);
        });
    }
}
