/// Main `eframe::App` implementation for UsbSleuth.
///
/// This is the top-level UI layout that composes all panels and widgets.
use crate::panels;
use crate::state::{AppPhase, AppState};
use crate::widgets;
use usbsleuth_core::config::SentryConfig;

/// Pre-built application state.
///
/// Construct this **before** calling `eframe::run_native` so configuration
/// errors surface on the console instead of in a half-drawn window.
pub struct UsbSleuthState {
    pub(crate) inner: AppState,
}

impl UsbSleuthState {
    /// Build the state for this platform.
    pub fn build(config: SentryConfig) -> anyhow::Result<Self> {
        Ok(Self {
            inner: AppState::new(config)?,
        })
    }
}

/// The UsbSleuth application.
pub struct UsbSleuthApp {
    state: AppState,
}

impl UsbSleuthApp {
    /// Create a new application instance from pre-built state.
    pub fn with_state(cc: &eframe::CreationContext<'_>, state: UsbSleuthState) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());
        Self { state: state.inner }
    }
}

impl eframe::App for UsbSleuthApp {
    /// Match the GPU clear colour to the active theme background.
    fn clear_color(&self, visuals: &egui::Visuals) -> [f32; 4] {
        let [r, g, b, a] = visuals.panel_fill.to_array();
        [
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        ]
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ── Apply theme ───────────────────────────────────────────────────
        if self.state.dark_mode {
            ctx.set_visuals(egui::Visuals::dark());
        } else {
            ctx.set_visuals(egui::Visuals::light());
        }

        // ── Process background events ─────────────────────────────────────
        if self.state.process_events() {
            ctx.request_repaint();
        }

        // Monitors and background actions run on their own schedule; keep
        // polling the channels.
        if self.state.phase == AppPhase::Monitoring || self.state.is_busy() {
            ctx.request_repaint_after(std::time::Duration::from_millis(250));
        }

        // ── Top toolbar ───────────────────────────────────────────────────
        egui::TopBottomPanel::top("toolbar")
            .min_height(36.0)
            .show(ctx, |ui| {
                ui.add_space(4.0);
                widgets::toolbar::toolbar(ui, &mut self.state);
                ui.add_space(4.0);
            });

        // ── About dialog ──────────────────────────────────────────────────
        let mut show_about = self.state.show_about;
        egui::Window::new("About UsbSleuth")
            .open(&mut show_about)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .fixed_size([340.0, 0.0])
            .show(ctx, |ui| {
                let accent = ui.visuals().hyperlink_color;
                let muted = ui.visuals().weak_text_color();
                let normal = ui.visuals().text_color();

                ui.vertical_centered(|ui| {
                    ui.add_space(8.0);
                    ui.label(
                        egui::RichText::new("🛡 UsbSleuth")
                            .size(24.0)
                            .strong()
                            .color(accent),
                    );
                    ui.add_space(4.0);
                    ui.label(
                        egui::RichText::new(format!("v{}", env!("CARGO_PKG_VERSION")))
                            .size(13.0)
                            .color(muted),
                    );
                    ui.add_space(12.0);
                    ui.label(
                        egui::RichText::new(
                            "Watches removable drives as they attach,\n\
                             tracks the files on each one, and flags\n\
                             devices carrying blacklisted file types.",
                        )
                        .size(12.0)
                        .color(normal),
                    );
                    ui.add_space(12.0);
                    ui.separator();
                    ui.add_space(4.0);
                    ui.label(
                        egui::RichText::new("MIT License · Built with Rust & egui")
                            .size(11.0)
                            .color(muted),
                    );
                    ui.add_space(8.0);
                });
            });
        self.state.show_about = show_about;

        // ── Log window ────────────────────────────────────────────────────
        if let Some(text) = &self.state.log_view {
            let mut open = true;
            egui::Window::new("Event log")
                .open(&mut open)
                .default_size([720.0, 420.0])
                .show(ctx, |ui| {
                    egui::ScrollArea::both()
                        .auto_shrink([false, false])
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            ui.label(egui::RichText::new(text.as_str()).monospace().size(11.0));
                        });
                });
            if !open {
                self.state.log_view = None;
            }
        }

        // ── Bottom status bar ─────────────────────────────────────────────
        egui::TopBottomPanel::bottom("status_bar")
            .min_height(24.0)
            .show(ctx, |ui| {
                ui.add_space(2.0);
                widgets::status_bar::status_bar(ui, &self.state);
                ui.add_space(2.0);
            });

        // ── Left sidebar: devices ─────────────────────────────────────────
        egui::SidePanel::left("device_panel")
            .default_width(340.0)
            .min_width(260.0)
            .max_width(600.0)
            .resizable(true)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    panels::device_panel::device_panel(ui, &mut self.state);
                });
            });

        // ── Central panel: events ─────────────────────────────────────────
        egui::CentralPanel::default().show(ctx, |ui| {
            panels::event_panel::event_panel(ui, &self.state);
        });
    }
}
