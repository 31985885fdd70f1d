/// Top action bar -- analysis controls, log and export actions, theme toggle.
use crate::state::{default_output_path, AppPhase, AppState};
use egui::Ui;

/// Draw the toolbar.
pub fn toolbar(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui| {
        ui.label(
            egui::RichText::new("🛡 UsbSleuth")
                .size(18.0)
                .strong()
                .color(ui.visuals().hyperlink_color),
        );

        ui.separator();

        let monitoring = state.phase == AppPhase::Monitoring;
        if ui
            .add_enabled(
                !monitoring,
                egui::Button::new("▶ Analyse").min_size(egui::vec2(80.0, 28.0)),
            )
            .on_hover_text("Watch for removable devices")
            .clicked()
        {
            state.start_analysis();
        }
        if ui
            .add_enabled(
                monitoring,
                egui::Button::new("⏹ Stop").min_size(egui::vec2(70.0, 28.0)),
            )
            .clicked()
        {
            state.stop_analysis();
        }

        ui.separator();

        let has_log = state.log_path().is_some();
        if ui
            .add_enabled(has_log, egui::Button::new("📄 Show log"))
            .clicked()
        {
            state.show_log();
        }
        if ui
            .add_enabled(has_log, egui::Button::new("💾 Save log"))
            .on_hover_text("Copy the event log into the working directory")
            .clicked()
        {
            let _ = state.save_log(&default_output_path("usbsleuth-log", "log"));
        }

        let can_export = !state.events.is_empty();
        if ui
            .add_enabled(can_export, egui::Button::new("📤 Export CSV"))
            .on_hover_text(if can_export {
                "Export the event history to CSV"
            } else {
                "No events to export yet"
            })
            .clicked()
        {
            let _ = state.export_events(&default_output_path("usbsleuth-events", "csv"));
        }

        if ui.button("🗑 Clear").on_hover_text("Clear the output").clicked() {
            state.clear_output();
        }

        ui.separator();

        let flagged = state.flagged_count();
        let quarantine_label = if flagged > 0 {
            egui::RichText::new(format!("⏏ Quarantine all ({flagged})"))
                .color(egui::Color32::from_rgb(0xf3, 0x8b, 0xa8))
        } else {
            egui::RichText::new("⏏ Quarantine all")
        };
        if ui
            .add_enabled(flagged > 0 && !state.is_busy(), egui::Button::new(quarantine_label))
            .on_hover_text("Eject every flagged device")
            .clicked()
        {
            state.quarantine_all();
        }

        // Right-aligned controls.
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            if ui.button("ℹ").on_hover_text("About UsbSleuth").clicked() {
                state.show_about = true;
            }

            let theme_label = if state.dark_mode { "☀" } else { "🌙" };
            let theme_tip = if state.dark_mode {
                "Switch to light mode"
            } else {
                "Switch to dark mode"
            };
            if ui.button(theme_label).on_hover_text(theme_tip).clicked() {
                state.dark_mode = !state.dark_mode;
            }

            ui.separator();
            ui.checkbox(&mut state.suspicious_only, "Suspicious only");
        });
    });
}
