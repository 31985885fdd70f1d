/// Bottom status bar - monitoring state, counts, and the latest notice.
use crate::state::{AppPhase, AppState, NoticeLevel};
use crate::theme::UsbSleuthTheme;
use egui::Ui;

/// Draw the status bar at the bottom of the window.
pub fn status_bar(ui: &mut Ui, state: &AppState) {
    let theme = UsbSleuthTheme::for_visuals(ui.visuals());
    let color_weak = ui.visuals().weak_text_color();
    let color_normal = ui.visuals().text_color();

    ui.horizontal(|ui| {
        match state.phase {
            AppPhase::Idle => {
                ui.label(egui::RichText::new("Ready").size(12.0).color(color_weak));
            }
            AppPhase::Monitoring => {
                ui.spinner();
                ui.label(
                    egui::RichText::new("Monitoring")
                        .size(12.0)
                        .color(theme.success),
                );
            }
        }

        ui.separator();
        ui.label(
            egui::RichText::new(format!("{} devices", state.registry().len()))
                .size(12.0)
                .color(color_normal),
        );

        let flagged = state.flagged_count();
        ui.separator();
        ui.label(
            egui::RichText::new(format!("{flagged} flagged"))
                .size(12.0)
                .color(if flagged > 0 { theme.error } else { color_normal }),
        );

        ui.separator();
        ui.label(
            egui::RichText::new(format!("{} events", state.events.len()))
                .size(12.0)
                .color(color_normal),
        );

        let suspicious = state.suspicious_event_count();
        if suspicious > 0 {
            ui.separator();
            ui.label(
                egui::RichText::new(format!("{suspicious} suspicious files"))
                    .size(12.0)
                    .color(theme.warning),
            );
        }

        if let Some(what) = state.busy_text() {
            ui.separator();
            ui.spinner();
            ui.label(egui::RichText::new(what).size(12.0).color(color_normal));
        }

        if let Some(notice) = &state.notice {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let color = match notice.level {
                    NoticeLevel::Info => color_normal,
                    NoticeLevel::Warning => theme.warning,
                    NoticeLevel::Error => theme.error,
                };
                ui.label(egui::RichText::new(&notice.text).size(12.0).color(color));
            });
        }
    });
}
