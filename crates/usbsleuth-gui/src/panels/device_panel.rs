/// Left panel: attached devices with status and per-device actions.
use crate::state::AppState;
use crate::theme::UsbSleuthTheme;
use egui::Ui;
use usbsleuth_core::lifecycle::DeviceStatus;

/// What the operator clicked this frame.
enum DeviceAction {
    Quarantine(String),
    FullScan(String),
    Purge(String),
}

pub fn device_panel(ui: &mut Ui, state: &mut AppState) {
    let theme = UsbSleuthTheme::for_visuals(ui.visuals());
    let muted = ui.visuals().weak_text_color();

    ui.label(
        egui::RichText::new("Devices")
            .size(14.0)
            .strong()
            .color(theme.accent),
    );
    ui.separator();

    let devices = state.devices();
    if devices.is_empty() {
        ui.add_space(8.0);
        ui.label(
            egui::RichText::new("No removable devices attached.")
                .size(12.0)
                .color(muted),
        );
        return;
    }

    let busy = state.is_busy();
    let mut action = None;
    for record in &devices {
        let id = record.id();
        let selected = state.selected_device.as_deref() == Some(id);
        let status_color = theme.status_color(record.status);

        egui::Frame::group(ui.style()).show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.horizontal(|ui| {
                let title = egui::RichText::new(format!("{} ({})", record.label, id)).strong();
                if ui.selectable_label(selected, title).clicked() {
                    state.selected_device = if selected { None } else { Some(id.to_owned()) };
                }
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.label(
                        egui::RichText::new(record.status.label())
                            .size(12.0)
                            .strong()
                            .color(status_color),
                    );
                });
            });

            let polled = record
                .last_polled_at
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_else(|| "pending".to_owned());
            ui.label(
                egui::RichText::new(format!(
                    "{} files · first seen {} · last poll {}",
                    record.snapshot.len(),
                    record.first_seen_at.format("%H:%M:%S"),
                    polled
                ))
                .size(11.0)
                .color(muted),
            );

            ui.horizontal(|ui| {
                let flagged = record.status == DeviceStatus::Flagged;
                let idle = !busy;
                if ui
                    .add_enabled(flagged && idle, egui::Button::new("⏏ Quarantine"))
                    .on_hover_text("Unmount and eject this device")
                    .clicked()
                {
                    action = Some(DeviceAction::Quarantine(id.to_owned()));
                }
                if ui
                    .add_enabled(idle, egui::Button::new("🔎 Full scan"))
                    .on_hover_text("Classify every file on the device now")
                    .clicked()
                {
                    action = Some(DeviceAction::FullScan(id.to_owned()));
                }
                if ui
                    .add_enabled(flagged, egui::Button::new("🗑 Purge"))
                    .on_hover_text("Delete the suspicious files found on this device")
                    .clicked()
                {
                    action = Some(DeviceAction::Purge(id.to_owned()));
                }
            });
        });
        ui.add_space(4.0);
    }

    match action {
        Some(DeviceAction::Quarantine(id)) => state.quarantine(&id),
        Some(DeviceAction::FullScan(id)) => state.full_scan(&id),
        Some(DeviceAction::Purge(id)) => {
            state.purge_suspicious(&id);
        }
        None => {}
    }

    if let Some((id, report)) = &state.last_scan {
        ui.separator();
        ui.label(
            egui::RichText::new(format!(
                "Last full scan of {id}: {} files in {:.1?}",
                report.files_scanned, report.duration
            ))
            .size(11.0)
            .color(muted),
        );
        for path in &report.suspicious {
            ui.label(
                egui::RichText::new(path.as_str())
                    .size(11.0)
                    .color(theme.error),
            );
        }
    }
}
