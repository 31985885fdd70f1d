/// Central panel: host banner plus the event table.
///
/// The table is virtualised through `egui_extras::TableBuilder`, so only
/// visible rows are laid out even with a long history.
use crate::state::AppState;
use crate::theme::UsbSleuthTheme;
use egui::Ui;
use egui_extras::{Column, TableBuilder};

const ROW_HEIGHT: f32 = 18.0;

pub fn event_panel(ui: &mut Ui, state: &AppState) {
    let theme = UsbSleuthTheme::for_visuals(ui.visuals());
    let muted = ui.visuals().weak_text_color();
    let normal = ui.visuals().text_color();

    egui::CollapsingHeader::new(
        egui::RichText::new("System information")
            .size(12.0)
            .color(theme.accent),
    )
    .default_open(state.events.is_empty())
    .show(ui, |ui| {
        egui::Grid::new("system_info")
            .num_columns(2)
            .spacing([16.0, 2.0])
            .show(ui, |ui| {
                for (label, value) in state.system_info.rows() {
                    ui.label(egui::RichText::new(label).size(11.0).color(muted));
                    ui.label(egui::RichText::new(value).size(11.0).color(normal));
                    ui.end_row();
                }
            });
    });
    ui.separator();

    let rows = state.visible_events();
    if rows.is_empty() {
        ui.add_space(16.0);
        ui.vertical_centered(|ui| {
            ui.label(
                egui::RichText::new("No events yet. Press Analyse and attach a device.")
                    .size(13.0)
                    .color(muted),
            );
        });
        return;
    }

    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .stick_to_bottom(true)
        .cell_layout(egui::Layout::left_to_right(egui::Align::Center))
        .column(Column::exact(130.0))
        .column(Column::initial(110.0).at_least(80.0))
        .column(Column::initial(150.0).at_least(80.0))
        .column(Column::remainder().at_least(120.0))
        .column(Column::exact(80.0))
        .header(20.0, |mut header| {
            for title in ["Time", "Event", "Device", "Path", "Class"] {
                header.col(|ui| {
                    ui.label(egui::RichText::new(title).size(11.0).color(theme.accent));
                });
            }
        })
        .body(|body| {
            body.rows(ROW_HEIGHT, rows.len(), |mut row| {
                let event = rows[row.index()];
                let color = theme.event_color(event, normal);
                let suspicious = event.is_suspicious();

                row.col(|ui| {
                    if suspicious {
                        ui.painter().rect_filled(ui.max_rect(), 0.0, theme.danger_row);
                    }
                    ui.label(
                        egui::RichText::new(event.timestamp.format("%H:%M:%S").to_string())
                            .size(11.0)
                            .color(muted),
                    );
                });
                row.col(|ui| {
                    ui.label(
                        egui::RichText::new(event.kind.label())
                            .size(12.0)
                            .strong()
                            .color(color),
                    );
                });
                row.col(|ui| {
                    ui.label(egui::RichText::new(&event.label).size(12.0).color(normal))
                        .on_hover_text(&event.device_id);
                });
                row.col(|ui| {
                    if let Some(path) = &event.path {
                        // Approximate 7 px per character at 12 px proportional size.
                        let avail_chars = ((ui.available_width() / 7.0).max(20.0)) as usize;
                        ui.label(
                            egui::RichText::new(truncate_path_left(path, avail_chars))
                                .size(12.0)
                                .color(color),
                        )
                        .on_hover_text(path);
                    }
                });
                row.col(|ui| {
                    if let Some(class) = event.classification {
                        ui.label(egui::RichText::new(class.label()).size(11.0).color(color));
                    }
                });
            });
        });
}

/// Truncate a path from the left so it fits within `max_chars` characters.
///
/// Keeps the file name visible. Counts characters rather than bytes so
/// multi-byte names cannot split a code point.
fn truncate_path_left(path: &str, max_chars: usize) -> String {
    let char_count = path.chars().count();
    if char_count <= max_chars {
        return path.to_owned();
    }
    // Keep the rightmost (max_chars - 4) chars so the ".../" prefix fits.
    let keep = max_chars.saturating_sub(4);
    let skip = char_count.saturating_sub(keep);
    let byte_start = path
        .char_indices()
        .nth(skip)
        .map(|(i, _)| i)
        .unwrap_or(path.len());
    format!(".../{}", &path[byte_start..])
}
