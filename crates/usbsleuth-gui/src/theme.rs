/// Colour scheme for UsbSleuth.
///
/// All status and classification colours are defined here so the panels
/// reference semantically-named values rather than raw hex codes.
use egui::Color32;
use usbsleuth_core::analysis::Classification;
use usbsleuth_core::lifecycle::DeviceStatus;
use usbsleuth_core::model::{DeviceEvent, EventKind};

/// Semantic colour palette.
pub struct UsbSleuthTheme {
    pub text_muted: Color32,
    pub accent: Color32,
    pub error: Color32,
    pub warning: Color32,
    pub success: Color32,
    /// Background tint for suspicious rows.
    pub danger_row: Color32,
}

impl UsbSleuthTheme {
    /// Dark theme - the default.
    pub fn dark() -> Self {
        Self {
            text_muted: Color32::from_rgb(0x6c, 0x70, 0x86),
            accent: Color32::from_rgb(0x89, 0xb4, 0xfa),
            error: Color32::from_rgb(0xf3, 0x8b, 0xa8),
            warning: Color32::from_rgb(0xfa, 0xb3, 0x87),
            success: Color32::from_rgb(0xa6, 0xe3, 0xa1),
            danger_row: Color32::from_rgba_premultiplied(0x60, 0x20, 0x2c, 0x60),
        }
    }

    pub fn light() -> Self {
        Self {
            text_muted: Color32::from_rgb(0x8a, 0x8a, 0x9a),
            accent: Color32::from_rgb(0x3a, 0x6f, 0xd8),
            error: Color32::from_rgb(0xd0, 0x40, 0x50),
            warning: Color32::from_rgb(0xd0, 0x80, 0x20),
            success: Color32::from_rgb(0x30, 0x98, 0x30),
            danger_row: Color32::from_rgba_premultiplied(0xf0, 0xc0, 0xc8, 0x80),
        }
    }

    pub fn for_visuals(visuals: &egui::Visuals) -> Self {
        if visuals.dark_mode {
            Self::dark()
        } else {
            Self::light()
        }
    }

    pub fn status_color(&self, status: DeviceStatus) -> Color32 {
        match status {
            DeviceStatus::Discovered | DeviceStatus::Analyzing => self.accent,
            DeviceStatus::Safe => self.success,
            DeviceStatus::Flagged => self.error,
            DeviceStatus::Disconnected => self.text_muted,
        }
    }

    /// Text colour for one event-table row.
    pub fn event_color(&self, event: &DeviceEvent, normal: Color32) -> Color32 {
        match (event.kind, event.classification) {
            (EventKind::Flagged, _) | (_, Some(Classification::Suspicious)) => self.error,
            (EventKind::Safe, _) => self.success,
            (EventKind::Deleted, _) => self.warning,
            (EventKind::Disconnected, _) => self.text_muted,
            _ => normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flagged_and_safe_use_distinct_colours() {
        let theme = UsbSleuthTheme::dark();
        assert_ne!(
            theme.status_color(DeviceStatus::Flagged),
            theme.status_color(DeviceStatus::Safe)
        );
    }

    #[test]
    fn suspicious_created_rows_are_red() {
        let theme = UsbSleuthTheme::light();
        let event = DeviceEvent::created("E:\\", "STICK", "x.exe", Classification::Suspicious);
        assert_eq!(theme.event_color(&event, Color32::WHITE), theme.error);
        let benign = DeviceEvent::created("E:\\", "STICK", "x.txt", Classification::Benign);
        assert_eq!(theme.event_color(&benign, Color32::WHITE), Color32::WHITE);
    }
}
