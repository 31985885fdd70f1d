/// UsbSleuth GUI - egui-based desktop frontend.
///
/// This crate contains all UI code. Detection logic lives in `usbsleuth-core`.
pub mod app;
pub mod panels;
pub mod state;
pub mod theme;
pub mod widgets;

pub use app::{UsbSleuthApp, UsbSleuthState};
