/// Main content panels.
pub mod device_panel;
pub mod event_panel;
