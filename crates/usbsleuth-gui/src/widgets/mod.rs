/// UI widgets for UsbSleuth.
pub mod status_bar;
pub mod toolbar;
