pub mod commands;
pub mod controller;
pub mod decode;
pub mod loop_worker;
pub mod state;

pub use controller::ScannerController;
pub use state::{ScannerState, ScannerStatus};
