pub mod controller;
pub mod engine;
pub mod monitor;
pub mod state;

pub use controller::TrackerController;
pub use engine::TrackerEngine;
pub use monitor::MidiMonitor;
pub use state::TrackerState;
