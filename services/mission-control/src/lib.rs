pub mod config;
pub mod roster;

pub use config::Config;
pub use roster::{RosterCallbacks, RoverRecord};
