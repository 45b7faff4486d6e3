// Configuration loading

pub mod ai;
pub mod settings;

pub use settings::{AIProvider, AISettings, Settings};
