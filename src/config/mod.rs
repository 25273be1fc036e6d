pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod inventory;
pub mod settings;

pub use settings::RunSettings;
