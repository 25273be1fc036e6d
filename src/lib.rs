pub mod adapters;
pub mod checks;
pub mod config;
pub mod core;
pub mod domain;
pub mod reporter;
pub mod utils;

pub use adapters::device::{AsyncEosDevice, DeviceOptions};
pub use config::RunSettings;
pub use core::{AntaCatalog, AntaInventory, ResultManager, RunOptions};
pub use domain::model::{AntaCommand, AntaTemplate, TestResult, TestStatus};
pub use domain::ports::{AntaDevice, AntaTest};
pub use utils::error::{AntaError, Result};
