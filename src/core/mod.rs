pub mod cache;
pub mod catalog;
pub mod inventory;
pub mod result_manager;
pub mod runner;
#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{AntaCatalog, AntaTestDefinition};
pub use inventory::AntaInventory;
pub use result_manager::ResultManager;
pub use runner::RunOptions;
