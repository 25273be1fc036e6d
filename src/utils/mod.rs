pub mod error;
pub mod logger;
pub mod monitor;
pub mod tools;
pub mod validation;
