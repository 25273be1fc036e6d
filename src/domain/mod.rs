// Domain layer: commands, results and the device/test seams.

pub mod model;
pub mod ports;
