// Adapters layer: concrete implementations for external systems (eAPI transport, EOS devices).

pub mod device;
pub mod eapi;
