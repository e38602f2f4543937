// Domain layer: entity models, ports (interfaces) and the status rules.

pub mod model;
pub mod ports;
pub mod status;
