// Domain layer: connection contract, result model and datasource descriptor.

pub mod datasource;
pub mod model;
pub mod ports;
pub mod result_set;
