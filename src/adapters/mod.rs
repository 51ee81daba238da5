// Adapters layer: the MaxCompute REST protocol behind the domain ports.

pub mod instance;
pub mod payload;
pub mod rest;
pub mod signer;
