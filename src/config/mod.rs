#[cfg(feature = "cli")]
pub mod cli;
pub mod options;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use options::ClientOptions;
pub use toml_config::ConnectorConfig;
