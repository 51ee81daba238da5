pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use app::runner::{OutputFormat, RunOutcome, StatementRunner};
pub use config::{ClientOptions, ConnectorConfig};
pub use core::connection::MaxComputeConnection;
pub use domain::datasource::Datasource;
pub use domain::model::{Column, Row, Value};
pub use domain::ports::DbConnection;
pub use domain::result_set::ResultSet;
pub use utils::error::{DbError, Result};
