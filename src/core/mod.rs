pub mod connection;
pub mod fetcher;

pub use crate::domain::datasource::Datasource;
pub use crate::domain::model::{Column, Row, Value};
pub use crate::domain::ports::{DbConnection, ResultFetcher};
pub use crate::domain::result_set::ResultSet;
pub use crate::utils::error::Result;
