use crate::domain::result_set::ResultSet;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Connection contract shared by the warehouse adapter and anything that
/// stands in for it.
#[async_trait]
pub trait DbConnection: Send + Sync {
    /// Runs a read query. Statement-level failures come back as a failed
    /// `ResultSet`; only transport, auth and lifecycle problems are `Err`.
    async fn query(&self, sql: &str) -> Result<ResultSet>;

    /// Runs DDL/DML. `Ok(false)` means the service failed the statement;
    /// the message is then available from `last_error`.
    async fn exec(&self, sql: &str) -> Result<bool>;

    /// Ordered `(name, type)` pairs of a table.
    async fn get_table_schema(&self, table: &str) -> Result<Vec<(String, String)>>;

    fn last_error(&self) -> Option<String>;

    /// Releases the session. Safe to call more than once.
    async fn close(&mut self);
}

/// Downloads the text body of a finished statement's result on demand.
#[async_trait]
pub trait ResultFetcher: Send + Sync {
    async fn fetch_result(&self) -> Result<String>;
}
