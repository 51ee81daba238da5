use crate::adapters::instance::SqlInstance;
use crate::adapters::rest::RestClient;
use crate::config::options::ClientOptions;
use crate::core::fetcher::InstanceResultFetcher;
use crate::domain::datasource::Datasource;
use crate::domain::ports::DbConnection;
use crate::domain::result_set::ResultSet;
use crate::utils::error::{DbError, Result};
use crate::utils::validation::Validate;
use async_trait::async_trait;
use std::sync::Mutex;

enum StatementOutcome {
    Succeeded(SqlInstance),
    Failed(String),
}

/// Connection to one MaxCompute project.
///
/// The service is stateless HTTP, so the "session" is the signed client;
/// closing drops it and every later call fails with `ClosedError`.
pub struct MaxComputeConnection {
    datasource: Datasource,
    client: Option<RestClient>,
    last_error: Mutex<Option<String>>,
}

impl MaxComputeConnection {
    pub async fn connect(datasource: Datasource) -> Result<Self> {
        Self::connect_with_options(datasource, ClientOptions::default()).await
    }

    pub async fn connect_uri(uri: &str) -> Result<Self> {
        Self::connect(Datasource::parse(uri)?).await
    }

    /// Validates the datasource and probes the project before handing out
    /// the connection.
    pub async fn connect_with_options(
        datasource: Datasource,
        options: ClientOptions,
    ) -> Result<Self> {
        datasource
            .validate()
            .map_err(|e| DbError::InvalidDatasourceError {
                uri: datasource.display_name(),
                reason: e.to_string(),
            })?;
        options.validate()?;

        let client = RestClient::new(&datasource, options)
            .map_err(|e| connection_error(&datasource, e))?;
        client
            .get_project(&datasource.project)
            .await
            .map_err(|e| connection_error(&datasource, e))?;

        tracing::info!("Connected to {}", datasource);
        Ok(Self {
            datasource,
            client: Some(client),
            last_error: Mutex::new(None),
        })
    }

    pub fn datasource(&self) -> &Datasource {
        &self.datasource
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_none()
    }

    fn client(&self) -> Result<&RestClient> {
        self.client.as_ref().ok_or(DbError::ClosedError)
    }

    async fn execute_statement(&self, client: &RestClient, sql: &str) -> Result<StatementOutcome> {
        let instance = match client.submit_sql(&self.datasource.project, sql).await {
            Ok(instance) => instance,
            Err(e) if e.is_statement_failure() => return Ok(StatementOutcome::Failed(e.to_string())),
            Err(e) => return Err(e),
        };

        let outcome = client.wait_for_completion(&instance).await?;
        if outcome.is_success() {
            return Ok(StatementOutcome::Succeeded(instance));
        }

        let detail = client.task_result(&instance).await?;
        let message = if detail.trim().is_empty() {
            format!("instance {} ended with status {}", instance.id, outcome.status)
        } else {
            detail.trim().to_string()
        };
        Ok(StatementOutcome::Failed(message))
    }

    fn set_last_error(&self, error: Option<String>) {
        let mut slot = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
        *slot = error;
    }

    /// `project.table` addresses another project; backticks are dropped.
    fn split_table_name<'a>(&'a self, table: &'a str) -> (&'a str, String) {
        let table = table.trim();
        match table.split_once('.') {
            Some((project, name)) => (project.trim_matches('`'), name.trim_matches('`').to_string()),
            None => (self.datasource.project.as_str(), table.trim_matches('`').to_string()),
        }
    }
}

#[async_trait]
impl DbConnection for MaxComputeConnection {
    async fn query(&self, sql: &str) -> Result<ResultSet> {
        let client = self.client()?;

        let instance = match self.execute_statement(client, sql).await? {
            StatementOutcome::Succeeded(instance) => instance,
            StatementOutcome::Failed(message) => {
                tracing::warn!("Query failed: {}", message);
                return Ok(ResultSet::failed(message));
            }
        };

        // the tunnel only serves select results; desc, show and explain
        // come back untyped from the text result
        let columns = match client.result_schema(&instance).await {
            Ok(columns) => columns,
            Err(e) if e.is_statement_failure() => {
                tracing::debug!("No result schema for {}: {}", instance.id, e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        Ok(ResultSet::lazy(
            columns,
            Box::new(InstanceResultFetcher::new(client.clone(), instance)),
        ))
    }

    async fn exec(&self, sql: &str) -> Result<bool> {
        let client = self.client()?;

        match self.execute_statement(client, sql).await? {
            StatementOutcome::Succeeded(instance) => {
                tracing::debug!("Statement {} succeeded", instance.id);
                self.set_last_error(None);
                Ok(true)
            }
            StatementOutcome::Failed(message) => {
                tracing::warn!("Statement failed: {}", message);
                self.set_last_error(Some(message));
                Ok(false)
            }
        }
    }

    async fn get_table_schema(&self, table: &str) -> Result<Vec<(String, String)>> {
        let client = self.client()?;
        let (project, name) = self.split_table_name(table);
        let columns = client.table_schema(project, &name).await?;
        Ok(columns.into_iter().map(|c| (c.name, c.type_name)).collect())
    }

    fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn close(&mut self) {
        if self.client.take().is_some() {
            tracing::info!("Closed connection to {}", self.datasource);
        }
    }
}

fn connection_error(datasource: &Datasource, error: DbError) -> DbError {
    let message = match &error {
        DbError::ServiceError { status: 401 | 403, message, .. } => {
            format!("authentication failed: {}", message)
        }
        DbError::ServiceError { status: 404, message, .. } => {
            format!("project '{}' not found: {}", datasource.project, message)
        }
        other => other.to_string(),
    };
    DbError::ConnectionError {
        endpoint: datasource.endpoint.clone(),
        message,
    }
}
