use crate::adapters::instance::SqlInstance;
use crate::adapters::rest::RestClient;
use crate::domain::ports::ResultFetcher;
use crate::utils::error::Result;
use async_trait::async_trait;

/// Reads the CSV result of a finished instance when rows are first needed.
pub struct InstanceResultFetcher {
    client: RestClient,
    instance: SqlInstance,
}

impl InstanceResultFetcher {
    pub fn new(client: RestClient, instance: SqlInstance) -> Self {
        Self { client, instance }
    }
}

#[async_trait]
impl ResultFetcher for InstanceResultFetcher {
    async fn fetch_result(&self) -> Result<String> {
        tracing::debug!("Downloading result of instance {}", self.instance.id);
        self.client.task_result(&self.instance).await
    }
}
