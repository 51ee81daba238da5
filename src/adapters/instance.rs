//! Lifecycle of a SQL instance: submit, wait, read result and schema.

use crate::adapters::payload::{
    sql_task_xml, DownloadSessionJson, InstanceXml, SchemaJson, TableXml, TASK_SUCCESS,
};
use crate::adapters::rest::{ApiRequest, RestClient};
use crate::domain::model::Column;
use crate::utils::error::{DbError, Result};
use std::time::Instant;

/// Header selecting the instance tunnel protocol revision.
const TUNNEL_VERSION_HEADER: &str = "x-odps-tunnel-version";
const TUNNEL_VERSION: &str = "5";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlInstance {
    pub project: String,
    pub id: String,
}

impl SqlInstance {
    fn resource(&self) -> String {
        format!("/projects/{}/instances/{}", self.project, self.id)
    }
}

/// Final status of the SQL task, e.g. `Success`, `Failed` or `Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub status: String,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.status == TASK_SUCCESS
    }
}

impl RestClient {
    /// Checks that the project exists and the credentials may read it.
    pub async fn get_project(&self, project: &str) -> Result<()> {
        self.send(&ApiRequest::get(format!("/projects/{}", project)))
            .await?;
        Ok(())
    }

    pub async fn submit_sql(&self, project: &str, sql: &str) -> Result<SqlInstance> {
        let body = sql_task_xml(sql, &self.options().settings_json()?, self.options().priority);
        let request = ApiRequest::post(format!("/projects/{}/instances", project))
            .non_idempotent()
            .body("application/xml", body);

        let response = self.send(&request).await?;
        let location = response.location.ok_or_else(|| DbError::DecodeError {
            message: "instance creation returned no Location header".to_string(),
        })?;
        let id = location
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DbError::DecodeError {
                message: format!("cannot read instance id from '{}'", location),
            })?;

        tracing::debug!("Submitted instance {} in project {}", id, project);
        Ok(SqlInstance {
            project: project.to_string(),
            id: id.to_string(),
        })
    }

    /// Polls until the instance terminates or the maximum wait runs out.
    pub async fn wait_for_completion(&self, instance: &SqlInstance) -> Result<TaskOutcome> {
        let started = Instant::now();
        let request = ApiRequest::get(instance.resource()).param("taskstatus", "");

        loop {
            let response = self.send(&request).await?;
            let status = InstanceXml::parse(&response.body)?;

            if status.is_terminated() {
                let task_status = status
                    .sql_task()
                    .and_then(|task| task.status.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                tracing::debug!("Instance {} terminated: {}", instance.id, task_status);
                return Ok(TaskOutcome {
                    status: task_status,
                });
            }

            let waited = started.elapsed();
            if waited >= self.options().max_wait {
                return Err(DbError::TimeoutError {
                    instance_id: instance.id.clone(),
                    waited_secs: waited.as_secs(),
                });
            }
            tokio::time::sleep(self.options().poll_interval).await;
        }
    }

    /// Text result of the SQL task: CSV rows on success, the error otherwise.
    pub async fn task_result(&self, instance: &SqlInstance) -> Result<String> {
        let request = ApiRequest::get(instance.resource()).param("result", "");
        let response = self.send(&request).await?;
        let parsed = InstanceXml::parse(&response.body)?;

        match parsed.sql_task().and_then(|task| task.result.as_ref()) {
            Some(result) => result.decoded_text(),
            None => Ok(String::new()),
        }
    }

    /// Column names and types of a finished query, read from a tunnel
    /// download session.
    pub async fn result_schema(&self, instance: &SqlInstance) -> Result<Vec<Column>> {
        let request = ApiRequest::post(instance.resource())
            .to_tunnel()
            .param("downloads", "")
            .header(TUNNEL_VERSION_HEADER, TUNNEL_VERSION);
        let response = self.send(&request).await?;
        let session: DownloadSessionJson = serde_json::from_str(&response.body)?;

        tracing::debug!(
            "Download session {:?} for instance {}: {:?} records",
            session.download_id,
            instance.id,
            session.record_count
        );
        Ok(session.schema.columns)
    }

    pub async fn table_schema(&self, project: &str, table: &str) -> Result<Vec<Column>> {
        let request = ApiRequest::get(format!("/projects/{}/tables/{}", project, table));
        let response = self.send(&request).await?;
        let meta: TableXml = quick_xml::de::from_str(&response.body)?;
        let schema: SchemaJson = serde_json::from_str(&meta.schema)?;

        tracing::debug!(
            "Table {} has {} columns",
            meta.name.as_deref().unwrap_or(table),
            schema.columns.len()
        );
        Ok(schema.columns)
    }
}
