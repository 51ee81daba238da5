//! Request and response bodies of the REST API.

use crate::domain::model::Column;
use crate::utils::error::{DbError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

pub const SQL_TASK_NAME: &str = "AnonymousSQLTask";
pub const INSTANCE_TERMINATED: &str = "Terminated";
pub const TASK_SUCCESS: &str = "Success";

/// `Instance` document returned by `?taskstatus` and `?result`.
#[derive(Debug, Default, Deserialize)]
pub struct InstanceXml {
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
    #[serde(rename = "Tasks", default)]
    pub tasks: TasksXml,
}

#[derive(Debug, Default, Deserialize)]
pub struct TasksXml {
    #[serde(rename = "Task", default)]
    pub items: Vec<TaskXml>,
}

#[derive(Debug, Deserialize)]
pub struct TaskXml {
    #[serde(rename = "@Type", default)]
    pub kind: Option<String>,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
    #[serde(rename = "Result", default)]
    pub result: Option<TaskResultXml>,
}

#[derive(Debug, Deserialize)]
pub struct TaskResultXml {
    #[serde(rename = "@Transform", default)]
    pub transform: Option<String>,
    #[serde(rename = "@Format", default)]
    pub format: Option<String>,
    #[serde(rename = "$text", default)]
    pub text: String,
}

impl TaskResultXml {
    /// Result text with any base64 transport encoding removed.
    pub fn decoded_text(&self) -> Result<String> {
        match self.transform.as_deref() {
            Some(t) if t.eq_ignore_ascii_case("base64") => {
                let compact: String = self.text.split_whitespace().collect();
                let bytes = STANDARD.decode(compact).map_err(|e| DbError::DecodeError {
                    message: format!("invalid base64 task result: {}", e),
                })?;
                String::from_utf8(bytes).map_err(|e| DbError::DecodeError {
                    message: format!("task result is not UTF-8: {}", e),
                })
            }
            _ => Ok(self.text.clone()),
        }
    }
}

impl InstanceXml {
    pub fn parse(body: &str) -> Result<Self> {
        Ok(quick_xml::de::from_str(body)?)
    }

    /// The SQL task, or the only task when it carries another name.
    pub fn sql_task(&self) -> Option<&TaskXml> {
        self.tasks
            .items
            .iter()
            .find(|t| t.name == SQL_TASK_NAME)
            .or_else(|| self.tasks.items.first())
    }

    pub fn is_terminated(&self) -> bool {
        self.status.as_deref() == Some(INSTANCE_TERMINATED)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ErrorXml {
    #[serde(rename = "Code", default)]
    pub code: Option<String>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
    #[serde(rename = "RequestId", default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TableXml {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,
    #[serde(rename = "Schema")]
    pub schema: String,
}

/// Table or result schema as JSON.
#[derive(Debug, Default, Deserialize)]
pub struct SchemaJson {
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// Instance tunnel download session.
#[derive(Debug, Deserialize)]
pub struct DownloadSessionJson {
    #[serde(rename = "DownloadID", default)]
    pub download_id: Option<String>,
    #[serde(rename = "RecordCount", default)]
    pub record_count: Option<u64>,
    #[serde(rename = "Schema", default)]
    pub schema: SchemaJson,
}

/// Job document submitting `sql` as a single SQL task.
pub fn sql_task_xml(sql: &str, settings_json: &str, priority: u32) -> String {
    let mut statement = sql.trim().to_string();
    if !statement.ends_with(';') {
        statement.push(';');
    }
    // a literal "]]>" would end the CDATA section early
    let statement = statement.replace("]]>", "]]]]><![CDATA[>");
    let settings = quick_xml::escape::escape(settings_json);

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Instance>
<Job>
<Priority>{priority}</Priority>
<Tasks>
<SQL>
<Name>{name}</Name>
<Config>
<Property>
<Name>settings</Name>
<Value>{settings}</Value>
</Property>
</Config>
<Query><![CDATA[{statement}]]></Query>
</SQL>
</Tasks>
</Job>
</Instance>
"#,
        priority = priority,
        name = SQL_TASK_NAME,
        settings = settings,
        statement = statement,
    )
}
