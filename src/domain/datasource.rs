use crate::utils::error::{DbError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_url, Validate};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

const URI_SCHEMES: [&str; 2] = ["maxcompute", "odps"];

/// Where and as whom to reach the warehouse.
#[derive(Clone, PartialEq, Eq)]
pub struct Datasource {
    pub access_id: String,
    pub access_key: String,
    /// Service endpoint without trailing slash, e.g. `https://service.odps.aliyun.com/api`.
    pub endpoint: String,
    pub project: String,
    pub tunnel_endpoint: Option<String>,
}

fn uri_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // the key is greedy so it may contain '@'; the last '@' starts the address
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<scheme>[a-z]+)://(?P<id>[^:@/]*):(?P<key>.*)@(?P<addr>[^@?]+)(?:\?(?P<query>.*))?$")
            .expect("datasource pattern is valid")
    })
}

impl Datasource {
    pub fn new(
        access_id: impl Into<String>,
        access_key: impl Into<String>,
        endpoint: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            access_id: access_id.into(),
            access_key: access_key.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            project: project.into(),
            tunnel_endpoint: None,
        }
    }

    pub fn with_tunnel_endpoint(mut self, tunnel_endpoint: impl Into<String>) -> Self {
        self.tunnel_endpoint = Some(tunnel_endpoint.into().trim_end_matches('/').to_string());
        self
    }

    /// Parses `maxcompute://{id}:{key}@{host}/api?curr_project={project}&scheme=https`.
    pub fn parse(uri: &str) -> Result<Self> {
        let invalid = |reason: &str| DbError::InvalidDatasourceError {
            uri: redact_uri(uri),
            reason: reason.to_string(),
        };

        let caps = uri_pattern()
            .captures(uri.trim())
            .ok_or_else(|| invalid("expected maxcompute://{access_id}:{access_key}@{endpoint}?curr_project={project}"))?;

        let scheme = &caps["scheme"];
        if !URI_SCHEMES.iter().any(|s| *s == scheme) {
            return Err(invalid(&format!("unsupported driver '{}'", scheme)));
        }

        let mut project = None;
        let mut http_scheme = "http".to_string();
        let mut tunnel_endpoint = None;
        if let Some(query) = caps.name("query") {
            for (key, value) in url::form_urlencoded::parse(query.as_str().as_bytes()) {
                match &*key {
                    "curr_project" => project = Some(value.into_owned()),
                    "scheme" => http_scheme = value.into_owned(),
                    "tunnel_endpoint" => tunnel_endpoint = Some(value.into_owned()),
                    other => tracing::debug!("Ignoring datasource parameter '{}'", other),
                }
            }
        }

        if http_scheme != "http" && http_scheme != "https" {
            return Err(invalid(&format!("scheme must be http or https, got '{}'", http_scheme)));
        }

        let mut datasource = Datasource::new(
            &caps["id"],
            &caps["key"],
            format!("{}://{}", http_scheme, &caps["addr"]),
            project.ok_or_else(|| invalid("missing curr_project parameter"))?,
        );
        if let Some(tunnel) = tunnel_endpoint {
            datasource = datasource.with_tunnel_endpoint(tunnel);
        }

        datasource.validate().map_err(|e| invalid(&e.to_string()))?;
        Ok(datasource)
    }

    pub fn tunnel_endpoint(&self) -> &str {
        self.tunnel_endpoint.as_deref().unwrap_or(&self.endpoint)
    }

    /// `access_id@endpoint/project`, safe to print.
    pub fn display_name(&self) -> String {
        format!("{}@{}/{}", self.access_id, self.endpoint, self.project)
    }
}

impl Validate for Datasource {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("access_id", &self.access_id)?;
        validate_non_empty_string("access_key", &self.access_key)?;
        validate_non_empty_string("curr_project", &self.project)?;
        validate_url("endpoint", &self.endpoint)?;
        if let Some(tunnel) = &self.tunnel_endpoint {
            validate_url("tunnel_endpoint", tunnel)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Datasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Datasource")
            .field("access_id", &self.access_id)
            .field("access_key", &"***")
            .field("endpoint", &self.endpoint)
            .field("project", &self.project)
            .field("tunnel_endpoint", &self.tunnel_endpoint)
            .finish()
    }
}

impl fmt::Display for Datasource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Masks the access key of a datasource URI for error messages and logs.
pub fn redact_uri(uri: &str) -> String {
    match uri_pattern().captures(uri.trim()) {
        Some(caps) => {
            let mut redacted = format!("{}://{}:***@{}", &caps["scheme"], &caps["id"], &caps["addr"]);
            if let Some(query) = caps.name("query") {
                redacted.push('?');
                redacted.push_str(query.as_str());
            }
            redacted
        }
        None => "<unparseable datasource>".to_string(),
    }
}
