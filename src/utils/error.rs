use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection to {endpoint} failed: {message}")]
    ConnectionError { endpoint: String, message: String },

    #[error("Invalid datasource '{uri}': {reason}")]
    InvalidDatasourceError { uri: String, reason: String },

    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Service error (HTTP {status}, {code}): {message}")]
    ServiceError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Instance {instance_id} did not finish within {waited_secs}s")]
    TimeoutError { instance_id: String, waited_secs: u64 },

    #[error("Connection is closed")]
    ClosedError,

    #[error("XML decoding error: {0}")]
    XmlError(#[from] quick_xml::DeError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Decoding error: {message}")]
    DecodeError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connection,
    Network,
    Service,
    Data,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl DbError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            DbError::ConnectionError { .. }
            | DbError::InvalidDatasourceError { .. }
            | DbError::ClosedError => ErrorCategory::Connection,
            DbError::ApiError(_) | DbError::TimeoutError { .. } => ErrorCategory::Network,
            DbError::ServiceError { .. } => ErrorCategory::Service,
            DbError::XmlError(_)
            | DbError::CsvError(_)
            | DbError::SerializationError(_)
            | DbError::DecodeError { .. } => ErrorCategory::Data,
            DbError::ConfigError { .. }
            | DbError::InvalidConfigValueError { .. }
            | DbError::MissingConfigError { .. } => ErrorCategory::Configuration,
            DbError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DbError::TimeoutError { .. } => ErrorSeverity::Medium,
            DbError::ApiError(e) if e.is_timeout() || e.is_connect() => ErrorSeverity::Medium,
            DbError::ServiceError { status, .. } if *status >= 500 => ErrorSeverity::Medium,
            DbError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// True when the service rejected or failed the statement itself, as
    /// opposed to transport, authentication or server-side outages.
    pub fn is_statement_failure(&self) -> bool {
        matches!(
            self,
            DbError::ServiceError { status, .. }
                if *status < 500 && *status != 401 && *status != 403
        )
    }

    pub fn is_connection_error(&self) -> bool {
        self.category() == ErrorCategory::Connection
    }

    /// Whether the same request may succeed if sent again.
    pub fn is_retryable(&self) -> bool {
        match self {
            DbError::ApiError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            DbError::ServiceError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether a non-idempotent request may be sent again: the first one
    /// never reached the server, or the server answered that it failed.
    pub fn is_safe_to_resend(&self) -> bool {
        match self {
            DbError::ApiError(e) => e.is_connect(),
            DbError::ServiceError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            DbError::ConnectionError { endpoint, .. } => {
                format!("Could not connect to MaxCompute at {}", endpoint)
            }
            DbError::InvalidDatasourceError { reason, .. } => {
                format!("The datasource is not valid: {}", reason)
            }
            DbError::ApiError(_) => "The request to MaxCompute failed".to_string(),
            DbError::ServiceError { code, message, .. } => {
                format!("MaxCompute rejected the request ({}): {}", code, message)
            }
            DbError::TimeoutError { instance_id, .. } => {
                format!("Statement {} is still running", instance_id)
            }
            DbError::ClosedError => "The connection has already been closed".to_string(),
            DbError::ConfigError { message } => format!("Configuration problem: {}", message),
            DbError::InvalidConfigValueError { field, reason, .. } => {
                format!("Setting {} is invalid: {}", field, reason)
            }
            DbError::MissingConfigError { field } => format!("Setting {} is required", field),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Connection => {
                "Check the access id, access key, endpoint and curr_project of the datasource"
            }
            ErrorCategory::Network => {
                "Check network connectivity, or raise the request timeout and maximum wait"
            }
            ErrorCategory::Service => "Check the SQL statement and the project permissions",
            ErrorCategory::Data => "The service returned data this client could not decode",
            ErrorCategory::Configuration => "Fix the configuration file or command-line flags",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
