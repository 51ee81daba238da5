use crate::adapters::payload::ErrorXml;
use crate::adapters::signer::{http_date, Signer};
use crate::config::options::ClientOptions;
use crate::domain::datasource::Datasource;
use crate::utils::error::{DbError, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, DATE, LOCATION};
use reqwest::{Client, Method, StatusCode};
use std::sync::Arc;

/// Which host a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Service,
    Tunnel,
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub endpoint: Endpoint,
    /// Path relative to the endpoint, e.g. `/projects/p/instances`.
    pub resource: String,
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<(String, String)>,
    /// False for requests that create something on the server.
    pub idempotent: bool,
}

impl ApiRequest {
    pub fn new(method: Method, resource: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: Endpoint::Service,
            resource: resource.into(),
            params: Vec::new(),
            headers: Vec::new(),
            body: None,
            idempotent: true,
        }
    }

    pub fn get(resource: impl Into<String>) -> Self {
        Self::new(Method::GET, resource)
    }

    pub fn post(resource: impl Into<String>) -> Self {
        Self::new(Method::POST, resource)
    }

    /// Marks the request as creating state, so a timed-out attempt is
    /// not sent again.
    pub fn non_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }

    pub fn to_tunnel(mut self) -> Self {
        self.endpoint = Endpoint::Tunnel;
        self
    }

    /// Adds a query parameter; an empty value is sent as a bare key.
    pub fn param(mut self, key: &str, value: &str) -> Self {
        self.params.push((key.to_string(), value.to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, content_type: &str, body: String) -> Self {
        self.body = Some((content_type.to_string(), body));
        self
    }

    fn query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| {
                let key: String = url::form_urlencoded::byte_serialize(k.as_bytes()).collect();
                if v.is_empty() {
                    key
                } else {
                    let value: String =
                        url::form_urlencoded::byte_serialize(v.as_bytes()).collect();
                    format!("{}={}", key, value)
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

/// Signed HTTP access to the service and tunnel endpoints.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    signer: Arc<Signer>,
    endpoint: String,
    tunnel_endpoint: String,
    options: Arc<ClientOptions>,
}

impl RestClient {
    pub fn new(datasource: &Datasource, options: ClientOptions) -> Result<Self> {
        let http = Client::builder()
            .timeout(options.request_timeout)
            .build()?;

        Ok(Self {
            http,
            signer: Arc::new(Signer::new(&datasource.access_id, &datasource.access_key)),
            endpoint: datasource.endpoint.clone(),
            tunnel_endpoint: datasource.tunnel_endpoint().to_string(),
            options: Arc::new(options),
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Sends the request, retrying transport failures and 5xx answers.
    ///
    /// A non-idempotent request is only sent again when the previous attempt
    /// could not connect or got a 5xx answer.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut attempt = 0;
        loop {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(e) if should_retry(request, &e) && attempt < self.options.retry_attempts => {
                    attempt += 1;
                    tracing::warn!(
                        "{} {} failed ({}), retry {}/{}",
                        request.method,
                        request.resource,
                        e,
                        attempt,
                        self.options.retry_attempts
                    );
                    tokio::time::sleep(self.options.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let base = match request.endpoint {
            Endpoint::Service => &self.endpoint,
            Endpoint::Tunnel => &self.tunnel_endpoint,
        };
        let mut url = format!("{}{}", base, request.resource);
        if !request.params.is_empty() {
            url.push('?');
            url.push_str(&request.query_string());
        }

        let date = http_date(chrono::Utc::now());
        let content_type = request
            .body
            .as_ref()
            .map(|(ct, _)| ct.as_str())
            .unwrap_or("");
        let canonical = Signer::canonical_resource(&request.resource, &request.params);
        let string_to_sign = Signer::string_to_sign(
            request.method.as_str(),
            "",
            content_type,
            &date,
            &request.headers,
            &canonical,
        );

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .header(DATE, &date)
            .header(AUTHORIZATION, self.signer.authorization(&string_to_sign)?);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some((content_type, body)) = &request.body {
            builder = builder.header(CONTENT_TYPE, content_type).body(body.clone());
        }

        tracing::debug!("{} {}", request.method, url);
        let response = builder.send().await?;
        let status = response.status();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        tracing::debug!("{} {} -> {}", request.method, request.resource, status);

        if !status.is_success() {
            return Err(service_error(status, &body));
        }

        Ok(ApiResponse {
            status,
            location,
            body,
        })
    }
}

fn should_retry(request: &ApiRequest, error: &DbError) -> bool {
    if request.idempotent {
        error.is_retryable()
    } else {
        error.is_safe_to_resend()
    }
}

fn service_error(status: StatusCode, body: &str) -> DbError {
    let parsed: ErrorXml = quick_xml::de::from_str(body).unwrap_or_default();
    let code = parsed
        .code
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
    let message = parsed
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status.to_string()
            } else {
                trimmed.to_string()
            }
        });

    if let Some(request_id) = parsed.request_id {
        tracing::debug!("Request {} failed with {}: {}", request_id, code, message);
    }

    DbError::ServiceError {
        status: status.as_u16(),
        code,
        message,
    }
}
