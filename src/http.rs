//! HTTP client for the storefront backend.
//!
//! An `ApiClient` is a base URL plus a `Transport` plus an ordered chain of
//! `Interceptor`s. Two clients are configured per run: one for the general
//! API root and one for the admin-scoped root.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Errors surfaced by the client and the session core
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not authorized (session expired or invalid token)")]
    Unauthorized,
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {field}: {message}")]
    Invalid { field: String, message: String },
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// HTTP status carried by this error, if it came from the server
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized => Some(401),
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// One file part of a multipart form
#[derive(Debug, Clone)]
pub struct FilePart {
    pub name: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A `multipart/form-data` body
#[derive(Debug, Clone)]
pub struct Multipart {
    boundary: String,
    fields: Vec<(String, String)>,
    files: Vec<FilePart>,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    pub fn new() -> Self {
        Self {
            boundary: format!("----storefront{}", uuid::Uuid::new_v4().simple()),
            fields: Vec::new(),
            files: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.fields.push((name.to_string(), value.into()));
        self
    }

    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    #[cfg(test)]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[cfg(test)]
    pub fn files(&self) -> &[FilePart] {
        &self.files
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, value) in &self.fields {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            out.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    escape_quoted(name)
                )
                .as_bytes(),
            );
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        for file in &self.files {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            out.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                    escape_quoted(&file.name),
                    escape_quoted(&file.filename)
                )
                .as_bytes(),
            );
            out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
            out.extend_from_slice(&file.bytes);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

/// Percent-encode the characters that would end a quoted header parameter
/// or the header line itself, as browsers do for form-data names.
fn escape_quoted(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    Json(Value),
    Multipart(Multipart),
}

/// A fully addressed outgoing request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the client's base URL, kept for logging
    pub path: String,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl ApiRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
    }
}

/// Raw response: status plus body text, whatever the status
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a request. Non-2xx statuses are returned as `Ok`; only transport
/// failures are `Err`.
pub trait Transport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Hooks run around every request of the client they are attached to
pub trait Interceptor {
    fn before_request(&self, _request: &mut ApiRequest) {}
    fn on_response(&self, _request: &ApiRequest, _response: &ApiResponse, _elapsed: Duration) {}
    fn on_error(&self, _request: &ApiRequest, _error: &ApiError) {}
}

/// Real transport over `ureq`
pub struct UreqTransport {
    agent: ureq::Agent,
    timeout: Duration,
}

impl UreqTransport {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            agent: ureq::Agent::new(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut req = self
            .agent
            .request(request.method.as_str(), &request.url)
            .timeout(self.timeout)
            .set("Accept", "application/json");
        for (name, value) in &request.query {
            req = req.query(name, value);
        }
        for (name, value) in &request.headers {
            req = req.set(name, value);
        }

        let resp = match &request.body {
            Body::Empty => req.call(),
            Body::Json(value) => req
                .set("Content-Type", "application/json")
                .send_json(value.clone()),
            Body::Multipart(form) => req
                .set("Content-Type", &form.content_type())
                .send_bytes(&form.to_bytes()),
        };

        match resp {
            Ok(r) => {
                let status = r.status();
                let body = r
                    .into_string()
                    .map_err(|e| ApiError::Network(e.to_string()))?;
                Ok(ApiResponse { status, body })
            }
            Err(ureq::Error::Status(status, r)) => Ok(ApiResponse {
                status,
                body: r.into_string().unwrap_or_default(),
            }),
            Err(e) => Err(ApiError::Network(e.to_string())),
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// The backend answers with `{"error": ..}`, `{"detail": ..}`,
/// `{"message": ..}` or a field-error map; anything else is shown raw.
pub fn error_message(body: &str) -> String {
    let trimmed = body.trim();
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return trimmed.chars().take(200).collect();
    };
    for key in ["error", "detail", "message"] {
        if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
            return text.to_string();
        }
    }
    if let Some(map) = value.as_object() {
        let parts: Vec<String> = map
            .iter()
            .map(|(field, errors)| match errors {
                Value::Array(items) => {
                    let texts: Vec<&str> = items.iter().filter_map(|i| i.as_str()).collect();
                    format!("{}: {}", field, texts.join(" "))
                }
                other => format!("{}: {}", field, other),
            })
            .collect();
        if !parts.is_empty() {
            return parts.join("; ");
        }
    }
    trimmed.chars().take(200).collect()
}

fn check_status(response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() {
        return Ok(response);
    }
    if response.status == 401 {
        return Err(ApiError::Unauthorized);
    }
    Err(ApiError::Status {
        status: response.status,
        message: error_message(&response.body),
    })
}

fn decode<T: DeserializeOwned>(path: &str, response: &ApiResponse) -> Result<T, ApiError> {
    // DELETE and some actions answer 204 with no body
    let body = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };
    serde_json::from_str(body).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}

/// A configured client: base URL, transport and interceptor chain
pub struct ApiClient {
    base_url: String,
    transport: Rc<dyn Transport>,
    interceptors: Vec<Rc<dyn Interceptor>>,
}

impl ApiClient {
    pub fn new(base_url: &str, transport: Rc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
            interceptors: Vec::new(),
        }
    }

    pub fn with_interceptor(mut self, interceptor: Rc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub fn request(&self, method: Method, path: &str) -> ApiRequest {
        ApiRequest {
            method,
            path: path.to_string(),
            url: self.url_for(path),
            query: Vec::new(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    /// Run a request through the interceptor chain and the transport
    pub fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        for interceptor in &self.interceptors {
            interceptor.before_request(&mut request);
        }

        let started = Instant::now();
        let result = self.transport.send(&request).and_then(check_status);
        let elapsed = started.elapsed();

        match &result {
            Ok(response) => {
                for interceptor in &self.interceptors {
                    interceptor.on_response(&request, response, elapsed);
                }
            }
            Err(error) => {
                for interceptor in &self.interceptors {
                    interceptor.on_error(&request, error);
                }
            }
        }
        result
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_with_query(path, &[])
    }

    pub fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let mut request = self.request(Method::Get, path);
        request.query = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let response = self.execute(request)?;
        decode(path, &response)
    }

    pub fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let value = serde_json::to_value(body).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })?;
        let mut request = self.request(method, path);
        request.body = Body::Json(value);
        let response = self.execute(request)?;
        decode(path, &response)
    }

    pub fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(Method::Post, path, body)
    }

    pub fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(Method::Put, path, body)
    }

    pub fn send_multipart<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: Multipart,
    ) -> Result<T, ApiError> {
        let mut request = self.request(method, path);
        request.body = Body::Multipart(form);
        let response = self.execute(request)?;
        decode(path, &response)
    }

    /// DELETE without a body; the response body is ignored
    pub fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(self.request(Method::Delete, path))?;
        Ok(())
    }
}

/// The general and admin-scoped clients of one run
pub struct ApiClients {
    pub api: ApiClient,
    pub admin: ApiClient,
}

impl ApiClients {
    /// Build both clients over one transport with the same interceptor chain
    pub fn new(
        base_url: &str,
        admin_base_url: &str,
        transport: Rc<dyn Transport>,
        interceptors: &[Rc<dyn Interceptor>],
    ) -> Self {
        let mut api = ApiClient::new(base_url, transport.clone());
        let mut admin = ApiClient::new(admin_base_url, transport);
        for interceptor in interceptors {
            api = api.with_interceptor(interceptor.clone());
            admin = admin.with_interceptor(interceptor.clone());
        }
        Self { api, admin }
    }
}
