use tracing::field::Empty;
use tracing::Span;
use uuid::Uuid;

const OPERATION_ID_LENGTH: usize = 10;

/// Diagnostic context of a single operation (one HTTP request, one scheduled tick).
///
/// Every log line emitted while the operation runs should carry the same
/// operation id, so the context is turned into a tracing span with
/// [`OperationContext::span`] and the operation is instrumented with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationContext {
    operation_id: String,
    operation_name: Option<String>,
    correlation_id: Option<String>,
    request_method: Option<String>,
    request_uri: Option<String>,
    client_ip: Option<String>,
}

impl OperationContext {
    /// A context with a fresh random operation id.
    pub fn new() -> Self {
        let mut operation_id = Uuid::new_v4().simple().to_string();
        operation_id.truncate(OPERATION_ID_LENGTH);
        Self {
            operation_id,
            operation_name: None,
            correlation_id: None,
            request_method: None,
            request_uri: None,
            client_ip: None,
        }
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Correlation id supplied by the client; unlike the operation id it may
    /// span several requests.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_request_method(mut self, method: impl Into<String>) -> Self {
        self.request_method = Some(method.into());
        self
    }

    pub fn with_request_uri(mut self, uri: impl Into<String>) -> Self {
        self.request_uri = Some(uri.into());
        self
    }

    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    /// Id to pass on when talking to other services: the client's
    /// correlation id if there is one, the operation id otherwise.
    pub fn correlation_id(&self) -> &str {
        self.correlation_id.as_deref().unwrap_or(&self.operation_id)
    }

    /// Span carrying every populated field of this context.
    pub fn span(&self) -> Span {
        let span = tracing::info_span!(
            "operation",
            operation_id = %self.operation_id,
            operation = Empty,
            correlation_id = Empty,
            http = Empty,
            uri = Empty,
            client_ip = Empty,
        );
        if let Some(name) = &self.operation_name {
            span.record("operation", name.as_str());
        }
        if let Some(correlation_id) = &self.correlation_id {
            span.record("correlation_id", correlation_id.as_str());
        }
        if let Some(method) = &self.request_method {
            span.record("http", method.as_str());
        }
        if let Some(uri) = &self.request_uri {
            span.record("uri", uri.as_str());
        }
        if let Some(client_ip) = &self.client_ip {
            span.record("client_ip", client_ip.as_str());
        }
        span
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}
