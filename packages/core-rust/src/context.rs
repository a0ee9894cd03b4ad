use crate::datasource::DatasourceRef;
use crate::types::Principal;

/// Per-request context built by the transport layer and read by the dispatcher
/// and backends. Never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Request identifier (the `x-request-id` header value).
    pub request_id: String,
    /// Authenticated caller, if any.
    pub principal: Option<Principal>,
    /// Organisation the caller acts in.
    pub org_id: i64,
    /// Raw `recipient` path segment naming the target resource.
    pub recipient: Option<String>,
    /// HTTP method of the inbound request.
    pub method: String,
    /// Matched route path of the inbound request.
    pub path: String,
    /// Decoded query string pairs in request order. Repeated keys such as
    /// `match[]` keep every value.
    pub query: Vec<(String, String)>,
}

impl RequestContext {
    /// Creates a context addressed at `recipient` with every other field defaulted.
    #[must_use]
    pub fn for_recipient(recipient: impl Into<String>) -> Self {
        Self {
            recipient: Some(recipient.into()),
            ..Self::default()
        }
    }

    /// Parses the target resource reference.
    ///
    /// Returns `None` when the recipient is absent or malformed.
    #[must_use]
    pub fn datasource_ref(&self) -> Option<DatasourceRef> {
        self.recipient.as_deref().and_then(DatasourceRef::parse)
    }

    /// First value of a query string parameter.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}
