use derive_more::Display;
use serde::Deserialize;


/// Value of the `update` flag that turns the invocation into a no-op.
pub const SUPPRESS_UPDATE: &str = "False";

/// HTTP method as seen by the handler
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum Method {
    #[display("GET")]
    Get,
    #[display("POST")]
    Post,
    /// Anything else, kept verbatim
    #[display("{_0}")]
    Other(String),
}

impl Method {
    /// Methods are matched exactly, the way the gateway forwards them.
    pub fn parse(method: &str) -> Self {
        match method {
            "GET" => Method::Get,
            "POST" => Method::Post,
            other => Method::Other(other.to_string()),
        }
    }
}

/// Gateway-shaped invocation event. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RequestEvent {
    #[serde(rename = "httpMethod")]
    pub http_method: String,
    /// Optional control flag; only the string [`SUPPRESS_UPDATE`] has meaning
    #[serde(default)]
    pub update: Option<serde_json::Value>,
}

impl RequestEvent {
    pub fn new(http_method: impl Into<String>) -> Self {
        Self {
            http_method: http_method.into(),
            update: None,
        }
    }

    #[cfg(test)]
    pub fn with_update(mut self, update: impl Into<String>) -> Self {
        self.update = Some(serde_json::Value::String(update.into()));
        self
    }

    /// Parse a raw JSON event
    pub fn from_slice(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    /// Build the event the gateway would send for an HTTP request
    pub fn from_http<B>(req: &hyper::Request<B>) -> Self {
        let mut event = Self::new(req.method().as_str());
        event.update = req
            .uri()
            .query()
            .and_then(|query| query_param(query, "update"))
            .map(serde_json::Value::String);
        event
    }

    pub fn method(&self) -> Method {
        Method::parse(&self.http_method)
    }

    /// True when the flag is present and is exactly the sentinel string.
    pub fn suppresses_update(&self) -> bool {
        matches!(&self.update, Some(serde_json::Value::String(s)) if s == SUPPRESS_UPDATE)
    }
}

/// First value of a query string parameter, percent-decoded
fn query_param(query: &str, name: &str) -> Option<String> {
    form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
