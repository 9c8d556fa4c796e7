use std::collections::BTreeMap;
use std::io;

use serde::Serialize;
use serde_json::ser::Formatter;

/// Result of one invocation, in the shape the gateway maps back to HTTP
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseResult {
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    /// JSON document carried as a string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Body of the success paths
#[derive(Debug, Serialize)]
pub struct CountBody<'a> {
    pub message: &'a str,
    pub count: u64,
}

/// Body of the error paths
#[derive(Debug, Serialize)]
pub struct MessageBody<'a> {
    pub message: &'a str,
}

impl ResponseResult {
    /// Response with a status code and nothing else
    pub fn status(status_code: u16) -> Self {
        Self {
            status_code,
            headers: None,
            body: None,
        }
    }

    /// Response whose body is `data` rendered by [`to_body`]
    pub fn json<T: Serialize>(status_code: u16, data: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            status_code,
            headers: None,
            body: Some(to_body(data)?),
        })
    }

    /// 200 with message and count
    pub fn count(message: &str, count: u64) -> Result<Self, serde_json::Error> {
        Self::json(200, &CountBody { message, count })
    }

    /// Error status with a message body
    pub fn error(status_code: u16, message: &str) -> Result<Self, serde_json::Error> {
        Self::json(status_code, &MessageBody { message })
    }

    pub fn with_headers(mut self, headers: &BTreeMap<String, String>) -> Self {
        if !headers.is_empty() {
            self.headers
                .get_or_insert_with(BTreeMap::new)
                .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self
    }

    /// Compact JSON of the whole result
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// CORS headers attached to every response when an origin is configured
pub fn cors_headers(allow_origin: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "Access-Control-Allow-Headers".to_string(),
            "Content-Type".to_string(),
        ),
        (
            "Access-Control-Allow-Origin".to_string(),
            allow_origin.to_string(),
        ),
        (
            "Access-Control-Allow-Methods".to_string(),
            "OPTIONS,POST,GET".to_string(),
        ),
    ])
}

/// Render a body with `", "` and `": "` separators, which is the text
/// existing clients of the counter endpoint receive.
pub fn to_body<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    data.serialize(&mut ser)?;
    // serde_json only ever writes valid utf-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}
