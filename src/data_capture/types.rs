//! Common data types used across the data_capture subsystem.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Ordered `(name, value)` header pairs, in wire order, duplicates kept.
pub type HeaderList = Vec<(String, String)>;

/// What the capture pipeline needs to know about one inbound HTTP exchange.
///
/// The web layer adapts its own request type into this; nothing below the web layer
/// depends on a transport library.
pub trait InboundRequest {
    fn method(&self) -> &str;

    /// Request path without the query string.
    fn path(&self) -> &str;

    /// Raw query string (without the leading `?`), if any.
    fn raw_query(&self) -> Option<&str>;

    /// Protocol version as written on the request line, e.g. `1.1`.
    fn http_version(&self) -> &str {
        "1.1"
    }

    /// Peer address, `None` when the transport does not know it.
    fn client_address(&self) -> Option<String>;

    /// Header pairs in the order they were received.
    fn headers(&self) -> &[(String, String)];

    fn body(&self) -> &[u8];

    /// Decoded query parameters, in order of appearance.
    fn query_pairs(&self) -> Vec<(String, String)> {
        match self.raw_query() {
            Some(query) => url::form_urlencoded::parse(query.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Owned, transport-independent inbound exchange.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawExchange {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub version: String,
    pub client_address: Option<String>,
    pub headers: HeaderList,
    pub body: Vec<u8>,
}

impl InboundRequest for RawExchange {
    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn raw_query(&self) -> Option<&str> {
        self.query.as_deref().filter(|q| !q.is_empty())
    }

    fn http_version(&self) -> &str {
        if self.version.is_empty() {
            "1.1"
        } else {
            &self.version
        }
    }

    fn client_address(&self) -> Option<String> {
        self.client_address.clone()
    }

    fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Stored payload: text when it decodes as UTF-8, raw bytes otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Body::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }
}

// Serialized as the two mutually exclusive fields `body_text` and `body_bytes_b64`.
impl Serialize for Body {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("body_text", &self.as_text())?;
        map.serialize_entry("body_bytes_b64", &self.as_binary().map(base64::encode))?;
        map.end()
    }
}

/// One captured HTTP request. Never mutated after it enters the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapturedRequest {
    /// Store-assigned identifier, strictly increasing in capture order
    pub id: u64,
    pub method: String,
    pub path: String,
    /// Capture time in seconds since the Unix epoch
    pub ts: f64,
    /// Client address, empty when unknown
    pub ip: String,
    /// Last-wins view of `headers_ordered`
    pub headers: BTreeMap<String, String>,
    /// Headers in wire order, duplicates kept
    pub headers_ordered: HeaderList,
    pub query: BTreeMap<String, String>,
    #[serde(flatten)]
    pub body: Body,
    /// Length of the original payload in bytes
    pub body_length: usize,
    /// Synthesized wire-level request, exported separately
    #[serde(skip)]
    pub raw: Option<Vec<u8>>,
}

/// Compact view of a capture used by listings and live notifications.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSummary {
    pub id: u64,
    pub method: String,
    pub path: String,
    pub ts: f64,
    pub ip: String,
    pub content_length: usize,
}

impl From<&CapturedRequest> for RequestSummary {
    fn from(request: &CapturedRequest) -> Self {
        Self {
            id: request.id,
            method: request.method.clone(),
            path: request.path.clone(),
            ts: request.ts,
            ip: request.ip.clone(),
            content_length: request.body_length,
        }
    }
}
