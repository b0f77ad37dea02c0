//! Turns one inbound exchange into an immutable [`CapturedRequest`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::types::{Body, CapturedRequest, HeaderList, InboundRequest};

/// Seconds since the Unix epoch, with microsecond precision.
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

/// Text when the payload is valid UTF-8, bytes otherwise, nothing when empty.
pub fn classify_body(payload: &[u8]) -> Body {
    if payload.is_empty() {
        return Body::Empty;
    }
    match std::str::from_utf8(payload) {
        Ok(text) => Body::Text(text.to_owned()),
        Err(_) => Body::Binary(payload.to_vec()),
    }
}

/// Last value wins for repeated names.
fn last_wins(pairs: &[(String, String)]) -> BTreeMap<String, String> {
    pairs.iter().cloned().collect()
}

/// Builds the record for `exchange` under the given `id`.
///
/// `headers` is the ordered header list after proxy filtering and `raw` the wire
/// reconstruction made from it, so the header map, the ordered list and the raw
/// bytes all describe the same set of headers. Any payload is accepted.
pub fn build_record<R: InboundRequest + ?Sized>(
    id: u64,
    exchange: &R,
    headers: HeaderList,
    raw: Option<Vec<u8>>,
    captured_at: DateTime<Utc>,
) -> CapturedRequest {
    let payload = exchange.body();
    CapturedRequest {
        id,
        method: exchange.method().to_owned(),
        path: exchange.path().to_owned(),
        ts: epoch_seconds(captured_at),
        ip: exchange.client_address().unwrap_or_default(),
        headers: last_wins(&headers),
        headers_ordered: headers,
        query: last_wins(&exchange.query_pairs()),
        body: classify_body(payload),
        body_length: payload.len(),
        raw,
    }
}
