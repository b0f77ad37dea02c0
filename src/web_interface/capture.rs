//! Adapter from warp's request pieces to the transport-independent [`RawExchange`].

use std::net::SocketAddr;

use bytes::Buf;
use futures::{Stream, StreamExt};
use warp::http::{HeaderMap, Method};

use crate::data_capture::types::RawExchange;
use crate::error_handling::types::CaptureError;

/// Reads the whole request body, giving up as soon as it grows past `limit` bytes.
pub async fn read_body<S, B>(body: S, limit: usize) -> Result<Vec<u8>, CaptureError>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    futures::pin_mut!(body);
    let mut payload = Vec::new();
    while let Some(chunk) = body.next().await {
        let mut chunk = chunk.map_err(|e| CaptureError::BodyRead(e.to_string()))?;
        if payload.len() + chunk.remaining() > limit {
            return Err(CaptureError::PayloadTooLarge { limit });
        }
        while chunk.has_remaining() {
            let part = chunk.chunk();
            let len = part.len();
            payload.extend_from_slice(part);
            chunk.advance(len);
        }
    }
    Ok(payload)
}

/// Header bytes mapped one-to-one onto characters U+0000..=U+00FF.
fn single_byte_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Header pairs in received order.
///
/// `HeaderMap` keeps the first-seen order of distinct names and groups repeated
/// names together, so interleaved duplicates come out adjacent.
pub fn ordered_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                single_byte_text(value.as_bytes()),
            )
        })
        .collect()
}

pub fn exchange_from_parts(
    method: &Method,
    path: &str,
    query: String,
    headers: &HeaderMap,
    remote: Option<SocketAddr>,
    body: Vec<u8>,
) -> RawExchange {
    RawExchange {
        method: method.as_str().to_owned(),
        path: path.to_owned(),
        query: Some(query).filter(|q| !q.is_empty()),
        version: String::from("1.1"),
        client_address: remote.map(|addr| addr.ip().to_string()),
        headers: ordered_headers(headers),
        body,
    }
}
