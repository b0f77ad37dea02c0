//! Best-effort HTTP/1.x wire text for a captured request.
//!
//! The output is what the request would have looked like on the wire given the
//! headers that survived proxy filtering: request line, one line per header in
//! received order, a blank line and the payload verbatim. Text parts are written
//! one byte per character so any header content serializes; characters above
//! U+00FF become `?`.

const CRLF: &[u8] = b"\r\n";
const REPLACEMENT: u8 = b'?';

/// Parts of a request needed to rebuild its wire form.
pub struct RawParts<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub version: &'a str,
    pub headers: &'a [(String, String)],
    pub body: &'a [u8],
}

/// Builds the wire-level byte stream. Never fails.
pub fn reconstruct(parts: &RawParts<'_>) -> Vec<u8> {
    let header_bytes: usize = parts
        .headers
        .iter()
        .map(|(name, value)| name.len() + value.len() + 4)
        .sum();
    let mut raw = Vec::with_capacity(64 + header_bytes + parts.body.len());

    push_single_byte(&mut raw, parts.method);
    raw.push(b' ');
    push_single_byte(&mut raw, parts.path);
    if let Some(query) = parts.query.filter(|q| !q.is_empty()) {
        raw.push(b'?');
        push_single_byte(&mut raw, query);
    }
    raw.extend_from_slice(b" HTTP/");
    push_single_byte(&mut raw, parts.version);
    raw.extend_from_slice(CRLF);

    for (name, value) in parts.headers {
        push_single_byte(&mut raw, name);
        raw.extend_from_slice(b": ");
        push_single_byte(&mut raw, value);
        raw.extend_from_slice(CRLF);
    }

    raw.extend_from_slice(CRLF);
    raw.extend_from_slice(parts.body);
    raw
}

fn push_single_byte(out: &mut Vec<u8>, text: &str) {
    out.extend(text.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(REPLACEMENT)));
}
