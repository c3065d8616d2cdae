//! Correlation id resolution.
//!
//! A caller-supplied `X-Request-ID` is reused verbatim so that ids survive
//! hops between services. Otherwise a fresh id is drawn from the OS random
//! source: 8 bytes, hex-encoded, 16 characters. There is no collision check.

use std::fmt::Write as _;

use http::HeaderMap;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::context::RequestId;

/// Header carrying the correlation id, inbound and outbound.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const ID_BYTES: usize = 8;

/// Returns the inbound id if the header is present and non-empty, otherwise
/// a newly generated one.
///
/// Non-ASCII ids are kept, decoded as UTF-8 (invalid bytes become `U+FFFD`).
pub fn resolve(headers: &HeaderMap) -> RequestId {
    headers
        .get(REQUEST_ID_HEADER)
        .filter(|v| !v.is_empty())
        .map(|v| RequestId::new(String::from_utf8_lossy(v.as_bytes())))
        .unwrap_or_else(generate)
}

/// Generates a 16-character lowercase hex id.
///
/// A failing random source is ignored: whatever was written to the buffer is
/// used, all zeros in the worst case.
pub fn generate() -> RequestId {
    let mut bytes = [0u8; ID_BYTES];
    let _ = OsRng.try_fill_bytes(&mut bytes);
    RequestId::new(encode_hex(&bytes))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
