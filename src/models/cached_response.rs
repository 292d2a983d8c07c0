//! Cached Response Model
//!
//! The record persisted for a completed request and replayed to later
//! requests that carry the same idempotency key.

use std::collections::BTreeMap;

use axum::{
    body::{Body, Bytes},
    http::{header::SET_COOKIE, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use futures::stream;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lowest status that is stored for replay.
pub const MIN_CACHEABLE_STATUS: u16 = 200;

/// Highest status that is stored for replay.
pub const MAX_CACHEABLE_STATUS: u16 = 226;

/// Joins values of headers that must stay separate lines. A newline can
/// never occur inside a header value.
const SPLIT_VALUE_SEPARATOR: &str = "\n";

// == Cached Response ==
/// Status, headers and ordered body chunks of a handler response.
///
/// Serialized as `{"status":201,"headers":{..},"response":["<base64>",..]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    #[serde(with = "base64_chunks")]
    pub response: Vec<Bytes>,
}

impl CachedResponse {
    // == Constructor ==
    /// Captures a response from its parts.
    ///
    /// Repeated header names are joined with `", "`, except `Set-Cookie`,
    /// whose values cannot be comma-joined; those are kept one per line and
    /// split again on replay. Values that are not visible ASCII are dropped
    /// since they cannot round-trip through a string map.
    pub fn from_parts(status: StatusCode, headers: &HeaderMap, response: Vec<Bytes>) -> Self {
        let mut map: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in headers {
            let Ok(value) = value.to_str() else {
                warn!(header = %name, "Skipping non-ASCII header value");
                continue;
            };
            let separator = if *name == SET_COOKIE {
                SPLIT_VALUE_SEPARATOR
            } else {
                ", "
            };
            map.entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(separator);
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        Self {
            status: status.as_u16(),
            headers: map,
            response,
        }
    }

    // == Cacheable ==
    /// Only successful statuses in [200, 226] are stored.
    pub fn is_cacheable(&self) -> bool {
        (MIN_CACHEABLE_STATUS..=MAX_CACHEABLE_STATUS).contains(&self.status)
    }

    // == Payload ==
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_payload(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }

    // == Into Response ==
    /// Rebuilds an HTTP response, optionally marking it with a replay header.
    pub fn into_response(self, replay_header: Option<&HeaderName>) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let mut response = Response::new(body_from_chunks(self.response));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, values) in &self.headers {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                warn!(header = %name, "Dropping unreplayable cached header");
                continue;
            };
            for value in values.split(SPLIT_VALUE_SEPARATOR) {
                match HeaderValue::from_str(value) {
                    Ok(value) => {
                        headers.append(name.clone(), value);
                    }
                    Err(_) => warn!(header = %name, "Dropping unreplayable cached header value"),
                }
            }
        }

        if let Some(name) = replay_header {
            headers.insert(name.clone(), HeaderValue::from_static("true"));
        }

        response
    }
}

/// Builds a body that yields the given chunks in order.
pub fn body_from_chunks(mut chunks: Vec<Bytes>) -> Body {
    match chunks.len() {
        0 => Body::empty(),
        1 => Body::from(chunks.remove(0)),
        _ => Body::from_stream(stream::iter(
            chunks.into_iter().map(Ok::<_, std::convert::Infallible>),
        )),
    }
}

mod base64_chunks {
    use axum::body::Bytes;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{de, ser::SerializeSeq, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(chunks: &[Bytes], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(chunks.len()))?;
        for chunk in chunks {
            seq.serialize_element(&STANDARD.encode(chunk))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Bytes>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .into_iter()
            .map(|encoded| {
                STANDARD
                    .decode(encoded)
                    .map(Bytes::from)
                    .map_err(de::Error::custom)
            })
            .collect()
    }
}
