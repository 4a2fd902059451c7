//! Stable image identifiers.
//!
//! Notion serves uploaded files from signed storage URLs whose query string
//! carries an expiring signature. The identifiers produced here survive a
//! signature rotation, so they can key immutable objects in the image store.

use sha3::{Digest, Sha3_256};
use url::Url;
use uuid::Uuid;

/// Maximum length accepted for a stable identifier.
pub const MAX_STABLE_ID_LEN: usize = 128;

/// Derive a stable identifier for an image.
///
/// Resolution order:
/// 1. the caller-supplied `hint` (record ID plus sequence index),
/// 2. the last UUID-shaped path segment of `source_url`,
/// 3. a SHA3-256 digest of `source_url` without its query string.
///
/// Callers must not pass an empty `source_url`.
pub fn derive(source_url: &str, hint: Option<&str>) -> String {
    if let Some(hint) = hint.filter(|h| !h.is_empty()) {
        return hint.to_string();
    }

    if let Some(id) = uuid_segment(source_url) {
        return id;
    }

    let stripped = strip_volatile_parts(source_url);
    tracing::debug!(url = %stripped, "No UUID segment in image URL, hashing");
    hex::encode(Sha3_256::digest(stripped.as_bytes()))
}

/// Build the hint used for images attached to a record.
///
/// `slot` is the image's position in the record, or a name such as `cover`.
pub fn record_hint(record_id: &str, slot: impl std::fmt::Display) -> String {
    format!("{}-{}", record_id.replace('-', ""), slot)
}

/// Check that a string is usable as an object key component.
pub fn is_valid_stable_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_STABLE_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Find the UUID-shaped path segment closest to the filename.
fn uuid_segment(source_url: &str) -> Option<String> {
    let path = match Url::parse(source_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => strip_volatile_parts(source_url).to_string(),
    };

    path.rsplit('/')
        .filter(|segment| segment.len() == 36 || segment.len() == 32)
        .find_map(|segment| Uuid::try_parse(segment).ok())
        .map(|id| id.hyphenated().to_string())
}

/// Drop the query string and fragment, which carry the signature.
fn strip_volatile_parts(source_url: &str) -> &str {
    let end = source_url
        .find(['?', '#'])
        .unwrap_or(source_url.len());
    &source_url[..end]
}
