//! Request identity derivation.
//!
//! The cache key for an intercepted request is a digest of its method and
//! URL. Callers are expected to canonicalize the URL first so that two
//! spellings of the same resource share one identity.

use sha2::{Digest, Sha256};

/// Compute the cache identity for a request.
///
/// Only idempotent, side-effect-free requests (GET) should ever be used
/// as cache keys; the classifier enforces that upstream.
pub fn request_identity(method: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}
