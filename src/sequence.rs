//! Sequence sanitizing and content-addressed identity.
//!
//! The identity of a run is the MD5 hex digest of its sanitized sequence.
//! Workspaces written by earlier deployments are keyed the same way, so the
//! digest must stay MD5 over UTF-8 bytes.

use md5::{Digest, Md5};
use regex::Regex;
use std::sync::LazyLock;

static IDENTITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{32}$").unwrap());

/// Uppercase `raw` and drop every character outside `{A, C, G, N, T}`.
///
/// An empty result is a valid (degenerate) sequence.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .flat_map(char::to_uppercase)
        .filter(|c| matches!(c, 'A' | 'C' | 'G' | 'N' | 'T'))
        .collect()
}

/// Lowercase hex MD5 digest of an already sanitized sequence.
pub fn identity(sequence: &str) -> String {
    hex::encode(Md5::digest(sequence.as_bytes()))
}

/// Whether `candidate` has the shape of an identity (32 lowercase hex chars).
///
/// Used to reject path components coming from requests before they are
/// joined onto the upload root.
pub fn is_identity(candidate: &str) -> bool {
    IDENTITY_REGEX.is_match(candidate)
}
