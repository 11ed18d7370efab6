//! Content-addressed cache keys.
//!
//! A key is the sha256 digest of every input that can change what the model
//! produces: model name, Bloom level, difficulty, subject and the normalised
//! excerpt. Anything else (file paths, timestamps, question count) stays out.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::GenerationParams;

/// Unit separator. Never appears in model names, labels or note text.
const FIELD_SEPARATOR: char = '\u{1f}';

static WIKILINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^|#\]]+)(?:#[^|\]]*)?(?:\|([^\]]+))?\]\]").expect("valid regex")
});

/// Fixed-length hex digest identifying one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accept an existing digest (e.g. a cache file stem).
    ///
    /// Returns `None` unless `s` is 64 lowercase hex characters.
    pub fn from_digest(s: &str) -> Option<Self> {
        let valid = s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        valid.then(|| Self(s.to_string()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for CacheKey {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for CacheKey {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        CacheKey::from_digest(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid cache key '{s}'")))
    }
}

/// Strip wikilink brackets keeping the visible text, collapse whitespace
/// runs to one space and trim.
pub fn normalize_excerpt(excerpt: &str) -> String {
    let unlinked = WIKILINK.replace_all(excerpt, |caps: &regex::Captures<'_>| {
        caps.get(2)
            .or_else(|| caps.get(1))
            .map_or("", |m| m.as_str())
            .trim()
            .to_string()
    });
    unlinked.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Derive the cache key for one generation.
///
/// Absent Bloom level or difficulty hash as `"mixed"`, the same label the
/// mixed preset uses everywhere else.
pub fn derive_key(
    model: &str,
    bloom: &str,
    difficulty: &str,
    subject: &str,
    excerpt: &str,
) -> CacheKey {
    let normalized = normalize_excerpt(excerpt);
    let mut hasher = Sha256::new();
    for (i, field) in [model, bloom, difficulty, subject, normalized.as_str()]
        .into_iter()
        .enumerate()
    {
        if i > 0 {
            let mut buf = [0u8; 4];
            hasher.update(FIELD_SEPARATOR.encode_utf8(&mut buf).as_bytes());
        }
        hasher.update(field.as_bytes());
    }
    CacheKey(format!("{:x}", hasher.finalize()))
}

/// [`derive_key`] over resolved run parameters.
pub fn key_for(params: &GenerationParams, excerpt: &str) -> CacheKey {
    derive_key(
        &params.model,
        params.bloom_label(),
        params.difficulty_label(),
        &params.subject,
        excerpt,
    )
}
