//! Deterministic cache key derivation
//!
//! Keys look like `EXPERIMENT__buckets::a,b__expt::Experiment3__user::User5`:
//! an uppercased prefix followed by `name::value` pairs sorted by name. Keys
//! stay human-readable where possible; anything non-ASCII or too long for
//! the backend is replaced by its SHA-256 digest.

use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};

/// Longest key or key component spelled out verbatim
///
/// Memcached-style backends cap keys at 250 bytes; leave room for the
/// backend's own prefix.
pub const MAX_KEY_LEN: usize = 200;

/// One identifying argument of a cached lookup
#[derive(Debug, Clone, Copy)]
pub enum KeyPart<'a> {
    /// Plain string value
    Str(&'a str),
    /// Reference to a stored entity, rendered as `<kind><id>`
    Entity { kind: &'static str, id: i64 },
    /// List of values, comma-joined
    List(&'a [String]),
}

/// Build a cache key from a prefix and named arguments
///
/// The argument order does not matter; pairs are sorted by name.
pub fn cache_key(prefix: &str, parts: &[(&str, KeyPart<'_>)]) -> String {
    let mut sorted: Vec<_> = parts.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let pieces = sorted
        .into_iter()
        .map(|(name, part)| format!("{}::{}", sanitize(name), render(part)))
        .collect::<Vec<_>>()
        .join("__");

    let key = format!("{}__{pieces}", ascii_or_hash(prefix).to_uppercase());
    hash_if_too_long(collapse_whitespace(&key))
}

fn render(part: &KeyPart<'_>) -> String {
    match part {
        KeyPart::Str(value) => sanitize(value),
        KeyPart::Entity { kind, id } => format!("{kind}{id}"),
        KeyPart::List(values) => {
            let joined = values.iter().map(|v| ascii_or_hash(v)).collect::<Vec<_>>().join(",");
            hash_if_too_long(joined)
        }
    }
}

fn sanitize(value: &str) -> String {
    hash_if_too_long(ascii_or_hash(value).trim().to_owned())
}

fn ascii_or_hash(value: &str) -> String {
    if value.is_ascii() { value.to_owned() } else { digest(value) }
}

fn hash_if_too_long(value: String) -> String {
    if value.len() > MAX_KEY_LEN { digest(&value) } else { value }
}

fn collapse_whitespace(value: &str) -> String {
    fn re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"[ \t\r\n]+").expect("must be valid regex"))
    }

    re().replace_all(value, "_").into_owned()
}

fn digest(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}
