//! Column-name construction for flattened records.
//!
//! Every path segment is reduced to `[a-z0-9_]`, and joined names longer than
//! the configured limit are shortened around a four-digit checksum. The
//! checksum keeps shortening reproducible across runs; two different long
//! names can still end up with the same shortened form.

const FALLBACK_SEGMENT: &str = "field";
const HASH_MODULUS: u32 = 10_000;

/// Sanitizes one path segment.
pub fn sanitize(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());

    for c in segment.to_lowercase().chars() {
        let keep = c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_';
        if !keep || (c == '_' && out.ends_with('_')) {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches('_');

    if trimmed.is_empty() {
        return FALLBACK_SEGMENT.to_string();
    }

    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Joins a sanitized parent path with a raw child key.
pub fn join(parent: &str, child: &str) -> String {
    let child = sanitize(child);

    if parent.is_empty() {
        child
    } else {
        format!("{parent}_{child}")
    }
}

/// Base-31 polynomial checksum of `name`, reduced mod 10000.
pub fn name_hash(name: &str) -> u32 {
    name.bytes()
        .fold(0u32, |hash, byte| (hash * 31 + u32::from(byte)) % HASH_MODULUS)
}

/// Shortens `name` to at most `max_length` bytes as `<prefix>_<hash>_<suffix>`.
///
/// Names are ASCII after sanitization, so byte slicing is safe.
pub fn shorten(name: &str, max_length: usize) -> String {
    if name.len() <= max_length {
        return name.to_string();
    }

    let hash = format!("{:04}", name_hash(name));
    let available = max_length.saturating_sub(hash.len() + 2);
    let prefix_length = available / 2;
    let suffix_length = available - prefix_length;

    let prefix = &name[..prefix_length];
    let suffix = &name[name.len() - suffix_length..];

    format!("{prefix}_{hash}_{suffix}")
}

/// Whether `name` is a legal column name: `[a-z_][a-z0-9_]*`.
pub fn is_valid_column_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
