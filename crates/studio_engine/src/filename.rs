use std::collections::HashSet;

use sha2::{Digest, Sha256};
use studio_core::BatchId;

const MAX_NAME_LEN: usize = 80;

/// Windows-safe directory name for a batch, unique within `used`.
///
/// Collisions (case-insensitive) get a `--{short_hash(id)}` suffix.
pub fn batch_dir_name(name: &str, batch_id: BatchId, used: &mut HashSet<String>) -> String {
    let base = sanitize_name(name);
    let candidate = if used.contains(&base.to_lowercase()) {
        format!("{base}--{}", short_hash(&batch_id.to_string()))
    } else {
        base
    };
    used.insert(candidate.to_lowercase());
    candidate
}

fn sanitize_name(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);
    let cleaned = if cleaned.is_empty() { "batch" } else { cleaned };

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }
    if compacted.len() > MAX_NAME_LEN {
        let mut end = MAX_NAME_LEN;
        while !compacted.is_char_boundary(end) {
            end -= 1;
        }
        compacted.truncate(end);
    }
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
