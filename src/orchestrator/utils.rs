//! Orchestrator utility functions
//!
//! Helpers for pulling a JSON object out of free-form model text, plus a short
//! hash used to correlate log lines without logging user data.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Compute a short hash for a piece of text
///
/// Returns an 8-character hexadecimal hash suitable for logging and tracing.
///
/// # Arguments
/// * `text` - The text to hash
///
/// # Returns
/// * `String` - 8-character hexadecimal hash
pub fn hash_text(text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("{:016x}", hasher.finish())[..8].to_string()
}

/// Remove a surrounding Markdown code fence, if any
///
/// Handles "```json\n{...}\n```", "```\n{...}\n```" and the single-line
/// "```json{...}```". Text that does not start with a fence is only trimmed.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Skip the language tag ("json", "JSON", nothing at all)
    let body = match rest.find('\n') {
        Some(idx) if rest[..idx].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[idx + 1..]
        }
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };

    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

/// Extract the JSON object embedded in a model response
///
/// Strips code fences, then returns the slice between the first `{` and the
/// last `}`. Any prose before or after the object is ignored.
///
/// # Returns
/// * `Some(&str)` - The candidate JSON object text (not yet parsed)
/// * `None` - If the text contains no `{ ... }` span
pub fn extract_json_object(text: &str) -> Option<&str> {
    let unfenced = strip_code_fences(text);
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&unfenced[start..=end])
}
