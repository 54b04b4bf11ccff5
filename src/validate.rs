//! Pre-write validation for user-supplied fields.
//!
//! Every rule runs before a storage write is attempted and reports a typed
//! error; nothing relies on implicit checks at save time.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Label is required")]
    EmptyLabel,

    #[error("Invalid URL format: destination URL must start with http:// or https://")]
    InvalidUrl,

    #[error("Alias can only contain lowercase letters, numbers, hyphens, and underscores")]
    InvalidAlias,
}

/// A destination URL must be an absolute http(s) URL with a non-empty host
/// part after the scheme.
pub fn validate_destination_url(url: &str) -> Result<(), ValidationError> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));

    match rest {
        Some(remainder) if !remainder.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::InvalidUrl),
    }
}

pub fn validate_label(label: &str) -> Result<(), ValidationError> {
    if label.trim().is_empty() {
        return Err(ValidationError::EmptyLabel);
    }
    Ok(())
}

/// Aliases are stored trimmed and lowercased.
pub fn normalize_alias(alias: &str) -> String {
    alias.trim().to_lowercase()
}

/// A normalized alias must be non-empty and match `[a-z0-9-_]+`.
pub fn validate_alias(alias: &str) -> Result<(), ValidationError> {
    if alias.is_empty() {
        return Err(ValidationError::InvalidAlias);
    }
    if alias
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
    {
        Ok(())
    } else {
        Err(ValidationError::InvalidAlias)
    }
}

/// Base alias derived from a destination label: lowercase, every
/// non-alphanumeric byte replaced with a hyphen. Uniqueness suffixes are the
/// caller's concern.
pub fn derive_alias(label: &str) -> String {
    label
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect()
}
