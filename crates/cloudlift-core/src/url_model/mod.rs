//! Source URL validation and target filename derivation.
//!
//! The target filename doubles as the object key at every destination, so it
//! is sanitized once at enqueue and never changes afterwards.

mod path;
mod sanitize;

use sha2::{Digest, Sha256};

use crate::error::EngineError;

pub use path::filename_from_url_path;
pub use sanitize::sanitize_filename;

/// Check that `raw` is an absolute http(s) URL with a host.
pub fn validate_source_url(raw: &str) -> Result<url::Url, EngineError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation("source url is empty".into()));
    }
    let parsed = url::Url::parse(trimmed)
        .map_err(|e| EngineError::Validation(format!("source url {:?}: {}", trimmed, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(EngineError::Validation(format!(
            "source url must be http or https, got {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(EngineError::Validation(format!(
            "source url {:?} has no host",
            trimmed
        )));
    }
    Ok(parsed)
}

/// Resolve the filename a job will be stored under.
///
/// An explicit override wins (it must still be non-empty after
/// sanitization). Otherwise the last URL path segment is used, and when the
/// path has none, `file_<8 hex chars of sha256(url)>`.
///
/// # Examples
///
/// - `resolve_target_filename("https://example.com/a/debian.iso", None)` → `"debian.iso"`
/// - `resolve_target_filename("https://example.com/a/debian.iso", Some("x.iso"))` → `"x.iso"`
pub fn resolve_target_filename(
    url: &str,
    filename_override: Option<&str>,
) -> Result<String, EngineError> {
    if let Some(name) = filename_override.map(str::trim).filter(|s| !s.is_empty()) {
        let sanitized = sanitize_filename(name);
        if sanitized.is_empty() {
            return Err(EngineError::Validation(format!(
                "filename {:?} is empty after removing unsafe characters",
                name
            )));
        }
        return Ok(sanitized);
    }

    let from_path = filename_from_url_path(url)
        .map(|s| sanitize_filename(&s))
        .filter(|s| !s.is_empty());
    Ok(from_path.unwrap_or_else(|| fallback_filename(url)))
}

/// `file_<hash>` name for URLs whose path yields nothing usable.
pub fn fallback_filename(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    format!("file_{}", &hex::encode(digest)[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_http_and_https() {
        assert!(validate_source_url("https://example.com/a.zip").is_ok());
        assert!(validate_source_url("  http://example.com/  ").is_ok());
    }

    #[test]
    fn validate_rejects_bad_urls() {
        for bad in ["", "   ", "not a url", "ftp://example.com/a", "file:///etc/passwd"] {
            assert!(
                matches!(validate_source_url(bad), Err(EngineError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn filename_from_url_path_segment() {
        assert_eq!(
            resolve_target_filename("https://cdn.example.com/path/to/debian-12.iso", None).unwrap(),
            "debian-12.iso"
        );
        assert_eq!(
            resolve_target_filename("https://example.com/my%20file.zip?x=1", None).unwrap(),
            "my file.zip"
        );
    }

    #[test]
    fn override_wins_and_is_sanitized() {
        assert_eq!(
            resolve_target_filename("https://example.com/a.zip", Some("../etc/b.zip")).unwrap(),
            "etc_b.zip"
        );
        assert!(matches!(
            resolve_target_filename("https://example.com/a.zip", Some("..//")),
            Err(EngineError::Validation(_))
        ));
        // blank override falls back to the url
        assert_eq!(
            resolve_target_filename("https://example.com/a.zip", Some("  ")).unwrap(),
            "a.zip"
        );
    }

    #[test]
    fn empty_path_uses_hash_fallback() {
        let name = resolve_target_filename("https://example.com/", None).unwrap();
        assert_eq!(name, fallback_filename("https://example.com/"));
        assert!(name.starts_with("file_"));
        assert_eq!(name.len(), "file_".len() + 8);
        assert_ne!(name, fallback_filename("https://example.org/"));
    }
}
