use std::sync::OnceLock;

use regex::Regex;

use crate::error::StagingError;

fn pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Za-z0-9_-]+/?)+$").unwrap())
}

/// Validates the `X-WPS-Output-Context` header value against
/// `^([A-Za-z0-9_-]+/?)+$`. An absent header is not validated here — callers
/// pass `None` through and the configured default context applies instead.
pub fn validate_output_context(value: &str) -> Result<String, StagingError> {
    if pattern().is_match(value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(StagingError::InvalidOutputContext(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_and_nested_segments() {
        assert!(validate_output_context("alice").is_ok());
        assert!(validate_output_context("alice/project-1").is_ok());
        assert!(validate_output_context("alice/project_1/").is_ok());
    }

    #[test]
    fn rejects_invalid_characters() {
        assert!(validate_output_context("alice/../etc").is_err());
        assert!(validate_output_context("alice bob").is_err());
        assert!(validate_output_context("").is_err());
    }
}
