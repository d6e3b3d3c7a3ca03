use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::job::Visibility;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    Wps,
    ApiProcesses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Token,
    Cert,
}

/// A registered remote WPS or API-Processes endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Service {
    pub name: String,
    pub url: String,
    pub kind: ServiceType,
    pub visibility: Visibility,
    pub auth_mode: AuthMode,
}

const FALLBACK_ADJECTIVES: &[&str] = &["quiet", "amber", "brisk", "lunar", "coral", "dusky"];
const FALLBACK_NOUNS: &[&str] = &["harbor", "falcon", "meridian", "thicket", "ember", "basin"];

/// Derives a deterministic `[a-z0-9_-]+` slug from free-form input. Empty or
/// entirely-non-alphanumeric input falls back to a random adjective-noun pair
/// rather than producing an empty name.
pub fn sane_name(input: &str) -> String {
    let slug: String = input
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let collapsed = slug
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if collapsed.is_empty() {
        random_fallback_name()
    } else {
        collapsed
    }
}

fn random_fallback_name() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let adj = FALLBACK_ADJECTIVES[rng.gen_range(0..FALLBACK_ADJECTIVES.len())];
    let noun = FALLBACK_NOUNS[rng.gen_range(0..FALLBACK_NOUNS.len())];
    format!("{adj}-{noun}-{}", rng.gen_range(1000..9999))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sane_name_slugifies() {
        assert_eq!(sane_name("My Cool Service!!"), "my-cool-service");
        assert_eq!(sane_name("  leading  "), "leading");
    }

    #[test]
    fn sane_name_falls_back_on_empty() {
        let name = sane_name("!!!");
        assert!(!name.is_empty());
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }
}
