use crate::error::CoreError;

/// Default number of deltas kept in a document's hot window.
pub const DEFAULT_HOT_WINDOW: usize = 10;

/// Default upper bound on saved content, in characters.
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 1_000_000;

/// Default upper bound on change descriptions, in characters.
pub const DEFAULT_MAX_DESCRIPTION_CHARS: usize = 500;

/// Versioning engine configuration.
///
/// The hot window size is a deployment constant: every store sharing the same
/// data must be built with the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersioningConfig {
    /// Deltas kept next to the current content before spilling to the archive.
    pub hot_window: usize,
    /// Maximum content length accepted by a save.
    pub max_content_chars: usize,
    /// Maximum change-description length accepted by a save.
    pub max_description_chars: usize,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            hot_window: DEFAULT_HOT_WINDOW,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
            max_description_chars: DEFAULT_MAX_DESCRIPTION_CHARS,
        }
    }
}

impl VersioningConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default   |
    /// |---------------------------------|-----------|
    /// | `VERSION_HOT_WINDOW`            | `10`      |
    /// | `VERSION_MAX_CONTENT_CHARS`     | `1000000` |
    /// | `VERSION_MAX_DESCRIPTION_CHARS` | `500`     |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let defaults = Self::default();
        let config = Self {
            hot_window: parse_var(&lookup, "VERSION_HOT_WINDOW", defaults.hot_window)?,
            max_content_chars: parse_var(
                &lookup,
                "VERSION_MAX_CONTENT_CHARS",
                defaults.max_content_chars,
            )?,
            max_description_chars: parse_var(
                &lookup,
                "VERSION_MAX_DESCRIPTION_CHARS",
                defaults.max_description_chars,
            )?,
        };

        if config.hot_window == 0 {
            return Err(CoreError::Validation(
                "VERSION_HOT_WINDOW must be at least 1".into(),
            ));
        }
        Ok(config)
    }
}

fn parse_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: usize,
) -> Result<usize, CoreError> {
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            CoreError::Validation(format!("{key} must be a non-negative integer, got '{raw}'"))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = VersioningConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, VersioningConfig::default());
        assert_eq!(config.hot_window, 10);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = VersioningConfig::from_lookup(lookup(&[
            ("VERSION_HOT_WINDOW", "4"),
            ("VERSION_MAX_CONTENT_CHARS", " 2048 "),
        ]))
        .unwrap();
        assert_eq!(config.hot_window, 4);
        assert_eq!(config.max_content_chars, 2048);
        assert_eq!(config.max_description_chars, DEFAULT_MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(VersioningConfig::from_lookup(lookup(&[("VERSION_HOT_WINDOW", "ten")])).is_err());
        assert!(VersioningConfig::from_lookup(lookup(&[("VERSION_HOT_WINDOW", "0")])).is_err());
        assert!(
            VersioningConfig::from_lookup(lookup(&[("VERSION_MAX_CONTENT_CHARS", "-1")])).is_err()
        );
    }
}
