//! Provider API key preload
//!
//! Reads plain-text `key=value` lines, one per line. Keys are matched
//! case-insensitively against the configured provider names; anything else
//! is skipped.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use crate::error::ConfigError;

/// API keys per provider. An empty value means "use the service default".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderKeys {
    keys: BTreeMap<String, String>,
}

impl ProviderKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, provider: &str, key: &str) {
        self.keys
            .insert(provider.trim().to_ascii_lowercase(), key.trim().to_string());
    }

    /// Key for a provider, empty when none is configured.
    pub fn get(&self, provider: &str) -> &str {
        self.keys
            .get(&provider.to_ascii_lowercase())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Overlay `other` on top of `self`. Non-empty keys win.
    pub fn merge(&mut self, other: &ProviderKeys) {
        for (provider, key) in &other.keys {
            if !key.is_empty() || !self.keys.contains_key(provider) {
                self.keys.insert(provider.clone(), key.clone());
            }
        }
    }

    /// Parse a credential file body. Returns the keys and how many lines matched.
    ///
    /// A provider listed twice keeps the last value and counts twice.
    pub fn parse(content: &str, known_providers: &[String]) -> (ProviderKeys, usize) {
        let mut keys = ProviderKeys::new();
        let mut matched = 0usize;

        for line in content.lines() {
            let line = line.trim();
            let Some((name, value)) = line.split_once('=') else {
                continue;
            };

            let name = name.trim().to_ascii_lowercase();
            if known_providers.iter().any(|p| p.eq_ignore_ascii_case(&name)) {
                keys.set(&name, value);
                matched += 1;
            }
        }

        (keys, matched)
    }

    /// Load and parse a credential file from disk.
    pub fn load_file(path: &Path, known_providers: &[String]) -> Result<(ProviderKeys, usize), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Credentials {
            path: path.display().to_string(),
            source,
        })?;

        let (keys, matched) = Self::parse(&content, known_providers);
        if matched == 0 {
            warn!("No known provider keys found in {}", path.display());
        } else {
            info!("Loaded {} provider key(s) from {}", matched, path.display());
        }
        Ok((keys, matched))
    }
}

impl std::fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // values are secrets
        f.debug_set().entries(self.keys.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn providers() -> Vec<String> {
        vec!["ethereum".to_string(), "tron".to_string()]
    }

    #[test]
    fn loads_known_keys_and_skips_unknown() {
        let (keys, matched) = ProviderKeys::parse("ethereum=abc123\nfoo=bar\ntron=xyz\n", &providers());

        assert_eq!(matched, 2);
        assert_eq!(keys.get("ethereum"), "abc123");
        assert_eq!(keys.get("tron"), "xyz");
        assert_eq!(keys.get("foo"), "");
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn keys_are_case_insensitive_and_trimmed() {
        let (keys, matched) = ProviderKeys::parse("  ETHEREUM = k1 \r\nTron=k2", &providers());

        assert_eq!(matched, 2);
        assert_eq!(keys.get("ethereum"), "k1");
        assert_eq!(keys.get("TRON"), "k2");
    }

    #[test]
    fn value_may_contain_equals_sign() {
        let (keys, _) = ProviderKeys::parse("tron=abc==", &providers());
        assert_eq!(keys.get("tron"), "abc==");
    }

    #[test]
    fn lines_without_separator_are_ignored() {
        let (keys, matched) = ProviderKeys::parse("ethereum\n\n# comment\n", &providers());
        assert_eq!(matched, 0);
        assert!(keys.is_empty());
    }

    #[test]
    fn extra_providers_can_be_configured() {
        let mut known = providers();
        known.push("bitcoin".to_string());
        let (keys, matched) = ProviderKeys::parse("bitcoin=btc-key", &known);
        assert_eq!(matched, 1);
        assert_eq!(keys.get("bitcoin"), "btc-key");
    }

    #[test]
    fn merge_keeps_existing_when_incoming_is_empty() {
        let mut base = ProviderKeys::new();
        base.set("ethereum", "preloaded");

        let mut incoming = ProviderKeys::new();
        incoming.set("ethereum", "");
        incoming.set("tron", "fresh");

        base.merge(&incoming);
        assert_eq!(base.get("ethereum"), "preloaded");
        assert_eq!(base.get("tron"), "fresh");
    }

    #[test]
    fn debug_hides_values() {
        let mut keys = ProviderKeys::new();
        keys.set("ethereum", "topsecret");
        assert!(!format!("{:?}", keys).contains("topsecret"));
    }

    #[test]
    fn load_file_reports_missing_file() {
        let err = ProviderKeys::load_file(Path::new("/nonexistent/keys.txt"), &providers()).unwrap_err();
        assert!(matches!(err, ConfigError::Credentials { .. }));
    }
}
