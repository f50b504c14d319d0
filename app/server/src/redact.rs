//! Log redaction helpers
//!
//! Seeds, passphrases, API keys and private keys must never reach the logs.
//! Addresses are public but are shortened to keep log lines readable and
//! avoid dumping whole wallets into shared log sinks.

/// Shorten an address to its first 6 and last 4 characters.
pub fn redact_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() < 12 {
        return "*".repeat(chars.len());
    }

    let prefix: String = chars[..6].iter().collect();
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", prefix, suffix)
}

/// Describe a seed phrase without revealing any of its words.
pub fn describe_seed(seed: &str) -> String {
    format!("<{} words>", seed.split_whitespace().count())
}

/// Placeholder for any secret value in `Debug` output.
pub fn redact_secret(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}
