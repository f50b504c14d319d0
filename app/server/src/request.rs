//! Search request builder
//!
//! Turns raw operator form input into a validated, immutable `SearchRequest`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::Deserialize;

use crate::credentials::ProviderKeys;
use crate::error::ValidationError;
use crate::protocol::{BtcAddressType, ChangeType, DeriveAndCheckRequest, NetworkId, REQUIRED_PROVIDERS};
use crate::range::IndexRange;
use crate::redact::{describe_seed, redact_secret};

/// Raw form input as posted by the UI.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct FormState {
    pub seed_phrase: String,
    pub use_passphrase: bool,
    pub passphrase: Option<String>,
    pub selected_networks: Vec<NetworkId>,
    pub bitcoin_address_types: Vec<BtcAddressType>,
    pub account_range: String,
    pub address_range: String,
    pub change_types: Vec<ChangeType>,
    /// Provider id to key. Missing or null entries mean "no key".
    pub api_keys: HashMap<String, Option<String>>,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            seed_phrase: String::new(),
            use_passphrase: false,
            passphrase: None,
            selected_networks: Vec::new(),
            bitcoin_address_types: Vec::new(),
            account_range: "0".to_string(),
            address_range: "0-10".to_string(),
            change_types: vec![ChangeType::External],
            api_keys: HashMap::new(),
        }
    }
}

impl fmt::Debug for FormState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormState")
            .field("seed_phrase", &describe_seed(&self.seed_phrase))
            .field("use_passphrase", &self.use_passphrase)
            .field("selected_networks", &self.selected_networks)
            .field("bitcoin_address_types", &self.bitcoin_address_types)
            .field("account_range", &self.account_range)
            .field("address_range", &self.address_range)
            .field("change_types", &self.change_types)
            .finish_non_exhaustive()
    }
}

/// A validated search. Built once per search and dropped after the call.
#[derive(Clone, PartialEq, Eq)]
pub struct SearchRequest {
    seed_phrase: String,
    passphrase: String,
    selected_networks: BTreeSet<NetworkId>,
    bitcoin_address_types: BTreeSet<BtcAddressType>,
    account_range: String,
    address_range: String,
    change_types: BTreeSet<ChangeType>,
    api_keys: BTreeMap<String, String>,
}

impl SearchRequest {
    pub fn seed_phrase(&self) -> &str {
        &self.seed_phrase
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    pub fn selected_networks(&self) -> &BTreeSet<NetworkId> {
        &self.selected_networks
    }

    pub fn bitcoin_address_types(&self) -> &BTreeSet<BtcAddressType> {
        &self.bitcoin_address_types
    }

    pub fn account_range(&self) -> &str {
        &self.account_range
    }

    pub fn address_range(&self) -> &str {
        &self.address_range
    }

    pub fn change_types(&self) -> &BTreeSet<ChangeType> {
        &self.change_types
    }

    pub fn api_keys(&self) -> &BTreeMap<String, String> {
        &self.api_keys
    }

    pub fn api_key(&self, provider: &str) -> &str {
        self.api_keys.get(provider).map(String::as_str).unwrap_or("")
    }

    /// Upper bound on the number of addresses the service will derive.
    ///
    /// Saturates at `usize::MAX`; full-width `u32` spans are valid input.
    pub fn max_derived_addresses(&self) -> usize {
        let accounts = self.account_range.parse::<IndexRange>().map(|r| r.len()).unwrap_or(0);
        let addresses = self.address_range.parse::<IndexRange>().map(|r| r.len()).unwrap_or(0);
        let per_network = accounts
            .saturating_mul(addresses)
            .saturating_mul(self.change_types.len());

        self.selected_networks
            .iter()
            .map(|n| match n {
                NetworkId::Btc => per_network.saturating_mul(self.bitcoin_address_types.len()),
                _ => per_network,
            })
            .fold(0usize, usize::saturating_add)
    }

    pub fn to_wire(&self) -> DeriveAndCheckRequest<'_> {
        DeriveAndCheckRequest {
            seed_phrase: &self.seed_phrase,
            passphrase: &self.passphrase,
            selected_networks: &self.selected_networks,
            account_indices: &self.account_range,
            address_indices: &self.address_range,
            bitcoin_address_types: &self.bitcoin_address_types,
            api_keys: &self.api_keys,
            change_types: &self.change_types,
        }
    }
}

impl fmt::Debug for SearchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchRequest")
            .field("seed_phrase", &describe_seed(&self.seed_phrase))
            .field("passphrase", &redact_secret(&self.passphrase))
            .field("selected_networks", &self.selected_networks)
            .field("bitcoin_address_types", &self.bitcoin_address_types)
            .field("account_range", &self.account_range)
            .field("address_range", &self.address_range)
            .field("change_types", &self.change_types)
            .field("api_keys", &self.api_keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Validate form input with no preloaded credentials.
pub fn build(form: &FormState) -> Result<SearchRequest, ValidationError> {
    build_with_keys(form, &ProviderKeys::new())
}

/// Validate form input. Non-empty form keys override `preloaded`.
///
/// Checks run in a fixed order and only the first violation is reported.
pub fn build_with_keys(form: &FormState, preloaded: &ProviderKeys) -> Result<SearchRequest, ValidationError> {
    let seed_phrase = form.seed_phrase.trim();
    if seed_phrase.is_empty() {
        return Err(ValidationError::EmptySeed);
    }

    let selected_networks: BTreeSet<NetworkId> = form.selected_networks.iter().copied().collect();
    if selected_networks.is_empty() {
        return Err(ValidationError::NoNetworkSelected);
    }

    let bitcoin_address_types: BTreeSet<BtcAddressType> = if selected_networks.contains(&NetworkId::Btc) {
        let types: BTreeSet<_> = form.bitcoin_address_types.iter().copied().collect();
        if types.is_empty() {
            return Err(ValidationError::NoBtcTypeSelected);
        }
        types
    } else {
        BTreeSet::new()
    };

    let change_types: BTreeSet<ChangeType> = form.change_types.iter().copied().collect();
    if change_types.is_empty() {
        return Err(ValidationError::NoChangeTypeSelected);
    }

    let account_range = checked_range("account", &form.account_range)?;
    let address_range = checked_range("address", &form.address_range)?;

    let passphrase = if form.use_passphrase {
        form.passphrase.clone().unwrap_or_default()
    } else {
        String::new()
    };

    // every selected network's provider gets an entry, even if empty
    let mut api_keys: BTreeMap<String, String> = REQUIRED_PROVIDERS
        .iter()
        .copied()
        .chain(selected_networks.iter().map(|n| n.provider()))
        .map(|p| (p.to_string(), String::new()))
        .collect();
    for provider in preloaded.providers() {
        api_keys.insert(provider.to_string(), preloaded.get(provider).to_string());
    }
    for (provider, key) in &form.api_keys {
        let key = key.as_deref().unwrap_or("").trim();
        let provider = provider.trim().to_ascii_lowercase();
        if provider.is_empty() {
            continue;
        }
        if !key.is_empty() || !api_keys.contains_key(&provider) {
            api_keys.insert(provider, key.to_string());
        }
    }

    Ok(SearchRequest {
        seed_phrase: seed_phrase.to_string(),
        passphrase,
        selected_networks,
        bitcoin_address_types,
        account_range,
        address_range,
        change_types,
        api_keys,
    })
}

fn checked_range(field: &'static str, raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    trimmed
        .parse::<IndexRange>()
        .map(|_| trimmed.to_string())
        .map_err(|_| ValidationError::InvalidRange {
            field,
            value: raw.to_string(),
        })
}
