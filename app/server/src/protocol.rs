//! Protocol definitions for derive-and-check requests and responses
//!
//! Defines the JSON structures exchanged with the external derivation and
//! balance-check service.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::redact::{redact_address, redact_secret};

/// Provider credential covering Bitcoin lookups.
pub const PROVIDER_BITCOIN: &str = "bitcoin";
/// Provider credential covering every EVM-compatible network.
pub const PROVIDER_ETHEREUM: &str = "ethereum";
/// Provider credential covering Tron.
pub const PROVIDER_TRON: &str = "tron";

/// Providers whose key is always sent, even when empty.
pub const REQUIRED_PROVIDERS: [&str; 2] = [PROVIDER_ETHEREUM, PROVIDER_TRON];

/// Supported blockchain networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NetworkId {
    Btc,
    Eth,
    Bsc,
    Matic,
    Trx,
    Base,
    Optimism,
    Arbitrum,
}

impl NetworkId {
    pub const ALL: [NetworkId; 8] = [
        NetworkId::Btc,
        NetworkId::Eth,
        NetworkId::Bsc,
        NetworkId::Matic,
        NetworkId::Trx,
        NetworkId::Base,
        NetworkId::Optimism,
        NetworkId::Arbitrum,
    ];

    /// Wire spelling, which is also the display symbol.
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkId::Btc => "BTC",
            NetworkId::Eth => "ETH",
            NetworkId::Bsc => "BSC",
            NetworkId::Matic => "MATIC",
            NetworkId::Trx => "TRX",
            NetworkId::Base => "BASE",
            NetworkId::Optimism => "OPTIMISM",
            NetworkId::Arbitrum => "ARBITRUM",
        }
    }

    /// Provider whose API key is used for lookups on this network.
    pub fn provider(&self) -> &'static str {
        match self {
            NetworkId::Btc => PROVIDER_BITCOIN,
            NetworkId::Trx => PROVIDER_TRON,
            NetworkId::Eth
            | NetworkId::Bsc
            | NetworkId::Matic
            | NetworkId::Base
            | NetworkId::Optimism
            | NetworkId::Arbitrum => PROVIDER_ETHEREUM,
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        NetworkId::ALL
            .into_iter()
            .find(|n| n.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown network: {}", wanted))
    }
}

/// Bitcoin address encodings the service can derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BtcAddressType {
    /// Legacy, BIP44
    P2pkh,
    /// Nested SegWit, BIP49
    P2sh,
    /// Native SegWit, BIP84
    Bech32,
    /// BIP86
    Taproot,
}

/// Derivation chain selector. Serialized as the bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChangeType {
    External = 0,
    Internal = 1,
}

impl ChangeType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u64(v: u64) -> Option<Self> {
        match v {
            0 => Some(ChangeType::External),
            1 => Some(ChangeType::Internal),
            _ => None,
        }
    }
}

impl Serialize for ChangeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for ChangeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // HTML checkbox values arrive as strings
        let parsed = match Value::deserialize(deserializer)? {
            Value::Number(n) => n.as_u64().and_then(ChangeType::from_u64),
            Value::String(s) => s.trim().parse::<u64>().ok().and_then(ChangeType::from_u64),
            _ => None,
        };
        parsed.ok_or_else(|| serde::de::Error::custom("change type must be 0 or 1"))
    }
}

/// Body of `POST /derive_and_check`. Borrows from the `SearchRequest`.
#[derive(Serialize)]
pub struct DeriveAndCheckRequest<'a> {
    pub seed_phrase: &'a str,
    pub passphrase: &'a str,
    pub selected_networks: &'a BTreeSet<NetworkId>,
    pub account_indices: &'a str,
    pub address_indices: &'a str,
    pub bitcoin_address_types: &'a BTreeSet<BtcAddressType>,
    pub api_keys: &'a BTreeMap<String, String>,
    pub change_types: &'a BTreeSet<ChangeType>,
}

/// One address derived (and possibly checked) by the service.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DerivedWalletRecord {
    pub address: String,
    pub network: String,
    pub derivation_path: String,
    pub private_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_type: Option<String>,

    #[serde(default, deserialize_with = "lenient_decimal_text")]
    pub balance_crypto: String,
    #[serde(default, deserialize_with = "lenient_satoshi", skip_serializing_if = "Option::is_none")]
    pub balance_satoshi: Option<u64>,
    #[serde(default, deserialize_with = "lenient_decimal_text")]
    pub balance_usd: String,

    #[serde(default)]
    pub has_real_balance: bool,
    #[serde(default)]
    pub has_transactions: bool,

    #[serde(default = "default_explorer_link")]
    pub explorer_link: String,
}

impl DerivedWalletRecord {
    /// Known network, if the service used one of ours.
    pub fn network_id(&self) -> Option<NetworkId> {
        self.network.parse().ok()
    }

    /// Case-insensitive; unknown networks are never Bitcoin.
    pub fn is_bitcoin(&self) -> bool {
        self.network_id() == Some(NetworkId::Btc)
    }
}

impl fmt::Debug for DerivedWalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedWalletRecord")
            .field("address", &redact_address(&self.address))
            .field("network", &self.network)
            .field("derivation_path", &self.derivation_path)
            .field("private_key", &redact_secret(&self.private_key))
            .field("address_type", &self.address_type)
            .field("balance_crypto", &self.balance_crypto)
            .field("balance_satoshi", &self.balance_satoshi)
            .field("balance_usd", &self.balance_usd)
            .field("has_real_balance", &self.has_real_balance)
            .field("has_transactions", &self.has_transactions)
            .finish()
    }
}

/// Successful service response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResult {
    /// Records with a balance or history, in service order.
    #[serde(default)]
    pub results: Vec<DerivedWalletRecord>,
    /// Every derived address, checked or not.
    #[serde(default)]
    pub all_derived_wallets: Vec<DerivedWalletRecord>,
}

/// Error envelope of a non-2xx service response.
#[derive(Debug, Deserialize)]
pub struct ServiceErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

fn default_explorer_link() -> String {
    "#".to_string()
}

/// Keep a numeric field as text. The service sends decimals as strings
/// but plain zeros as JSON numbers; parsing happens at classification.
fn lenient_decimal_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn lenient_satoshi<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .and_then(|f| Decimal::from_f64_retain(f))
                .and_then(|d| d.to_u64())
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                Decimal::from_str(s)
                    .ok()
                    .filter(|d| d.fract().is_zero() && !d.is_sign_negative())
                    .and_then(|d| d.to_u64())
            })
        }
        _ => None,
    })
}
