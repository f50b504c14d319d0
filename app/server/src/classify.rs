//! Result classification and USD aggregation
//!
//! Turns the service's filtered records into display rows and a running USD
//! total. Pure: the same input always yields the same report.

use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::FormatError;
use crate::protocol::DerivedWalletRecord;
use crate::redact::{redact_address, redact_secret};

/// Sentinel shown when a value is missing, unparsable or not positive.
pub const NOT_APPLICABLE: &str = "N/A";

/// Shown instead of rows when the service found nothing.
pub const NO_RESULTS_MESSAGE: &str = "No address with balance or history found for the given parameters.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    HasBalance,
    HasHistory,
    Empty,
}

impl StatusCategory {
    /// A real balance wins over history.
    pub fn of(has_real_balance: bool, has_transactions: bool) -> Self {
        if has_real_balance {
            StatusCategory::HasBalance
        } else if has_transactions {
            StatusCategory::HasHistory
        } else {
            StatusCategory::Empty
        }
    }
}

/// Column titles of the report, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportColumns {
    pub address: String,
    pub network: String,
    pub balance: String,
    pub usd: String,
    pub derivation_path: String,
    pub private_key: String,
    pub explorer: String,
}

impl ReportColumns {
    /// Position of the USD column, used to align the total line.
    pub const USD_INDEX: usize = 3;

    pub fn titles(&self) -> [&str; 7] {
        [
            self.address.as_str(),
            self.network.as_str(),
            self.balance.as_str(),
            self.usd.as_str(),
            self.derivation_path.as_str(),
            self.private_key.as_str(),
            self.explorer.as_str(),
        ]
    }
}

impl Default for ReportColumns {
    fn default() -> Self {
        Self {
            address: "Address".to_string(),
            network: "Network".to_string(),
            balance: "Balance / Status".to_string(),
            usd: "USD Balance".to_string(),
            derivation_path: "Derivation Path".to_string(),
            private_key: "Private Key".to_string(),
            explorer: "Explorer".to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct ClassifiedRow {
    /// Index in the service's result order.
    pub position: usize,
    pub address: String,
    pub network: String,
    pub status: StatusCategory,
    pub balance_display: String,
    pub usd_display: String,
    /// Rounded USD amount included in the total, if any.
    pub usd_value: Option<Decimal>,
    pub derivation_path: String,
    pub private_key: String,
    pub explorer_link: String,
}

impl ClassifiedRow {
    /// Fields in column order, as written to the filtered export.
    pub fn fields(&self) -> [&str; 7] {
        [
            self.address.as_str(),
            self.network.as_str(),
            self.balance_display.as_str(),
            self.usd_display.as_str(),
            self.derivation_path.as_str(),
            self.private_key.as_str(),
            self.explorer_link.as_str(),
        ]
    }
}

impl fmt::Debug for ClassifiedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifiedRow")
            .field("position", &self.position)
            .field("address", &redact_address(&self.address))
            .field("network", &self.network)
            .field("status", &self.status)
            .field("balance_display", &self.balance_display)
            .field("usd_display", &self.usd_display)
            .field("derivation_path", &self.derivation_path)
            .field("private_key", &redact_secret(&self.private_key))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    ServiceOrder,
    UsdDescending,
    Network,
    Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub columns: ReportColumns,
    pub rows: Vec<ClassifiedRow>,
    pub found: usize,
    pub total_usd: Decimal,
    pub total_usd_display: String,
    /// Display-only notice for an empty result. Never exported.
    pub placeholder: Option<&'static str>,
    pub format_errors: Vec<FormatError>,
}

impl Report {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn with_columns(mut self, columns: ReportColumns) -> Self {
        self.columns = columns;
        self
    }

    /// Stable re-sort. Ties keep service order; the total is unaffected.
    pub fn sort_by(&mut self, key: SortKey) {
        match key {
            SortKey::ServiceOrder => self.rows.sort_by_key(|r| r.position),
            SortKey::UsdDescending => self
                .rows
                .sort_by(|a, b| b.usd_value.cmp(&a.usd_value).then(a.position.cmp(&b.position))),
            SortKey::Network => self
                .rows
                .sort_by(|a, b| a.network.cmp(&b.network).then(a.position.cmp(&b.position))),
            SortKey::Status => self
                .rows
                .sort_by(|a, b| a.status.cmp(&b.status).then(a.position.cmp(&b.position))),
        }
    }
}

/// Classify the service's filtered results and total their USD value.
pub fn classify(results: &[DerivedWalletRecord]) -> Report {
    let mut rows = Vec::with_capacity(results.len());
    let mut format_errors = Vec::new();
    let mut total = Decimal::ZERO;

    for (position, record) in results.iter().enumerate() {
        let row = classify_record(position, record, &mut format_errors);
        if let Some(usd) = row.usd_value {
            total = total.saturating_add(usd);
        }
        rows.push(row);
    }

    for e in &format_errors {
        warn!("Degraded field: {}", e);
    }

    let placeholder = if rows.is_empty() { Some(NO_RESULTS_MESSAGE) } else { None };
    let total = fixed_point(total, 2);

    Report {
        columns: ReportColumns::default(),
        found: rows.len(),
        rows,
        total_usd_display: format_usd(total),
        total_usd: total,
        placeholder,
        format_errors,
    }
}

fn classify_record(position: usize, record: &DerivedWalletRecord, errors: &mut Vec<FormatError>) -> ClassifiedRow {
    let status = StatusCategory::of(record.has_real_balance, record.has_transactions);

    let balance_display = match status {
        StatusCategory::HasBalance => match record.balance_satoshi {
            Some(sat) if record.is_bitcoin() => format!("{} Satoshis", sat),
            _ => match parse_decimal(&record.balance_crypto) {
                Some(amount) => format!("{} {}", format_fixed(amount, 8), record.network),
                None => {
                    errors.push(format_error(record, "balance_crypto", &record.balance_crypto));
                    format!("{} {}", NOT_APPLICABLE, record.network)
                }
            },
        },
        StatusCategory::HasHistory => format!("0 {} (history)", record.network),
        StatusCategory::Empty => format!("0 {} (empty)", record.network),
    };

    let usd_value = match parse_decimal(&record.balance_usd) {
        Some(usd) if usd > Decimal::ZERO => Some(fixed_point(usd, 2)),
        Some(_) => None,
        None => {
            if !record.balance_usd.trim().is_empty() {
                errors.push(format_error(record, "balance_usd", &record.balance_usd));
            }
            None
        }
    };
    let usd_display = match usd_value {
        Some(usd) => format_usd(usd),
        None => NOT_APPLICABLE.to_string(),
    };

    ClassifiedRow {
        position,
        address: record.address.clone(),
        network: record.network.clone(),
        status,
        balance_display,
        usd_display,
        usd_value,
        derivation_path: record.derivation_path.clone(),
        private_key: record.private_key.clone(),
        explorer_link: record.explorer_link.clone(),
    }
}

fn format_error(record: &DerivedWalletRecord, field: &'static str, raw: &str) -> FormatError {
    FormatError {
        address: redact_address(&record.address),
        field,
        raw: raw.to_string(),
    }
}

/// Parse plain or scientific decimal text.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Round half away from zero to `dp` fractional digits.
///
/// The scale is raised to `dp` only as far as the 28-digit mantissa allows,
/// so very large values may carry fewer digits. Render with `format_fixed`.
pub fn fixed_point(value: Decimal, dp: u32) -> Decimal {
    let mut v = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    v.rescale(dp);
    v
}

/// `fixed_point`, always rendered with exactly `dp` fractional digits.
pub fn format_fixed(value: Decimal, dp: u32) -> String {
    format!("{:.*}", dp as usize, fixed_point(value, dp))
}

pub fn format_usd(value: Decimal) -> String {
    format!("${}", format_fixed(value, 2))
}
