//! CSV export of search results
//!
//! Two exports share one encoding: UTF-8 with a byte-order mark, every field
//! double-quoted with inner quotes doubled, `\n` between rows, header first.
//! The filtered export mirrors the report on screen; the full export dumps
//! every derived address as the service returned it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::classify::{ReportColumns, Report, NOT_APPLICABLE};
use crate::error::ExportError;
use crate::protocol::DerivedWalletRecord;

pub const FILTERED_EXPORT_FILE: &str = "filtered_results.csv";
pub const FULL_EXPORT_FILE: &str = "all_derived_addresses.csv";

pub const FULL_EXPORT_HEADERS: [&str; 5] = [
    "Address",
    "Network",
    "Derivation Path",
    "Private Key",
    "Address Type",
];

pub const TOTAL_LABEL: &str = "Total USD";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Where an export landed and how many data rows it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub rows: usize,
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        // the total line is shorter than a data row
        .flexible(true)
        .from_writer(UTF8_BOM.to_vec())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ExportError> {
    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// Encode the classified rows of `report`, followed by the USD total line.
pub fn encode_filtered(report: &Report) -> Result<Vec<u8>, ExportError> {
    if report.rows.is_empty() {
        return Err(ExportError::Empty("no addresses with balance or history"));
    }

    let mut writer = csv_writer();
    writer.write_record(report.columns.titles())?;
    for row in &report.rows {
        writer.write_record(row.fields())?;
    }

    let mut total_line = vec![""; ReportColumns::USD_INDEX - 1];
    total_line.push(TOTAL_LABEL);
    total_line.push(&report.total_usd_display);
    writer.write_record(&total_line)?;

    finish(writer)
}

/// Encode every derived address. No total line.
pub fn encode_all(records: &[DerivedWalletRecord]) -> Result<Vec<u8>, ExportError> {
    if records.is_empty() {
        return Err(ExportError::Empty("no derived addresses; run a search first"));
    }

    let mut writer = csv_writer();
    writer.write_record(FULL_EXPORT_HEADERS)?;
    for record in records {
        let address_type = record
            .address_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(NOT_APPLICABLE);

        writer.write_record([
            record.address.as_str(),
            record.network.as_str(),
            record.derivation_path.as_str(),
            record.private_key.as_str(),
            address_type,
        ])?;
    }

    finish(writer)
}

pub fn export_filtered(report: &Report, dir: &Path) -> Result<ExportSummary, ExportError> {
    let bytes = encode_filtered(report)?;
    let path = write_atomically(dir, FILTERED_EXPORT_FILE, &bytes)?;
    info!("Exported {} filtered row(s) to {}", report.rows.len(), path.display());
    Ok(ExportSummary {
        path,
        rows: report.rows.len(),
    })
}

pub fn export_all(records: &[DerivedWalletRecord], dir: &Path) -> Result<ExportSummary, ExportError> {
    let bytes = encode_all(records)?;
    let path = write_atomically(dir, FULL_EXPORT_FILE, &bytes)?;
    info!("Exported {} derived address(es) to {}", records.len(), path.display());
    Ok(ExportSummary {
        path,
        rows: records.len(),
    })
}

/// Write to a sibling temp file, then rename over the target.
fn write_atomically(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir)?;
    let target = dir.join(file_name);
    let tmp = dir.join(format!(".{}.tmp", file_name));
    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, &target) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(target)
}
