//! Seedsweep Library
//!
//! Builds derive-and-check searches, classifies the results into a USD
//! report, and exports them as CSV.

pub mod api;
pub mod classify;
pub mod config;
pub mod credentials;
pub mod error;
pub mod export;
pub mod protocol;
pub mod range;
pub mod redact;
pub mod request;
pub mod service;
pub mod session;

pub use classify::{classify, ClassifiedRow, Report, ReportColumns, SortKey, StatusCategory};
pub use error::{ExportError, FormatError, SearchError, ValidationError};
pub use protocol::{DerivedWalletRecord, NetworkId, SearchResult};
pub use request::{build, FormState, SearchRequest};
pub use session::SearchSession;
