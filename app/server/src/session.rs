//! Session-scoped search state
//!
//! Holds the latest classified report and the full derived set. Each search
//! replaces both wholesale. At most one search runs at a time, and every
//! search carries a token so a response that arrives after a newer search
//! or a reset is dropped instead of overwriting fresher state.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::classify::{classify, Report, ReportColumns, SortKey};
use crate::error::{ExportError, SearchError};
use crate::export::{self, ExportSummary};
use crate::protocol::{DerivedWalletRecord, SearchResult};
use crate::request::SearchRequest;
use crate::service::DeriveService;

/// Result of one completed search. Immutable once published.
#[derive(Debug, Clone)]
pub struct SearchSnapshot {
    pub token: u64,
    pub report: Report,
    pub all_derived_wallets: Arc<Vec<DerivedWalletRecord>>,
    pub completed_at: DateTime<Utc>,
}

/// Proof that the holder owns the single in-flight slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct SearchTicket {
    token: u64,
    in_flight: Arc<AtomicBool>,
}

impl SearchTicket {
    pub fn token(&self) -> u64 {
        self.token
    }
}

impl Drop for SearchTicket {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct SessionState {
    current: Option<Arc<SearchSnapshot>>,
    columns: ReportColumns,
    sort: SortKey,
}

#[derive(Default)]
pub struct SearchSession {
    state: RwLock<SessionState>,
    latest_token: AtomicU64,
    in_flight: Arc<AtomicBool>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_searching(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> Option<Arc<SearchSnapshot>> {
        self.state.read().current.clone()
    }

    /// Claim the in-flight slot and clear the previous results.
    pub fn begin(&self) -> Result<SearchTicket, SearchError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SearchError::Busy);
        }

        let token = self.latest_token.fetch_add(1, Ordering::AcqRel) + 1;
        self.state.write().current = None;

        Ok(SearchTicket {
            token,
            in_flight: self.in_flight.clone(),
        })
    }

    /// Classify a response and publish it, unless a newer search or a reset
    /// happened since `ticket` was issued.
    pub fn commit(&self, ticket: SearchTicket, result: SearchResult) -> Result<Arc<SearchSnapshot>, SearchError> {
        let mut state = self.state.write();

        if self.latest_token.load(Ordering::Acquire) != ticket.token {
            warn!("Dropping stale response for search {}", ticket.token);
            return Err(SearchError::Superseded { token: ticket.token });
        }

        let mut report = classify(&result.results).with_columns(state.columns.clone());
        report.sort_by(state.sort);

        let snapshot = Arc::new(SearchSnapshot {
            token: ticket.token,
            report,
            all_derived_wallets: Arc::new(result.all_derived_wallets),
            completed_at: Utc::now(),
        });

        info!(
            "Search {} complete: found={} derived={} total={}",
            snapshot.token,
            snapshot.report.found,
            snapshot.all_derived_wallets.len(),
            snapshot.report.total_usd_display
        );

        state.current = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Run one search end to end. The request is dropped once the call returns.
    pub async fn run(&self, service: &dyn DeriveService, request: SearchRequest) -> Result<Arc<SearchSnapshot>, SearchError> {
        let ticket = self.begin()?;
        info!("Search {} started", ticket.token());

        let outcome = service.derive_and_check(&request).await;
        drop(request);

        match outcome {
            Ok(result) => self.commit(ticket, result),
            Err(e) => {
                warn!("Search {} failed ({}): {}", ticket.token(), e.kind(), e);
                Err(e)
            }
        }
    }

    /// Forget the current results. Any search still in flight will be dropped on arrival.
    pub fn clear(&self) {
        self.latest_token.fetch_add(1, Ordering::AcqRel);
        self.state.write().current = None;
    }

    /// Re-sort the displayed rows. Applies to later searches too.
    pub fn sort(&self, key: SortKey) -> Option<Arc<SearchSnapshot>> {
        let mut state = self.state.write();
        state.sort = key;
        Self::republish(&mut state, |report| report.sort_by(key))
    }

    /// Relabel the report columns. Applies to later searches too.
    pub fn set_columns(&self, columns: ReportColumns) -> Option<Arc<SearchSnapshot>> {
        let mut state = self.state.write();
        state.columns = columns.clone();
        Self::republish(&mut state, |report| report.columns = columns)
    }

    fn republish<F: FnOnce(&mut Report)>(state: &mut SessionState, edit: F) -> Option<Arc<SearchSnapshot>> {
        let current = state.current.as_ref()?;
        let mut next = SearchSnapshot::clone(current);
        edit(&mut next.report);
        let next = Arc::new(next);
        state.current = Some(next.clone());
        Some(next)
    }

    pub fn export_filtered(&self, dir: &Path) -> Result<ExportSummary, ExportError> {
        let snapshot = self
            .snapshot()
            .ok_or(ExportError::Empty("no search results; run a search first"))?;
        export::export_filtered(&snapshot.report, dir)
    }

    pub fn export_all(&self, dir: &Path) -> Result<ExportSummary, ExportError> {
        let snapshot = self
            .snapshot()
            .ok_or(ExportError::Empty("no derived addresses; run a search first"))?;
        export::export_all(&snapshot.all_derived_wallets, dir)
    }
}
