//! Last-request-wins trace loading.
//!
//! Selecting a driver issues a load; selecting another before the first one
//! finishes must not let the stale result overwrite the newer one. Each
//! request takes a [`LoadTicket`] carrying a generation number, and a result
//! is only accepted if its ticket is still the latest one issued.
//!
//! Loads that fail (missing file, malformed JSON) degrade to
//! [`LoadOutcome::NoTelemetry`]; the viewer shows the outline without a
//! trace instead of erroring.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::error::Result;
use crate::telemetry::TelemetryTrace;

/// Handle for one load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    key: String,
}

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// What was requested (typically a driver code).
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Result of committing a finished load.
#[derive(Debug)]
pub enum LoadOutcome<T> {
    /// Latest request, loaded successfully
    Loaded(T),
    /// Latest request, but the load failed; show no telemetry
    NoTelemetry,
    /// A newer request was issued, result discarded
    Superseded,
}

impl<T> LoadOutcome<T> {
    pub fn is_superseded(&self) -> bool {
        matches!(self, LoadOutcome::Superseded)
    }

    pub fn loaded(self) -> Option<T> {
        match self {
            LoadOutcome::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

/// Issues tickets and filters out stale results.
///
/// Cheap to clone; clones share the same generation counter.
#[derive(Debug, Clone, Default)]
pub struct TraceLoader {
    latest: Arc<AtomicU64>,
}

impl TraceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, invalidating every earlier ticket.
    pub fn request(&self, key: impl Into<String>) -> LoadTicket {
        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let key = key.into();
        debug!("[TraceLoader] Request #{} for {}", generation, key);
        LoadTicket { generation, key }
    }

    /// Invalidate outstanding tickets without starting a new load.
    pub fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.generation
    }

    /// Accept or discard a finished load.
    pub fn commit<T>(&self, ticket: &LoadTicket, result: Result<T>) -> LoadOutcome<T> {
        if !self.is_current(ticket) {
            debug!(
                "[TraceLoader] Discarding stale result #{} for {}",
                ticket.generation, ticket.key
            );
            return LoadOutcome::Superseded;
        }
        match result {
            Ok(value) => LoadOutcome::Loaded(value),
            Err(e) => {
                warn!("[TraceLoader] No telemetry for {}: {}", ticket.key, e);
                LoadOutcome::NoTelemetry
            }
        }
    }

    /// Read and parse a trace on the calling thread, then commit it.
    pub fn load_blocking(&self, ticket: &LoadTicket, path: &Path) -> LoadOutcome<TelemetryTrace> {
        if !self.is_current(ticket) {
            return LoadOutcome::Superseded;
        }
        self.commit(ticket, TelemetryTrace::load(path))
    }

    /// Read and parse a trace on tokio's blocking pool, then commit it.
    #[cfg(feature = "async")]
    pub async fn load_async(&self, ticket: LoadTicket, path: PathBuf) -> LoadOutcome<TelemetryTrace> {
        if !self.is_current(&ticket) {
            return LoadOutcome::Superseded;
        }
        let loaded = tokio::task::spawn_blocking(move || TelemetryTrace::load(&path)).await;
        match loaded {
            Ok(result) => self.commit(&ticket, result),
            Err(e) => {
                warn!("[TraceLoader] Load task for {} failed: {}", ticket.key, e);
                if self.is_current(&ticket) {
                    LoadOutcome::NoTelemetry
                } else {
                    LoadOutcome::Superseded
                }
            }
        }
    }
}

/// Directory of per-driver trace files named `{code}.json`.
#[derive(Debug, Clone)]
pub struct TraceDirectory {
    root: PathBuf,
}

impl TraceDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, code: &str) -> PathBuf {
        self.root.join(format!("{}.json", code))
    }

    /// Request and load the trace for `code` through `loader`.
    pub fn load(&self, loader: &TraceLoader, code: &str) -> LoadOutcome<TelemetryTrace> {
        let ticket = loader.request(code);
        loader.load_blocking(&ticket, &self.path_for(code))
    }
}
