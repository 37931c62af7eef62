//! Refresh cycles: fetch, memoize, compute, fall back.
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │ SheetSource│──▶│ raw snapshot │──▶│ run_pipeline │──▶│ RefreshOutcome │
//! │  (4 sheets)│   │ (TTL cached) │   │ (memoized by │   │ (fresh/stale)  │
//! └────────────┘   └──────────────┘   │ fingerprint) │   └────────────────┘
//!                                     └──────────────┘
//! ```
//!
//! Both caches share the same wall-clock bucket, so a refresh inside one
//! TTL window neither re-fetches nor recomputes. A failed cycle serves the
//! last good report marked stale, if there is one.
//!
//! Cache keys carry the generation the cycle started in. [`RefreshService::invalidate`]
//! bumps it, so a fetch that was in flight during an invalidation can never
//! be served to later cycles.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

use crate::api::logs::{log_error, log_info, log_success, log_warning};
use crate::cache::TtlCache;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{DashboardReport, RawWorkbook, SheetNames};
use crate::sheets::{fetch_workbook, SheetSource};
use crate::transform::pipeline::{run_pipeline, PipelineOptions};

/// Result of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    /// Unique per call
    pub cycle_id: Uuid,
    /// When the report was produced; for a stale outcome, when the last
    /// good report was
    pub generated_at: DateTime<Utc>,
    /// True when `report` is the last good one, served after a failure
    pub stale: bool,
    /// Why this cycle failed, for stale outcomes
    pub error: Option<String>,
    pub report: DashboardReport,
}

/// Drives refresh cycles over a sheet source.
pub struct RefreshService<S> {
    source: S,
    names: SheetNames,
    options: PipelineOptions,
    raw_cache: TtlCache<u64, RawWorkbook>,
    /// Keyed by (generation, fingerprint)
    report_cache: TtlCache<(u64, u64), DashboardReport>,
    last_good: Mutex<Option<RefreshOutcome>>,
    generation: AtomicU64,
}

impl<S: SheetSource> RefreshService<S> {
    pub fn new(source: S, names: SheetNames, options: PipelineOptions, ttl: Duration) -> Self {
        Self {
            source,
            names,
            options,
            raw_cache: TtlCache::new(ttl),
            report_cache: TtlCache::new(ttl),
            last_good: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn names(&self) -> &SheetNames {
        &self.names
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run a cycle at the current time.
    pub async fn refresh_now(&self) -> PipelineResult<RefreshOutcome> {
        self.refresh(Utc::now()).await
    }

    /// Run a cycle as of `now`.
    ///
    /// Fails only when the cycle fails and no good report exists yet.
    #[instrument(skip_all, fields(now = %now))]
    pub async fn refresh(&self, now: DateTime<Utc>) -> PipelineResult<RefreshOutcome> {
        let cycle_id = Uuid::new_v4();
        let generation = self.generation.load(Ordering::SeqCst);

        match self.compute(generation, now.timestamp()).await {
            Ok(report) => {
                let outcome = RefreshOutcome {
                    cycle_id,
                    generated_at: now,
                    stale: false,
                    error: None,
                    report,
                };
                if self.generation.load(Ordering::SeqCst) == generation {
                    *self.last_good.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some(outcome.clone());
                }
                Ok(outcome)
            }
            Err(e) => {
                log_error(format!("Refresh failed: {}", e));
                let previous = self
                    .last_good
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                match previous {
                    Some(prev) => {
                        log_warning(format!(
                            "Serving last good report from {}",
                            prev.generated_at.to_rfc3339()
                        ));
                        Ok(RefreshOutcome {
                            cycle_id,
                            generated_at: prev.generated_at,
                            stale: true,
                            error: Some(e.to_string()),
                            report: prev.report,
                        })
                    }
                    None => Err(e),
                }
            }
        }
    }

    /// Drop cached snapshots and reports; the next cycle re-fetches.
    ///
    /// Cycles already in flight still finish, but what they fetched is
    /// cached under the old generation and never read again.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.raw_cache.clear();
        self.report_cache.clear();
    }

    async fn compute(&self, generation: u64, now_secs: i64) -> PipelineResult<DashboardReport> {
        let raw = match self.raw_cache.get(&generation, now_secs) {
            Some(raw) => {
                log_info("Using cached sheet snapshot");
                raw
            }
            None => {
                log_info("📡 Fetching sheets...");
                let raw = fetch_workbook(&self.source, &self.names).await?;
                log_success(format!("Fetched {} sheets", raw.sheets.len()));
                self.raw_cache.insert(generation, raw.clone(), now_secs);
                raw
            }
        };

        let fingerprint = raw.fingerprint();
        self.report_cache
            .get_or_try_insert_with((generation, fingerprint), now_secs, || {
                run_pipeline(&raw, &self.names, &self.options)
            })
            .map_err(PipelineError::from)
    }
}
