//! Native delivery engine.
//!
//! The Crux app core drives deliveries through shell timers; headless and
//! server-side shells use this engine instead. Same store, same single-shot
//! transition rules, but with real tokio timers and a shared store behind a
//! lock: batch insert and clear-all exclude each other and enumerating
//! reads, while each job's status changes exactly once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::campaign::{
    render_template, CampaignError, CampaignStore, Job, JobId, Recipient, StoreStats, UnixTimeMs,
};
use crate::delivery::DeliveryBackend;
use crate::storage::{JobStorage, StorageError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Campaign(#[from] CampaignError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What the dashboard reads: aggregate counts plus the detail list,
/// newest-first. Snapshotted under one read lock, so the counts always add
/// up against the rows they were taken with.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DashboardState {
    pub stats: StoreStats,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Default)]
pub struct DispatchMetrics {
    pub batches_submitted: AtomicU64,
    pub batches_rejected: AtomicU64,
    pub jobs_enqueued: AtomicU64,
    pub jobs_sent: AtomicU64,
    pub jobs_errored: AtomicU64,
    /// Resolutions that fired after their job was removed by clear-all.
    pub stale_resolutions: AtomicU64,
    pub duplicate_resolutions: AtomicU64,
    pub storage_errors: AtomicU64,
}

impl DispatchMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_submitted: self.batches_submitted.load(Ordering::Relaxed),
            batches_rejected: self.batches_rejected.load(Ordering::Relaxed),
            jobs_enqueued: self.jobs_enqueued.load(Ordering::Relaxed),
            jobs_sent: self.jobs_sent.load(Ordering::Relaxed),
            jobs_errored: self.jobs_errored.load(Ordering::Relaxed),
            stale_resolutions: self.stale_resolutions.load(Ordering::Relaxed),
            duplicate_resolutions: self.duplicate_resolutions.load(Ordering::Relaxed),
            storage_errors: self.storage_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches_submitted: u64,
    pub batches_rejected: u64,
    pub jobs_enqueued: u64,
    pub jobs_sent: u64,
    pub jobs_errored: u64,
    pub stale_resolutions: u64,
    pub duplicate_resolutions: u64,
    pub storage_errors: u64,
}

/// A cancellable dashboard subscription. Snapshots arrive over a watch
/// channel. Last write wins by construction, so a slow reader only ever
/// sees the freshest state. Dropping the handle tears the poller down; no
/// refresh survives it.
pub struct PollerHandle {
    rx: watch::Receiver<DashboardState>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn state(&self) -> watch::Receiver<DashboardState> {
        self.rx.clone()
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct Dispatcher {
    store: Arc<RwLock<CampaignStore>>,
    backend: Arc<dyn DeliveryBackend>,
    storage: Arc<dyn JobStorage>,
    metrics: Arc<DispatchMetrics>,
}

impl Dispatcher {
    /// Hydrate the store from whatever the storage already holds.
    pub async fn new(
        backend: Arc<dyn DeliveryBackend>,
        storage: Arc<dyn JobStorage>,
    ) -> Result<Arc<Self>, DispatchError> {
        let jobs = storage.load_all().await?;
        if !jobs.is_empty() {
            info!(count = jobs.len(), "hydrated job store");
        }
        Ok(Arc::new(Self {
            store: Arc::new(RwLock::new(CampaignStore::from_jobs(jobs))),
            backend,
            storage,
            metrics: Arc::new(DispatchMetrics::default()),
        }))
    }

    /// Expand one submission into pending jobs and schedule a resolution for
    /// each. Returns once the jobs are durably recorded; delivery outcomes
    /// surface later through the job statuses, never through this call.
    #[instrument(skip(self, message, recipients), fields(recipients = recipients.len()))]
    pub async fn submit_batch(
        &self,
        message: &str,
        recipients: &[Recipient],
    ) -> Result<Vec<JobId>, DispatchError> {
        let now = UnixTimeMs::now();

        let jobs = {
            let mut store = self.store.write().await;
            let ids = store.insert_batch(message, recipients, now).map_err(|e| {
                self.metrics.batches_rejected.fetch_add(1, Ordering::Relaxed);
                e
            })?;
            ids.iter()
                .filter_map(|id| store.get(*id).cloned())
                .collect::<Vec<_>>()
        };

        if let Err(e) = self.storage.insert_batch(&jobs).await {
            // Roll the batch back. A concurrent reader may glimpse the doomed
            // jobs before the rollback lands, but never a partial batch, and
            // nothing of it survives this call.
            let ids: Vec<_> = jobs.iter().map(|j| j.id).collect();
            self.store.write().await.remove_batch(&ids);
            self.metrics.storage_errors.fetch_add(1, Ordering::Relaxed);
            warn!("batch persistence failed, rolled back: {e}");
            return Err(e.into());
        }

        self.metrics.batches_submitted.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .jobs_enqueued
            .fetch_add(jobs.len() as u64, Ordering::Relaxed);

        let ids: Vec<_> = jobs.iter().map(|j| j.id).collect();
        for job in jobs {
            let delay = self.backend.schedule(&job);
            let store = Arc::clone(&self.store);
            let backend = Arc::clone(&self.backend);
            let storage = Arc::clone(&self.storage);
            let metrics = Arc::clone(&self.metrics);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                Self::resolve_job(&store, &*backend, &*storage, &metrics, &job).await;
            });
        }

        info!(jobs = ids.len(), "batch enqueued");
        Ok(ids)
    }

    /// Drive one job to its terminal state. Missing jobs (cleared while the
    /// timer was pending) and already-terminal jobs are silent no-ops.
    /// The body comes from the job's own captured template, so submissions
    /// that land while this job waits cannot change what it sends.
    async fn resolve_job(
        store: &RwLock<CampaignStore>,
        backend: &dyn DeliveryBackend,
        storage: &dyn JobStorage,
        metrics: &DispatchMetrics,
        job: &Job,
    ) {
        let body = render_template(&job.message, &job.name);
        let outcome = backend.resolve(job, &body);
        let now = UnixTimeMs::now();

        let resolved = {
            let mut store = store.write().await;
            store.resolve(job.id, outcome, now).map(|j| j.status)
        };

        match resolved {
            Ok(status) => {
                match status {
                    crate::campaign::DeliveryStatus::Sent => {
                        metrics.jobs_sent.fetch_add(1, Ordering::Relaxed);
                    }
                    _ => {
                        metrics.jobs_errored.fetch_add(1, Ordering::Relaxed);
                    }
                }
                if let Err(e) = storage.update_status(job.id, status, now).await {
                    metrics.storage_errors.fetch_add(1, Ordering::Relaxed);
                    warn!(job = %job.id, "status persistence failed: {e}");
                }
            }
            Err(CampaignError::NotFound(_)) => {
                metrics.stale_resolutions.fetch_add(1, Ordering::Relaxed);
            }
            Err(CampaignError::AlreadyResolved { .. }) => {
                metrics.duplicate_resolutions.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(job = %job.id, "unexpected resolution failure: {e}");
            }
        }
    }

    /// Consistent aggregate + detail snapshot.
    pub async fn dashboard_state(&self) -> DashboardState {
        let store = self.store.read().await;
        DashboardState {
            stats: store.stats(),
            jobs: store.jobs_newest_first(),
        }
    }

    /// Atomically empty the store. Scheduled resolutions against removed
    /// jobs become no-ops.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<(), DispatchError> {
        {
            let mut store = self.store.write().await;
            store.clear_all();
        }
        self.storage.clear_all().await?;
        info!("store cleared");
        Ok(())
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Start a fixed-cadence dashboard poller: one snapshot immediately,
    /// then one per interval until the handle is cancelled or dropped.
    pub fn subscribe(&self, interval: Duration) -> PollerHandle {
        let (tx, rx) = watch::channel(DashboardState::default());
        let store = Arc::clone(&self.store);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let state = {
                    let store = store.read().await;
                    DashboardState {
                        stats: store.stats(),
                        jobs: store.jobs_newest_first(),
                    }
                };
                if tx.send(state).is_err() {
                    break;
                }
            }
        });

        PollerHandle { rx, task }
    }
}
