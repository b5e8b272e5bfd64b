//! Out-of-band ageing of durable thread mappings.

use crate::config::LifecycleSettings;
use crate::mapping::{
    domain::{TenantId, ThreadId, ThreadMapping},
    ports::{MappingStore, MappingStoreError},
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of rows selected per sweep batch.
pub const DEFAULT_SWEEP_BATCH_SIZE: usize = 500;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Errors raised by lifecycle operations.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    /// The mapping store rejected an operation.
    #[error(transparent)]
    Store(#[from] MappingStoreError),

    /// A duration cannot be subtracted from the current time.
    #[error("duration out of range: {0:?}")]
    DurationOutOfRange(Duration),
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Rows selected as stale.
    pub candidates: u64,
    /// Rows removed.
    pub deleted: u64,
    /// Rows that were touched or removed by someone else before deletion.
    pub skipped: u64,
}

/// Removes mappings that have been idle past the inactivity threshold.
///
/// Sweeps are meant to run from a single scheduler. Concurrent sweeps remain
/// safe because every delete re-checks the row's activity.
pub struct MappingLifecycleManager<S, C>
where
    S: MappingStore + ?Sized,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    batch_size: usize,
}

impl<S, C> MappingLifecycleManager<S, C>
where
    S: MappingStore + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates a manager with the default batch size.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self {
            store,
            clock,
            batch_size: DEFAULT_SWEEP_BATCH_SIZE,
        }
    }

    /// Sets the number of rows selected per batch (at least one).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Deletes mappings idle for longer than `inactivity_threshold`.
    ///
    /// The cutoff is fixed when the sweep starts as the earlier of
    /// `now - inactivity_threshold` and `now - grace_window`. A mapping
    /// touched after selection survives.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] when the store fails and
    /// [`LifecycleError::DurationOutOfRange`] for unrepresentable durations.
    pub async fn sweep(
        &self,
        inactivity_threshold: Duration,
        grace_window: Duration,
    ) -> LifecycleResult<SweepReport> {
        self.sweep_in_batches(inactivity_threshold, grace_window, self.batch_size)
            .await
    }

    async fn sweep_in_batches(
        &self,
        inactivity_threshold: Duration,
        grace_window: Duration,
        batch_size: usize,
    ) -> LifecycleResult<SweepReport> {
        let now = self.clock.utc();
        let cutoff =
            cutoff_before(now, inactivity_threshold)?.min(cutoff_before(now, grace_window)?);
        let limit = batch_size.max(1);
        let mut report = SweepReport::default();
        let mut seen = HashSet::new();

        loop {
            let batch = self.store.list_inactive(cutoff, limit).await?;
            let exhausted = batch.len() < limit;
            let fresh: Vec<ThreadMapping> = batch
                .into_iter()
                .filter(|mapping| seen.insert(mapping.thread_id().clone()))
                .collect();
            // Only rows already handled in this sweep came back.
            if fresh.is_empty() {
                break;
            }
            self.delete_batch(&fresh, cutoff, &mut report).await?;
            if exhausted {
                break;
            }
        }

        info!(
            candidates = report.candidates,
            deleted = report.deleted,
            skipped = report.skipped,
            cutoff = %cutoff,
            "mapping sweep finished"
        );
        Ok(report)
    }

    async fn delete_batch(
        &self,
        batch: &[ThreadMapping],
        cutoff: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> LifecycleResult<()> {
        for mapping in batch {
            report.candidates += 1;
            if self
                .store
                .delete_if_inactive(mapping.thread_id(), cutoff)
                .await?
            {
                report.deleted += 1;
            } else {
                debug!(thread_id = %mapping.thread_id(), "mapping touched during sweep, kept");
                report.skipped += 1;
            }
        }
        Ok(())
    }

    /// Deletes every mapping idle for longer than `older_than` in one call.
    ///
    /// Unlike [`Self::sweep`] this does not batch.
    ///
    /// # Errors
    ///
    /// See [`Self::sweep`].
    pub async fn purge(&self, older_than: Duration) -> LifecycleResult<u64> {
        let cutoff = cutoff_before(self.clock.utc(), older_than)?;
        let deleted = self.store.delete_inactive(cutoff).await?;
        info!(deleted, cutoff = %cutoff, "purged inactive mappings");
        Ok(deleted)
    }

    /// Marks a mapping inactive without deleting it.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] with
    /// [`MappingStoreError::NotFound`] for unknown threads.
    pub async fn deactivate(&self, thread_id: &ThreadId) -> LifecycleResult<()> {
        self.store.deactivate(thread_id).await?;
        info!(thread_id = %thread_id, "deactivated thread mapping");
        Ok(())
    }

    /// Returns the active mappings of a tenant, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] when the store fails.
    pub async fn list_active(&self, tenant_id: &TenantId) -> LifecycleResult<Vec<ThreadMapping>> {
        Ok(self.store.list_active(tenant_id).await?)
    }

    /// Sweeps every `sweep_interval` until `shutdown` is cancelled.
    ///
    /// The first sweep runs immediately. Sweep failures are logged and the
    /// loop carries on.
    pub async fn run(&self, settings: LifecycleSettings, shutdown: &CancellationToken) {
        let mut ticker = tokio::time::interval(settings.sweep_interval.max(MIN_SWEEP_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            sweep_interval = ?settings.sweep_interval,
            inactivity_threshold = ?settings.inactivity_threshold,
            "starting mapping sweeper"
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self
                        .sweep_in_batches(
                            settings.inactivity_threshold,
                            settings.grace_window,
                            settings.batch_size,
                        )
                        .await
                    {
                        warn!(error = %err, "mapping sweep failed");
                    }
                }
            }
        }

        info!("mapping sweeper stopped");
    }
}

fn cutoff_before(now: DateTime<Utc>, age: Duration) -> LifecycleResult<DateTime<Utc>> {
    chrono::Duration::from_std(age)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or(LifecycleError::DurationOutOfRange(age))
}
