//! Scheduler (§4.7): independent-cadence recurring jobs with
//! skip-if-still-running semantics and graceful shutdown.
//!
//! The tick loop shape is grounded on the teacher's
//! `data_collector::run_data_collector` (`tokio::time::interval` +
//! `loop { interval.tick().await; ... }`). Graceful shutdown is
//! grounded on `cowprotocol-services`' `ShutdownController`
//! (`crates/autopilot/src/shutdown_controller.rs`): a `tokio::select!`
//! over `ctrl_c()` and, on unix, `SIGTERM`.

use crate::collector::Collector;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// One job's recurring cadence, independent of the others (§4.7 table).
pub struct ScheduledJob {
    pub name: &'static str,
    pub period: Duration,
    running: Arc<AtomicBool>,
}

impl ScheduledJob {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the job's tick loop. A tick that fires while the previous
    /// invocation of the same job is still running is skipped, not
    /// queued (§4.7 state machine).
    fn spawn<F, Fut>(self, mut shutdown: oneshot::Receiver<()>, mut action: F) -> tokio::task::JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if self.running.swap(true, Ordering::SeqCst) {
                            warn!(job = self.name, "previous tick still running, skipping");
                            continue;
                        }
                        let started = std::time::Instant::now();
                        if let Err(e) = action().await {
                            error!(job = self.name, error = %e, "job tick failed");
                        }
                        let elapsed = started.elapsed();
                        if elapsed > self.period {
                            warn!(job = self.name, elapsed_ms = elapsed.as_millis() as u64, "tick exceeded its period");
                        }
                        self.running.store(false, Ordering::SeqCst);
                    }
                    _ = &mut shutdown => {
                        info!(job = self.name, "stopping");
                        break;
                    }
                }
            }
        })
    }
}

/// Signals every job's `shutdown` receiver and waits up to `drain_timeout`
/// for them all to return (§4.7 lifecycle, §5 cancellation, §8 S6).
pub struct Scheduler {
    handles: Vec<tokio::task::JoinHandle<()>>,
    shutdown_txs: Vec<oneshot::Sender<()>>,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Registers and starts the four jobs in §4.7's table against `collector`.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        collector: Arc<Collector>,
        collect_interval: Duration,
        depth_interval: Duration,
        gas_interval: Duration,
        cleanup_interval: Duration,
        retention_days: i64,
    ) -> Self {
        let mut handles = Vec::new();
        let mut shutdown_txs = Vec::new();

        {
            let (tx, rx) = oneshot::channel();
            let c = collector.clone();
            handles.push(ScheduledJob::new("price_collection", collect_interval).spawn(rx, move || {
                let c = c.clone();
                async move {
                    let stats = c.collect_prices().await?;
                    info!(
                        priced = stats.priced,
                        no_liquidity = stats.no_liquidity,
                        not_found = stats.not_found,
                        decode_errors = stats.decode_errors,
                        unsupported = stats.unsupported,
                        "price collection tick complete"
                    );
                    Ok(())
                }
            }));
            shutdown_txs.push(tx);
        }

        {
            let (tx, rx) = oneshot::channel();
            let c = collector.clone();
            handles.push(ScheduledJob::new("depth_sampling", depth_interval).spawn(rx, move || {
                let c = c.clone();
                async move {
                    let count = c.collect_v3_depths().await?;
                    info!(rows = count, "depth sampling tick complete");
                    Ok(())
                }
            }));
            shutdown_txs.push(tx);
        }

        {
            let (tx, rx) = oneshot::channel();
            let c = collector.clone();
            handles.push(ScheduledJob::new("gas_sampling", gas_interval).spawn(rx, move || {
                let c = c.clone();
                async move { c.collect_gas().await }
            }));
            shutdown_txs.push(tx);
        }

        {
            let (tx, rx) = oneshot::channel();
            let c = collector.clone();
            handles.push(ScheduledJob::new("retention_cleanup", cleanup_interval).spawn(rx, move || {
                let c = c.clone();
                async move {
                    let deleted = c.cleanup_old(retention_days).await?;
                    info!(deleted, "retention cleanup complete");
                    Ok(())
                }
            }));
            shutdown_txs.push(tx);
        }

        let cancel = collector.cancel_token();
        Self {
            handles,
            shutdown_txs,
            cancel,
        }
    }

    /// Signals all jobs to stop issuing new ticks, cancels whatever tick
    /// is currently in flight (§5), and waits up to 30s for them to
    /// drain (§4.7 lifecycle). Returns once the deadline passes even if
    /// a job is still in flight — the caller owns process exit.
    pub async fn stop(self) {
        for tx in self.shutdown_txs {
            let _ = tx.send(());
        }
        self.cancel.cancel();
        let drain = futures::future::join_all(self.handles);
        if tokio::time::timeout(Duration::from_secs(30), drain).await.is_err() {
            warn!("scheduler drain deadline exceeded, returning anyway");
        }
    }
}

/// Resolves when the process receives an interrupt or terminate signal.
/// Mirrors `cowprotocol-services`' `ShutdownController::wait_for_signal`.
pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn skip_if_still_running_never_overlaps() {
        let calls = Arc::new(AtomicUsize::new(0));
        let concurrent = Arc::new(AtomicUsize::new(0));
        let max_concurrent = Arc::new(AtomicUsize::new(0));

        let (tx, rx) = oneshot::channel();
        let job = ScheduledJob::new("test", Duration::from_millis(10));
        let calls2 = calls.clone();
        let concurrent2 = concurrent.clone();
        let max2 = max_concurrent.clone();
        let handle = job.spawn(rx, move || {
            let calls = calls2.clone();
            let concurrent = concurrent2.clone();
            let max = max2.clone();
            async move {
                let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                max.fetch_max(now, Ordering::SeqCst);
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                concurrent.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        let _ = tx.send(());
        let _ = handle.await;

        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }
}
