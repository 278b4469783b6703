//! Background relevance sweeper.
//!
//! Runs the global relevance pass off the request path: once on startup, then
//! every `interval`, and whenever [`RelevanceSweeperHandle::trigger`] is
//! called. Failures are logged and retried with bounded exponential backoff;
//! they never propagate.

use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::relevance::RelevanceReconciler;
use crate::store::SystemStore;

/// Config for the relevance sweeper.
#[derive(Debug, Clone)]
pub struct RelevanceSweeper {
    pub interval: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for RelevanceSweeper {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
        }
    }
}

/// Handle for the running sweeper (shutdown + trigger hook).
#[derive(Debug)]
pub struct RelevanceSweeperHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl RelevanceSweeperHandle {
    /// Request a pass as soon as possible.
    ///
    /// Triggers are coalesced: if a pass is already pending this is a no-op.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Stop the sweeper thread and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl Drop for RelevanceSweeperHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl RelevanceSweeper {
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Spawn the sweeper thread.
    ///
    /// Store calls are driven on `runtime`, which must outlive the handle.
    /// A zero `interval` is rejected with `InvalidInput`.
    pub fn spawn<S>(
        &self,
        reconciler: RelevanceReconciler<S>,
        runtime: Handle,
    ) -> io::Result<RelevanceSweeperHandle>
    where
        S: SystemStore + 'static,
    {
        if self.interval.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "relevance sweeper interval must be non-zero",
            ));
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);

        let cfg = self.clone();
        let join = thread::Builder::new()
            .name("relevance-sweeper".to_string())
            .spawn(move || sweeper_loop(cfg, shutdown_rx, trigger_rx, reconciler, runtime))?;

        Ok(RelevanceSweeperHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            join: Some(join),
        })
    }
}

fn sweeper_loop<S>(
    cfg: RelevanceSweeper,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    reconciler: RelevanceReconciler<S>,
    runtime: Handle,
) where
    S: SystemStore,
{
    info!(interval_secs = cfg.interval.as_secs(), "relevance sweeper started");

    let mut next_tick = Instant::now() + cfg.interval;
    let mut pending = true; // run once on startup
    let mut failures: u32 = 0;
    let mut backoff_until: Option<Instant> = None;

    loop {
        // Shutdown has priority.
        match shutdown_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
            Err(mpsc::TryRecvError::Empty) => {}
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            while next_tick <= now {
                next_tick += cfg.interval;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if let Some(until) = backoff_until {
            if Instant::now() < until {
                thread::sleep(Duration::from_millis(50));
                continue;
            }
            backoff_until = None;
        }

        if !pending {
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(250));
            thread::sleep(sleep_for);
            continue;
        }

        pending = false;

        match runtime.block_on(reconciler.recompute_all()) {
            Ok(report) => {
                failures = 0;
                info!(marked_irrelevant = report.marked_irrelevant, "relevance sweep finished");
            }
            Err(e) => {
                warn!(error = %e, attempt = failures + 1, "relevance sweep failed");
                failures += 1;
                if failures <= cfg.max_retries {
                    pending = true;
                    backoff_until = Some(Instant::now() + backoff(cfg.base_backoff, failures));
                } else {
                    failures = 0;
                }
            }
        }
    }

    info!("relevance sweeper stopped");
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    // base * 2^(attempt-1), capped at 10s
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(pow as u128);
    Duration::from_millis(ms.min(10_000) as u64)
}
