use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{SaveOutcome, SharedFileSession};

/// Recurring save of the current file, running on its own tokio task.
///
/// The task stops when [`stop`](Self::stop) is awaited or the handle is dropped.
pub struct AutosaveHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AutosaveHandle {
    /// Spawns the loop; the first save fires one full `interval` after spawning.
    pub fn spawn(files: SharedFileSession, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let period = interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let task = tokio::spawn(run_autosave_loop(files, ticker, shutdown_rx));
        tracing::debug!(interval_ms = interval.as_millis() as u64, "autosave started");
        Self {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stops the loop, letting a save already in progress finish.
    pub async fn stop(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(%error, "autosave task ended abnormally");
            }
        }
        tracing::debug!("autosave stopped");
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_autosave_loop(
    files: SharedFileSession,
    mut ticker: tokio::time::Interval,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                let outcome = files.lock().await.autosave_tick().await;
                if outcome == SaveOutcome::SyncFailed {
                    tracing::debug!("autosave will retry on the next tick");
                }
            }
        }
    }
}
