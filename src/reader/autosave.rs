use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::NonFatal;
use crate::formats::ReadingProgress;
use crate::reader::store::ProgressStore;

/// Periodic progress writer owned by a reading session.
///
/// Each tick writes the latest percentage when it differs from the last
/// successful write. Failed writes are logged and left for the next tick.
/// Dropping the handle cancels the task without waiting for it.
#[derive(Debug)]
pub struct Autosave {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Autosave {
    pub fn spawn(
        store: Arc<dyn ProgressStore>,
        book_id: String,
        progress: watch::Receiver<ReadingProgress>,
        interval: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            store,
            book_id,
            progress,
            interval.max(Duration::from_millis(1)),
            cancel.clone(),
        ));
        Self {
            cancel,
            task: Some(task),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Cancels the task and waits for its final write to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            tracing::warn!(?err, "autosave task did not shut down cleanly");
        }
    }
}

impl Drop for Autosave {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    store: Arc<dyn ProgressStore>,
    book_id: String,
    mut progress: watch::Receiver<ReadingProgress>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    tracing::debug!(book_id = %book_id, ?interval, "autosave started");
    let mut last_saved: Option<u8> = None;
    loop {
        let cancelled = tokio::select! {
            _ = cancel.cancelled() => true,
            _ = ticker.tick() => false,
        };

        let percentage = progress.borrow_and_update().percentage;
        if last_saved != Some(percentage) {
            match store.update_progress(&book_id, percentage).await {
                Ok(()) => {
                    tracing::debug!(book_id = %book_id, percentage, "progress saved");
                    last_saved = Some(percentage);
                }
                Err(err) => NonFatal::progress_save(book_id.clone(), err).log(),
            }
        }

        if cancelled {
            break;
        }
    }
    tracing::debug!(book_id = %book_id, "autosave stopped");
}
