use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct PendingJob {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PendingJob {
    fn cancel(self) {
        self.token.cancel();
    }
}

enum Wake<T> {
    Result(Option<(u64, T)>),
    Exited,
}

/// Runs at most one delayed job at a time and only ever yields the result of
/// the most recently scheduled one.
///
/// Each job is tagged with a generation number. Scheduling or cancelling
/// bumps the generation and cancels the pending job's token, so a job that
/// already finished but whose result is still queued is dropped on receipt
/// instead of being applied.
pub struct Debouncer<T> {
    generation: u64,
    pending: Option<PendingJob>,
    tx: mpsc::UnboundedSender<(u64, T)>,
    rx: mpsc::UnboundedReceiver<(u64, T)>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            generation: 0,
            pending: None,
            tx,
            rx,
        }
    }

    /// Cancels whatever is pending and runs `job` after `delay`.
    /// Returns the generation of the new job.
    pub fn schedule<F, Fut>(&mut self, delay: Duration, job: F) -> u64
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        let token = CancellationToken::new();
        let cancel = token.clone();
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            let value = tokio::select! {
                _ = token.cancelled() => return,
                value = job(token.clone()) => value,
            };
            let _ = tx.send((generation, value));
        });

        self.pending = Some(PendingJob {
            token: cancel,
            handle,
        });
        generation
    }

    pub fn cancel(&mut self) {
        self.generation += 1;
        if let Some(job) = self.pending.take() {
            job.cancel();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Waits for the latest job's result. Returns `None` at once when nothing
    /// is pending, or when the job ends without producing a value.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            let wake = {
                let job = self.pending.as_mut()?;
                tokio::select! {
                    biased;
                    message = self.rx.recv() => Wake::Result(message),
                    _ = &mut job.handle => Wake::Exited,
                }
            };

            match wake {
                Wake::Result(message) => {
                    let (generation, value) = message?;
                    if let Some(value) = self.accept(generation, value) {
                        return Some(value);
                    }
                }
                Wake::Exited => {
                    // A job that finished normally queued its value before exiting
                    if let Some(value) = self.try_next() {
                        return Some(value);
                    }
                    tracing::warn!(generation = self.generation, "debounced job ended without a result");
                    self.pending = None;
                    return None;
                }
            }
        }
    }

    /// Non-blocking variant of [`Debouncer::next`].
    pub fn try_next(&mut self) -> Option<T> {
        while let Ok((generation, value)) = self.rx.try_recv() {
            if let Some(value) = self.accept(generation, value) {
                return Some(value);
            }
        }
        None
    }

    fn accept(&mut self, generation: u64, value: T) -> Option<T> {
        if generation == self.generation && self.pending.is_some() {
            self.pending = None;
            Some(value)
        } else {
            tracing::debug!(generation, current = self.generation, "discarding stale result");
            None
        }
    }
}

impl<T: Send + 'static> Default for Debouncer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(job) = self.pending.take() {
            job.cancel();
        }
    }
}
