//! Search input debouncing.
//!
//! Every input restarts the delay. A value is committed only once the delay
//! passes with no newer input, so a burst of keystrokes yields at most one
//! commit: the last value typed.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Delay between the last keystroke and the committed search term.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

/// A closure run once after a delay unless cancelled first.
#[derive(Debug)]
pub struct DelayedTask {
    handle: JoinHandle<()>,
}

impl DelayedTask {
    pub fn spawn<F>(delay: Duration, run: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            run();
        });
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Commits pushed values to a channel after `delay` of quiet.
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<DelayedTask>,
    commits: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// The receiver yields each committed value.
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (commits, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                pending: None,
                commits,
            },
            rx,
        )
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a new raw value, replacing any commit still waiting.
    pub fn push(&mut self, value: T) {
        self.cancel();
        let commits = self.commits.clone();
        self.pending = Some(DelayedTask::spawn(self.delay, move || {
            // Receiver gone means nobody is listening any more.
            let _ = commits.send(value);
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.cancel();
        }
    }

    /// A value has been pushed and not yet committed.
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}
