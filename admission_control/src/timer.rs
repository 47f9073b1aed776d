//! Control-loop plumbing. Each loop is a spawned tokio task that sleeps for a
//! delay its tick closure hands back, so the fast loop's adaptive interval
//! takes effect on the very next re-arm. The handle owns a cancellation flag
//! and the task itself; `cancel_and_join` guarantees no tick runs after it
//! returns, which is what reconfiguration and teardown rely on.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

pub(crate) struct LoopHandle {
    cancel: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl LoopHandle {
    /// Spawn a periodic loop. `tick` runs after each delay and returns the
    /// next delay, or `None` to stop the loop.
    pub fn spawn<F>(name: &'static str, initial_delay: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Option<Duration> + Send + 'static,
    {
        let (cancel, mut cancelled) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut delay = initial_delay;
            loop {
                tokio::select! {
                    _ = cancelled.changed() => break,
                    _ = tokio::time::sleep(delay) => {
                        match tick() {
                            Some(next_delay) => delay = next_delay,
                            None => break,
                        }
                    },
                }
            }
            debug!("{name} control loop exited");
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Signal the loop to stop and wait for it to finish. Ticks are
    /// synchronous, so once this returns no callback is running and none will
    /// run again.
    pub async fn cancel_and_join(mut self) {
        let _ = self.cancel.send(true);
        if let Some(task) = self.task.take() {
            if let Err(join_err) = task.await {
                if join_err.is_panic() {
                    error!("control loop task panicked: {join_err}");
                }
            }
        }
    }
}

impl Drop for LoopHandle {
    fn drop(&mut self) {
        // Backstop for handles dropped without cancel_and_join.
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
