//! Tracks the tasks spawned for a run and shuts them down together.
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Owns the shutdown signal and the handles of every spawned task.
///
/// Clones share the same handle list and signal. Tasks observe the signal
/// through [`TaskManager::get_shutdown_rx`].
#[derive(Clone, Debug)]
pub struct TaskManager {
    handles: Arc<Mutex<Vec<(&'static str, JoinHandle<()>)>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskManager {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            handles: Arc::new(Mutex::new(Vec::new())),
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Spawns `future` and keeps its handle until [`TaskManager::shutdown`].
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        debug!(task_name = name, "Spawning task");
        let handle = tokio::spawn(future);
        self.lock_handles().push((name, handle));
    }

    /// A receiver that changes to `true` once shutdown is triggered.
    pub fn get_shutdown_rx(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Asks every task to stop.
    pub fn trigger_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Waits for all spawned tasks and returns how many of them panicked.
    pub async fn shutdown(self) -> usize {
        let handles = self.lock_handles().drain(..).collect::<Vec<_>>();
        debug!(tasks = handles.len(), "Waiting for tasks to finish");

        let (names, handles): (Vec<&'static str>, Vec<JoinHandle<()>>) =
            handles.into_iter().unzip();
        let results = join_all(handles).await;

        let mut panicked = 0;
        for (task_name, result) in names.into_iter().zip(results) {
            if let Err(e) = result {
                error!(task_name, error = %e, "Task panicked");
                panicked += 1;
            }
        }
        panicked
    }

    fn lock_handles(&self) -> std::sync::MutexGuard<'_, Vec<(&'static str, JoinHandle<()>)>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_signal_reaches_tasks() {
        let task_manager = TaskManager::new();
        let mut shutdown_rx = task_manager.get_shutdown_rx();
        task_manager.spawn("Waiter", async move {
            let _ = shutdown_rx.changed().await;
        });

        assert!(!task_manager.is_shutting_down());
        task_manager.trigger_shutdown();
        assert!(task_manager.is_shutting_down());

        let panicked = tokio::time::timeout(Duration::from_secs(1), task_manager.shutdown())
            .await
            .unwrap();
        assert_eq!(panicked, 0);
    }

    #[tokio::test]
    async fn test_panics_are_counted() {
        let task_manager = TaskManager::new();
        task_manager.spawn("Ok", async {});
        task_manager.spawn("Boom", async { panic!("boom") });
        assert_eq!(task_manager.shutdown().await, 1);
    }
}
