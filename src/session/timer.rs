use std::future::Future;
use tokio::task::JoinHandle;

/// Owns at most one pending background task
///
/// Arming replaces (and aborts) the previous task. Cancelling is idempotent.
#[derive(Debug, Default)]
pub struct RefreshTimer {
    handle: Option<JoinHandle<()>>,
}

impl RefreshTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the current runtime, cancelling whatever was armed before
    pub fn arm<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.handle = Some(tokio::spawn(task));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RefreshTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_arm_replaces_previous_task() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = RefreshTimer::new();

        let first = fired.clone();
        timer.arm(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            first.fetch_add(1, Ordering::SeqCst);
        });

        let second = fired.clone();
        timer.arm(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            second.fetch_add(10, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 10);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = RefreshTimer::new();
        timer.cancel();

        let counter = fired.clone();
        timer.arm(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.is_armed());

        timer.cancel();
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
