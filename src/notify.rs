use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Trailing-edge debounce: `touch` restarts a quiet-period timer and the
/// callback runs once the timer elapses untouched. A steady stream of touches
/// closer together than the window never fires.
pub struct ChangeNotifier {
    tx: mpsc::UnboundedSender<()>,
    task: JoinHandle<()>,
}

impl ChangeNotifier {
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(window: Duration, on_quiet: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                loop {
                    tokio::select! {
                        next = rx.recv() => {
                            if next.is_none() {
                                on_quiet();
                                return;
                            }
                        }
                        _ = tokio::time::sleep(window) => {
                            on_quiet();
                            break;
                        }
                    }
                }
            }
        });
        Self { tx, task }
    }

    pub fn touch(&self) {
        let _ = self.tx.send(());
    }
}

impl Drop for ChangeNotifier {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    const WINDOW: Duration = Duration::from_millis(300);

    fn counter() -> (Arc<AtomicUsize>, ChangeNotifier) {
        let fired = Arc::new(AtomicUsize::new(0));
        let hits = fired.clone();
        let notifier = ChangeNotifier::spawn(WINDOW, move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
        (fired, notifier)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_to_one_signal() {
        let (fired, notifier) = counter();
        for _ in 0..20 {
            notifier.touch();
            sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(400)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn isolated_touch_fires_after_window() {
        let (fired, notifier) = counter();
        notifier.touch();
        sleep(Duration::from_millis(299)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_fire_separately() {
        let (fired, notifier) = counter();
        notifier.touch();
        sleep(Duration::from_millis(500)).await;
        notifier.touch();
        notifier.touch();
        sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
