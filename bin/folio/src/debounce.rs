//! Timer-coalescing queue for file change notifications.

use std::{collections::BTreeSet, future::Future, mem, path::PathBuf, time::Duration};

use tokio::sync::mpsc;

/// Collect changed paths and flush them as one batch once `delay` passes
/// without a new event.
///
/// Every event restarts the timer. Pending paths are flushed one last time
/// when the sender side closes.
pub async fn debounce<F, Fut>(
    mut rx: mpsc::UnboundedReceiver<PathBuf>,
    delay: Duration,
    mut flush: F,
) where
    F: FnMut(BTreeSet<PathBuf>) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut pending = BTreeSet::new();

    loop {
        if pending.is_empty() {
            match rx.recv().await {
                Some(path) => {
                    pending.insert(path);
                }
                None => return,
            }
            continue;
        }

        tokio::select! {
            received = rx.recv() => match received {
                Some(path) => {
                    pending.insert(path);
                }
                None => {
                    flush(mem::take(&mut pending)).await;
                    return;
                }
            },
            () = tokio::time::sleep(delay) => {
                flush(mem::take(&mut pending)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_queue(
        delay_ms: u64,
    ) -> (
        mpsc::UnboundedSender<PathBuf>,
        mpsc::UnboundedReceiver<BTreeSet<PathBuf>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        tokio::spawn(debounce(rx, Duration::from_millis(delay_ms), move |batch| {
            let out_tx = out_tx.clone();
            async move {
                let _ = out_tx.send(batch);
            }
        }));

        (tx, out_rx)
    }

    fn paths(names: &[&str]) -> BTreeSet<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_flushes_once() {
        let (tx, mut out) = spawn_queue(200);
        tx.send(PathBuf::from("a")).unwrap();
        tx.send(PathBuf::from("b")).unwrap();
        tx.send(PathBuf::from("a")).unwrap();

        assert_eq!(out.recv().await.unwrap(), paths(&["a", "b"]));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(out.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_event_resets_timer() {
        let (tx, mut out) = spawn_queue(200);
        tx.send(PathBuf::from("a")).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(PathBuf::from("b")).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(out.try_recv().is_err());
        assert_eq!(out.recv().await.unwrap(), paths(&["a", "b"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_flush_separately() {
        let (tx, mut out) = spawn_queue(100);
        tx.send(PathBuf::from("a")).unwrap();
        assert_eq!(out.recv().await.unwrap(), paths(&["a"]));

        tx.send(PathBuf::from("b")).unwrap();
        assert_eq!(out.recv().await.unwrap(), paths(&["b"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending() {
        let (tx, mut out) = spawn_queue(10_000);
        tx.send(PathBuf::from("a")).unwrap();
        drop(tx);

        assert_eq!(out.recv().await.unwrap(), paths(&["a"]));
        assert!(out.recv().await.is_none());
    }
}
