use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;

#[test]
fn callbacks_run_once_on_first_cancel() {
    let signal = CancelSignal::new();
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let hits = hits.clone();
        signal.on_cancel(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        });
    }

    assert!(signal.check().is_ok());
    signal.cancel();
    signal.cancel();
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(signal.is_cancelled());
    assert!(matches!(signal.check(), Err(FramecastError::Cancelled)));
}

#[test]
fn late_subscriber_runs_immediately() {
    let signal = CancelSignal::new();
    signal.cancel();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    signal.on_cancel(move || {
        h.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn clones_share_state() {
    let signal = CancelSignal::new();
    let clone = signal.clone();
    clone.cancel();
    assert!(signal.is_cancelled());
}

#[tokio::test]
async fn race_prefers_cancellation() {
    let signal = CancelSignal::new();
    signal.cancel();
    let r = signal.race(async { Ok::<_, FramecastError>(7) }).await;
    assert!(matches!(r, Err(FramecastError::Cancelled)));
}

#[tokio::test]
async fn race_interrupts_pending_work() {
    let signal = CancelSignal::new();
    let trigger = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let r = signal
        .race(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok::<_, FramecastError>(())
        })
        .await;
    assert!(r.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn race_passes_through_results() {
    let signal = CancelSignal::new();
    let r = signal.race(async { Ok::<_, FramecastError>(7) }).await;
    assert_eq!(r.unwrap(), 7);
}
