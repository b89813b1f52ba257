//! Bounded worker pool with cooperative cancellation.
//!
//! Workers claim items from a shared cursor and send `(index, result)` back
//! to the calling thread, which applies them in completion order. Only the
//! calling thread sees the results, so `on_complete` may mutate state
//! without synchronization.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use super::cancel::CancellationToken;

/// How often the consumer re-checks cancellation while waiting.
const CANCEL_POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolSummary {
    /// Items whose work was started.
    pub submitted: usize,
    /// Results handed to `on_complete`.
    pub completed: usize,
    pub cancelled: bool,
}

/// Run `work` over `items` on at most `workers` threads.
///
/// Cancellation is checked before every claim: once set, no new item is
/// started. The consumer stops as soon as it observes cancellation; results
/// still in flight are discarded. All threads are joined before returning.
pub fn run_bounded<T, R, W, C>(
    items: &[T],
    workers: usize,
    cancel: &CancellationToken,
    work: W,
    mut on_complete: C,
) -> PoolSummary
where
    T: Sync,
    R: Send,
    W: Fn(&T) -> R + Sync,
    C: FnMut(usize, R),
{
    let total = items.len();
    if total == 0 {
        return PoolSummary::default();
    }
    let workers = workers.clamp(1, total);

    let cursor = AtomicUsize::new(0);
    let submitted = AtomicUsize::new(0);
    let (tx, rx) = mpsc::channel::<(usize, R)>();
    let mut completed = 0;
    let mut cancelled = false;

    thread::scope(|scope| {
        for _ in 0..workers {
            let tx = tx.clone();
            let (cursor, submitted, work) = (&cursor, &submitted, &work);
            scope.spawn(move || loop {
                if cancel.is_cancelled() {
                    break;
                }
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= total || cancel.is_cancelled() {
                    break;
                }
                submitted.fetch_add(1, Ordering::SeqCst);
                let result = work(&items[index]);
                if tx.send((index, result)).is_err() {
                    break;
                }
            });
        }
        drop(tx);

        let rx = rx;
        loop {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            match rx.recv_timeout(CANCEL_POLL) {
                Ok((index, result)) => {
                    on_complete(index, result);
                    completed += 1;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        // Workers still running fail their next send and stop.
        drop(rx);
    });

    PoolSummary {
        submitted: submitted.load(Ordering::SeqCst),
        completed,
        cancelled,
    }
}
