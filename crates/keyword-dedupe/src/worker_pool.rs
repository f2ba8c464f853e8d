//! Bounded async worker pool.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;

/// Run `f` over every item with at most `concurrency` calls in flight.
///
/// `min(concurrency, items.len())` workers pull indices from a shared cursor
/// until the input is exhausted. Results come back in input order. A
/// concurrency of 0 is treated as 1.
pub async fn run_bounded<'a, T, R, F, Fut>(items: &'a [T], concurrency: usize, f: F) -> Vec<R>
where
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = R>,
{
    if items.is_empty() {
        return Vec::new();
    }

    let workers = concurrency.clamp(1, items.len());
    let cursor = AtomicUsize::new(0);
    let cursor = &cursor;
    let f = &f;

    let tasks = (0..workers).map(|_| async move {
        let mut done = Vec::new();
        loop {
            let index = cursor.fetch_add(1, Ordering::Relaxed);
            let Some(item) = items.get(index) else {
                break;
            };
            done.push((index, f(item).await));
        }
        done
    });

    let mut results: Vec<(usize, R)> = join_all(tasks).await.into_iter().flatten().collect();
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_in_input_order() {
        let items: Vec<u64> = (0..20).collect();
        let results = run_bounded(&items, 4, |n| async move {
            // later items finish first
            tokio::time::sleep(Duration::from_millis(20 - *n)).await;
            n * 10
        })
        .await;
        assert_eq!(results, items.iter().map(|n| n * 10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let items: Vec<usize> = (0..25).collect();
        let in_flight = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        let (in_flight, peak) = (&in_flight, &peak);

        run_bounded(&items, 3, |_| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(2)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
        })
        .await;

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak {peak} exceeded bound");
        assert!(peak > 1, "pool never ran concurrently");
    }

    #[tokio::test]
    async fn test_every_item_processed_once() {
        let items: Vec<usize> = (0..50).collect();
        let calls = AtomicUsize::new(0);
        let results = run_bounded(&items, 8, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { *n }
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 50);
        assert_eq!(results, items);
    }

    #[tokio::test]
    async fn test_empty_and_zero_concurrency() {
        let empty: Vec<u8> = Vec::new();
        assert!(run_bounded(&empty, 4, |n| async move { *n }).await.is_empty());

        let items = vec![1u8, 2, 3];
        assert_eq!(run_bounded(&items, 0, |n| async move { *n }).await, items);
    }
}
