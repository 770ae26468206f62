//! Bounded per-class concurrency for provider calls.
//!
//! Image and text generation each get their own semaphore, so saturating one
//! class never blocks the other. Tokio semaphores are fair: waiters acquire
//! permits in arrival order.

use crate::config::ConcurrencyConfig;
use crate::types::OperationClass;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Two independent bounded queues, one per [`OperationClass`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    image: Arc<Semaphore>,
    text: Arc<Semaphore>,
    image_slots: usize,
    text_slots: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::from(&ConcurrencyConfig::default())
    }
}

impl From<&ConcurrencyConfig> for Dispatcher {
    fn from(config: &ConcurrencyConfig) -> Self {
        Self::new(config.image_slots, config.text_slots)
    }
}

impl Dispatcher {
    pub fn new(image_slots: usize, text_slots: usize) -> Self {
        Self {
            image: Arc::new(Semaphore::new(image_slots)),
            text: Arc::new(Semaphore::new(text_slots)),
            image_slots,
            text_slots,
        }
    }

    fn semaphore(&self, class: OperationClass) -> &Semaphore {
        match class {
            OperationClass::Image => &self.image,
            OperationClass::Text => &self.text,
        }
    }

    /// Capacity of a class.
    pub fn slots(&self, class: OperationClass) -> usize {
        match class {
            OperationClass::Image => self.image_slots,
            OperationClass::Text => self.text_slots,
        }
    }

    /// Number of calls of `class` currently holding a slot.
    pub fn in_flight(&self, class: OperationClass) -> usize {
        self.slots(class)
            .saturating_sub(self.semaphore(class).available_permits())
    }

    /// Run `task` once a slot for `class` is free.
    ///
    /// The slot is released when `task` completes, whatever its output, or
    /// when the returned future is dropped.
    pub async fn submit<F, T>(&self, class: OperationClass, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let permit = match self.semaphore(class).acquire().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!("{class} dispatcher semaphore closed unexpectedly; running unbounded");
                None
            }
        };
        tracing::trace!("{class} slot acquired ({}/{})", self.in_flight(class), self.slots(class));

        let output = task.await;
        drop(permit); // Release slot before handing the result back
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    /// Submit `count` tasks to `class` and return the observed high-water mark.
    async fn high_water_mark(dispatcher: &Dispatcher, class: OperationClass, count: usize) -> usize {
        let in_flight = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);
        let (in_flight_ref, max_seen_ref) = (&in_flight, &max_seen);

        let tasks = (0..count).map(move |_| {
            dispatcher.submit(class, async move {
                let current = in_flight_ref.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen_ref.fetch_max(current, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight_ref.fetch_sub(1, Ordering::SeqCst);
            })
        });
        join_all(tasks).await;

        max_seen.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn test_image_class_bounded_at_two() {
        let dispatcher = Dispatcher::default();
        let max = high_water_mark(&dispatcher, OperationClass::Image, 40).await;
        assert_eq!(max, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_text_class_bounded_at_four() {
        let dispatcher = Dispatcher::default();
        let max = high_water_mark(&dispatcher, OperationClass::Text, 40).await;
        assert_eq!(max, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_bound_holds_across_spawned_tasks() {
        let dispatcher = Dispatcher::new(2, 4);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                let in_flight = in_flight.clone();
                let max_seen = max_seen.clone();
                tokio::spawn(async move {
                    dispatcher
                        .submit(OperationClass::Image, async {
                            let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(current, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            in_flight.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_saturated_image_class_does_not_block_text() {
        let dispatcher = Dispatcher::new(2, 4);
        let (release_a_tx, release_a_rx) = oneshot::channel::<()>();
        let (release_b_tx, release_b_rx) = oneshot::channel::<()>();

        // Occupy both image slots until released.
        let blocker = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                let first = dispatcher.submit(OperationClass::Image, async move {
                    let _ = release_a_rx.await;
                });
                let second = dispatcher.submit(OperationClass::Image, async move {
                    let _ = release_b_rx.await;
                });
                tokio::join!(first, second);
            })
        };

        while dispatcher.in_flight(OperationClass::Image) < 2 {
            tokio::task::yield_now().await;
        }

        let text = tokio::time::timeout(
            Duration::from_secs(1),
            dispatcher.submit(OperationClass::Text, async { "title" }),
        )
        .await;
        assert_eq!(text.unwrap(), "title");

        release_a_tx.send(()).unwrap();
        release_b_tx.send(()).unwrap();
        blocker.await.unwrap();
        assert_eq!(dispatcher.in_flight(OperationClass::Image), 0);
    }

    #[tokio::test]
    async fn test_failing_task_frees_slot() {
        let dispatcher = Dispatcher::new(1, 1);

        let failed: Result<(), &str> = dispatcher
            .submit(OperationClass::Image, async { Err("boom") })
            .await;
        assert!(failed.is_err());
        assert_eq!(dispatcher.in_flight(OperationClass::Image), 0);

        let next = tokio::time::timeout(
            Duration::from_secs(1),
            dispatcher.submit(OperationClass::Image, async { 7 }),
        )
        .await;
        assert_eq!(next.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_dropped_submission_frees_slot() {
        let dispatcher = Dispatcher::new(1, 1);
        let pending = dispatcher.submit(OperationClass::Image, std::future::pending::<()>());
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert_eq!(dispatcher.in_flight(OperationClass::Image), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arrival_order_is_preserved() {
        let dispatcher = Dispatcher::new(1, 1);
        let order = std::sync::Mutex::new(Vec::new());
        let (dispatcher_ref, order_ref) = (&dispatcher, &order);

        let tasks = (0..5).map(move |i| {
            dispatcher_ref.submit(OperationClass::Image, async move {
                order_ref.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(5)).await;
            })
        });
        join_all(tasks).await;

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
