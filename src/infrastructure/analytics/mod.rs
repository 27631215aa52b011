//! Fire-and-forget analytics recording backed by a bounded queue and a
//! fixed number of concurrent writers.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{
        Semaphore,
        mpsc::{self, error::TrySendError},
    },
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::domain::{entities::AnalyticsEvent, repositories::AnalyticsRepository};
use crate::infrastructure::config::AnalyticsConfig;

/// Handle used by request paths to record events. Cloning is cheap.
///
/// Recording never blocks and never fails the caller: when the queue is
/// full the new event is dropped, counted, and logged.
#[derive(Clone)]
pub struct AnalyticsSink {
    sender: mpsc::Sender<AnalyticsEvent>,
    dropped: Arc<AtomicU64>,
}

/// Owns the dispatcher task; await [`AnalyticsWorkers::shutdown`] after every
/// sink clone has been dropped to flush queued events.
pub struct AnalyticsWorkers {
    dispatcher: JoinHandle<()>,
}

impl AnalyticsSink {
    /// Start the dispatcher with `config.workers` concurrent writers.
    pub fn spawn(
        repository: Arc<dyn AnalyticsRepository>,
        config: &AnalyticsConfig,
    ) -> (Self, AnalyticsWorkers) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let workers = config.workers.max(1);
        let dispatcher = tokio::spawn(dispatch(receiver, repository, workers));

        info!(workers, queue_capacity = config.queue_capacity, "Analytics workers started");

        (Self { sender, dropped: Arc::new(AtomicU64::new(0)) }, AnalyticsWorkers { dispatcher })
    }

    pub fn record(&self, event: AnalyticsEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    event_type = %event.event_type,
                    account_id = %event.account_id,
                    dropped_total = dropped,
                    "Analytics queue full, dropping event"
                );
            }
            Err(TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(event_type = %event.event_type, "Analytics workers stopped, dropping event");
            }
        }
    }

    /// Events discarded since start because the queue was full or closed.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl AnalyticsWorkers {
    /// Wait for queued and in-flight events to be written, up to `grace`.
    pub async fn shutdown(self, grace: Duration) {
        match tokio::time::timeout(grace, self.dispatcher).await {
            Ok(Ok(())) => info!("Analytics workers drained"),
            Ok(Err(e)) => error!(error = %e, "Analytics dispatcher panicked"),
            Err(_) => warn!(grace_secs = grace.as_secs(), "Analytics workers did not drain in time"),
        }
    }
}

async fn dispatch(
    mut receiver: mpsc::Receiver<AnalyticsEvent>,
    repository: Arc<dyn AnalyticsRepository>,
    workers: usize,
) {
    let permits = Arc::new(Semaphore::new(workers));

    while let Some(event) = receiver.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let repository = Arc::clone(&repository);

        tokio::spawn(async move {
            let _permit = permit;
            match repository.insert_event(&event).await {
                Ok(()) => debug!(
                    event_type = %event.event_type,
                    account_id = %event.account_id,
                    "Analytics event stored"
                ),
                Err(e) => error!(
                    event_type = %event.event_type,
                    account_id = %event.account_id,
                    error = %e,
                    "Failed to store analytics event"
                ),
            }
        });
    }

    // Channel closed: wait until every writer has returned its permit.
    let all = u32::try_from(workers).unwrap_or(u32::MAX);
    if permits.acquire_many(all).await.is_err() {
        warn!("Analytics worker permits closed before drain completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{AccountId, PostId};
    use crate::infrastructure::persistence::InMemoryAnalyticsRepository;
    use crate::test_utils::{
        fixtures::analytics_config,
        mocks::{FailingAnalyticsRepository, StalledAnalyticsRepository},
    };

    fn event(n: i64) -> AnalyticsEvent {
        AnalyticsEvent::post_created(AccountId::new(n), PostId::new(n))
    }

    #[tokio::test]
    async fn queued_events_are_persisted_on_shutdown() {
        let repository = InMemoryAnalyticsRepository::new();
        let (sink, workers) = AnalyticsSink::spawn(Arc::new(repository.clone()), &analytics_config(16, 2));

        for n in 1..=10 {
            sink.record(event(n));
        }
        drop(sink);
        workers.shutdown(Duration::from_secs(5)).await;

        let mut ids: Vec<_> = repository.events().iter().map(|e| e.account_id.as_i64()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts_new_events() {
        let (sink, _workers) =
            AnalyticsSink::spawn(Arc::new(StalledAnalyticsRepository), &analytics_config(2, 1));

        for n in 1..=20 {
            sink.record(event(n));
        }

        // The queue holds two; the dispatcher may have pulled up to two more.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let dropped = sink.dropped_events();
        assert!(dropped >= 16, "dropped {dropped}");
        assert!(dropped < 20);
    }

    #[tokio::test]
    async fn storage_failures_are_logged_not_raised() {
        let repository = FailingAnalyticsRepository::default();
        let attempts = Arc::clone(&repository.attempts);
        let (sink, workers) = AnalyticsSink::spawn(Arc::new(repository), &analytics_config(8, 2));

        sink.record(event(1));
        sink.record(event(2));
        drop(sink);
        workers.shutdown(Duration::from_secs(5)).await;

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn recording_after_shutdown_is_counted_as_dropped() {
        let (sink, workers) =
            AnalyticsSink::spawn(Arc::new(InMemoryAnalyticsRepository::new()), &analytics_config(4, 1));
        let late = sink.clone();
        drop(sink);
        workers.dispatcher.abort();
        tokio::time::sleep(Duration::from_millis(20)).await;

        late.record(event(1));
        assert_eq!(late.dropped_events(), 1);
    }
}
