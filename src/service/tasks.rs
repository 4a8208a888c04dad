//! Background work: queued discovery and the periodic cleanup timer.
//!
//! Both run as tokio tasks with a best-effort contract: failures are
//! logged and the task keeps going.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::MatchService;
use crate::domain::{PromptId, UserId};

/// A discovery run to perform in the background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryRequest {
    /// User whose prompt was deployed.
    pub user_id: UserId,
    /// The deployed prompt.
    pub prompt_id: PromptId,
}

/// Bounded queue of discovery runs drained by one worker task.
///
/// Enqueueing never waits: a full queue drops the request with a warning.
/// The worker stops once every [`DiscoveryQueue`] handle is dropped.
#[derive(Debug, Clone)]
pub struct DiscoveryQueue {
    sender: mpsc::Sender<DiscoveryRequest>,
}

impl DiscoveryQueue {
    /// Spawns the worker and returns the queue handle and the worker's
    /// join handle.
    #[must_use]
    pub fn spawn(service: Arc<MatchService>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<DiscoveryRequest>(capacity.max(1));
        let worker = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                match service
                    .find_matches(request.user_id, request.prompt_id)
                    .await
                {
                    Ok(created) => tracing::debug!(
                        user_id = %request.user_id,
                        prompt_id = %request.prompt_id,
                        created = created.len(),
                        "background discovery finished"
                    ),
                    Err(e) => tracing::warn!(
                        user_id = %request.user_id,
                        prompt_id = %request.prompt_id,
                        error = %e,
                        "background discovery failed"
                    ),
                }
            }
            tracing::debug!("discovery queue closed");
        });
        (Self { sender }, worker)
    }

    /// Queues a discovery run. Returns `false` if it was dropped.
    pub fn enqueue(&self, request: DiscoveryRequest) -> bool {
        match self.sender.try_send(request) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                tracing::warn!(
                    user_id = %dropped.user_id,
                    prompt_id = %dropped.prompt_id,
                    "discovery queue full, request dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                tracing::error!(
                    user_id = %dropped.user_id,
                    prompt_id = %dropped.prompt_id,
                    "discovery worker stopped, request dropped"
                );
                false
            }
        }
    }
}

/// Spawns a task running the cleanup sweep every `every`. A zero period
/// disables the timer and returns `None`.
#[must_use]
pub fn spawn_cleanup_timer(service: Arc<MatchService>, every: Duration) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        tracing::info!("cleanup timer disabled");
        return None;
    }
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = service.run_cleanup().await {
                tracing::error!(error = %e, "scheduled cleanup failed");
            }
        }
    }))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::MatchStatus;
    use crate::service::testing::Fixture;

    #[tokio::test]
    async fn queued_discovery_creates_matches() {
        let fx = Fixture::new().await;
        let a = fx.user("a").await;
        let b = fx.user("b").await;
        let prompt_a = fx.deploy(a, "Q1").await;
        fx.deploy(b, "Q1").await;

        let (queue, worker) = DiscoveryQueue::spawn(Arc::new(fx.service.clone()), 4);
        assert!(queue.enqueue(DiscoveryRequest {
            user_id: a,
            prompt_id: prompt_a.id,
        }));
        drop(queue);
        let Ok(()) = worker.await else {
            panic!("worker panicked");
        };

        let rows = fx.store.all_matches().await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|m| m.status == MatchStatus::Pending));
    }

    #[tokio::test]
    async fn failed_run_does_not_stop_worker() {
        let fx = Fixture::new().await;
        let a = fx.user("a").await;
        let b = fx.user("b").await;
        let prompt_a = fx.deploy(a, "Q1").await;
        fx.deploy(b, "Q1").await;

        let (queue, worker) = DiscoveryQueue::spawn(Arc::new(fx.service.clone()), 4);
        assert!(queue.enqueue(DiscoveryRequest {
            user_id: a,
            prompt_id: PromptId::new(),
        }));
        assert!(queue.enqueue(DiscoveryRequest {
            user_id: a,
            prompt_id: prompt_a.id,
        }));
        drop(queue);
        let Ok(()) = worker.await else {
            panic!("worker panicked");
        };
        assert_eq!(fx.store.all_matches().await.len(), 2);
    }

    #[tokio::test]
    async fn full_queue_drops_request() {
        let fx = Fixture::new().await;
        let (sender, _receiver) = mpsc::channel(1);
        let queue = DiscoveryQueue { sender };
        let request = DiscoveryRequest {
            user_id: fx.user("a").await,
            prompt_id: PromptId::new(),
        };
        assert!(queue.enqueue(request));
        assert!(!queue.enqueue(request));
    }

    #[tokio::test]
    async fn zero_period_disables_timer() {
        let fx = Fixture::new().await;
        assert!(spawn_cleanup_timer(Arc::new(fx.service.clone()), Duration::ZERO).is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn timer_runs_first_sweep_immediately() {
        let fx = Fixture::new().await;
        fx.matched_pair("Q1").await;
        fx.clock.advance(chrono::Duration::days(4));

        let Some(timer) = spawn_cleanup_timer(
            Arc::new(fx.service.clone()),
            Duration::from_secs(3600),
        ) else {
            panic!("timer should be enabled");
        };
        let swept = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if fx
                    .store
                    .all_matches()
                    .await
                    .iter()
                    .all(|m| m.status == MatchStatus::Expired)
                {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        timer.abort();
        assert!(swept.is_ok(), "first sweep did not run");
    }
}
