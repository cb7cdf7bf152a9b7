//! Single-flight job execution with duplicate-request coalescing.
//!
//! At most one execution of a unit of work runs per [`JobId`] at any time.
//! A request that arrives while the same identity is in flight does not
//! start a second execution; it waits on the job's channel for the
//! terminal signal and receives the same outcome as the initiator.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use repodocs_shared::{JobId, RepodocsError, Result};

use crate::bus::{JobEvent, ProgressBus};

/// How long a coalesced waiter is willing to wait for the in-flight job's
/// terminal signal before giving up with a coordinator-timeout error.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(120);

/// Bookkeeping for one in-flight job. Exists only while work is running;
/// removed exactly once, on settlement.
#[derive(Debug)]
struct JobRecord {
    started_at: Instant,
}

/// Coalesces concurrent identical requests onto a single execution.
pub struct JobCoordinator<T> {
    bus: Arc<ProgressBus<T>>,
    jobs: Mutex<HashMap<JobId, JobRecord>>,
    wait_timeout: Duration,
}

impl<T: Clone> JobCoordinator<T> {
    pub fn new(bus: Arc<ProgressBus<T>>) -> Self {
        Self {
            bus,
            jobs: Mutex::new(HashMap::new()),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    /// Override the waiter timeout (tests use short intervals).
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }

    /// The bus this coordinator publishes terminal signals on.
    pub fn bus(&self) -> &Arc<ProgressBus<T>> {
        &self.bus
    }

    /// Whether a job is currently in flight for this identity.
    pub fn is_running(&self, job_id: &JobId) -> bool {
        self.jobs.lock().expect("job registry poisoned").contains_key(job_id)
    }

    /// Run `work` under single-flight semantics for `job_id`.
    ///
    /// - First caller for an identity runs `work` and, on settlement,
    ///   publishes the terminal signal, removes the record, and returns
    ///   the outcome.
    /// - Any caller that finds a record in flight waits for that signal
    ///   instead, bounded by the wait timeout. A timed-out waiter detaches
    ///   immediately and does not affect the original execution.
    pub async fn start<F>(&self, job_id: JobId, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        // Check-and-insert and waiter subscription happen under the same
        // table lock: a waiter that observed the record is guaranteed to
        // attach before the terminal signal, which is published under
        // this lock on settlement.
        let waiter_rx = {
            let mut jobs = self.jobs.lock().expect("job registry poisoned");
            if jobs.contains_key(&job_id) {
                debug!(%job_id, "job already in flight, waiting for outcome");
                Some(self.bus.subscribe(&job_id))
            } else {
                jobs.insert(
                    job_id.clone(),
                    JobRecord {
                        started_at: Instant::now(),
                    },
                );
                None
            }
        };

        if let Some(rx) = waiter_rx {
            return self.wait_for_outcome(&job_id, rx).await;
        }

        info!(%job_id, "starting job");
        let outcome = work.await;

        // Settle: publish the terminal signal and drop the record inside
        // one critical section, then release the channel if unobserved.
        {
            let mut jobs = self.jobs.lock().expect("job registry poisoned");
            match &outcome {
                Ok(value) => {
                    self.bus.publish(&job_id, JobEvent::Completed(value.clone()));
                }
                Err(err) => {
                    self.bus.publish(&job_id, JobEvent::Failed(err.clone()));
                }
            }
            if let Some(record) = jobs.remove(&job_id) {
                debug!(
                    %job_id,
                    elapsed_ms = record.started_at.elapsed().as_millis(),
                    success = outcome.is_ok(),
                    "job settled"
                );
            }
        }
        self.bus.remove_if_idle(&job_id);

        outcome
    }

    /// Wait for the in-flight job's terminal event, bounded by the wait
    /// timeout. The receiver is dropped on return, so a timed-out waiter
    /// stops receiving events for the job it gave up on.
    async fn wait_for_outcome(
        &self,
        job_id: &JobId,
        mut rx: broadcast::Receiver<JobEvent<T>>,
    ) -> Result<T> {
        let outcome = tokio::time::timeout(self.wait_timeout, async {
            loop {
                match rx.recv().await {
                    Ok(JobEvent::Completed(value)) => return Ok(value),
                    Ok(JobEvent::Failed(err)) => return Err(err),
                    Ok(JobEvent::Progress(_)) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(%job_id, skipped, "waiter lagged on job channel");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        // Channel torn down without a terminal signal for
                        // us; treat as a timed-out wait.
                        return Err(RepodocsError::CoordinatorTimeout);
                    }
                }
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_elapsed) => {
                warn!(%job_id, "waiter timed out, in-flight job continues");
                Err(RepodocsError::CoordinatorTimeout)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn coordinator() -> JobCoordinator<String> {
        JobCoordinator::new(Arc::new(ProgressBus::new()))
    }

    fn job(repo: &str) -> JobId {
        JobId::derive("octocat", repo, "token")
    }

    #[tokio::test]
    async fn concurrent_duplicates_run_work_once() {
        let coordinator = Arc::new(coordinator());
        let calls = Arc::new(AtomicUsize::new(0));
        let id = job("single-flight");

        let make_work = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, RepodocsError>("the docs".to_string())
        };

        let first = {
            let coordinator = Arc::clone(&coordinator);
            let work = make_work(Arc::clone(&calls));
            let id = id.clone();
            tokio::spawn(async move { coordinator.start(id, work).await })
        };
        // Let the initiator claim the record before the duplicate arrives.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let coordinator = Arc::clone(&coordinator);
            let work = make_work(Arc::clone(&calls));
            let id = id.clone();
            tokio::spawn(async move { coordinator.start(id, work).await })
        };

        let a = first.await.expect("join").expect("outcome");
        let b = second.await.expect("join").expect("outcome");

        assert_eq!(a, "the docs");
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_delivered_to_initiator_and_waiter() {
        let coordinator = Arc::new(coordinator());
        let id = job("fanout-failure");

        let first = {
            let coordinator = Arc::clone(&coordinator);
            let id = id.clone();
            tokio::spawn(async move {
                coordinator
                    .start(id, async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Err::<String, _>(RepodocsError::synthesis("empty response"))
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = {
            let coordinator = Arc::clone(&coordinator);
            let id = id.clone();
            tokio::spawn(async move {
                coordinator
                    .start(id, async { Ok("never runs".to_string()) })
                    .await
            })
        };

        let a = first.await.expect("join").expect_err("must fail");
        let b = second.await.expect("join").expect_err("must fail");
        assert_eq!(a.to_string(), b.to_string());
        assert!(a.to_string().contains("empty response"));
    }

    #[tokio::test]
    async fn waiter_times_out_without_cancelling_the_job() {
        let bus = Arc::new(ProgressBus::new());
        let coordinator = Arc::new(
            JobCoordinator::new(bus).with_wait_timeout(Duration::from_millis(30)),
        );
        let id = job("slow");

        let first = {
            let coordinator = Arc::clone(&coordinator);
            let id = id.clone();
            tokio::spawn(async move {
                coordinator
                    .start(id, async {
                        tokio::time::sleep(Duration::from_millis(150)).await;
                        Ok("eventually done".to_string())
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let waiter_err = coordinator
            .start(id.clone(), async { Ok("never runs".to_string()) })
            .await
            .expect_err("waiter must time out");
        assert!(matches!(waiter_err, RepodocsError::CoordinatorTimeout));

        // The original execution is unaffected by the waiter's timeout.
        let original = first.await.expect("join").expect("outcome");
        assert_eq!(original, "eventually done");
    }

    #[tokio::test]
    async fn record_is_removed_on_settlement() {
        let coordinator = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        let id = job("rerun");

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let outcome = coordinator
                .start(id.clone(), async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("ok".to_string())
                })
                .await
                .expect("outcome");
            assert_eq!(outcome, "ok");
            assert!(!coordinator.is_running(&id));
        }

        // No record left between runs, so the work ran twice.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn settled_job_channel_is_removed_when_unobserved() {
        let coordinator = coordinator();
        let id = job("cleanup");

        coordinator
            .start(id.clone(), async { Ok("ok".to_string()) })
            .await
            .expect("outcome");

        assert!(!coordinator.bus().contains(&id));
    }

    #[tokio::test]
    async fn distinct_identities_do_not_coalesce() {
        let coordinator = Arc::new(coordinator());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for repo in ["alpha", "beta"] {
            let coordinator = Arc::clone(&coordinator);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                coordinator
                    .start(job(repo), async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        Ok(repo.to_string())
                    })
                    .await
            }));
        }

        for handle in handles {
            handle.await.expect("join").expect("outcome");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
