//! Per-job broadcast channel registry.
//!
//! Each in-flight job owns one lazily-created broadcast channel. Progress
//! observers (SSE clients) and coordinator waiters subscribe to the same
//! channel; every subscriber receives every event published after it
//! attached. Nothing is buffered for future subscribers — a late attacher
//! sees no replay.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::debug;

use repodocs_shared::{JobId, ProgressEvent, RepodocsError};

/// Per-channel buffer depth. A lagging subscriber drops old events rather
/// than blocking the publisher.
const CHANNEL_CAPACITY: usize = 64;

/// Everything a job channel carries.
///
/// Stream consumers forward only `Progress`; coordinator waiters resolve
/// on `Completed` / `Failed`.
#[derive(Debug, Clone)]
pub enum JobEvent<T> {
    Progress(ProgressEvent),
    Completed(T),
    Failed(RepodocsError),
}

/// Registry of per-job broadcast channels.
///
/// The bus never deletes a channel on its own: removal is the
/// coordinator's decision, made only once the job has settled AND the
/// channel has no subscribers left. Removing earlier would race a
/// subscriber attaching between job start and its first event.
pub struct ProgressBus<T> {
    channels: Mutex<HashMap<JobId, broadcast::Sender<JobEvent<T>>>>,
}

impl<T: Clone> ProgressBus<T> {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Get the job's channel sender, creating the channel if absent.
    pub fn channel(&self, job_id: &JobId) -> broadcast::Sender<JobEvent<T>> {
        let mut channels = self.channels.lock().expect("channel registry poisoned");
        channels
            .entry(job_id.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Attach a new subscriber. Only events published after this call are
    /// delivered.
    pub fn subscribe(&self, job_id: &JobId) -> broadcast::Receiver<JobEvent<T>> {
        self.channel(job_id).subscribe()
    }

    /// Publish an event on the job's channel. With zero subscribers this
    /// is a no-op: the event is dropped, never buffered.
    pub fn publish(&self, job_id: &JobId, event: JobEvent<T>) {
        let sender = self.channel(job_id);
        if sender.send(event).is_err() {
            debug!(%job_id, "no subscribers on job channel, event dropped");
        }
    }

    /// Publish a plain progress update.
    pub fn publish_progress(&self, job_id: &JobId, event: ProgressEvent) {
        self.publish(job_id, JobEvent::Progress(event));
    }

    /// Number of live subscribers on the job's channel (0 if no channel).
    pub fn subscriber_count(&self, job_id: &JobId) -> usize {
        let channels = self.channels.lock().expect("channel registry poisoned");
        channels
            .get(job_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    /// Drop the job's channel if nothing is subscribed to it. Returns
    /// whether the channel was removed. Called by the coordinator after a
    /// job settles; never called on subscriber disconnect.
    pub fn remove_if_idle(&self, job_id: &JobId) -> bool {
        let mut channels = self.channels.lock().expect("channel registry poisoned");
        match channels.get(job_id) {
            Some(sender) if sender.receiver_count() == 0 => {
                channels.remove(job_id);
                debug!(%job_id, "removed idle job channel");
                true
            }
            _ => false,
        }
    }

    /// Whether a channel currently exists for the job.
    pub fn contains(&self, job_id: &JobId) -> bool {
        let channels = self.channels.lock().expect("channel registry poisoned");
        channels.contains_key(job_id)
    }
}

impl<T: Clone> Default for ProgressBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repodocs_shared::ProgressEvent;
    use tokio::sync::broadcast::error::TryRecvError;

    fn job() -> JobId {
        JobId::derive("octocat", "hello-world", "token")
    }

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let bus: ProgressBus<String> = ProgressBus::new();
        let id = job();

        let mut rx1 = bus.subscribe(&id);
        let mut rx2 = bus.subscribe(&id);

        bus.publish_progress(&id, ProgressEvent::new(Some(5), "starting"));

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.expect("recv") {
                JobEvent::Progress(event) => assert_eq!(event.message, "starting"),
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let bus: ProgressBus<String> = ProgressBus::new();
        let id = job();

        // No subscribers yet: must not panic, must not buffer.
        bus.publish_progress(&id, ProgressEvent::new(Some(10), "nobody listening"));

        let mut rx = bus.subscribe(&id);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn late_subscriber_sees_no_replay() {
        let bus: ProgressBus<String> = ProgressBus::new();
        let id = job();

        let mut early = bus.subscribe(&id);
        bus.publish_progress(&id, ProgressEvent::new(Some(20), "early event"));
        assert!(matches!(early.recv().await, Ok(JobEvent::Progress(_))));

        let mut late = bus.subscribe(&id);
        bus.publish_progress(&id, ProgressEvent::new(Some(30), "late event"));

        match late.recv().await.expect("recv") {
            JobEvent::Progress(event) => assert_eq!(event.message, "late event"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(late.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn remove_if_idle_respects_subscribers() {
        let bus: ProgressBus<String> = ProgressBus::new();
        let id = job();

        let rx = bus.subscribe(&id);
        assert!(!bus.remove_if_idle(&id));
        assert!(bus.contains(&id));

        drop(rx);
        assert!(bus.remove_if_idle(&id));
        assert!(!bus.contains(&id));
    }

    #[tokio::test]
    async fn channel_recreated_after_removal_starts_empty() {
        let bus: ProgressBus<String> = ProgressBus::new();
        let id = job();

        bus.channel(&id);
        bus.publish(&id, JobEvent::Completed("done".into()));
        assert!(bus.remove_if_idle(&id));

        // Fresh channel: the stale terminal event is gone.
        let mut rx = bus.subscribe(&id);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
