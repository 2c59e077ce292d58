//! In-flight request tracking.
//!
//! The tracker owns the request id counter and the working set. Every
//! mutation happens under one mutex and publishes a
//! [`ServerEvent::WorkingSetChanged`] snapshot while that mutex is still held,
//! so observers see snapshots in mutation order.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use feedback_core::{EventActor, EventBus, RequestId, ServerEvent};

#[derive(Debug, Default)]
struct TrackerState {
    last_id: u64,
    working_set: BTreeSet<RequestId>,
}

/// Thread-safe registry of report requests that are accepted but not yet completed.
pub struct RequestTracker {
    state: Mutex<TrackerState>,
    events: EventBus,
}

impl RequestTracker {
    /// Create an empty tracker publishing change notifications on `events`.
    pub fn new(events: EventBus) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            events,
        }
    }

    /// The bus change notifications are published on.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Allocate the next request id and mark it in flight in one step.
    ///
    /// No two callers can observe the same id, and the id is in the working
    /// set before this returns.
    pub fn admit(&self) -> RequestId {
        let mut state = self.lock();
        state.last_id += 1;
        let id = RequestId(state.last_id);
        state.working_set.insert(id);
        debug!(request_id = %id, in_flight = state.working_set.len(), "Request admitted");
        self.notify(&state);
        id
    }

    /// Mark an externally allocated id in flight.
    ///
    /// A duplicate id is an invariant violation: it is logged and the working
    /// set is left unchanged apart from the notification.
    pub fn add(&self, id: RequestId) {
        let mut state = self.lock();
        if !state.working_set.insert(id) {
            error!(request_id = %id, "Request id already in flight");
        }
        state.last_id = state.last_id.max(id.get());
        self.notify(&state);
    }

    /// Remove `id` from the working set. Idempotent; returns whether it was present.
    pub fn remove(&self, id: RequestId) -> bool {
        let mut state = self.lock();
        let removed = state.working_set.remove(&id);
        debug!(request_id = %id, removed, in_flight = state.working_set.len(), "Request removed");
        self.notify(&state);
        removed
    }

    /// Remove `id` and publish its completion event under the same lock.
    ///
    /// Anyone who receives `completion` and then queries the tracker will
    /// not find `id` in flight. Returns whether `id` was present.
    pub fn retire(&self, id: RequestId, completion: ServerEvent, actor: EventActor) -> bool {
        let mut state = self.lock();
        let removed = state.working_set.remove(&id);
        self.events.emit_as(completion, actor);
        debug!(request_id = %id, removed, in_flight = state.working_set.len(), "Request retired");
        self.notify(&state);
        removed
    }

    /// Whether no request is in flight.
    pub fn is_empty(&self) -> bool {
        self.lock().working_set.is_empty()
    }

    /// Number of requests in flight.
    pub fn len(&self) -> usize {
        self.lock().working_set.len()
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.lock().working_set.contains(&id)
    }

    /// Ids currently in flight, ascending.
    pub fn snapshot(&self) -> Vec<RequestId> {
        self.lock().working_set.iter().copied().collect()
    }

    fn notify(&self, state: &TrackerState) {
        self.events.emit(ServerEvent::WorkingSetChanged {
            request_ids: state.working_set.iter().copied().collect(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast::Receiver;

    use super::*;
    use feedback_core::EventEnvelope;

    fn tracker() -> (RequestTracker, Receiver<EventEnvelope>) {
        let bus = EventBus::new(64);
        let rx = bus.subscribe();
        (RequestTracker::new(bus), rx)
    }

    fn working_set(envelope: EventEnvelope) -> Vec<u64> {
        match envelope.payload {
            ServerEvent::WorkingSetChanged { request_ids } => {
                request_ids.into_iter().map(RequestId::get).collect()
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_admit_allocates_increasing_ids() {
        let (tracker, _rx) = tracker();
        let a = tracker.admit();
        let b = tracker.admit();
        let c = tracker.admit();
        assert_eq!((a.get(), b.get(), c.get()), (1, 2, 3));
        assert_eq!(tracker.snapshot(), vec![a, b, c]);
        assert_eq!(tracker.len(), 3);
    }

    #[test]
    fn test_ids_not_reused_after_remove() {
        let (tracker, _rx) = tracker();
        let a = tracker.admit();
        assert!(tracker.remove(a));
        let b = tracker.admit();
        assert!(b > a);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (tracker, _rx) = tracker();
        let id = tracker.admit();
        assert!(tracker.remove(id));
        assert!(!tracker.remove(id));
        assert!(!tracker.remove(RequestId(999)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_is_empty() {
        let (tracker, _rx) = tracker();
        assert!(tracker.is_empty());
        let id = tracker.admit();
        assert!(!tracker.is_empty());
        assert!(tracker.contains(id));
        tracker.remove(id);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_add_duplicate_keeps_single_entry() {
        let (tracker, _rx) = tracker();
        tracker.add(RequestId(7));
        tracker.add(RequestId(7));
        assert_eq!(tracker.snapshot(), vec![RequestId(7)]);
    }

    #[test]
    fn test_add_advances_counter() {
        let (tracker, _rx) = tracker();
        tracker.add(RequestId(10));
        assert_eq!(tracker.admit(), RequestId(11));
    }

    #[tokio::test]
    async fn test_every_mutation_notifies_with_snapshot() {
        let (tracker, mut rx) = tracker();
        let a = tracker.admit();
        let b = tracker.admit();
        tracker.remove(a);
        tracker.remove(a);

        assert_eq!(working_set(rx.recv().await.unwrap()), vec![1]);
        assert_eq!(working_set(rx.recv().await.unwrap()), vec![1, 2]);
        assert_eq!(working_set(rx.recv().await.unwrap()), vec![b.get()]);
        assert_eq!(working_set(rx.recv().await.unwrap()), vec![b.get()]);
    }

    #[tokio::test]
    async fn test_retire_emits_completion_then_snapshot() {
        let (tracker, mut rx) = tracker();
        let id = tracker.admit();
        let _ = rx.recv().await.unwrap();

        let completion = ServerEvent::GenerateReportFinished {
            request_id: id,
            files: vec![],
        };
        assert!(tracker.retire(id, completion.clone(), EventActor::user("alice")));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.payload, completion);
        assert_eq!(first.actor.id.as_deref(), Some("alice"));
        assert!(!tracker.contains(id));
        assert_eq!(working_set(rx.recv().await.unwrap()), Vec::<u64>::new());
    }

    #[test]
    fn test_concurrent_admit_yields_distinct_ids() {
        let bus = EventBus::new(16);
        let tracker = Arc::new(RequestTracker::new(bus));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || (0..50).map(|_| tracker.admit()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<RequestId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 400);
        assert_eq!(tracker.len(), 400);
        assert_eq!(all.last().copied(), Some(RequestId(400)));
    }
}
