use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendError, TrySendError};

use crate::events::trigger::{Trigger, TriggerEvent};

/// Pipelines with an interval tick queued or running.
type Gate = Arc<Mutex<HashSet<String>>>;

/// Result of offering an interval tick to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// The pipeline already has a tick queued or running
    Dropped,
    Closed,
}

/// Create the trigger channel feeding the scheduler.
///
/// Manual events are always delivered. Interval ticks go through
/// [`EventSender::offer`], which admits at most one tick per pipeline until
/// the scheduler calls [`EventReceiver::release`] after the run, so windows
/// missed during a long run are never replayed.
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let gate = Gate::default();
    (
        EventSender { tx, gate: gate.clone() },
        EventReceiver { rx, gate },
    )
}

fn lock(gate: &Gate) -> std::sync::MutexGuard<'_, HashSet<String>> {
    gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<TriggerEvent>,
    gate: Gate,
}

impl EventSender {
    pub async fn send(&self, event: TriggerEvent) -> Result<(), SendError<TriggerEvent>> {
        self.tx.send(event).await
    }

    /// Queue an interval tick unless one is already in flight for the pipeline.
    pub fn offer(&self, event: TriggerEvent) -> Offer {
        let pipeline = event.pipeline.clone();
        if !lock(&self.gate).insert(pipeline.clone()) {
            return Offer::Dropped;
        }
        match self.tx.try_send(event) {
            Ok(()) => Offer::Queued,
            Err(e) => {
                lock(&self.gate).remove(&pipeline);
                match e {
                    TrySendError::Full(_) => Offer::Dropped,
                    TrySendError::Closed(_) => Offer::Closed,
                }
            }
        }
    }
}

pub struct EventReceiver {
    rx: mpsc::Receiver<TriggerEvent>,
    gate: Gate,
}

impl EventReceiver {
    /// Receive the next trigger event. Returns None when all senders are dropped.
    pub async fn recv(&mut self) -> Option<TriggerEvent> {
        self.rx.recv().await
    }

    /// Mark an event as handled; the pipeline accepts interval ticks again.
    pub fn release(&self, event: &TriggerEvent) {
        if matches!(event.trigger, Trigger::Interval(_)) {
            lock(&self.gate).remove(&event.pipeline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn tick(pipeline: &str) -> TriggerEvent {
        TriggerEvent {
            pipeline: pipeline.to_string(),
            trigger: Trigger::Interval(Duration::from_secs(60)),
        }
    }

    #[tokio::test]
    async fn second_tick_dropped_until_released() {
        let (tx, mut rx) = channel(16);

        assert_eq!(tx.offer(tick("finance")), Offer::Queued);
        assert_eq!(tx.offer(tick("finance")), Offer::Dropped);
        assert_eq!(tx.offer(tick("other")), Offer::Queued);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.pipeline, "finance");
        // Still running: further ticks are missed windows
        assert_eq!(tx.offer(tick("finance")), Offer::Dropped);

        rx.release(&event);
        assert_eq!(tx.offer(tick("finance")), Offer::Queued);
    }

    #[tokio::test]
    async fn manual_events_bypass_the_gate() {
        let (tx, mut rx) = channel(16);
        assert_eq!(tx.offer(tick("finance")), Offer::Queued);

        tx.send(TriggerEvent { pipeline: "finance".to_string(), trigger: Trigger::Manual })
            .await
            .unwrap();

        assert!(matches!(rx.recv().await.unwrap().trigger, Trigger::Interval(_)));
        let manual = rx.recv().await.unwrap();
        assert_eq!(manual.trigger, Trigger::Manual);
        rx.release(&manual);
        assert_eq!(tx.offer(tick("finance")), Offer::Dropped);
    }

    #[tokio::test]
    async fn full_channel_drops_and_closed_channel_reports() {
        let (tx, rx) = channel(1);
        assert_eq!(tx.offer(tick("a")), Offer::Queued);
        assert_eq!(tx.offer(tick("b")), Offer::Dropped);
        // A dropped tick does not hold the gate
        drop(rx);
        assert_eq!(tx.offer(tick("b")), Offer::Closed);
    }
}
