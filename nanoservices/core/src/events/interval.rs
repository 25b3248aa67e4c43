use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::events::bus::{EventSender, Offer};
use crate::events::trigger::{Trigger, TriggerEvent};

/// Spawns a tokio task that emits TriggerEvents on a fixed interval.
/// Ticks missed while a run is still going are dropped, not replayed.
pub fn spawn_interval_trigger(
    pipeline: String,
    interval: Duration,
    sender: EventSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // Skip the first immediate tick
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let event = TriggerEvent {
                pipeline: pipeline.clone(),
                trigger: Trigger::Interval(interval),
            };
            match sender.offer(event) {
                Offer::Queued => {}
                Offer::Dropped => tracing::debug!(pipeline = %pipeline, "tick skipped, previous run pending"),
                Offer::Closed => break,
            }
        }
    })
}
