use std::time::Duration;

/// The type of event that triggers a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Run on a fixed interval
    Interval(Duration),
    /// Run only when asked to (CLI or `EltFlow::run_once`)
    Manual,
}

/// An event delivered to the scheduler.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    /// Which pipeline this event is for
    pub pipeline: String,
    /// What kind of trigger caused this event
    pub trigger: Trigger,
}

impl Trigger {
    /// Short label stored in run history.
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Interval(_) => "interval",
            Trigger::Manual => "manual",
        }
    }
}
