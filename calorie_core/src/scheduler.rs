//! Background rollover scheduler.
//!
//! A single thread wakes up periodically, decides whether a day boundary has
//! passed, and rolls the shared tracker over while holding its lock. Results
//! are published to subscribers over channels; the scheduler never touches
//! presentation state itself.

use crate::tracker::{self, SharedTracker};
use crate::{Result, RolloverEvent};
use chrono::{Local, NaiveDate};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Source of the current calendar date
pub trait Clock: Send + 'static {
    fn today(&self) -> NaiveDate;
}

/// Local wall-clock date
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

impl<F> Clock for F
where
    F: Fn() -> NaiveDate + Send + 'static,
{
    fn today(&self) -> NaiveDate {
        self()
    }
}

/// When the scheduler rolls the tracker over
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RolloverTrigger {
    /// Every `poll`, roll over while the clock's date is past the active day
    Calendar { poll: Duration },
    /// Roll over every `every`, each tick simulating one day
    Interval { every: Duration },
}

impl RolloverTrigger {
    fn period(&self) -> Duration {
        match *self {
            RolloverTrigger::Calendar { poll } => poll,
            RolloverTrigger::Interval { every } => every,
        }
    }
}

/// Outcome of a rollover attempt, as seen by subscribers
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulerEvent {
    RolledOver(RolloverEvent),
    /// The ledger could not be written; counters were left untouched
    RolloverFailed { day: NaiveDate, error: String },
}

/// Drives rollovers for a shared tracker
pub struct Scheduler<C: Clock> {
    tracker: SharedTracker,
    trigger: RolloverTrigger,
    clock: C,
    subscribers: Vec<Sender<SchedulerEvent>>,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(tracker: SharedTracker, trigger: RolloverTrigger, clock: C) -> Self {
        Self {
            tracker,
            trigger,
            clock,
            subscribers: Vec::new(),
        }
    }

    /// Receive an event for every rollover attempt
    pub fn subscribe(&mut self) -> Receiver<SchedulerEvent> {
        let (tx, rx) = channel();
        self.subscribers.push(tx);
        rx
    }

    /// Evaluate the trigger once and publish what happened
    ///
    /// The tracker lock is held across all rollovers of one tick.
    pub fn tick(&mut self) -> Vec<SchedulerEvent> {
        let events = {
            let mut tracker = tracker::lock(&self.tracker);
            match self.trigger {
                RolloverTrigger::Interval { .. } => {
                    let day = tracker.active_day();
                    vec![to_event(day, tracker.rollover())]
                }
                RolloverTrigger::Calendar { .. } => {
                    let today = self.clock.today();
                    let mut events = Vec::new();
                    while tracker.active_day() < today {
                        let day = tracker.active_day();
                        let event = to_event(day, tracker.rollover());
                        let failed = matches!(event, SchedulerEvent::RolloverFailed { .. });
                        events.push(event);
                        if failed {
                            break;
                        }
                    }
                    events
                }
            }
        };

        for event in &events {
            self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
        events
    }

    /// Run the scheduler on its own thread
    pub fn spawn(mut self) -> Result<SchedulerHandle> {
        let (stop_tx, stop_rx) = channel::<()>();
        let period = self.trigger.period();

        let thread = thread::Builder::new()
            .name("rollover-scheduler".into())
            .spawn(move || {
                tracing::debug!("Rollover scheduler started ({:?})", self.trigger);
                loop {
                    match stop_rx.recv_timeout(period) {
                        Err(RecvTimeoutError::Timeout) => {
                            self.tick();
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("Rollover scheduler stopped");
            })?;

        Ok(SchedulerHandle {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        })
    }
}

fn to_event(day: NaiveDate, result: Result<RolloverEvent>) -> SchedulerEvent {
    match result {
        Ok(event) => SchedulerEvent::RolledOver(event),
        Err(e) => {
            tracing::error!("Rollover of {} failed: {}", day, e);
            SchedulerEvent::RolloverFailed {
                day,
                error: e.to_string(),
            }
        }
    }
}

/// Handle to a running scheduler thread; stops it when dropped
pub struct SchedulerHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop the scheduler, waiting for an in-flight tick to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Rollover scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
