//! Signals: waiters block on an identifier until woken or thrown at

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::{EngineError, EngineResult, PrimitiveId};

/// How a signal releases its waiters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Wake,
    Throw,
}

#[derive(Debug, Default)]
struct SignalState {
    waiting: usize,
    generation: u64,
    last: Option<Delivery>,
}

/// Signal table. Entries are never removed: a woken waiter may still need to
/// read the generation it was released by.
#[derive(Debug, Default)]
pub(crate) struct Signals {
    state: Mutex<HashMap<PrimitiveId, SignalState>>,
    cond: Condvar,
}

impl Signals {
    pub(crate) fn waiting(&self, id: &PrimitiveId) -> bool {
        self.state.lock().get(id).is_some_and(|s| s.waiting > 0)
    }

    pub(crate) fn wait_for(&self, id: &PrimitiveId, millis: u64) -> EngineResult<()> {
        debug!(%id, millis, "Signals::wait_for: called");
        let deadline = (millis > 0).then(|| Instant::now() + Duration::from_millis(millis));

        let mut state = self.state.lock();
        let entry = state.entry(id.clone()).or_default();
        entry.waiting += 1;
        let generation = entry.generation;
        // signallers using must-meet wait for a waiter to show up
        self.cond.notify_all();

        loop {
            let entry = state.entry(id.clone()).or_default();
            if entry.generation != generation {
                return match entry.last {
                    Some(Delivery::Throw) => {
                        debug!(%id, "Signals::wait_for: thrown");
                        Err(EngineError::SignalThrown { id: id.clone() })
                    }
                    _ => {
                        debug!(%id, "Signals::wait_for: woken");
                        Ok(())
                    }
                };
            }

            match deadline {
                Some(deadline) => {
                    if self.cond.wait_until(&mut state, deadline).timed_out() {
                        let entry = state.entry(id.clone()).or_default();
                        if entry.generation == generation {
                            entry.waiting = entry.waiting.saturating_sub(1);
                            debug!(%id, "Signals::wait_for: timed out");
                            return Ok(());
                        }
                    }
                }
                None => self.cond.wait(&mut state),
            }
        }
    }

    pub(crate) fn signal(&self, id: &PrimitiveId, delivery: Delivery, must_meet: bool) -> bool {
        debug!(%id, ?delivery, must_meet, "Signals::signal: called");
        let mut state = self.state.lock();
        loop {
            let entry = state.entry(id.clone()).or_default();
            if entry.waiting > 0 {
                entry.waiting = 0;
                entry.generation += 1;
                entry.last = Some(delivery);
                self.cond.notify_all();
                return true;
            }
            if !must_meet {
                return false;
            }
            self.cond.wait(&mut state);
        }
    }
}
