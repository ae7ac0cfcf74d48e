//! In-memory reference engine

mod join;
mod rendezvous;
mod signal;
mod tally;
mod trace;

use std::path::PathBuf;

use tracing::debug;

use crate::{EngineResult, PrimitiveEngine, PrimitiveId};
use join::Joins;
use rendezvous::Rendezvous;
use signal::{Delivery, Signals};
use tally::{CountDowns, Counters, Flags, Timers};
use trace::Traces;

/// Process-local engine holding every primitive in memory
#[derive(Debug, Default)]
pub struct LocalEngine {
    signals: Signals,
    rendezvous: Rendezvous,
    joins: Joins,
    flags: Flags,
    countdowns: CountDowns,
    counters: Counters,
    timers: Timers,
    traces: Traces,
}

impl LocalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relative trace file names resolve against `dir`
    pub fn with_trace_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        debug!(dir = %dir.display(), "LocalEngine::with_trace_dir: called");
        Self {
            traces: Traces::with_base_dir(dir),
            ..Self::default()
        }
    }
}

impl PrimitiveEngine for LocalEngine {
    fn waiting(&self, id: &PrimitiveId) -> EngineResult<bool> {
        Ok(self.signals.waiting(id))
    }

    fn wait_for(&self, id: &PrimitiveId, millis: u64) -> EngineResult<()> {
        self.signals.wait_for(id, millis)
    }

    fn signal_wake(&self, id: &PrimitiveId, must_meet: bool) -> EngineResult<bool> {
        Ok(self.signals.signal(id, Delivery::Wake, must_meet))
    }

    fn signal_throw(&self, id: &PrimitiveId, must_meet: bool) -> EngineResult<bool> {
        Ok(self.signals.signal(id, Delivery::Throw, must_meet))
    }

    fn create_rendezvous(&self, id: &PrimitiveId, expected: i32, restartable: bool) -> EngineResult<bool> {
        Ok(self.rendezvous.create(id, expected, restartable))
    }

    fn is_rendezvous(&self, id: &PrimitiveId, expected: i32) -> EngineResult<bool> {
        Ok(self.rendezvous.is(id, expected))
    }

    fn get_rendezvous(&self, id: &PrimitiveId, expected: i32) -> EngineResult<i32> {
        Ok(self.rendezvous.arrived(id, expected))
    }

    fn rendezvous(&self, id: &PrimitiveId) -> EngineResult<i32> {
        Ok(self.rendezvous.arrive(id))
    }

    fn delete_rendezvous(&self, id: &PrimitiveId, expected: i32) -> EngineResult<bool> {
        Ok(self.rendezvous.delete(id, expected))
    }

    fn create_join(&self, id: &PrimitiveId, max: i32) -> EngineResult<bool> {
        Ok(self.joins.create(id, max))
    }

    fn is_join(&self, id: &PrimitiveId, max: i32) -> EngineResult<bool> {
        Ok(self.joins.is(id, max))
    }

    fn join_enlist(&self, id: &PrimitiveId) -> EngineResult<bool> {
        Ok(self.joins.enlist(id))
    }

    fn join_wait(&self, id: &PrimitiveId, count: i32) -> EngineResult<bool> {
        Ok(self.joins.wait(id, count))
    }

    fn flag(&self, id: &PrimitiveId) -> EngineResult<bool> {
        Ok(self.flags.flag(id))
    }

    fn flagged(&self, id: &PrimitiveId) -> EngineResult<bool> {
        Ok(self.flags.flagged(id))
    }

    fn clear(&self, id: &PrimitiveId) -> EngineResult<bool> {
        Ok(self.flags.clear(id))
    }

    fn is_count_down(&self, id: &PrimitiveId) -> EngineResult<bool> {
        Ok(self.countdowns.exists(id))
    }

    fn create_count_down(&self, id: &PrimitiveId, count: i32) -> EngineResult<bool> {
        Ok(self.countdowns.create(id, count))
    }

    fn count_down(&self, id: &PrimitiveId) -> EngineResult<bool> {
        Ok(self.countdowns.count_down(id))
    }

    fn create_counter(&self, id: &PrimitiveId, value: i32) -> EngineResult<bool> {
        Ok(self.counters.create(id, value))
    }

    fn delete_counter(&self, id: &PrimitiveId) -> EngineResult<bool> {
        Ok(self.counters.delete(id))
    }

    fn read_counter(&self, id: &PrimitiveId, zero: bool) -> EngineResult<i32> {
        Ok(self.counters.read(id, zero))
    }

    fn increment_counter(&self, id: &PrimitiveId, amount: i32) -> EngineResult<i32> {
        Ok(self.counters.add(id, amount))
    }

    fn decrement_counter(&self, id: &PrimitiveId) -> EngineResult<i32> {
        Ok(self.counters.add(id, -1))
    }

    fn create_timer(&self, id: &PrimitiveId) -> EngineResult<bool> {
        Ok(self.timers.create(id))
    }

    fn delete_timer(&self, id: &PrimitiveId) -> EngineResult<bool> {
        Ok(self.timers.delete(id))
    }

    fn elapsed_time(&self, id: &PrimitiveId) -> EngineResult<i64> {
        Ok(self.timers.elapsed(id))
    }

    fn reset_timer(&self, id: &PrimitiveId) -> EngineResult<i64> {
        Ok(self.timers.reset(id))
    }

    fn trace_open(&self, id: &PrimitiveId, file_name: &str) -> EngineResult<bool> {
        self.traces.open(id, file_name)
    }

    fn trace_close(&self, id: &PrimitiveId) -> EngineResult<bool> {
        Ok(self.traces.close(id))
    }

    fn trace(&self, id: &PrimitiveId, message: &str) -> EngineResult<bool> {
        self.traces.write(id, message, false)
    }

    fn trace_line(&self, id: &PrimitiveId, message: &str) -> EngineResult<bool> {
        self.traces.write(id, message, true)
    }
}
