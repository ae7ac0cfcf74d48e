//! PrimitiveEngine trait - the authoritative owner of primitive state
//!
//! The controller forwards every primitive operation to an engine. Operations
//! that wait (signals, rendezvous, join-wait) block the calling thread, so
//! callers must run them off any async executor.

use crate::{EngineResult, PrimitiveId};

/// Owner of the state and algorithms behind every synchronization primitive
pub trait PrimitiveEngine: Send + Sync {
    // === Signals ===

    /// Whether a thread is currently waiting on the signal
    fn waiting(&self, id: &PrimitiveId) -> EngineResult<bool>;

    /// Block until the signal is raised, or `millis` elapse (0 waits forever)
    fn wait_for(&self, id: &PrimitiveId, millis: u64) -> EngineResult<()>;

    /// Wake the waiters on the signal; with `must_meet`, wait for a waiter first
    fn signal_wake(&self, id: &PrimitiveId, must_meet: bool) -> EngineResult<bool>;

    /// Like `signal_wake`, but the woken waiters fail with `SignalThrown`
    fn signal_throw(&self, id: &PrimitiveId, must_meet: bool) -> EngineResult<bool>;

    // === Rendezvous (barrier) ===

    fn create_rendezvous(&self, id: &PrimitiveId, expected: i32, restartable: bool) -> EngineResult<bool>;

    fn is_rendezvous(&self, id: &PrimitiveId, expected: i32) -> EngineResult<bool>;

    /// Number of threads currently arrived, or -1 if no matching rendezvous exists
    fn get_rendezvous(&self, id: &PrimitiveId, expected: i32) -> EngineResult<i32>;

    /// Arrive and block until all expected threads arrived; returns the arrival
    /// index, or -1 if the rendezvous does not exist or was deleted meanwhile
    fn rendezvous(&self, id: &PrimitiveId) -> EngineResult<i32>;

    fn delete_rendezvous(&self, id: &PrimitiveId, expected: i32) -> EngineResult<bool>;

    // === Join ===

    fn create_join(&self, id: &PrimitiveId, max: i32) -> EngineResult<bool>;

    fn is_join(&self, id: &PrimitiveId, max: i32) -> EngineResult<bool>;

    /// Enlist the calling thread. Returns promptly; the join tracks the calling
    /// thread until it exits.
    fn join_enlist(&self, id: &PrimitiveId) -> EngineResult<bool>;

    /// Block until `count` enlisted threads have all exited, then delete the join
    fn join_wait(&self, id: &PrimitiveId, count: i32) -> EngineResult<bool>;

    // === Flags ===

    fn flag(&self, id: &PrimitiveId) -> EngineResult<bool>;

    fn flagged(&self, id: &PrimitiveId) -> EngineResult<bool>;

    fn clear(&self, id: &PrimitiveId) -> EngineResult<bool>;

    // === Countdown (latch) ===

    fn is_count_down(&self, id: &PrimitiveId) -> EngineResult<bool>;

    fn create_count_down(&self, id: &PrimitiveId, count: i32) -> EngineResult<bool>;

    /// Decrement; true when this call brought the latch to zero (it is then deleted)
    fn count_down(&self, id: &PrimitiveId) -> EngineResult<bool>;

    // === Counters ===

    fn create_counter(&self, id: &PrimitiveId, value: i32) -> EngineResult<bool>;

    fn delete_counter(&self, id: &PrimitiveId) -> EngineResult<bool>;

    fn read_counter(&self, id: &PrimitiveId, zero: bool) -> EngineResult<i32>;

    fn increment_counter(&self, id: &PrimitiveId, amount: i32) -> EngineResult<i32>;

    fn decrement_counter(&self, id: &PrimitiveId) -> EngineResult<i32>;

    // === Timers ===

    fn create_timer(&self, id: &PrimitiveId) -> EngineResult<bool>;

    fn delete_timer(&self, id: &PrimitiveId) -> EngineResult<bool>;

    /// Milliseconds since the timer was created or last reset
    fn elapsed_time(&self, id: &PrimitiveId) -> EngineResult<i64>;

    /// Returns the elapsed milliseconds and restarts the timer
    fn reset_timer(&self, id: &PrimitiveId) -> EngineResult<i64>;

    // === Traces ===

    fn trace_open(&self, id: &PrimitiveId, file_name: &str) -> EngineResult<bool>;

    fn trace_close(&self, id: &PrimitiveId) -> EngineResult<bool>;

    fn trace(&self, id: &PrimitiveId, message: &str) -> EngineResult<bool>;

    fn trace_line(&self, id: &PrimitiveId, message: &str) -> EngineResult<bool>;
}
