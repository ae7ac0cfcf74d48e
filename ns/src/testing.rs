//! Test doubles shared by unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use primitives::{EngineError, EngineResult, PrimitiveEngine, PrimitiveId, ThreadExit};

/// Engine whose joins count live enlisted threads; every other primitive is inert
#[derive(Debug)]
pub(crate) struct JoinStub {
    /// None makes every enlist fail
    accept: Option<bool>,
    participants: Mutex<HashMap<PrimitiveId, Vec<ThreadExit>>>,
    enlist_calls: AtomicUsize,
}

impl JoinStub {
    pub(crate) fn new(accept: bool) -> Self {
        Self {
            accept: Some(accept),
            participants: Mutex::default(),
            enlist_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            accept: None,
            ..Self::new(false)
        }
    }

    /// Enlisted threads that have not exited yet
    pub(crate) fn live(&self, id: &PrimitiveId) -> usize {
        self.participants
            .lock()
            .get(id)
            .map_or(0, |exits| exits.iter().filter(|e| !e.has_exited()).count())
    }

    pub(crate) fn wait_all_exited(&self, id: &PrimitiveId, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.live(id) > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    pub(crate) fn enlist_calls(&self) -> usize {
        self.enlist_calls.load(Ordering::SeqCst)
    }
}

impl PrimitiveEngine for JoinStub {
    fn waiting(&self, _id: &PrimitiveId) -> EngineResult<bool> {
        Ok(false)
    }

    fn wait_for(&self, _id: &PrimitiveId, _millis: u64) -> EngineResult<()> {
        Ok(())
    }

    fn signal_wake(&self, _id: &PrimitiveId, _must_meet: bool) -> EngineResult<bool> {
        Ok(false)
    }

    fn signal_throw(&self, _id: &PrimitiveId, _must_meet: bool) -> EngineResult<bool> {
        Ok(false)
    }

    fn create_rendezvous(&self, _id: &PrimitiveId, _expected: i32, _restartable: bool) -> EngineResult<bool> {
        Ok(false)
    }

    fn is_rendezvous(&self, _id: &PrimitiveId, _expected: i32) -> EngineResult<bool> {
        Ok(false)
    }

    fn get_rendezvous(&self, _id: &PrimitiveId, _expected: i32) -> EngineResult<i32> {
        Ok(-1)
    }

    fn rendezvous(&self, _id: &PrimitiveId) -> EngineResult<i32> {
        Ok(-1)
    }

    fn delete_rendezvous(&self, _id: &PrimitiveId, _expected: i32) -> EngineResult<bool> {
        Ok(false)
    }

    fn create_join(&self, _id: &PrimitiveId, _max: i32) -> EngineResult<bool> {
        Ok(true)
    }

    fn is_join(&self, id: &PrimitiveId, max: i32) -> EngineResult<bool> {
        Ok(self.live(id) == max as usize)
    }

    fn join_enlist(&self, id: &PrimitiveId) -> EngineResult<bool> {
        self.enlist_calls.fetch_add(1, Ordering::SeqCst);
        match self.accept {
            None => Err(EngineError::InvalidArgument {
                id: id.clone(),
                reason: "enlist refused by stub".to_string(),
            }),
            Some(false) => Ok(false),
            Some(true) => {
                self.participants
                    .lock()
                    .entry(id.clone())
                    .or_default()
                    .push(ThreadExit::current());
                Ok(true)
            }
        }
    }

    fn join_wait(&self, _id: &PrimitiveId, _count: i32) -> EngineResult<bool> {
        Ok(true)
    }

    fn flag(&self, _id: &PrimitiveId) -> EngineResult<bool> {
        Ok(false)
    }

    fn flagged(&self, _id: &PrimitiveId) -> EngineResult<bool> {
        Ok(false)
    }

    fn clear(&self, _id: &PrimitiveId) -> EngineResult<bool> {
        Ok(false)
    }

    fn is_count_down(&self, _id: &PrimitiveId) -> EngineResult<bool> {
        Ok(false)
    }

    fn create_count_down(&self, _id: &PrimitiveId, _count: i32) -> EngineResult<bool> {
        Ok(false)
    }

    fn count_down(&self, _id: &PrimitiveId) -> EngineResult<bool> {
        Ok(false)
    }

    fn create_counter(&self, _id: &PrimitiveId, _value: i32) -> EngineResult<bool> {
        Ok(false)
    }

    fn delete_counter(&self, _id: &PrimitiveId) -> EngineResult<bool> {
        Ok(false)
    }

    fn read_counter(&self, _id: &PrimitiveId, _zero: bool) -> EngineResult<i32> {
        Ok(0)
    }

    fn increment_counter(&self, _id: &PrimitiveId, _amount: i32) -> EngineResult<i32> {
        Ok(0)
    }

    fn decrement_counter(&self, _id: &PrimitiveId) -> EngineResult<i32> {
        Ok(0)
    }

    fn create_timer(&self, _id: &PrimitiveId) -> EngineResult<bool> {
        Ok(false)
    }

    fn delete_timer(&self, _id: &PrimitiveId) -> EngineResult<bool> {
        Ok(false)
    }

    fn elapsed_time(&self, _id: &PrimitiveId) -> EngineResult<i64> {
        Ok(0)
    }

    fn reset_timer(&self, _id: &PrimitiveId) -> EngineResult<i64> {
        Ok(0)
    }

    fn trace_open(&self, _id: &PrimitiveId, _file_name: &str) -> EngineResult<bool> {
        Ok(false)
    }

    fn trace_close(&self, _id: &PrimitiveId) -> EngineResult<bool> {
        Ok(false)
    }

    fn trace(&self, _id: &PrimitiveId, _message: &str) -> EngineResult<bool> {
        Ok(false)
    }

    fn trace_line(&self, _id: &PrimitiveId, _message: &str) -> EngineResult<bool> {
        Ok(false)
    }
}
