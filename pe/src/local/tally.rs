//! Flags, countdowns, counters and timers

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use parking_lot::Mutex;

use crate::PrimitiveId;

#[derive(Debug, Default)]
pub(crate) struct Flags {
    set: Mutex<HashSet<PrimitiveId>>,
}

impl Flags {
    /// True if the flag was not already set
    pub(crate) fn flag(&self, id: &PrimitiveId) -> bool {
        self.set.lock().insert(id.clone())
    }

    pub(crate) fn flagged(&self, id: &PrimitiveId) -> bool {
        self.set.lock().contains(id)
    }

    /// True if the flag was set
    pub(crate) fn clear(&self, id: &PrimitiveId) -> bool {
        self.set.lock().remove(id)
    }
}

#[derive(Debug, Default)]
pub(crate) struct CountDowns {
    counts: Mutex<HashMap<PrimitiveId, i32>>,
}

impl CountDowns {
    pub(crate) fn create(&self, id: &PrimitiveId, count: i32) -> bool {
        if count < 1 {
            return false;
        }
        let mut counts = self.counts.lock();
        if counts.contains_key(id) {
            return false;
        }
        counts.insert(id.clone(), count);
        true
    }

    pub(crate) fn exists(&self, id: &PrimitiveId) -> bool {
        self.counts.lock().contains_key(id)
    }

    pub(crate) fn count_down(&self, id: &PrimitiveId) -> bool {
        let mut counts = self.counts.lock();
        let Some(count) = counts.get_mut(id) else {
            return false;
        };
        *count -= 1;
        if *count <= 0 {
            counts.remove(id);
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    values: Mutex<HashMap<PrimitiveId, i32>>,
}

impl Counters {
    pub(crate) fn create(&self, id: &PrimitiveId, value: i32) -> bool {
        let mut values = self.values.lock();
        if values.contains_key(id) {
            return false;
        }
        values.insert(id.clone(), value);
        true
    }

    pub(crate) fn delete(&self, id: &PrimitiveId) -> bool {
        self.values.lock().remove(id).is_some()
    }

    /// Missing counters read as zero
    pub(crate) fn read(&self, id: &PrimitiveId, zero: bool) -> i32 {
        let mut values = self.values.lock();
        match values.get_mut(id) {
            Some(value) if zero => std::mem::take(value),
            Some(value) => *value,
            None => 0,
        }
    }

    /// Missing counters are created at zero before adding
    pub(crate) fn add(&self, id: &PrimitiveId, amount: i32) -> i32 {
        let mut values = self.values.lock();
        let value = values.entry(id.clone()).or_insert(0);
        *value = value.wrapping_add(amount);
        *value
    }
}

#[derive(Debug, Default)]
pub(crate) struct Timers {
    started: Mutex<HashMap<PrimitiveId, Instant>>,
}

impl Timers {
    pub(crate) fn create(&self, id: &PrimitiveId) -> bool {
        let mut started = self.started.lock();
        if started.contains_key(id) {
            return false;
        }
        started.insert(id.clone(), Instant::now());
        true
    }

    pub(crate) fn delete(&self, id: &PrimitiveId) -> bool {
        self.started.lock().remove(id).is_some()
    }

    /// Missing timers are started now and read as zero
    pub(crate) fn elapsed(&self, id: &PrimitiveId) -> i64 {
        let mut started = self.started.lock();
        let start = started.entry(id.clone()).or_insert_with(Instant::now);
        start.elapsed().as_millis() as i64
    }

    pub(crate) fn reset(&self, id: &PrimitiveId) -> i64 {
        let mut started = self.started.lock();
        let now = Instant::now();
        match started.insert(id.clone(), now) {
            Some(previous) => now.duration_since(previous).as_millis() as i64,
            None => 0,
        }
    }
}
