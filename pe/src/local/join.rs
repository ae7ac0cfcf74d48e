//! Joins: a waiter blocks until a fixed number of enlisted threads have exited

use std::collections::HashMap;
use std::thread;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::PrimitiveId;
use crate::liveness::ThreadExit;

#[derive(Debug)]
struct JoinState {
    max: i32,
    enlisted: Vec<ThreadExit>,
    /// Only one thread may wait on a join
    waiter: bool,
    /// Set once the waiter has taken the enlisted threads; no further enlisting
    closed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Joins {
    joins: Mutex<HashMap<PrimitiveId, JoinState>>,
    cond: Condvar,
}

impl Joins {
    pub(crate) fn create(&self, id: &PrimitiveId, max: i32) -> bool {
        if max < 1 {
            return false;
        }
        let mut joins = self.joins.lock();
        if joins.contains_key(id) {
            return false;
        }
        joins.insert(
            id.clone(),
            JoinState {
                max,
                enlisted: Vec::new(),
                waiter: false,
                closed: false,
            },
        );
        true
    }

    pub(crate) fn is(&self, id: &PrimitiveId, max: i32) -> bool {
        self.joins.lock().get(id).is_some_and(|j| j.max == max)
    }

    pub(crate) fn enlist(&self, id: &PrimitiveId) -> bool {
        let current = thread::current().id();
        let mut joins = self.joins.lock();
        let Some(join) = joins.get_mut(id) else {
            debug!(%id, "Joins::enlist: no such join");
            return false;
        };

        if join.closed || join.enlisted.len() >= join.max as usize {
            debug!(%id, "Joins::enlist: join is full");
            return false;
        }
        if join.enlisted.iter().any(|e| e.thread_id() == current) {
            debug!(%id, ?current, "Joins::enlist: thread already enlisted");
            return false;
        }

        join.enlisted.push(ThreadExit::current());
        debug!(%id, enlisted = join.enlisted.len(), max = join.max, "Joins::enlist: enlisted");
        self.cond.notify_all();
        true
    }

    pub(crate) fn wait(&self, id: &PrimitiveId, count: i32) -> bool {
        let mut joins = self.joins.lock();
        match joins.get_mut(id) {
            Some(join) if join.max == count && !join.waiter => join.waiter = true,
            _ => return false,
        }

        loop {
            match joins.get(id) {
                Some(join) if join.enlisted.len() < join.max as usize => self.cond.wait(&mut joins),
                Some(_) => break,
                None => return false,
            }
        }

        let enlisted = joins
            .get_mut(id)
            .map(|j| {
                j.closed = true;
                std::mem::take(&mut j.enlisted)
            })
            .unwrap_or_default();
        drop(joins);

        debug!(%id, count = enlisted.len(), "Joins::wait: waiting for enlisted threads to exit");
        for exit in &enlisted {
            exit.wait();
        }

        self.joins.lock().remove(id);
        debug!(%id, "Joins::wait: all enlisted threads exited");
        true
    }
}
