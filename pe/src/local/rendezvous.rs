//! Rendezvous barriers

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::PrimitiveId;

#[derive(Debug, Default)]
struct BarrierState {
    arrived: i32,
    generation: u64,
    deleted: bool,
}

#[derive(Debug)]
struct Barrier {
    expected: i32,
    restartable: bool,
    state: Mutex<BarrierState>,
    cond: Condvar,
}

#[derive(Debug, Default)]
pub(crate) struct Rendezvous {
    barriers: Mutex<HashMap<PrimitiveId, Arc<Barrier>>>,
}

impl Rendezvous {
    pub(crate) fn create(&self, id: &PrimitiveId, expected: i32, restartable: bool) -> bool {
        if expected < 1 {
            return false;
        }
        let mut barriers = self.barriers.lock();
        if barriers.contains_key(id) {
            return false;
        }
        barriers.insert(
            id.clone(),
            Arc::new(Barrier {
                expected,
                restartable,
                state: Mutex::new(BarrierState::default()),
                cond: Condvar::new(),
            }),
        );
        true
    }

    pub(crate) fn is(&self, id: &PrimitiveId, expected: i32) -> bool {
        self.barriers.lock().get(id).is_some_and(|b| b.expected == expected)
    }

    pub(crate) fn arrived(&self, id: &PrimitiveId, expected: i32) -> i32 {
        let barrier = self.barriers.lock().get(id).cloned();
        match barrier {
            Some(barrier) if barrier.expected == expected => barrier.state.lock().arrived,
            _ => -1,
        }
    }

    pub(crate) fn arrive(&self, id: &PrimitiveId) -> i32 {
        let Some(barrier) = self.barriers.lock().get(id).cloned() else {
            debug!(%id, "Rendezvous::arrive: no such rendezvous");
            return -1;
        };

        let mut state = barrier.state.lock();
        if state.deleted {
            return -1;
        }

        let index = state.arrived;
        state.arrived += 1;
        debug!(%id, index, expected = barrier.expected, "Rendezvous::arrive: arrived");

        if state.arrived >= barrier.expected {
            state.arrived = 0;
            state.generation += 1;
            if !barrier.restartable {
                state.deleted = true;
            }
            barrier.cond.notify_all();
            drop(state);

            if !barrier.restartable {
                let mut barriers = self.barriers.lock();
                if barriers.get(id).is_some_and(|b| Arc::ptr_eq(b, &barrier)) {
                    barriers.remove(id);
                }
            }
            return index;
        }

        let generation = state.generation;
        while state.generation == generation && !state.deleted {
            barrier.cond.wait(&mut state);
        }
        if state.generation == generation { -1 } else { index }
    }

    pub(crate) fn delete(&self, id: &PrimitiveId, expected: i32) -> bool {
        let barrier = {
            let mut barriers = self.barriers.lock();
            match barriers.get(id) {
                Some(b) if b.expected == expected => barriers.remove(id),
                _ => None,
            }
        };
        match barrier {
            Some(barrier) => {
                barrier.state.lock().deleted = true;
                barrier.cond.notify_all();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_create_rejects_duplicates_and_bad_counts() {
        let rendezvous = Rendezvous::default();
        let id = PrimitiveId::from("r");
        assert!(!rendezvous.create(&id, 0, false));
        assert!(rendezvous.create(&id, 2, false));
        assert!(!rendezvous.create(&id, 2, false));
        assert!(rendezvous.is(&id, 2));
        assert!(!rendezvous.is(&id, 3));
    }

    #[test]
    fn test_all_parties_released_with_distinct_indices() {
        let rendezvous = Arc::new(Rendezvous::default());
        let id = PrimitiveId::from("r");
        rendezvous.create(&id, 3, false);

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let rendezvous = rendezvous.clone();
                let id = id.clone();
                thread::spawn(move || rendezvous.arrive(&id))
            })
            .collect();

        let mut indices: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        indices.sort();
        assert_eq!(indices, vec![0, 1, 2]);

        // non-restartable rendezvous is gone once complete
        assert!(!rendezvous.is(&id, 3));
        assert_eq!(rendezvous.arrive(&id), -1);
    }

    #[test]
    fn test_restartable_survives_completion() {
        let rendezvous = Rendezvous::default();
        let id = PrimitiveId::from("r");
        rendezvous.create(&id, 1, true);
        assert_eq!(rendezvous.arrive(&id), 0);
        assert_eq!(rendezvous.arrive(&id), 0);
        assert!(rendezvous.is(&id, 1));
    }

    #[test]
    fn test_delete_releases_waiters_with_minus_one() {
        let rendezvous = Arc::new(Rendezvous::default());
        let id = PrimitiveId::from("r");
        rendezvous.create(&id, 2, false);

        let waiter = {
            let rendezvous = rendezvous.clone();
            let id = id.clone();
            thread::spawn(move || rendezvous.arrive(&id))
        };

        while rendezvous.arrived(&id, 2) < 1 {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(rendezvous.delete(&id, 2));
        assert_eq!(waiter.join().unwrap(), -1);
        assert_eq!(rendezvous.arrived(&id, 2), -1);
    }
}
