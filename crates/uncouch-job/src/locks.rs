use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

struct Slot {
    lock: Arc<Mutex<()>>,
    users: usize,
}

/// Per-destination mutexes, created on first use and dropped when the last
/// lease on them goes away.
#[derive(Default)]
pub struct LockRegistry {
    slots: Mutex<HashMap<String, Slot>>,
}

/// A claim on one destination's mutex. Lock it with [`LockLease::lock`].
pub struct LockLease<'a> {
    registry: &'a LockRegistry,
    key: String,
    lock: Arc<Mutex<()>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, key: &str) -> LockLease<'_> {
        let mut slots = self.slots.lock().expect("lock registry poisoned");
        let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
            lock: Arc::new(Mutex::new(())),
            users: 0,
        });
        slot.users += 1;
        LockLease {
            registry: self,
            key: key.to_string(),
            lock: Arc::clone(&slot.lock),
        }
    }

    /// Destinations currently leased.
    pub fn len(&self) -> usize {
        self.slots.lock().expect("lock registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &str) {
        let mut slots = self.slots.lock().expect("lock registry poisoned");
        if let Some(slot) = slots.get_mut(key) {
            slot.users -= 1;
            if slot.users == 0 {
                slots.remove(key);
            }
        }
    }
}

impl LockLease<'_> {
    pub fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().expect("destination lock poisoned")
    }
}

impl Drop for LockLease<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}
