use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{any::AnyInstance, key::Key};

/// Identity of a cached singleton
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum CacheKey {
    Binding(Key),
    /// Contribution of an aggregate by its index
    Element(Key, usize),
}

enum Slot {
    /// Constructed by some thread right now
    Pending,
    Ready(AnyInstance),
}

/// Singleton instances of one injector.
///
/// Every key is constructed at most once: the first thread reserves the key and the others wait
/// on the condvar until the reservation is fulfilled or dropped.
#[derive(Default)]
pub(crate) struct SingletonCache {
    slots: Mutex<BTreeMap<CacheKey, Slot>>,
    constructed: Condvar,
}

pub(crate) enum Acquired<'a> {
    Ready(AnyInstance),
    Vacant(Reservation<'a>),
}

impl SingletonCache {
    #[must_use]
    pub(crate) fn get(&self, key: &CacheKey) -> Option<AnyInstance> {
        match self.slots.lock().get(key) {
            Some(Slot::Ready(instance)) => Some(instance.clone()),
            Some(Slot::Pending) | None => None,
        }
    }

    /// Returns the cached instance or reserves the key for the current thread,
    /// blocking while another thread holds the reservation.
    pub(crate) fn acquire(&self, key: CacheKey) -> Acquired<'_> {
        let mut slots = self.slots.lock();
        loop {
            let pending = match slots.get(&key) {
                Some(Slot::Ready(instance)) => return Acquired::Ready(instance.clone()),
                Some(Slot::Pending) => true,
                None => false,
            };
            if !pending {
                break;
            }

            debug!("Waiting for construction in another thread");
            self.constructed.wait(&mut slots);
        }

        slots.insert(key.clone(), Slot::Pending);
        Acquired::Vacant(Reservation { cache: self, key })
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.slots.lock().values().filter(|slot| matches!(slot, Slot::Ready(_))).count()
    }
}

/// Exclusive right to construct a key.
/// Dropping it without [`Reservation::fulfill`] releases the key, so one of the waiters retries the construction.
#[must_use]
pub(crate) struct Reservation<'a> {
    cache: &'a SingletonCache,
    key: CacheKey,
}

impl Reservation<'_> {
    pub(crate) fn fulfill(self, instance: AnyInstance) {
        self.cache.slots.lock().insert(self.key.clone(), Slot::Ready(instance));
        debug!("Cached");
        // `Drop` wakes the waiters
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        let mut slots = self.cache.slots.lock();
        if let Some(Slot::Pending) = slots.get(&self.key) {
            slots.remove(&self.key);
            debug!("Reservation released without an instance");
        }
        drop(slots);

        self.cache.constructed.notify_all();
    }
}
