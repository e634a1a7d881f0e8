//! `PersistHelper` registers named state carriers and flushes changed ones
//! to a `StoreProvider`. Grounded on
//! `original_source/mod/data/PersistProvider.py`; pickle replaced by
//! stable JSON per spec §9's redesign flag, and the change-detection hash
//! swapped from `hashlib`'s md5 to `sha2` (teacher's stack already depends
//! on `sha2` for checksum work elsewhere).

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use qx_types::{EventType, PersistError, PersistMode, QxResult, StoreProvider};

use crate::bus::EventBus;

/// Anything that can serialize/restore its own state as JSON bytes.
pub trait Persistable {
    fn get_state(&self) -> QxResult<Vec<u8>>;
    fn set_state(&mut self, state: &[u8]) -> QxResult<()>;
}

/// Adapts any serde-friendly shared value (an `Arc<Mutex<Account>>`, a
/// `Portfolio`, …) into a `Persistable` without a hand-written impl per
/// type.
pub struct JsonPersistable<T> {
    value: Arc<Mutex<T>>,
}

impl<T> JsonPersistable<T> {
    pub fn new(value: Arc<Mutex<T>>) -> Self {
        Self { value }
    }
}

impl<T: Serialize + DeserializeOwned> Persistable for JsonPersistable<T> {
    fn get_state(&self) -> QxResult<Vec<u8>> {
        Ok(serde_json::to_vec(&*self.value.lock())?)
    }

    fn set_state(&mut self, state: &[u8]) -> QxResult<()> {
        *self.value.lock() = serde_json::from_slice(state)?;
        Ok(())
    }
}

struct Entry {
    object: Box<dyn Persistable>,
    last_hash: Option<[u8; 32]>,
}

/// Registry of named `Persistable`s, flushed to a `StoreProvider` keyed by
/// registration name. A content hash skips re-writing state that hasn't
/// changed since the last successful persist.
pub struct PersistHelper {
    store: Box<dyn StoreProvider>,
    registry: IndexMap<String, Entry>,
}

fn hash_of(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

impl PersistHelper {
    pub fn new(store: Box<dyn StoreProvider>) -> Self {
        Self { store, registry: IndexMap::new() }
    }

    pub fn register(&mut self, key: impl Into<String>, object: Box<dyn Persistable>) -> QxResult<()> {
        let key = key.into();
        if self.registry.contains_key(&key) {
            return Err(PersistError::DuplicateKey { key }.into());
        }
        self.registry.insert(key, Entry { object, last_hash: None });
        Ok(())
    }

    /// Writes state for every registered object whose serialized form has
    /// changed since the last successful write. Individual failures are
    /// logged and do not prevent other keys from persisting (spec §7:
    /// `PersistError` is non-fatal, the next tick retries).
    pub fn persist(&mut self) {
        for (key, entry) in self.registry.iter_mut() {
            let state = match entry.object.get_state() {
                Ok(state) => state,
                Err(err) => {
                    tracing::warn!(key, %err, "failed to serialize state for persistence");
                    continue;
                }
            };
            let hash = hash_of(&state);
            if entry.last_hash == Some(hash) {
                continue;
            }
            match self.store.store(key, &state) {
                Ok(()) => entry.last_hash = Some(hash),
                Err(err) => tracing::warn!(key, %err, "failed to persist state"),
            }
        }
    }

    /// Restores state for every registered object that has a stored value.
    /// Missing keys are left at their constructed default.
    pub fn restore(&mut self) {
        for (key, entry) in self.registry.iter_mut() {
            match self.store.load(key) {
                Ok(Some(state)) => {
                    if let Err(err) = entry.object.set_state(&state) {
                        tracing::warn!(key, %err, "failed to restore state");
                        continue;
                    }
                    entry.last_hash = Some(hash_of(&state));
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(key, %err, "failed to load persisted state"),
            }
        }
    }

    /// In `PersistMode::RealTime`, subscribes `persist()` to the lifecycle
    /// events spec §4.6 names (`PostBeforeTrading`, `PostAfterTrading`,
    /// `PostBar`, `PostSettlement`, `DoPersist`); a no-op under
    /// `PersistMode::None`. Grounded on
    /// `original_source/mod/data/PersistProvider.py`'s subscription set.
    pub fn subscribe(helper: &Arc<Mutex<Self>>, bus: &EventBus, mode: PersistMode) {
        if mode != PersistMode::RealTime {
            return;
        }
        for event_type in [
            EventType::PostBeforeTrading,
            EventType::PostAfterTrading,
            EventType::PostBar,
            EventType::PostSettlement,
            EventType::DoPersist,
        ] {
            let helper = Arc::clone(helper);
            bus.add_listener(
                event_type,
                Box::new(move |_event| {
                    helper.lock().persist();
                    false
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qx_data::InMemoryStoreProvider;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct Counter(Arc<AtomicU64>);

    impl Persistable for Counter {
        fn get_state(&self) -> QxResult<Vec<u8>> {
            Ok(self.0.load(Ordering::SeqCst).to_le_bytes().to_vec())
        }

        fn set_state(&mut self, state: &[u8]) -> QxResult<()> {
            let bytes: [u8; 8] = state.try_into().map_err(|_| PersistError::LoadFailed {
                key: "counter".into(),
                reason: "bad length".into(),
            })?;
            self.0.store(u64::from_le_bytes(bytes), Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn unchanged_state_is_not_rewritten() {
        let store = InMemoryStoreProvider::new();
        let mut helper = PersistHelper::new(Box::new(store));
        let counter = Arc::new(AtomicU64::new(1));
        helper.register("counter", Box::new(Counter(Arc::clone(&counter)))).unwrap();

        helper.persist();
        helper.persist();

        assert_eq!(helper.registry["counter"].last_hash, Some(hash_of(&1u64.to_le_bytes())));
    }

    #[test]
    fn restore_applies_stored_state() {
        let store = Box::new(InMemoryStoreProvider::new());
        store.store("counter", &42u64.to_le_bytes()).unwrap();
        let mut helper = PersistHelper::new(store);
        let counter = Arc::new(AtomicU64::new(0));
        helper.register("counter", Box::new(Counter(Arc::clone(&counter)))).unwrap();

        helper.restore();

        assert_eq!(counter.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn real_time_mode_persists_on_post_bar_event() {
        use std::time::Duration;

        let bus = Arc::new(EventBus::new(Duration::from_secs(1), Duration::from_millis(100)));
        let store = InMemoryStoreProvider::new();
        let mut helper = PersistHelper::new(Box::new(store));
        let counter = Arc::new(AtomicU64::new(7));
        helper.register("counter", Box::new(Counter(Arc::clone(&counter)))).unwrap();
        let helper = Arc::new(Mutex::new(helper));

        PersistHelper::subscribe(&helper, &bus, PersistMode::RealTime);
        bus.start();
        bus.put(qx_types::EventObject::new(EventType::PostBar, qx_types::EventPayload::Empty));
        std::thread::sleep(Duration::from_millis(100));
        bus.stop();

        assert_eq!(
            helper.lock().registry["counter"].last_hash,
            Some(hash_of(&7u64.to_le_bytes()))
        );
    }

    #[test]
    fn none_mode_never_subscribes() {
        use std::time::Duration;

        let bus = Arc::new(EventBus::new(Duration::from_secs(1), Duration::from_millis(100)));
        let store = InMemoryStoreProvider::new();
        let mut helper = PersistHelper::new(Box::new(store));
        helper.register("counter", Box::new(Counter(Arc::new(AtomicU64::new(1))))).unwrap();
        let helper = Arc::new(Mutex::new(helper));

        PersistHelper::subscribe(&helper, &bus, PersistMode::None);
        bus.start();
        bus.put(qx_types::EventObject::new(EventType::PostBar, qx_types::EventPayload::Empty));
        std::thread::sleep(Duration::from_millis(100));
        bus.stop();

        assert_eq!(helper.lock().registry["counter"].last_hash, None);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let store = InMemoryStoreProvider::new();
        let mut helper = PersistHelper::new(Box::new(store));
        let counter = Arc::new(AtomicU64::new(0));
        helper.register("counter", Box::new(Counter(Arc::clone(&counter)))).unwrap();
        let result = helper.register("counter", Box::new(Counter(counter)));
        assert!(result.is_err());
    }

    #[test]
    fn json_persistable_round_trips_through_store() {
        let position = Arc::new(Mutex::new(qx_types::Position::new("IF2009".into())));
        position.lock().buy_today = 3;

        let store = Box::new(InMemoryStoreProvider::new());
        let mut helper = PersistHelper::new(store);
        helper.register("position:IF2009", Box::new(JsonPersistable::new(Arc::clone(&position)))).unwrap();
        helper.persist();

        position.lock().buy_today = 0;
        helper.restore();

        assert_eq!(position.lock().buy_today, 3);
    }
}
