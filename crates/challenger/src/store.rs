//! Pending challenge bookkeeping

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use xlayer_fp_primitives::{ChallengeKey, ChallengeRecord, GameId};

/// Table of confirmed, unresolved challenges plus in-flight reservations.
///
/// A reservation claims a [`ChallengeKey`] before the bonded transaction is
/// sent, so two deliveries of the same proposal cannot both get through the
/// check. Only [`ChallengeStore::commit`] creates a record.
pub trait ChallengeStore: Send + Sync + std::fmt::Debug {
    /// Claim `key`. `false` if it is already reserved or has a pending record.
    fn try_reserve(&self, key: ChallengeKey) -> bool;

    /// Turn the reservation for `record.key()` into a pending record.
    fn commit(&self, record: ChallengeRecord);

    /// Drop a reservation that never produced a game.
    fn release(&self, key: &ChallengeKey);

    /// Keep the reservation for `key` after a submission whose outcome is
    /// unknown, until `until`. A held key is not freed by
    /// [`ChallengeStore::release`], only by [`ChallengeStore::expire_holds`]
    /// or a commit.
    fn hold(&self, key: ChallengeKey, until: u64);

    /// Free and return every held key whose hold ended at or before `now`.
    fn expire_holds(&self, now: u64) -> Vec<ChallengeKey>;

    /// Pending record of `game_id`.
    fn get(&self, game_id: &GameId) -> Option<ChallengeRecord>;

    /// Retire a record, freeing its key.
    fn remove(&self, game_id: &GameId) -> Option<ChallengeRecord>;

    /// Whether `key` is reserved or pending.
    fn contains_key(&self, key: &ChallengeKey) -> bool;

    /// Pending records, in no particular order.
    fn pending(&self) -> Vec<ChallengeRecord>;

    /// Retire and return every record whose window closed at or before `now`.
    fn evict_expired(&self, now: u64) -> Vec<ChallengeRecord>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Reserved,
    /// Bond may be posted, game unknown.
    Held { until: u64 },
    Pending(GameId),
}

#[derive(Debug, Default)]
struct Tables {
    records: HashMap<GameId, ChallengeRecord>,
    keys: HashMap<ChallengeKey, Slot>,
}

impl Tables {
    fn retire(&mut self, game_id: &GameId) -> Option<ChallengeRecord> {
        let record = self.records.remove(game_id)?;
        if self.keys.get(&record.key()) == Some(&Slot::Pending(*game_id)) {
            self.keys.remove(&record.key());
        }
        Some(record)
    }
}

/// Mutex-guarded in-memory [`ChallengeStore`].
#[derive(Debug, Default)]
pub struct InMemoryChallengeStore {
    tables: Mutex<Tables>,
}

impl InMemoryChallengeStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChallengeStore for InMemoryChallengeStore {
    fn try_reserve(&self, key: ChallengeKey) -> bool {
        let mut tables = self.tables();
        if tables.keys.contains_key(&key) {
            return false;
        }
        tables.keys.insert(key, Slot::Reserved);
        true
    }

    fn commit(&self, record: ChallengeRecord) {
        let mut tables = self.tables();
        tables.keys.insert(record.key(), Slot::Pending(record.game_id));
        tables.records.insert(record.game_id, record);
    }

    fn release(&self, key: &ChallengeKey) {
        let mut tables = self.tables();
        if tables.keys.get(key) == Some(&Slot::Reserved) {
            tables.keys.remove(key);
        }
    }

    fn hold(&self, key: ChallengeKey, until: u64) {
        let mut tables = self.tables();
        if !matches!(tables.keys.get(&key), Some(Slot::Pending(_))) {
            tables.keys.insert(key, Slot::Held { until });
        }
    }

    fn expire_holds(&self, now: u64) -> Vec<ChallengeKey> {
        let mut tables = self.tables();
        let expired: Vec<ChallengeKey> = tables
            .keys
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Held { until } if *until <= now))
            .map(|(key, _)| *key)
            .collect();
        for key in &expired {
            tables.keys.remove(key);
        }
        expired
    }

    fn get(&self, game_id: &GameId) -> Option<ChallengeRecord> {
        self.tables().records.get(game_id).cloned()
    }

    fn remove(&self, game_id: &GameId) -> Option<ChallengeRecord> {
        self.tables().retire(game_id)
    }

    fn contains_key(&self, key: &ChallengeKey) -> bool {
        self.tables().keys.contains_key(key)
    }

    fn pending(&self) -> Vec<ChallengeRecord> {
        self.tables().records.values().cloned().collect()
    }

    fn evict_expired(&self, now: u64) -> Vec<ChallengeRecord> {
        let mut tables = self.tables();
        let expired: Vec<GameId> = tables
            .records
            .values()
            .filter(|record| record.is_expired(now))
            .map(|record| record.game_id)
            .collect();
        expired.iter().filter_map(|game_id| tables.retire(game_id)).collect()
    }
}
