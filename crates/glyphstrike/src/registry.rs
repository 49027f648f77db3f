//! Per-font map from strike keys to live strikes
//!
//! Entries hold strikes weakly and remember each strike's id. Whatever gets
//! upgraded or replaced here is handed back to the caller, so a strike's
//! last reference is never dropped while a map shard is locked.

use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use glyphstrike_core::{Retention, StrikeKey};
use parking_lot::RwLock;

use crate::strike::{FontStrike, StrikeId};

struct RegistryEntry {
    id: StrikeId,
    strike: Weak<FontStrike>,
    retention: Retention,
}

impl RegistryEntry {
    fn new(strike: &Arc<FontStrike>, retention: Retention) -> Self {
        Self {
            id: strike.id(),
            strike: Arc::downgrade(strike),
            retention,
        }
    }
}

/// Outcome of [`StrikeRegistry::publish`]
pub(crate) struct Published {
    pub strike: Arc<FontStrike>,
    pub retention: Retention,
    /// Our own strike, when another thread got there first
    pub discarded: Option<Arc<FontStrike>>,
}

pub(crate) struct StrikeRegistry {
    entries: DashMap<StrikeKey, RegistryEntry>,
    last: RwLock<Weak<FontStrike>>,
}

impl StrikeRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            last: RwLock::new(Weak::new()),
        }
    }

    /// The most recently handed out strike, if it matches `key`
    pub fn last_used(&self, key: &StrikeKey) -> Option<Arc<FontStrike>> {
        let strike = self.last.read().upgrade()?;
        if strike.key() == key {
            Some(strike)
        } else {
            None
        }
    }

    pub fn set_last(&self, strike: &Arc<FontStrike>) {
        *self.last.write() = Arc::downgrade(strike);
    }

    /// Live strike for `key`, with the retention it was published under
    pub fn lookup(&self, key: &StrikeKey) -> Option<(Arc<FontStrike>, Retention)> {
        let (weak, retention) = {
            let entry = self.entries.get(key)?;
            (entry.strike.clone(), entry.retention)
        };
        weak.upgrade().map(|strike| (strike, retention))
    }

    /// Offer a freshly built strike; the first live one for a key wins
    pub fn publish(
        &self,
        key: StrikeKey,
        strike: Arc<FontStrike>,
        retention: Retention,
    ) -> Published {
        let incumbent = match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => match occupied.get().strike.upgrade() {
                Some(live) => Some((live, occupied.get().retention)),
                None => {
                    occupied.insert(RegistryEntry::new(&strike, retention));
                    None
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(RegistryEntry::new(&strike, retention));
                None
            }
        };
        match incumbent {
            Some((live, retention)) => Published {
                strike: live,
                retention,
                discarded: Some(strike),
            },
            None => Published {
                strike,
                retention,
                discarded: None,
            },
        }
    }

    /// Remove the entry for `key` only if it still names strike `id`
    pub fn forget(&self, key: &StrikeKey, id: StrikeId) -> bool {
        self.entries
            .remove_if(key, |_, entry| entry.id == id)
            .is_some()
    }

    /// Every strike still alive
    pub fn live_strikes(&self) -> Vec<Arc<FontStrike>> {
        self.entries
            .iter()
            .filter_map(|entry| entry.strike.upgrade())
            .collect()
    }

    /// Entries, dead or alive
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, key: &StrikeKey) -> bool {
        self.entries.contains_key(key)
    }
}
