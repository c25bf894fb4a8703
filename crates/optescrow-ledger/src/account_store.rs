//! Market account store, the persistent home of every [`MarketRecord`].
//!
//! Records are keyed by [`MarketKey`]; a key can be claimed once. Records
//! are never removed.

use std::collections::BTreeMap;

use optescrow_types::{MarketKey, MarketRecord, OptescrowError, Result};

/// Storage seam for market records.
pub trait AccountStore {
    /// Insert a new record under its own key.
    ///
    /// # Errors
    /// Returns `DuplicateMarket` if the key is taken; the stored record is
    /// left as it was.
    fn create(&mut self, record: MarketRecord) -> Result<()>;

    fn get(&self, key: &MarketKey) -> Option<&MarketRecord>;

    fn get_mut(&mut self, key: &MarketKey) -> Option<&mut MarketRecord>;

    /// All keys, in key order.
    fn keys(&self) -> Vec<MarketKey>;

    fn contains(&self, key: &MarketKey) -> bool {
        self.get(key).is_some()
    }
}

/// BTreeMap-backed [`AccountStore`]. Ordered so listings are stable.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    records: BTreeMap<MarketKey, MarketRecord>,
}

impl InMemoryAccountStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl AccountStore for InMemoryAccountStore {
    fn create(&mut self, record: MarketRecord) -> Result<()> {
        let key = record.key();
        if self.records.contains_key(&key) {
            return Err(OptescrowError::DuplicateMarket(key));
        }
        self.records.insert(key, record);
        Ok(())
    }

    fn get(&self, key: &MarketKey) -> Option<&MarketRecord> {
        self.records.get(key)
    }

    fn get_mut(&mut self, key: &MarketKey) -> Option<&mut MarketRecord> {
        self.records.get_mut(key)
    }

    fn keys(&self) -> Vec<MarketKey> {
        self.records.keys().copied().collect()
    }
}
