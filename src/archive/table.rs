//! Name and index lookup over the engine.
//!
//! Lookups always go to the engine's locate primitive. The optional LRU cache
//! only short-cuts repeated lookups of the same name and is cleared by every
//! structural change; a cached index is checked against the engine before it
//! is trusted.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::Result;
use crate::codec::{NameCodec, UTF8_FLAG};
use crate::engine::{Engine, EntryRecord};
use crate::entry::Entry;

/// Name→index resolution for one session.
#[derive(Debug)]
pub(crate) struct NameTable {
    cache: Option<LruCache<Vec<u8>, u64>>,
}

impl NameTable {
    pub fn new(capacity: Option<NonZeroUsize>) -> Self {
        Self {
            cache: capacity.map(LruCache::new),
        }
    }

    /// Drops every cached index.
    pub fn invalidate(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
    }

    /// Index of the live entry called `name`.
    ///
    /// The name is encoded with `codec`. When that finds nothing and the
    /// codec is not UTF-8, entries flagged as UTF-8 are tried as well.
    pub fn lookup<E: Engine>(
        &mut self,
        engine: &E,
        codec: &dyn NameCodec,
        name: &str,
    ) -> Result<Option<u64>> {
        if let Ok(raw) = codec.encode(name) {
            if let Some(index) = self.locate_raw(engine, &raw)? {
                return Ok(Some(index));
            }
        }
        if codec.label().eq_ignore_ascii_case("utf-8") {
            return Ok(None);
        }
        let raw = name.as_bytes();
        match self.locate_raw(engine, raw)? {
            Some(index) => {
                let flagged = engine
                    .stat(index)?
                    .is_some_and(|record| record.flags & UTF8_FLAG != 0);
                Ok(flagged.then_some(index))
            }
            None => Ok(None),
        }
    }

    /// Index of the live entry whose raw name is exactly `raw`.
    pub fn locate_raw<E: Engine>(&mut self, engine: &E, raw: &[u8]) -> Result<Option<u64>> {
        if let Some(cache) = self.cache.as_mut() {
            if let Some(&index) = cache.get(raw) {
                if matches_raw(engine.stat(index)?.as_ref(), raw) {
                    return Ok(Some(index));
                }
                cache.pop(raw);
            }
        }
        let found = engine.locate(raw);
        if let (Some(cache), Some(index)) = (self.cache.as_mut(), found) {
            cache.put(raw.to_vec(), index);
        }
        Ok(found)
    }

    /// Resolves an entry snapshot to the index it currently lives at.
    ///
    /// A resolved entry is trusted at its index as long as that slot still
    /// carries the same raw name; otherwise (and for standalone entries) the
    /// raw name is looked up.
    pub fn resolve<E: Engine>(&mut self, engine: &E, entry: &Entry) -> Result<Option<u64>> {
        if let Some(index) = entry.index() {
            if index < engine.slot_count()
                && matches_raw(engine.stat(index)?.as_ref(), entry.raw_name())
            {
                return Ok(Some(index));
            }
        }
        self.locate_raw(engine, entry.raw_name())
    }
}

fn matches_raw(record: Option<&EntryRecord>, raw: &[u8]) -> bool {
    record.is_some_and(|r| r.raw_name == raw)
}

/// Snapshot of the entry at `index`, `None` for a removed slot.
pub(crate) fn snapshot<E: Engine>(
    engine: &E,
    codec: &dyn NameCodec,
    index: u64,
) -> Result<Option<Entry>> {
    Ok(engine
        .stat(index)?
        .map(|record| Entry::from_record(record, codec)))
}

/// Number of live entries.
pub(crate) fn live_count<E: Engine>(engine: &E) -> Result<u64> {
    let mut count = 0;
    for index in 0..engine.slot_count() {
        if engine.stat(index)?.is_some() {
            count += 1;
        }
    }
    Ok(count)
}
