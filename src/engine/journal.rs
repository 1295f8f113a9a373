//! Staged modifications of a ZIP archive.
//!
//! The journal is an ordered table of slots. A slot either refers to an
//! entry of the archive as it was opened, carries new content, or is empty
//! because its entry was removed. Nothing here touches the disk.

use std::collections::HashMap;

use super::{EntryRecord, EntrySource};
use crate::method::{CompressionMethod, EncryptionMethod};
use crate::password::Password;
use crate::timestamp::Timestamp;
use crate::{Error, Result};

/// Metadata of an entry as found in the archive on open.
#[derive(Debug, Clone)]
pub(crate) struct OriginalEntry {
    pub raw_name: Vec<u8>,
    pub modified: Option<Timestamp>,
    pub crc32: u32,
    pub size: u64,
    pub compressed_size: u64,
    pub compression: CompressionMethod,
    pub encryption: EncryptionMethod,
    pub flags: u16,
    pub extra: Vec<u8>,
    pub comment: String,
}

/// New content staged for a slot.
#[derive(Debug, Clone)]
pub(crate) struct StagedContent {
    pub source: EntrySource,
    pub size: u64,
    pub crc32: Option<u32>,
    pub modified: Timestamp,
}

/// One journal slot.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub raw_name: Vec<u8>,
    /// Position of the entry in the opened archive, if it came from there.
    pub origin: Option<usize>,
    pub content: Option<StagedContent>,
    pub compression: Option<(CompressionMethod, u32)>,
    pub encryption: Option<(EncryptionMethod, Option<Password>)>,
    pub modified: Option<Timestamp>,
}

impl Slot {
    fn new(raw_name: Vec<u8>, origin: Option<usize>) -> Self {
        Self {
            raw_name,
            origin,
            content: None,
            compression: None,
            encryption: None,
            modified: None,
        }
    }

    /// True if committing must decode and re-encode this entry.
    pub fn needs_encode(&self) -> bool {
        self.content.is_some()
            || self.compression.is_some()
            || self.encryption.is_some()
            || self.modified.is_some()
    }
}

/// The ordered slot table plus archive-level staged state.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    originals: Vec<OriginalEntry>,
    slots: Vec<Option<Slot>>,
    by_name: HashMap<Vec<u8>, u64>,
    original_comment: Vec<u8>,
    comment: Option<Vec<u8>>,
    dirty: bool,
}

impl Journal {
    /// Builds a journal mirroring an opened archive.
    pub fn new(originals: Vec<OriginalEntry>, comment: Vec<u8>) -> Self {
        let mut by_name = HashMap::with_capacity(originals.len());
        let mut slots = Vec::with_capacity(originals.len());
        for (i, original) in originals.iter().enumerate() {
            // First occurrence wins for duplicate names.
            by_name.entry(original.raw_name.clone()).or_insert(i as u64);
            slots.push(Some(Slot::new(original.raw_name.clone(), Some(i))));
        }
        Self {
            originals,
            slots,
            by_name,
            original_comment: comment,
            comment: None,
            dirty: false,
        }
    }

    pub fn slot_count(&self) -> u64 {
        self.slots.len() as u64
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forces a rewrite on commit, e.g. after truncating a non-empty file.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn original(&self, origin: usize) -> Option<&OriginalEntry> {
        self.originals.get(origin)
    }

    /// Live slots in index order.
    pub fn live_slots(&self) -> impl Iterator<Item = (u64, &Slot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i as u64, s)))
    }

    /// `Ok(None)` for a removed slot.
    pub fn slot(&self, index: u64) -> Result<Option<&Slot>> {
        let count = self.slot_count();
        self.slots
            .get(index as usize)
            .map(Option::as_ref)
            .ok_or(Error::InvalidIndex { index, count })
    }

    fn live_slot_mut(&mut self, index: u64) -> Result<&mut Slot> {
        let count = self.slot_count();
        match self.slots.get_mut(index as usize) {
            Some(Some(slot)) => Ok(slot),
            Some(None) => Err(Error::invalid_argument(format!(
                "entry {} has been removed",
                index
            ))),
            None => Err(Error::InvalidIndex { index, count }),
        }
    }

    pub fn locate(&self, raw_name: &[u8]) -> Option<u64> {
        self.by_name.get(raw_name).copied()
    }

    /// Stages content under a name, replacing a live entry of the same name.
    pub fn insert(&mut self, raw_name: &[u8], content: StagedContent) -> u64 {
        self.dirty = true;
        if let Some(index) = self.locate(raw_name) {
            if let Some(Some(slot)) = self.slots.get_mut(index as usize) {
                slot.content = Some(content);
                slot.compression = None;
                slot.encryption = None;
                slot.modified = None;
                return index;
            }
        }
        let index = self.slot_count();
        let mut slot = Slot::new(raw_name.to_vec(), None);
        slot.content = Some(content);
        self.slots.push(Some(slot));
        self.by_name.insert(raw_name.to_vec(), index);
        index
    }

    pub fn rename(&mut self, index: u64, raw_name: &[u8]) -> Result<()> {
        let old = self.live_slot_mut(index)?.raw_name.clone();
        if old == raw_name {
            return Ok(());
        }
        if self.locate(raw_name).is_some() {
            return Err(Error::invalid_argument(format!(
                "an entry named '{}' already exists",
                String::from_utf8_lossy(raw_name)
            )));
        }
        self.live_slot_mut(index)?.raw_name = raw_name.to_vec();
        if self.by_name.get(&old) == Some(&index) {
            self.by_name.remove(&old);
        }
        self.by_name.insert(raw_name.to_vec(), index);
        self.dirty = true;
        Ok(())
    }

    pub fn remove(&mut self, index: u64) -> Result<()> {
        let raw_name = self.live_slot_mut(index)?.raw_name.clone();
        self.slots[index as usize] = None;
        if self.by_name.get(&raw_name) == Some(&index) {
            self.by_name.remove(&raw_name);
            // A duplicate of the removed name becomes reachable again.
            let duplicate = self
                .live_slots()
                .find(|(_, s)| s.raw_name == raw_name)
                .map(|(i, _)| i);
            if let Some(i) = duplicate {
                self.by_name.insert(raw_name, i);
            }
        }
        self.dirty = true;
        Ok(())
    }

    pub fn set_compression(&mut self, index: u64, method: CompressionMethod, level: u32) -> Result<()> {
        self.live_slot_mut(index)?.compression = Some((method, level));
        self.dirty = true;
        Ok(())
    }

    pub fn set_encryption(
        &mut self,
        index: u64,
        method: EncryptionMethod,
        password: Option<Password>,
    ) -> Result<()> {
        self.live_slot_mut(index)?.encryption = Some((method, password));
        self.dirty = true;
        Ok(())
    }

    pub fn set_modified(&mut self, index: u64, time: Timestamp) -> Result<()> {
        self.live_slot_mut(index)?.modified = Some(time);
        self.dirty = true;
        Ok(())
    }

    pub fn comment(&self) -> &[u8] {
        self.comment.as_deref().unwrap_or(&self.original_comment)
    }

    pub fn set_comment(&mut self, raw: &[u8]) {
        if self.comment() != raw {
            self.comment = Some(raw.to_vec());
            self.dirty = true;
        }
    }

    /// True if the slot keeps its original bytes but under a new name.
    pub fn is_renamed(&self, slot: &Slot) -> bool {
        slot.origin
            .and_then(|o| self.original(o))
            .is_some_and(|o| o.raw_name != slot.raw_name)
    }

    /// Metadata of a slot with staged changes applied.
    pub fn record(&self, index: u64) -> Result<Option<EntryRecord>> {
        let Some(slot) = self.slot(index)? else {
            return Ok(None);
        };
        let mut record = match (&slot.content, slot.origin.and_then(|o| self.original(o))) {
            (Some(content), _) => EntryRecord {
                index,
                raw_name: slot.raw_name.clone(),
                modified: Some(content.modified),
                crc32: content.crc32,
                size: content.size,
                compressed_size: None,
                compression: CompressionMethod::Default,
                encryption: EncryptionMethod::None,
                flags: 0,
                extra: Vec::new(),
                comment: String::new(),
            },
            (None, Some(original)) => EntryRecord {
                index,
                raw_name: slot.raw_name.clone(),
                modified: original.modified,
                crc32: Some(original.crc32),
                size: original.size,
                compressed_size: Some(original.compressed_size),
                compression: original.compression,
                encryption: original.encryption,
                flags: original.flags,
                extra: original.extra.clone(),
                comment: original.comment.clone(),
            },
            (None, None) => {
                return Err(Error::Engine(format!("slot {} has no content", index)));
            }
        };
        if let Some((method, _)) = slot.compression {
            record.compression = method;
            record.compressed_size = None;
        }
        if let Some((method, _)) = &slot.encryption {
            record.encryption = *method;
            record.compressed_size = None;
        }
        if let Some(time) = slot.modified {
            record.modified = Some(time);
        }
        Ok(Some(record))
    }
}
