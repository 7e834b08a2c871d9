//! The in-memory object store: every record of the current fetch, viewable
//! both in pack order and by content identity.

use std::collections::BTreeMap;

use gitup_hash::{Hasher, ObjectId};
use gitup_object::ObjectKind;

use crate::RecordKind;

/// One record decoded from the pack (or reconstructed from a delta chain).
#[derive(Debug)]
pub struct PackRecord {
    pub kind: RecordKind,
    /// Byte offset of this record in the pack; 0 for reconstructed and
    /// externally loaded objects.
    pub pack_offset: u64,
    /// Insertion order within this store.
    pub index: usize,
    /// Inflated payload: object content for terminal records, the
    /// instruction stream for delta records.
    pub payload: Vec<u8>,
    /// Identity of the (reconstructed) object. Set at decode time for
    /// terminal records; set by delta application for delta records.
    pub id: Option<ObjectId>,
}

impl PackRecord {
    /// A delta record whose chain has not been applied yet.
    pub fn is_unresolved_delta(&self) -> bool {
        self.kind.is_delta() && self.id.is_none()
    }
}

/// Two views over the same records: a pack-order sequence (used during
/// decoding and ofs-delta resolution) and an identity-keyed ordered map
/// (used by ref-delta resolution and the checkout walk).
#[derive(Default)]
pub struct ObjectStore {
    records: Vec<PackRecord>,
    by_id: BTreeMap<ObjectId, usize>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PackRecord] {
        &self.records
    }

    /// Look up a record by identity.
    pub fn get(&self, oid: &ObjectId) -> Option<&PackRecord> {
        self.by_id.get(oid).map(|&i| &self.records[i])
    }

    /// Look up a record by pack-order index.
    pub fn get_index(&self, index: usize) -> Option<&PackRecord> {
        self.records.get(index)
    }

    pub fn contains(&self, oid: &ObjectId) -> bool {
        self.by_id.contains_key(oid)
    }

    /// Hash and insert a terminal object. A duplicate identity is a no-op
    /// (the first record wins) and the new payload is dropped.
    pub fn insert_terminal(
        &mut self,
        kind: ObjectKind,
        pack_offset: u64,
        payload: Vec<u8>,
    ) -> ObjectId {
        let id = Hasher::hash_object(kind.as_str(), &payload);
        if self.by_id.contains_key(&id) {
            return id;
        }
        let index = self.records.len();
        self.records.push(PackRecord {
            kind: RecordKind::from_object_kind(kind),
            pack_offset,
            index,
            payload,
            id: Some(id),
        });
        self.by_id.insert(id, index);
        id
    }

    /// Insert a reconstructed or externally loaded object (no pack offset).
    pub fn insert_object(&mut self, kind: ObjectKind, payload: Vec<u8>) -> ObjectId {
        self.insert_terminal(kind, 0, payload)
    }

    /// Append a delta record. Delta records join the pack-order sequence but
    /// are not identity-indexed until their chain is resolved.
    pub fn push_delta(&mut self, kind: RecordKind, pack_offset: u64, payload: Vec<u8>) -> usize {
        debug_assert!(kind.is_delta());
        let index = self.records.len();
        self.records.push(PackRecord {
            kind,
            pack_offset,
            index,
            payload,
            id: None,
        });
        index
    }

    /// Find the most recent record whose pack offset equals `target`.
    ///
    /// Ofs-delta bases are located by scanning backwards through the
    /// pack-order sequence, so a back-reference can only land on a record
    /// decoded earlier.
    pub fn find_offset(&self, target: u64) -> Option<usize> {
        self.records
            .iter()
            .rev()
            .find(|r| r.pack_offset == target && r.pack_offset != 0)
            .map(|r| r.index)
    }

    /// Record the identity a delta record resolved to.
    pub fn set_resolved(&mut self, index: usize, id: ObjectId) {
        self.records[index].id = Some(id);
    }
}
