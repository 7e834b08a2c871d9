//! Tree payload parsing and construction.
//!
//! A tree payload is a concatenation of entries, each
//! `<octal-mode> <name>\0<20-byte-id>`. Entries are ordered by git's
//! name comparison, where directories compare as if they had a trailing `/`.

use std::cmp::Ordering;

use bstr::{BStr, BString, ByteSlice};
use gitup_hash::ObjectId;

use crate::ObjectError;

/// Directory bit in a tree entry mode.
pub const MODE_DIR: u32 = 0o040000;
/// Symbolic link mode.
pub const MODE_SYMLINK: u32 = 0o120000;
/// Regular file mode.
pub const MODE_FILE: u32 = 0o100644;
/// Executable file mode.
pub const MODE_EXEC: u32 = 0o100755;

/// A single entry in a tree payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry<'a> {
    /// POSIX mode bits as recorded in the tree.
    pub mode: u32,
    /// Entry name (a single path component; not always UTF-8).
    pub name: &'a BStr,
    pub oid: ObjectId,
}

impl TreeEntry<'_> {
    pub fn is_dir(&self) -> bool {
        self.mode & 0o170000 == MODE_DIR
    }

    pub fn is_symlink(&self) -> bool {
        self.mode & 0o170000 == MODE_SYMLINK
    }
}

/// Iterator over the entries of a raw tree payload.
pub struct TreeIter<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> TreeIter<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { payload, pos: 0 }
    }

    fn parse_next(&mut self) -> Result<TreeEntry<'a>, ObjectError> {
        let start = self.pos;

        let space = self.payload[start..]
            .find_byte(b' ')
            .ok_or_else(|| ObjectError::InvalidTreeEntry {
                offset: start,
                reason: "missing space after mode".into(),
            })?
            + start;
        let mode =
            parse_octal(&self.payload[start..space]).ok_or_else(|| ObjectError::InvalidTreeEntry {
                offset: start,
                reason: "invalid octal mode".into(),
            })?;

        let name_start = space + 1;
        let nul = self.payload[name_start..]
            .find_byte(0)
            .ok_or_else(|| ObjectError::InvalidTreeEntry {
                offset: name_start,
                reason: "missing NUL after name".into(),
            })?
            + name_start;
        let name = self.payload[name_start..nul].as_bstr();

        let oid_start = nul + 1;
        if oid_start + 20 > self.payload.len() {
            return Err(ObjectError::InvalidTreeEntry {
                offset: oid_start,
                reason: "truncated object id".into(),
            });
        }
        let oid = ObjectId::from_bytes(&self.payload[oid_start..oid_start + 20])
            .expect("slice is exactly 20 bytes");

        self.pos = oid_start + 20;
        Ok(TreeEntry { mode, name, oid })
    }
}

impl<'a> Iterator for TreeIter<'a> {
    type Item = Result<TreeEntry<'a>, ObjectError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.payload.len() {
            return None;
        }
        match self.parse_next() {
            Ok(entry) => Some(Ok(entry)),
            Err(e) => {
                // Stop iterating after the first malformed entry.
                self.pos = self.payload.len();
                Some(Err(e))
            }
        }
    }
}

/// Parse an octal ASCII string to u32.
fn parse_octal(s: &[u8]) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut val: u32 = 0;
    for &b in s {
        if !(b'0'..=b'7').contains(&b) {
            return None;
        }
        val = val.checked_mul(8)?.checked_add(u32::from(b - b'0'))?;
    }
    Some(val)
}

/// Builds a canonical tree payload from unordered entries.
///
/// Used by the local snapshot to synthesise the tree id of a directory it
/// has walked, so that it can be compared against ids from the remote.
#[derive(Default)]
pub struct TreeBuilder {
    entries: Vec<(u32, BString, ObjectId)>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mode: u32, name: impl Into<BString>, oid: ObjectId) {
        self.entries.push((mode, name.into(), oid));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sort the entries and serialise the payload.
    pub fn into_payload(mut self) -> Vec<u8> {
        self.entries.sort_by(|a, b| {
            base_name_compare(
                a.1.as_ref(),
                a.0 & 0o170000 == MODE_DIR,
                b.1.as_ref(),
                b.0 & 0o170000 == MODE_DIR,
            )
        });

        let mut payload = Vec::new();
        for (mode, name, oid) in &self.entries {
            payload.extend_from_slice(format!("{:o} ", mode).as_bytes());
            payload.extend_from_slice(name);
            payload.push(0);
            payload.extend_from_slice(oid.as_bytes());
        }
        payload
    }
}

/// Git's tree entry name comparison: after the common prefix, directory
/// names get an implicit trailing `/`. "foo" (dir) sorts after "foo.c"
/// but before "foo0".
fn base_name_compare(name1: &[u8], is_dir1: bool, name2: &[u8], is_dir2: bool) -> Ordering {
    let min_len = name1.len().min(name2.len());
    let cmp = name1[..min_len].cmp(&name2[..min_len]);
    if cmp != Ordering::Equal {
        return cmp;
    }
    let c1 = if name1.len() > min_len {
        name1[min_len]
    } else if is_dir1 {
        b'/'
    } else {
        0
    };
    let c2 = if name2.len() > min_len {
        name2[min_len]
    } else if is_dir2 {
        b'/'
    } else {
        0
    };
    c1.cmp(&c2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u8) -> ObjectId {
        ObjectId::from([n; 20])
    }

    fn raw_entry(mode: &str, name: &str, id: ObjectId) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(mode.as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(name.as_bytes());
        buf.push(0);
        buf.extend_from_slice(id.as_bytes());
        buf
    }

    #[test]
    fn iterate_two_entries() {
        let mut payload = raw_entry("100644", "README", oid(1));
        payload.extend_from_slice(&raw_entry("40000", "src", oid(2)));

        let entries: Vec<_> = TreeIter::new(&payload)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].mode, 0o100644);
        assert_eq!(entries[0].name.as_bytes(), b"README");
        assert_eq!(entries[0].oid, oid(1));
        assert!(!entries[0].is_dir());
        assert!(entries[1].is_dir());
    }

    #[test]
    fn symlink_mode_detected() {
        let payload = raw_entry("120000", "link", oid(3));
        let entry = TreeIter::new(&payload).next().unwrap().unwrap();
        assert!(entry.is_symlink());
        assert!(!entry.is_dir());
    }

    #[test]
    fn truncated_oid_rejected() {
        let mut payload = raw_entry("100644", "file", oid(1));
        payload.truncate(payload.len() - 5);
        let err = TreeIter::new(&payload).next().unwrap().unwrap_err();
        assert!(matches!(err, ObjectError::InvalidTreeEntry { .. }));
    }

    #[test]
    fn bad_mode_rejected() {
        let payload = raw_entry("10z644", "file", oid(1));
        let err = TreeIter::new(&payload).next().unwrap().unwrap_err();
        assert!(matches!(err, ObjectError::InvalidTreeEntry { .. }));
    }

    #[test]
    fn empty_payload_yields_nothing() {
        assert!(TreeIter::new(&[]).next().is_none());
    }

    #[test]
    fn builder_roundtrips_through_iter() {
        let mut builder = TreeBuilder::new();
        builder.push(MODE_DIR, "src", oid(2));
        builder.push(MODE_FILE, "README", oid(1));
        let payload = builder.into_payload();

        let entries: Vec<_> = TreeIter::new(&payload)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries.len(), 2);
        // "README" < "src" under the canonical sort.
        assert_eq!(entries[0].name.as_bytes(), b"README");
        assert_eq!(entries[1].name.as_bytes(), b"src");
    }

    #[test]
    fn directories_sort_with_trailing_slash() {
        // "foo" as a directory compares as "foo/", which sorts after "foo.c".
        let mut builder = TreeBuilder::new();
        builder.push(MODE_DIR, "foo", oid(1));
        builder.push(MODE_FILE, "foo.c", oid(2));
        let payload = builder.into_payload();

        let entries: Vec<_> = TreeIter::new(&payload)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(entries[0].name.as_bytes(), b"foo.c");
        assert_eq!(entries[1].name.as_bytes(), b"foo");
    }
}
