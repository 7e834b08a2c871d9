//! Commit payload parsing.
//!
//! The checkout path only needs one field from a commit: the root tree id on
//! the first header line.

use gitup_hash::ObjectId;

use crate::ObjectError;

/// Extract the root tree id from a commit payload.
///
/// The payload must begin with `tree <40-hex>\n`.
pub fn root_tree(payload: &[u8]) -> Result<ObjectId, ObjectError> {
    let rest = payload
        .strip_prefix(b"tree ")
        .ok_or_else(|| ObjectError::InvalidCommit("payload does not start with a tree header".into()))?;
    if rest.len() < 41 || rest[40] != b'\n' {
        return Err(ObjectError::InvalidCommit(
            "tree header is not followed by a 40-hex id and newline".into(),
        ));
    }
    let hex = std::str::from_utf8(&rest[..40])
        .map_err(|_| ObjectError::InvalidCommit("tree id is not ASCII hex".into()))?;
    ObjectId::from_hex(hex)
        .map_err(|e| ObjectError::InvalidCommit(format!("bad tree id: {e}")))
}
