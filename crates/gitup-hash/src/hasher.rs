use sha1::{Digest, Sha1};

use crate::ObjectId;

/// Streaming SHA-1 computation.
///
/// Data can be fed incrementally with [`update`](Hasher::update) or through
/// the [`std::io::Write`] implementation, then finalised into an
/// [`ObjectId`].
pub struct Hasher {
    inner: Sha1,
}

impl Hasher {
    pub fn new() -> Self {
        Self { inner: Sha1::new() }
    }

    /// Feed data into the hasher.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the ObjectId.
    pub fn finalize(self) -> ObjectId {
        let digest = self.inner.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        ObjectId::from(bytes)
    }

    /// Convenience: hash data in one call.
    pub fn digest(data: &[u8]) -> ObjectId {
        let mut h = Self::new();
        h.update(data);
        h.finalize()
    }

    /// Hash an object: `SHA1("{kind} {len}\0{payload}")`.
    ///
    /// `kind` must be a terminal type name (`commit`, `tree`, `blob`, `tag`);
    /// delta payloads are never hashed directly.
    pub fn hash_object(kind: &str, payload: &[u8]) -> ObjectId {
        let header = format!("{} {}\0", kind, payload.len());
        let mut h = Self::new();
        h.update(header.as_bytes());
        h.update(payload);
        h.finalize()
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::io::Write for Hasher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_digest() {
        // SHA1 of the empty string.
        assert_eq!(
            Hasher::digest(b"").to_hex(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn blob_identity_matches_git() {
        // `echo hello | git hash-object --stdin`
        assert_eq!(
            Hasher::hash_object("blob", b"hello\n").to_hex(),
            "ce013625030ba8dba906f756967f9e9ca394464a"
        );
    }

    #[test]
    fn incremental_equals_oneshot() {
        let mut h = Hasher::new();
        h.update(b"hello ");
        h.update(b"world");
        assert_eq!(h.finalize(), Hasher::digest(b"hello world"));
    }

    #[test]
    fn write_impl_feeds_hasher() {
        use std::io::Write;
        let mut h = Hasher::new();
        h.write_all(b"hello world").unwrap();
        assert_eq!(h.finalize(), Hasher::digest(b"hello world"));
    }

    #[test]
    fn empty_blob_identity() {
        assert_eq!(
            Hasher::hash_object("blob", b"").to_hex(),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }
}
