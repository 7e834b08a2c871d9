//! Pack-stream decoding: header, record iteration, inflation, trailer.

use std::io::Read;

use flate2::bufread::ZlibDecoder;
use gitup_hash::{Hasher, ObjectId};
use gitup_object::ObjectKind;

use crate::record::{parse_ofs_offset, parse_record_header};
use crate::store::ObjectStore;
use crate::{
    PackError, RecordKind, PACK_HEADER_SIZE, PACK_SIGNATURE, PACK_TRAILER_SIZE, PACK_VERSION,
};

/// Decode a complete pack into `store`.
///
/// The buffer must hold the entire stream: `PACK` magic, version, object
/// count, the records, and the trailing 20-byte checksum over everything
/// before it. Terminal records are hashed and identity-indexed as they are
/// decoded; delta records join the sequence unresolved and are dealt with by
/// [`delta::apply::apply_deltas`](crate::delta::apply::apply_deltas).
pub fn unpack(data: &[u8], store: &mut ObjectStore) -> Result<(), PackError> {
    if data.len() < PACK_HEADER_SIZE + PACK_TRAILER_SIZE {
        return Err(PackError::InvalidHeader(format!(
            "stream too short: {} bytes",
            data.len()
        )));
    }
    if &data[0..4] != PACK_SIGNATURE {
        return Err(PackError::InvalidHeader("bad PACK signature".into()));
    }

    verify_checksum(data)?;

    let version = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if version != PACK_VERSION {
        return Err(PackError::UnsupportedVersion(version));
    }
    let count = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

    let body_end = data.len() - PACK_TRAILER_SIZE;
    let mut pos = PACK_HEADER_SIZE;

    for _ in 0..count {
        if pos >= body_end {
            return Err(PackError::CorruptRecord(pos as u64));
        }
        pos = decode_record(data, pos, body_end, store)?;
    }

    Ok(())
}

/// Decode one record starting at `pos`; returns the position of the next.
fn decode_record(
    data: &[u8],
    pos: usize,
    body_end: usize,
    store: &mut ObjectStore,
) -> Result<usize, PackError> {
    let pack_offset = pos as u64;
    let header = parse_record_header(&data[pos..body_end], pack_offset)?;
    let mut pos = pos + header.consumed;

    let kind = match header.type_num {
        1..=4 => {
            let kind = ObjectKind::from_type_number(header.type_num)
                .expect("type numbers 1..4 are terminal");
            RecordKind::from_object_kind(kind)
        }
        6 => {
            let (distance, consumed) = parse_ofs_offset(&data[pos..body_end], pack_offset)?;
            pos += consumed;
            if distance > pack_offset {
                return Err(PackError::CorruptRecord(pack_offset));
            }
            let base_index = store
                .find_offset(pack_offset - distance)
                .ok_or(PackError::UnresolvedOfsDelta {
                    offset: pack_offset,
                })?;
            RecordKind::OfsDelta { base_index }
        }
        7 => {
            if pos + 20 > body_end {
                return Err(PackError::CorruptRecord(pack_offset));
            }
            let base_oid = ObjectId::from_bytes(&data[pos..pos + 20])
                .expect("slice is exactly 20 bytes");
            pos += 20;
            RecordKind::RefDelta { base_oid }
        }
        _ => return Err(PackError::CorruptRecord(pack_offset)),
    };

    let (payload, consumed) = inflate(&data[pos..body_end], header.size, pack_offset)?;
    pos += consumed;

    if payload.len() != header.size {
        return Err(PackError::InflatedSizeMismatch {
            offset: pack_offset,
            expected: header.size,
            actual: payload.len(),
        });
    }

    match kind {
        RecordKind::OfsDelta { .. } | RecordKind::RefDelta { .. } => {
            store.push_delta(kind, pack_offset, payload);
        }
        terminal => {
            let object_kind = terminal.to_object_kind().expect("kind is terminal");
            store.insert_terminal(object_kind, pack_offset, payload);
        }
    }

    Ok(pos)
}

/// Inflate one zlib stream, reporting how many compressed bytes it consumed.
fn inflate(data: &[u8], size_hint: usize, offset: u64) -> Result<(Vec<u8>, usize), PackError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut payload = Vec::with_capacity(size_hint);
    decoder
        .read_to_end(&mut payload)
        .map_err(|source| PackError::Inflate { offset, source })?;
    Ok((payload, decoder.total_in() as usize))
}

/// Verify the trailing SHA-1 over everything before it.
fn verify_checksum(data: &[u8]) -> Result<(), PackError> {
    let body_end = data.len() - PACK_TRAILER_SIZE;
    let expected = ObjectId::from_bytes(&data[body_end..]).expect("trailer is 20 bytes");
    let actual = Hasher::digest(&data[..body_end]);
    if expected != actual {
        return Err(PackError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_short_stream() {
        let err = unpack(b"PACK", &mut ObjectStore::new()).unwrap_err();
        assert!(matches!(err, PackError::InvalidHeader(_)));
    }

    #[test]
    fn rejects_bad_signature() {
        let data = [0u8; 40];
        let err = unpack(&data, &mut ObjectStore::new()).unwrap_err();
        assert!(matches!(err, PackError::InvalidHeader(_)));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut data = Vec::new();
        data.extend_from_slice(PACK_SIGNATURE);
        data.extend_from_slice(&3u32.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        let trailer = Hasher::digest(&data);
        data.extend_from_slice(trailer.as_bytes());

        let err = unpack(&data, &mut ObjectStore::new()).unwrap_err();
        assert!(matches!(err, PackError::UnsupportedVersion(3)));
    }

    #[test]
    fn empty_pack_yields_empty_store() {
        let mut data = Vec::new();
        data.extend_from_slice(PACK_SIGNATURE);
        data.extend_from_slice(&PACK_VERSION.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        let trailer = Hasher::digest(&data);
        data.extend_from_slice(trailer.as_bytes());

        let mut store = ObjectStore::new();
        unpack(&data, &mut store).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn checksum_flip_detected() {
        let mut data = Vec::new();
        data.extend_from_slice(PACK_SIGNATURE);
        data.extend_from_slice(&PACK_VERSION.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        let trailer = Hasher::digest(&data);
        data.extend_from_slice(trailer.as_bytes());
        let last = data.len() - 1;
        data[last] ^= 0x01;

        let mut store = ObjectStore::new();
        let err = unpack(&data, &mut store).unwrap_err();
        assert!(matches!(err, PackError::ChecksumMismatch { .. }));
        assert!(store.is_empty());
    }
}
