//! Extraction of the pack stream from a v2 fetch response.
//!
//! The response is a pkt-line stream of named sections. `shallow-info` and
//! `acknowledgments` are skipped; inside `packfile` every data line carries
//! a one-byte sideband marker: band 1 is pack data, band 2 progress chatter,
//! band 3 a fatal server message.

use std::io::Cursor;

use crate::pktline::{PktLine, PktLineReader};
use crate::ProtocolError;

const BAND_DATA: u8 = 1;
const BAND_PROGRESS: u8 = 2;
const BAND_ERROR: u8 = 3;

/// Concatenate the band-1 payloads of the `packfile` section.
///
/// `progress` receives band-2 messages as they arrive. Returns the raw pack
/// bytes; an empty result means the server had nothing to send (the empty
/// pack a `have == want` pull produces still decodes as a pack).
pub fn extract_pack(
    body: &[u8],
    mut progress: impl FnMut(&[u8]),
) -> Result<Vec<u8>, ProtocolError> {
    let mut reader = PktLineReader::new(Cursor::new(body));
    let mut pack = Vec::new();
    let mut in_packfile = false;

    while let Some(pkt) = reader.read_pkt()? {
        let data = match pkt {
            PktLine::Data(data) => data,
            PktLine::Flush | PktLine::ResponseEnd => break,
            // Section separator: the next data line names the new section.
            PktLine::Delimiter => {
                in_packfile = false;
                continue;
            }
        };
        if data.is_empty() {
            continue;
        }

        if in_packfile {
            let (band, payload) = (data[0], &data[1..]);
            match band {
                BAND_DATA => pack.extend_from_slice(payload),
                BAND_PROGRESS => progress(payload),
                BAND_ERROR => {
                    return Err(ProtocolError::ServerError(
                        String::from_utf8_lossy(payload).trim_end().to_string(),
                    ))
                }
                other => {
                    return Err(ProtocolError::Protocol(format!(
                        "unknown sideband channel: {other}"
                    )))
                }
            }
            continue;
        }

        match strip_newline(&data) {
            b"packfile" => in_packfile = true,
            // Acknowledgment and shallow bookkeeping is not consulted: the
            // request always ends with `done`, so the pack follows
            // unconditionally.
            b"acknowledgments" | b"shallow-info" => {}
            _ => {}
        }
    }

    Ok(pack)
}

fn strip_newline(data: &[u8]) -> &[u8] {
    match data.last() {
        Some(b'\n') => &data[..data.len() - 1],
        _ => data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pktline::PktLineWriter;

    fn band_line(band: u8, payload: &[u8]) -> Vec<u8> {
        let mut line = vec![band];
        line.extend_from_slice(payload);
        line
    }

    #[test]
    fn concatenates_band_one() {
        let mut buf = Vec::new();
        let mut writer = PktLineWriter::new(&mut buf);
        writer.write_text("packfile").unwrap();
        writer.write_line(&band_line(1, b"PACK....")).unwrap();
        writer.write_line(&band_line(1, b"more")).unwrap();
        writer.write_flush().unwrap();

        let pack = extract_pack(&buf, |_| {}).unwrap();
        assert_eq!(pack, b"PACK....more");
    }

    #[test]
    fn skips_shallow_info_section() {
        let mut buf = Vec::new();
        let mut writer = PktLineWriter::new(&mut buf);
        writer.write_text("shallow-info").unwrap();
        writer
            .write_text("shallow 95d09f2b10159347eece71399a7e2e907ea3df4f")
            .unwrap();
        writer.write_delimiter().unwrap();
        writer.write_text("packfile").unwrap();
        writer.write_line(&band_line(1, b"PACKdata")).unwrap();
        writer.write_flush().unwrap();

        let pack = extract_pack(&buf, |_| {}).unwrap();
        assert_eq!(pack, b"PACKdata");
    }

    #[test]
    fn forwards_progress_messages() {
        let mut buf = Vec::new();
        let mut writer = PktLineWriter::new(&mut buf);
        writer.write_text("packfile").unwrap();
        writer
            .write_line(&band_line(2, b"Counting objects: 3\n"))
            .unwrap();
        writer.write_line(&band_line(1, b"data")).unwrap();
        writer.write_flush().unwrap();

        let mut messages = Vec::new();
        let pack = extract_pack(&buf, |msg| messages.push(msg.to_vec())).unwrap();
        assert_eq!(pack, b"data");
        assert_eq!(messages, vec![b"Counting objects: 3\n".to_vec()]);
    }

    #[test]
    fn band_three_is_fatal() {
        let mut buf = Vec::new();
        let mut writer = PktLineWriter::new(&mut buf);
        writer.write_text("packfile").unwrap();
        writer
            .write_line(&band_line(3, b"repository not found\n"))
            .unwrap();
        writer.write_flush().unwrap();

        let err = extract_pack(&buf, |_| {}).unwrap_err();
        assert!(matches!(err, ProtocolError::ServerError(msg) if msg == "repository not found"));
    }

    #[test]
    fn empty_packfile_section_is_legal() {
        let mut buf = Vec::new();
        let mut writer = PktLineWriter::new(&mut buf);
        writer.write_text("acknowledgments").unwrap();
        writer.write_text("NAK").unwrap();
        writer.write_delimiter().unwrap();
        writer.write_text("packfile").unwrap();
        writer.write_flush().unwrap();

        let pack = extract_pack(&buf, |_| {}).unwrap();
        assert!(pack.is_empty());
    }
}
