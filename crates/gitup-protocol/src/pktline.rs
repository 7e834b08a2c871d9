//! Pkt-line protocol framing.
//!
//! Each packet is prefixed with a 4-hex-digit length that includes the 4
//! bytes of the length field itself. Special packets:
//! - `0000`: flush packet (end of section)
//! - `0001`: delimiter packet (v2 section separator)
//! - `0002`: response-end packet (v2 response terminator)

use std::io::{Read, Write};

use crate::ProtocolError;

/// Maximum data per packet (65520 - 4 = 65516).
pub const MAX_PKT_DATA_LEN: usize = 65516;

/// One packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    /// Normal data line.
    Data(Vec<u8>),
    /// Flush packet (0000).
    Flush,
    /// Delimiter packet (0001).
    Delimiter,
    /// Response-end packet (0002).
    ResponseEnd,
}

/// Pkt-line reader.
pub struct PktLineReader<R> {
    reader: R,
}

impl<R: Read> PktLineReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read one pkt-line. Returns `None` at a clean end of stream.
    pub fn read_pkt(&mut self) -> Result<Option<PktLine>, ProtocolError> {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(ProtocolError::Io(e)),
        }

        let len_str = std::str::from_utf8(&len_buf).map_err(|_| {
            ProtocolError::InvalidPktLine(format!("invalid pkt-line length bytes: {:?}", len_buf))
        })?;
        let len = u16::from_str_radix(len_str, 16).map_err(|_| {
            ProtocolError::InvalidPktLine(format!("invalid pkt-line length: {:?}", len_str))
        })?;

        match len {
            0 => Ok(Some(PktLine::Flush)),
            1 => Ok(Some(PktLine::Delimiter)),
            2 => Ok(Some(PktLine::ResponseEnd)),
            3 => Err(ProtocolError::InvalidPktLine(
                "pkt-line length 3 is invalid (minimum data packet is 4)".into(),
            )),
            _ => {
                let data_len = (len as usize) - 4;
                if data_len > MAX_PKT_DATA_LEN {
                    return Err(ProtocolError::InvalidPktLine(format!(
                        "pkt-line too long: {} bytes",
                        data_len
                    )));
                }
                let mut data = vec![0u8; data_len];
                self.reader.read_exact(&mut data).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        ProtocolError::InvalidPktLine("truncated pkt-line data".into())
                    } else {
                        ProtocolError::Io(e)
                    }
                })?;
                Ok(Some(PktLine::Data(data)))
            }
        }
    }
}

/// Pkt-line writer.
pub struct PktLineWriter<W> {
    writer: W,
}

impl<W: Write> PktLineWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write a data packet.
    pub fn write_line(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.write_frame(data, false)
    }

    /// Write a text line, appending `\n` if not present.
    pub fn write_text(&mut self, text: &str) -> Result<(), ProtocolError> {
        self.write_frame(text.as_bytes(), !text.ends_with('\n'))
    }

    /// Assemble one packet (length prefix, data, optional trailing newline)
    /// and write it in a single call.
    fn write_frame(&mut self, data: &[u8], add_newline: bool) -> Result<(), ProtocolError> {
        let payload_len = data.len() + usize::from(add_newline);
        if payload_len > MAX_PKT_DATA_LEN {
            return Err(ProtocolError::InvalidPktLine(format!(
                "data too long for pkt-line: {payload_len} bytes (max {MAX_PKT_DATA_LEN})"
            )));
        }

        let mut frame = Vec::with_capacity(4 + payload_len);
        frame.extend_from_slice(&length_prefix(4 + payload_len));
        frame.extend_from_slice(data);
        if add_newline {
            frame.push(b'\n');
        }
        self.writer.write_all(&frame)?;
        Ok(())
    }

    /// Write a flush packet (0000).
    pub fn write_flush(&mut self) -> Result<(), ProtocolError> {
        self.writer.write_all(b"0000")?;
        Ok(())
    }

    /// Write a delimiter packet (0001).
    pub fn write_delimiter(&mut self) -> Result<(), ProtocolError> {
        self.writer.write_all(b"0001")?;
        Ok(())
    }
}

/// Render a packet length as its four hex digits.
///
/// The maximum packet length is 0xfff0, so four digits always suffice.
fn length_prefix(len: usize) -> [u8; 4] {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut prefix = [0u8; 4];
    for (index, slot) in prefix.iter_mut().enumerate() {
        *slot = DIGITS[(len >> (12 - 4 * index)) & 0xf];
    }
    prefix
}
