//! Parsing of the `info/refs` discovery response.
//!
//! The advertisement lists one ref per pkt-line as `<40-hex> <refname>`,
//! with the server's capabilities appended to the first ref line after a
//! NUL. The driver needs two things out of it: the id of the requested
//! branch head (the `want`) and the server's `agent=…` token, which is
//! echoed back in the fetch request.

use std::io::Cursor;

use bstr::ByteSlice;
use gitup_hash::ObjectId;

use crate::pktline::{PktLine, PktLineReader};
use crate::ProtocolError;

/// What discovery learned about the remote.
#[derive(Debug)]
pub struct Advertisement {
    /// Head of the requested branch.
    pub want: ObjectId,
    /// The server's `agent=…` capability token, verbatim.
    pub agent: String,
}

/// Scan the advertisement body for `refs/heads/<branch>` and the agent token.
pub fn parse(body: &[u8], branch: &str) -> Result<Advertisement, ProtocolError> {
    let mut reader = PktLineReader::new(Cursor::new(body));
    let full_ref = format!("refs/heads/{branch}");

    let mut want = None;
    let mut agent = None;

    while let Some(pkt) = reader.read_pkt()? {
        let data = match pkt {
            PktLine::Data(data) => data,
            _ => continue,
        };
        // Service announcement lines ("# service=git-upload-pack") carry no refs.
        if data.starts_with(b"# ") {
            continue;
        }

        // Capabilities follow the first NUL on the ref line.
        let (ref_part, caps) = match data.find_byte(0) {
            Some(nul) => (&data[..nul], Some(&data[nul + 1..])),
            None => (&data[..], None),
        };

        if let Some(caps) = caps {
            if agent.is_none() {
                agent = caps
                    .fields()
                    .find(|token| token.starts_with(b"agent="))
                    .and_then(|token| std::str::from_utf8(token).ok())
                    .map(str::to_owned);
            }
        }

        let line = ref_part.trim_end_with(|c| c == '\n');
        if line.len() < 41 || line[40] != b' ' {
            continue;
        }
        let name = &line[41..];
        if name == full_ref.as_bytes() {
            let hex = std::str::from_utf8(&line[..40])
                .map_err(|_| ProtocolError::Protocol("ref line id is not ASCII".into()))?;
            want = Some(ObjectId::from_hex(hex)?);
        }
    }

    let want = want.ok_or_else(|| ProtocolError::BranchNotFound(branch.to_owned()))?;
    let agent = agent.ok_or(ProtocolError::MissingAgent)?;

    Ok(Advertisement { want, agent })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pktline::PktLineWriter;

    fn sample_advertisement() -> Vec<u8> {
        let mut buf = Vec::new();
        let mut writer = PktLineWriter::new(&mut buf);
        writer.write_text("# service=git-upload-pack").unwrap();
        writer.write_flush().unwrap();
        writer
            .write_line(
                b"95d09f2b10159347eece71399a7e2e907ea3df4f HEAD\0multi_ack ofs-delta \
                  shallow side-band-64k agent=git/2.28.0\n",
            )
            .unwrap();
        writer
            .write_text("95d09f2b10159347eece71399a7e2e907ea3df4f refs/heads/main")
            .unwrap();
        writer
            .write_text("0a3f2c1d10159347eece71399a7e2e907ea3df4f refs/heads/dev")
            .unwrap();
        writer.write_flush().unwrap();
        buf
    }

    #[test]
    fn finds_branch_and_agent() {
        let ad = parse(&sample_advertisement(), "main").unwrap();
        assert_eq!(
            ad.want.to_hex(),
            "95d09f2b10159347eece71399a7e2e907ea3df4f"
        );
        assert_eq!(ad.agent, "agent=git/2.28.0");
    }

    #[test]
    fn finds_secondary_branch() {
        let ad = parse(&sample_advertisement(), "dev").unwrap();
        assert_eq!(
            ad.want.to_hex(),
            "0a3f2c1d10159347eece71399a7e2e907ea3df4f"
        );
    }

    #[test]
    fn unknown_branch_fails() {
        let err = parse(&sample_advertisement(), "release").unwrap_err();
        assert!(matches!(err, ProtocolError::BranchNotFound(b) if b == "release"));
    }

    #[test]
    fn branch_name_must_match_exactly() {
        // "mai" is a prefix of "main" but not an advertised ref.
        let err = parse(&sample_advertisement(), "mai").unwrap_err();
        assert!(matches!(err, ProtocolError::BranchNotFound(_)));
    }

    #[test]
    fn missing_agent_fails() {
        let mut buf = Vec::new();
        let mut writer = PktLineWriter::new(&mut buf);
        writer
            .write_line(b"95d09f2b10159347eece71399a7e2e907ea3df4f HEAD\0multi_ack\n")
            .unwrap();
        writer
            .write_text("95d09f2b10159347eece71399a7e2e907ea3df4f refs/heads/main")
            .unwrap();
        writer.write_flush().unwrap();

        let err = parse(&buf, "main").unwrap_err();
        assert!(matches!(err, ProtocolError::MissingAgent));
    }
}
