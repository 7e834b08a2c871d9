//! Construction of the v2 `fetch` command body.
//!
//! The body is a pkt-line stream: the command, the agent echoed from the
//! advertisement, a delimiter, the argument lines, and a flush. A first-time
//! clone asks for the branch head alone; an incremental pull additionally
//! declares the previous head as a `have` and deepens by one so the server
//! answers with a thin delta pack.

use std::fmt::Write as _;

use gitup_hash::ObjectId;

use crate::pktline::PktLineWriter;
use crate::ProtocolError;

/// Parameters of one fetch.
#[derive(Debug)]
pub struct FetchRequest<'a> {
    /// The server's `agent=…` token from discovery.
    pub agent: &'a str,
    pub want: ObjectId,
    /// Previous branch head; `None` means a full clone.
    pub have: Option<ObjectId>,
}

impl FetchRequest<'_> {
    /// Render the pkt-line request body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut body = Vec::new();
        let mut writer = PktLineWriter::new(&mut body);

        writer.write_line(b"command=fetch")?;
        writer.write_line(self.agent.as_bytes())?;
        writer.write_delimiter()?;

        if self.have.is_some() {
            writer.write_line(b"thin-pack")?;
        }
        writer.write_line(b"no-progress")?;
        writer.write_line(b"ofs-delta")?;

        let mut line = String::new();
        write!(line, "shallow {}", self.want).unwrap();
        writer.write_line(line.as_bytes())?;

        match self.have {
            None => {
                // A clone repeats the want; the second line keeps the server
                // from pruning the shallow boundary object itself.
                let want_line = format!("want {}\n", self.want);
                writer.write_line(want_line.as_bytes())?;
                writer.write_line(want_line.as_bytes())?;
            }
            Some(have) => {
                let shallow_line = format!("shallow {}", have);
                writer.write_line(shallow_line.as_bytes())?;
                writer.write_line(b"deepen 1")?;
                writer.write_line(format!("want {}\n", self.want).as_bytes())?;
                writer.write_line(format!("have {}\n", have).as_bytes())?;
            }
        }

        writer.write_line(b"done\n")?;
        writer.write_flush()?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WANT: &str = "95d09f2b10159347eece71399a7e2e907ea3df4f";
    const HAVE: &str = "0a3f2c1d10159347eece71399a7e2e907ea3df4f";

    #[test]
    fn clone_body_is_byte_exact() {
        let request = FetchRequest {
            agent: "agent=git/2.28.0",
            want: ObjectId::from_hex(WANT).unwrap(),
            have: None,
        };
        let body = request.to_bytes().unwrap();

        let expected = format!(
            "0011command=fetch\
             0014agent=git/2.28.0\
             0001\
             000fno-progress\
             000dofs-delta\
             0034shallow {WANT}\
             0032want {WANT}\n\
             0032want {WANT}\n\
             0009done\n\
             0000"
        );
        assert_eq!(body, expected.as_bytes());
    }

    #[test]
    fn pull_body_is_byte_exact() {
        let request = FetchRequest {
            agent: "agent=git/2.28.0",
            want: ObjectId::from_hex(WANT).unwrap(),
            have: Some(ObjectId::from_hex(HAVE).unwrap()),
        };
        let body = request.to_bytes().unwrap();

        let expected = format!(
            "0011command=fetch\
             0014agent=git/2.28.0\
             0001\
             000dthin-pack\
             000fno-progress\
             000dofs-delta\
             0034shallow {WANT}\
             0034shallow {HAVE}\
             000cdeepen 1\
             0032want {WANT}\n\
             0032have {HAVE}\n\
             0009done\n\
             0000"
        );
        assert_eq!(body, expected.as_bytes());
    }
}
