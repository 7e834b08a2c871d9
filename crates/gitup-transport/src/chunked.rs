//! Chunked-transfer reassembly.
//!
//! Takes a raw HTTP/1.1 response (status line, headers, body) and returns
//! just the body bytes. A chunked body is stitched back together from its
//! hex-length frames; anything else is returned verbatim.

use crate::TransportError;

/// Decode a raw HTTP response into its body.
///
/// Fails on any status other than 200.
pub fn decode(raw: &[u8]) -> Result<Vec<u8>, TransportError> {
    let header_end = find_subslice(raw, b"\r\n\r\n").ok_or_else(|| {
        TransportError::MalformedResponse("no end of headers in response".into())
    })?;
    let header = String::from_utf8_lossy(&raw[..header_end]);
    let body = &raw[header_end + 4..];

    let status = parse_status(&header)?;
    if status != 200 {
        return Err(TransportError::UpstreamStatus { status });
    }

    if !is_chunked(&header) {
        return Ok(body.to_vec());
    }
    decode_chunks(body)
}

/// Stitch the chunk frames of `body` into one buffer.
fn decode_chunks(body: &[u8]) -> Result<Vec<u8>, TransportError> {
    let mut out = Vec::with_capacity(body.len());
    let mut pos = 0;

    loop {
        let line_end = find_subslice(&body[pos..], b"\r\n").ok_or(
            TransportError::TruncatedChunk {
                expected: 2,
                available: body.len() - pos,
            },
        )? + pos;

        let size = parse_chunk_size(&body[pos..line_end])?;
        pos = line_end + 2;

        if size == 0 {
            // Terminal chunk; trailers, if any, are ignored.
            return Ok(out);
        }

        if pos + size + 2 > body.len() {
            return Err(TransportError::TruncatedChunk {
                expected: size + 2,
                available: body.len() - pos,
            });
        }
        out.extend_from_slice(&body[pos..pos + size]);
        pos += size;

        if &body[pos..pos + 2] != b"\r\n" {
            return Err(TransportError::BadChunkHeader(
                "chunk data not terminated by CRLF".into(),
            ));
        }
        pos += 2;
    }
}

/// Parse the hex chunk-size line, tolerating chunk extensions after `;`.
fn parse_chunk_size(line: &[u8]) -> Result<usize, TransportError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| TransportError::BadChunkHeader("chunk size is not ASCII".into()))?;
    let digits = text.split(';').next().unwrap_or("").trim();
    usize::from_str_radix(digits, 16)
        .map_err(|_| TransportError::BadChunkHeader(format!("not a hex length: {digits:?}")))
}

/// Extract the numeric status from the status line.
fn parse_status(header: &str) -> Result<u16, TransportError> {
    let status_line = header.lines().next().unwrap_or("");
    status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            TransportError::MalformedResponse(format!("bad status line: {status_line:?}"))
        })
}

fn is_chunked(header: &str) -> bool {
    header.lines().any(|line| {
        let Some((name, value)) = line.split_once(':') else {
            return false;
        };
        name.eq_ignore_ascii_case("transfer-encoding")
            && value.to_ascii_lowercase().contains("chunked")
    })
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
