//! Wire framing for the two streaming flavors
//!
//! Chunked-HTTP frames: `<hex length>\r\n<payload>\r\n`.
//! Event-stream frames: `data: <json>\n\n` (payload is single-line JSON).

use bytes::Bytes;

pub fn chunk_frame(payload: &[u8]) -> Bytes {
    let mut frame = Vec::with_capacity(payload.len() + 16);
    frame.extend_from_slice(format!("{:x}\r\n", payload.len()).as_bytes());
    frame.extend_from_slice(payload);
    frame.extend_from_slice(b"\r\n");
    Bytes::from(frame)
}

pub fn sse_frame(payload: &str) -> Bytes {
    Bytes::from(format!("data: {payload}\n\n"))
}

/// Decode one chunked frame, returning the payload and any trailing bytes.
/// Returns `None` if the input is not a complete, well-formed frame.
pub fn decode_chunk_frame(frame: &[u8]) -> Option<(Vec<u8>, &[u8])> {
    let head_end = frame.windows(2).position(|window| window == b"\r\n")?;
    let length = usize::from_str_radix(std::str::from_utf8(&frame[..head_end]).ok()?, 16).ok()?;

    let payload_start = head_end + 2;
    let payload_end = payload_start.checked_add(length)?;
    if frame.len() < payload_end + 2 || &frame[payload_end..payload_end + 2] != b"\r\n" {
        return None;
    }

    Some((frame[payload_start..payload_end].to_vec(), &frame[payload_end + 2..]))
}
