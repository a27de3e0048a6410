//! DAP transport layer: Content-Length based message framing.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::DapError;

const HEADER_SEPARATOR: &[u8] = b"\r\n\r\n";

/// Encode a JSON value into a framed DAP message.
pub fn encode_message(value: &serde_json::Value) -> Vec<u8> {
    let body = value.to_string();
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    let mut buf = Vec::with_capacity(header.len() + body.len());
    buf.extend_from_slice(header.as_bytes());
    buf.extend_from_slice(body.as_bytes());
    buf
}

/// Decode one framed message from the front of `data`.
///
/// Returns the parsed JSON value and the number of bytes consumed. An
/// incomplete frame is a `Transport` error.
pub fn decode_message(data: &[u8]) -> Result<(serde_json::Value, usize), DapError> {
    let sep_pos = data
        .windows(HEADER_SEPARATOR.len())
        .position(|w| w == HEADER_SEPARATOR)
        .ok_or_else(|| DapError::Transport("incomplete header: missing \\r\\n\\r\\n".into()))?;

    let header = std::str::from_utf8(&data[..sep_pos])
        .map_err(|e| DapError::Transport(format!("invalid UTF-8 in header: {e}")))?;
    let content_length = content_length_from_header(header)?;

    let body_start = sep_pos + HEADER_SEPARATOR.len();
    let total_consumed = body_start + content_length;
    if data.len() < total_consumed {
        return Err(DapError::Transport(format!(
            "incomplete body: expected {content_length} bytes, have {}",
            data.len() - body_start
        )));
    }

    let value = serde_json::from_slice(&data[body_start..total_consumed])
        .map_err(|e| DapError::InvalidResponse(format!("JSON parse error: {e}")))?;
    Ok((value, total_consumed))
}

/// Read one framed message from an async stream.
///
/// Returns `Ok(None)` on a clean end of stream before a header starts.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<serde_json::Value>, DapError>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            if saw_header {
                return Err(DapError::Transport("stream ended inside header".into()));
            }
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if saw_header {
                break;
            }
            continue;
        }
        saw_header = true;
        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(parse_length(value)?);
        }
    }

    let length =
        content_length.ok_or_else(|| DapError::Transport("missing Content-Length header".into()))?;
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| DapError::InvalidResponse(format!("JSON parse error: {e}")))
}

fn content_length_from_header(header: &str) -> Result<usize, DapError> {
    header
        .split("\r\n")
        .find_map(|line| line.trim().strip_prefix("Content-Length:"))
        .ok_or_else(|| DapError::Transport("missing Content-Length header".into()))
        .and_then(parse_length)
}

fn parse_length(value: &str) -> Result<usize, DapError> {
    let value = value.trim();
    value
        .parse::<usize>()
        .map_err(|e| DapError::Transport(format!("invalid Content-Length value '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[test]
    fn encode_then_decode_single_frame() {
        let req = json!({
            "seq": 1,
            "type": "request",
            "command": "initialize",
            "arguments": {"adapterID": "debugpy"}
        });
        let encoded = encode_message(&req);
        let text = String::from_utf8(encoded.clone()).unwrap();
        assert!(text.starts_with("Content-Length: "));

        let (decoded, consumed) = decode_message(&encoded).unwrap();
        assert_eq!(decoded, req);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn content_length_counts_bytes_not_chars() {
        let evt = json!({"seq": 1, "type": "event", "event": "output", "body": {"output": "héllo ✓"}});
        let encoded = encode_message(&evt);
        let (decoded, consumed) = decode_message(&encoded).unwrap();
        assert_eq!(decoded, evt);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn decode_malformed_header() {
        let err = decode_message(b"Bad-Header: 42\r\n\r\n{}").unwrap_err();
        assert!(err.to_string().contains("missing Content-Length"), "got: {err}");
    }

    #[test]
    fn decode_incomplete_body() {
        let err = decode_message(b"Content-Length: 100\r\n\r\n{\"short\":true}").unwrap_err();
        assert!(err.to_string().contains("incomplete body"), "got: {err}");
    }

    #[test]
    fn decode_missing_separator() {
        let err = decode_message(b"Content-Length: 2\r\n{}").unwrap_err();
        assert!(err.to_string().contains("incomplete header"), "got: {err}");
    }

    #[test]
    fn decode_back_to_back_frames() {
        let msg1 = json!({"seq": 1, "type": "response", "command": "threads"});
        let msg2 = json!({"seq": 2, "type": "event", "event": "stopped"});
        let mut buf = encode_message(&msg1);
        buf.extend_from_slice(&encode_message(&msg2));

        let (decoded1, consumed1) = decode_message(&buf).unwrap();
        assert_eq!(decoded1, msg1);
        let (decoded2, consumed2) = decode_message(&buf[consumed1..]).unwrap();
        assert_eq!(decoded2, msg2);
        assert_eq!(consumed1 + consumed2, buf.len());
    }

    #[tokio::test]
    async fn read_message_from_stream() {
        let msg1 = json!({"seq": 1, "type": "event", "event": "initialized"});
        let msg2 = json!({"seq": 2, "type": "event", "event": "terminated"});
        let mut bytes = encode_message(&msg1);
        bytes.extend_from_slice(b"Content-Type: application/json\r\n");
        bytes.extend_from_slice(&encode_message(&msg2));

        let mut reader = BufReader::new(bytes.as_slice());
        assert_eq!(read_message(&mut reader).await.unwrap(), Some(msg1));
        assert_eq!(read_message(&mut reader).await.unwrap(), Some(msg2));
        assert_eq!(read_message(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_message_truncated_body_is_error() {
        let bytes = b"Content-Length: 50\r\n\r\n{}".to_vec();
        let mut reader = BufReader::new(bytes.as_slice());
        assert!(read_message(&mut reader).await.is_err());
    }
}
