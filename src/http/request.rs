//! Minimal HTTP/1.1 request reader
//!
//! Parses the request line, the three headers the server cares about
//! (`Content-Length`, `Accept`, `Content-Type`), and an explicit
//! Content-Length body decoded as UTF-8. No other transfer coding is honored
//! inbound. A malformed or empty request line yields `Ok(None)`: the caller
//! closes the connection without writing a response.

use std::io;

use percent_encoding::percent_decode_str;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

pub const MAX_BODY_BYTES: usize = 1024 * 1024;
const MAX_LINE_BYTES: usize = 8 * 1024;
const MAX_HEADER_LINES: usize = 64;

#[derive(Debug)]
pub struct HttpRequest {
    pub method: String,
    pub target: String,
    pub accept: Option<String>,
    pub content_type: Option<String>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(path, _)| path)
    }

    pub fn query_param(&self, name: &str) -> Option<String> {
        let (_, query) = self.target.split_once('?')?;
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            if key == name {
                return percent_decode_str(&value.replace('+', " "))
                    .decode_utf8()
                    .ok()
                    .map(|decoded| decoded.into_owned());
            }
        }
        None
    }

    pub fn accepts_event_stream(&self) -> bool {
        self.accept
            .as_deref()
            .is_some_and(|accept| accept.contains("text/event-stream"))
    }
}

pub async fn read_request<R>(reader: &mut R) -> io::Result<Option<HttpRequest>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 || line.len() > MAX_LINE_BYTES {
        return Ok(None);
    }

    let request_line = line.trim_end_matches(['\r', '\n']);
    let mut parts = request_line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next())
    else {
        return Ok(None);
    };
    if !version.starts_with("HTTP/") {
        return Ok(None);
    }
    let method = method.to_string();
    let target = target.to_string();

    let mut content_length: usize = 0;
    let mut accept = None;
    let mut content_type = None;
    let mut header_lines = 0;
    loop {
        if header_lines == MAX_HEADER_LINES {
            return Ok(None);
        }
        header_lines += 1;

        let mut header = String::new();
        if reader.read_line(&mut header).await? == 0 || header.len() > MAX_LINE_BYTES {
            return Ok(None);
        }
        let header = header.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            break;
        }

        let Some((name, value)) = header.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match name.trim().to_ascii_lowercase().as_str() {
            "content-length" => {
                content_length = match value.parse() {
                    Ok(length) => length,
                    Err(_) => return Ok(None),
                };
            }
            "accept" => accept = Some(value.to_string()),
            "content-type" => content_type = Some(value.to_string()),
            _ => {}
        }
    }

    if content_length > MAX_BODY_BYTES {
        return Ok(None);
    }

    let body = if method.eq_ignore_ascii_case("POST") && content_length > 0 {
        let mut buffer = vec![0u8; content_length];
        reader.read_exact(&mut buffer).await?;
        match String::from_utf8(buffer) {
            Ok(text) => Some(text),
            Err(_) => return Ok(None),
        }
    } else {
        None
    };

    Ok(Some(HttpRequest {
        method,
        target,
        accept,
        content_type,
        body,
    }))
}

#[cfg(test)]
mod tests {
    use tokio::io::BufReader;

    use super::read_request;

    async fn parse(raw: &[u8]) -> Option<super::HttpRequest> {
        let mut reader = BufReader::new(raw);
        read_request(&mut reader).await.expect("io on byte slice")
    }

    #[tokio::test]
    async fn parses_post_with_exact_body() {
        let raw = b"POST /mcp HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: 17\r\n\r\n{\"method\":\"ping\"}tail-ignored";

        let request = parse(raw).await.expect("well-formed request");
        assert_eq!(request.method, "POST");
        assert_eq!(request.target, "/mcp");
        assert_eq!(request.content_type.as_deref(), Some("application/json"));
        assert_eq!(request.body.as_deref(), Some("{\"method\":\"ping\"}"));
    }

    #[tokio::test]
    async fn header_names_are_case_insensitive() {
        let raw = b"GET / HTTP/1.1\r\nACCEPT: text/event-stream\r\n\r\n";

        let request = parse(raw).await.expect("well-formed request");
        assert!(request.accepts_event_stream());
        assert!(request.body.is_none());
    }

    #[tokio::test]
    async fn empty_request_line_is_rejected_silently() {
        assert!(parse(b"").await.is_none());
        assert!(parse(b"\r\n").await.is_none());
    }

    #[tokio::test]
    async fn malformed_request_line_is_rejected_silently() {
        assert!(parse(b"POST /mcp\r\n\r\n").await.is_none());
        assert!(parse(b"POST /mcp JUNK/1.1\r\n\r\n").await.is_none());
    }

    #[tokio::test]
    async fn bad_content_length_is_rejected_silently() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: nope\r\n\r\n";
        assert!(parse(raw).await.is_none());
    }

    #[tokio::test]
    async fn query_params_are_percent_decoded() {
        let raw = b"GET /read?uri=resource%3A%2F%2Fscenes&other=1 HTTP/1.1\r\n\r\n";

        let request = parse(raw).await.expect("well-formed request");
        assert_eq!(request.path(), "/read");
        assert_eq!(
            request.query_param("uri").as_deref(),
            Some("resource://scenes")
        );
        assert_eq!(request.query_param("other").as_deref(), Some("1"));
        assert!(request.query_param("missing").is_none());
    }
}
