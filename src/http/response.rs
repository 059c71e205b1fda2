//! Raw HTTP/1.1 response assembly
//!
//! One-shot responses always carry a Content-Length and close the
//! connection; streaming responses switch the socket over to chunked or
//! event-stream framing and never close on their own.

pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        202 => "Accepted",
        204 => "No Content",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

pub fn payload_response(status: u16, content_type: &str, body: &[u8]) -> Vec<u8> {
    let head = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\n\r\n",
        status_reason(status),
        body.len(),
    );

    let mut response = head.into_bytes();
    response.extend_from_slice(body);
    response
}

pub fn empty_response(status: u16) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status} {}\r\nContent-Length: 0\r\nAccess-Control-Allow-Origin: *\r\nConnection: close\r\n\r\n",
        status_reason(status),
    )
    .into_bytes()
}

pub fn preflight_response() -> Vec<u8> {
    b"HTTP/1.1 204 No Content\r\n\
Access-Control-Allow-Origin: *\r\n\
Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
Access-Control-Allow-Headers: Content-Type, Authorization\r\n\
Access-Control-Max-Age: 86400\r\n\
Content-Length: 0\r\n\r\n"
        .to_vec()
}

pub fn chunked_stream_head() -> &'static [u8] {
    b"HTTP/1.1 200 OK\r\n\
Content-Type: application/json\r\n\
Transfer-Encoding: chunked\r\n\
Access-Control-Allow-Origin: *\r\n\r\n"
}

pub fn event_stream_head() -> &'static [u8] {
    b"HTTP/1.1 200 OK\r\n\
Content-Type: text/event-stream\r\n\
Cache-Control: no-cache\r\n\
Access-Control-Allow-Origin: *\r\n\
Connection: keep-alive\r\n\r\n"
}
