use super::error::HttpError;

/// Prefixes that identify an HTTP message in the first four payload octets.
const HTTP_PREFIXES: [&[u8; 4]; 5] = [b"GET ", b"POST", b"HEAD", b"PUT ", b"HTTP"];

/// Request or response, decided by the leading token of the start line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpKind {
    Request,
    Response,
}

/// Decoded HTTP message header section.
///
/// Header keys are lowercased for storage; the body is whatever follows
/// the blank-line terminator (empty when the terminator is absent).
#[derive(Debug)]
pub struct HttpMessage {
    pub kind: HttpKind,
    /// Request method, empty for responses.
    pub method: String,
    /// Request URI, empty for responses.
    pub uri: String,
    pub version: String,
    /// Response status code.
    pub status_code: Option<u16>,
    /// Response status message, empty for requests.
    pub status_message: String,
    pub headers: Vec<(String, String)>,
    pub content_length: Option<usize>,
    pub body_len: usize,
}

impl HttpMessage {
    pub fn header(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Decode an HTTP request or response from a transport payload.
///
/// Returns `Ok(None)` when the payload does not look like HTTP. A
/// message without a header terminator still yields the parsed start
/// line with empty headers and body.
pub fn decode_http(payload: &[u8]) -> Result<Option<HttpMessage>, HttpError> {
    if payload.len() < 4 {
        return Ok(None);
    }
    let prefix: &[u8] = &payload[..4];
    if !HTTP_PREFIXES.iter().any(|p| &p[..] == prefix) {
        return Ok(None);
    }

    let terminated = split_head(payload);
    let (head, body_len) = terminated.unwrap_or((payload, 0));
    let text = String::from_utf8_lossy(head);
    let mut lines = text.split("\r\n").flat_map(|chunk| chunk.split('\n'));

    let start_line = lines.next().ok_or(HttpError::MissingStartLine)?;
    let mut message = parse_start_line(start_line)?;

    // Without the blank-line terminator the header section never ended;
    // only the start line is trusted.
    if terminated.is_some() {
        for line in lines {
            if line.is_empty() {
                break;
            }
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            message
                .headers
                .push((key.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    message.content_length = message
        .header("content-length")
        .and_then(|v| v.parse::<usize>().ok());
    message.body_len = body_len;

    Ok(Some(message))
}

/// Split the payload at the header terminator (CRLFCRLF or LFLF),
/// returning the head and the body length. `None` when the terminator
/// is absent.
fn split_head(payload: &[u8]) -> Option<(&[u8], usize)> {
    if let Some(pos) = find(payload, b"\r\n\r\n") {
        return Some((&payload[..pos], payload.len() - pos - 4));
    }
    if let Some(pos) = find(payload, b"\n\n") {
        return Some((&payload[..pos], payload.len() - pos - 2));
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn parse_start_line(line: &str) -> Result<HttpMessage, HttpError> {
    let mut parts = line.splitn(3, ' ');
    let first = parts.next().unwrap_or("");
    let second = parts.next().unwrap_or("");
    let rest = parts.next().unwrap_or("");

    if first.is_empty() || second.is_empty() {
        return Err(HttpError::MalformedStartLine {
            line: line.to_string(),
        });
    }

    if first.starts_with("HTTP") {
        let status_code = second
            .parse::<u16>()
            .map_err(|_| HttpError::InvalidStatusCode {
                value: second.to_string(),
            })?;
        return Ok(HttpMessage {
            kind: HttpKind::Response,
            method: String::new(),
            uri: String::new(),
            version: first.to_string(),
            status_code: Some(status_code),
            status_message: rest.to_string(),
            headers: Vec::new(),
            content_length: None,
            body_len: 0,
        });
    }

    Ok(HttpMessage {
        kind: HttpKind::Request,
        method: first.to_string(),
        uri: second.to_string(),
        version: rest.to_string(),
        status_code: None,
        status_message: String::new(),
        headers: Vec::new(),
        content_length: None,
        body_len: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::{HttpKind, decode_http};
    use crate::protocols::http::error::HttpError;

    #[test]
    fn decode_request_with_headers_and_body() {
        let payload = b"POST /login HTTP/1.1\r\nHost: example.com\r\nContent-Length: 9\r\n\r\nuser=root";
        let message = decode_http(payload).unwrap().unwrap();
        assert_eq!(message.kind, HttpKind::Request);
        assert_eq!(message.method, "POST");
        assert_eq!(message.uri, "/login");
        assert_eq!(message.version, "HTTP/1.1");
        assert_eq!(message.header("host"), Some("example.com"));
        assert_eq!(message.content_length, Some(9));
        assert_eq!(message.body_len, 9);
    }

    #[test]
    fn decode_response() {
        let payload = b"HTTP/1.1 404 Not Found\r\nServer: nginx\r\n\r\n";
        let message = decode_http(payload).unwrap().unwrap();
        assert_eq!(message.kind, HttpKind::Response);
        assert_eq!(message.status_code, Some(404));
        assert_eq!(message.status_message, "Not Found");
        assert_eq!(message.header("server"), Some("nginx"));
        assert_eq!(message.body_len, 0);
    }

    #[test]
    fn lf_only_line_endings_are_accepted() {
        let payload = b"GET /a HTTP/1.0\nHost: h\n\nbody";
        let message = decode_http(payload).unwrap().unwrap();
        assert_eq!(message.method, "GET");
        assert_eq!(message.header("host"), Some("h"));
        assert_eq!(message.body_len, 4);
    }

    #[test]
    fn missing_terminator_yields_start_line_only() {
        let payload = b"GET /x?id=1 HTTP/1.1\r\nHost: example.com";
        let message = decode_http(payload).unwrap().unwrap();
        assert_eq!(message.uri, "/x?id=1");
        assert!(message.headers.is_empty());
        assert_eq!(message.body_len, 0);
    }

    #[test]
    fn non_http_payload_is_skipped() {
        assert!(decode_http(b"SSH-2.0-OpenSSH_9.0\r\n").unwrap().is_none());
        assert!(decode_http(b"GE").unwrap().is_none());
    }

    #[test]
    fn bad_status_code_is_an_error() {
        let err = decode_http(b"HTTP/1.1 abc Bad\r\n\r\n").unwrap_err();
        assert!(matches!(err, HttpError::InvalidStatusCode { .. }));
    }

    #[test]
    fn header_keys_are_lowercased() {
        let payload = b"GET / HTTP/1.1\r\nUSER-AGENT: curl\r\n\r\n";
        let message = decode_http(payload).unwrap().unwrap();
        assert_eq!(message.headers[0].0, "user-agent");
    }
}
