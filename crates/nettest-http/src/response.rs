//! Parsing of HTTP/1.1 responses with `httparse`.

use crate::error::HttpError;
use std::borrow::Cow;
use std::io::{BufRead, Read};

const MAX_HEADERS: usize = 64;

/// A complete HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    /// Read one response from `reader`.
    ///
    /// The body length comes from `Content-Length`; without it the body runs to EOF.
    pub fn read_from<R: BufRead>(mut reader: R) -> Result<Self, HttpError> {
        let head = read_head(&mut reader)?;

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Response::new(&mut headers);
        if parsed.parse(&head)?.is_partial() {
            return Err(HttpError::Incomplete);
        }

        let status = parsed.code.ok_or(HttpError::Incomplete)?;
        let reason = parsed.reason.unwrap_or_default().to_string();
        let headers: Vec<(String, String)> = parsed
            .headers
            .iter()
            .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
            .collect();

        let content_length = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .map(|(_, value)| {
                value
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| HttpError::ContentLength(value.clone()))
            })
            .transpose()?;

        let body = match content_length {
            Some(length) => {
                let mut body = vec![0; length];
                reader.read_exact(&mut body)?;
                body
            }
            None => {
                let mut body = Vec::new();
                reader.read_to_end(&mut body)?;
                body
            }
        };

        Ok(Self {
            status,
            reason,
            headers,
            body,
        })
    }

    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn read_head<R: BufRead>(reader: &mut R) -> Result<Vec<u8>, HttpError> {
    let mut head = Vec::new();
    loop {
        let read = reader.read_until(b'\n', &mut head)?;
        if read == 0 {
            return Err(HttpError::Incomplete);
        }
        if head.ends_with(b"\r\n\r\n") || head.ends_with(b"\n\n") {
            return Ok(head);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Cursor;

    fn parse(raw: &[u8]) -> Result<Response, HttpError> {
        Response::read_from(Cursor::new(raw.to_vec()))
    }

    #[rstest]
    fn test_content_length_body() {
        let response = parse(b"HTTP/1.1 418 I'm a teapot\r\nContent-Length: 13\r\n\r\n{\"id\": \"abc\"}trailing").unwrap();

        assert_eq!(response.status, 418);
        assert_eq!(response.reason, "I'm a teapot");
        assert_eq!(response.header("content-length"), Some("13"));
        assert_eq!(response.body, b"{\"id\": \"abc\"}");
        assert!(!response.is_success());
    }

    #[rstest]
    fn test_body_to_eof() {
        let response = parse(b"HTTP/1.1 200 OK\r\nX-Test: yes\r\n\r\nhello").unwrap();
        assert_eq!(response.text(), "hello");
        assert_eq!(response.header("X-TEST"), Some("yes"));
        assert!(response.is_success());
    }

    #[rstest]
    fn test_empty_reason() {
        let response = parse(b"HTTP/1.1 599 \r\nContent-Length: 0\r\n\r\n").unwrap();
        assert_eq!(response.status, 599);
        assert_eq!(response.reason, "");
        assert!(response.body.is_empty());
    }

    #[rstest]
    #[case(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n")]
    #[case(b"")]
    fn test_incomplete_head(#[case] raw: &[u8]) {
        assert!(matches!(parse(raw), Err(HttpError::Incomplete)));
    }

    #[rstest]
    fn test_short_body() {
        let err = parse(b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort").unwrap_err();
        assert!(matches!(err, HttpError::Io(_)));
    }

    #[rstest]
    fn test_invalid_content_length() {
        let err = parse(b"HTTP/1.1 200 OK\r\nContent-Length: ten\r\n\r\n").unwrap_err();
        assert!(matches!(err, HttpError::ContentLength(ref value) if value == "ten"));
    }

    #[rstest]
    fn test_malformed_status_line() {
        let err = parse(b"NOT HTTP\r\n\r\n").unwrap_err();
        assert!(matches!(err, HttpError::Parse(_)));
    }
}
