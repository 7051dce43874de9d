//! Hostname extraction and header/body classification of raw request writes.
//!
//! A request usually reaches the send entry point as a headers write followed by
//! separate body writes. A write is treated as headers when it ends with the blank
//! line terminating an HTTP header block; anything else is a body continuation.
//! This is a framing heuristic: a body that happens to end in `\r\n\r\n` is taken
//! for headers.

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// True if `data` is not a complete header block.
pub fn is_body_continuation(data: &[u8]) -> bool {
    !data.ends_with(HEADER_TERMINATOR)
}

/// Hostname from the `Host` header of a headers write, without its port.
pub fn extract_hostname(data: &[u8]) -> Option<String> {
    if is_body_continuation(data) {
        return None;
    }

    // The first line is the request line.
    let value = data
        .split(|&b| b == b'\n')
        .skip(1)
        .find_map(|line| header_value(line, b"host"))?;
    let authority = std::str::from_utf8(value).ok()?;
    let hostname = strip_port(authority);

    if hostname.is_empty() {
        None
    } else {
        Some(hostname.to_owned())
    }
}

fn header_value<'a>(line: &'a [u8], name: &[u8]) -> Option<&'a [u8]> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let colon = line.iter().position(|&b| b == b':')?;
    let (key, rest) = line.split_at(colon);
    if !key.eq_ignore_ascii_case(name) {
        return None;
    }
    Some(trim_spaces(&rest[1..]))
}

fn trim_spaces(mut value: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = value {
        value = rest;
    }
    while let [rest @ .., b' ' | b'\t'] = value {
        value = rest;
    }
    value
}

fn strip_port(authority: &str) -> &str {
    if let Some(literal) = authority.strip_prefix('[') {
        return literal.find(']').map_or(literal, |end| &literal[..end]);
    }
    authority.find(':').map_or(authority, |end| &authority[..end])
}

/// Classification of one outbound write against a set of declared hostnames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteKind {
    /// Headers addressed to a declared hostname
    Declared(String),
    /// Headers addressed to some other hostname
    Undeclared(String),
    /// Headers without a `Host` header
    Anonymous,
    /// Not a header block
    Body,
}

/// Decides whether requests belong to a mock's declared hostnames.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostMatcher {
    hostnames: Vec<String>,
}

impl HostMatcher {
    pub fn new<I, S>(hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hostnames: hostnames.into_iter().map(Into::into).collect(),
        }
    }

    pub fn hostnames(&self) -> &[String] {
        &self.hostnames
    }

    pub fn declares(&self, hostname: &str) -> bool {
        self.hostnames.iter().any(|h| h == hostname)
    }

    pub fn classify(&self, data: &[u8]) -> WriteKind {
        if is_body_continuation(data) {
            return WriteKind::Body;
        }
        match extract_hostname(data) {
            Some(hostname) if self.declares(&hostname) => WriteKind::Declared(hostname),
            Some(hostname) => WriteKind::Undeclared(hostname),
            None => WriteKind::Anonymous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n", false)]
    #[case(b"{\"name\": \"value\"}", true)]
    #[case(b"GET / HTTP/1.1\r\nHost: example.com\r\n", true)]
    #[case(b"", true)]
    fn test_is_body_continuation(#[case] data: &[u8], #[case] expected: bool) {
        assert_eq!(is_body_continuation(data), expected);
    }

    #[rstest]
    #[case(b"GET / HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n", Some("127.0.0.1"))]
    #[case(b"GET / HTTP/1.1\r\nHost: api.example.com:8080\r\n\r\n", Some("api.example.com"))]
    #[case(b"GET / HTTP/1.1\r\nAccept: */*\r\nhost:  example.com \r\n\r\n", Some("example.com"))]
    #[case(b"GET / HTTP/1.1\r\nHost: [::1]:8080\r\n\r\n", Some("::1"))]
    #[case(b"GET / HTTP/1.1\r\nAccept: */*\r\n\r\n", None)]
    #[case(b"GET / HTTP/1.1\r\nHost: example.com\r\n", None)]
    #[case(b"GET / HTTP/1.1\r\nHost: \r\n\r\n", None)]
    #[case(b"GET /Host: evil HTTP/1.1\r\nAccept: */*\r\n\r\n", None)]
    #[case(b"GET / HTTP/1.1\r\nX-Forwarded-Host: other\r\nHost: real\r\n\r\n", Some("real"))]
    fn test_extract_hostname(#[case] data: &[u8], #[case] expected: Option<&str>) {
        assert_eq!(extract_hostname(data).as_deref(), expected);
    }

    #[rstest]
    #[case(b"GET / HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n", WriteKind::Declared("127.0.0.1".into()))]
    #[case(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n", WriteKind::Undeclared("localhost".into()))]
    #[case(b"GET / HTTP/1.0\r\n\r\n", WriteKind::Anonymous)]
    #[case(b"body", WriteKind::Body)]
    fn test_classify(#[case] data: &[u8], #[case] expected: WriteKind) {
        let matcher = HostMatcher::new(["127.0.0.1"]);
        assert_eq!(matcher.classify(data), expected);
    }
}
