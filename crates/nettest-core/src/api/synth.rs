//! Response synthesis.
//!
//! Turns a status/body pair or a raw payload into the bytes a host HTTP parser
//! reads back as a response.

use crate::error::MockError;
use http::StatusCode;
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::Value;
use std::io::{self, BufRead, Cursor, Read};

/// Pre-formatted response payload, used verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPayload {
    Text(String),
    Bytes(Vec<u8>),
}

impl RawPayload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RawPayload::Text(text) => text.as_bytes(),
            RawPayload::Bytes(bytes) => bytes,
        }
    }

    /// Accepts a JSON string or an array of byte values.
    pub fn from_value(value: &Value) -> Result<Self, MockError> {
        match value {
            Value::String(text) => Ok(RawPayload::Text(text.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| MockError::InvalidRawPayload(item.to_string()))
                })
                .collect::<Result<Vec<u8>, _>>()
                .map(RawPayload::Bytes),
            other => Err(MockError::InvalidRawPayload(other.to_string())),
        }
    }
}

impl From<&str> for RawPayload {
    fn from(text: &str) -> Self {
        RawPayload::Text(text.to_owned())
    }
}

impl From<String> for RawPayload {
    fn from(text: String) -> Self {
        RawPayload::Text(text)
    }
}

impl From<&[u8]> for RawPayload {
    fn from(bytes: &[u8]) -> Self {
        RawPayload::Bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for RawPayload {
    fn from(bytes: Vec<u8>) -> Self {
        RawPayload::Bytes(bytes)
    }
}

/// What a response generator returns.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseSpec {
    /// Status code with an optional structured body
    Status { code: u16, body: Option<Value> },
    /// Complete response payload, status line included
    Raw(RawPayload),
}

impl ResponseSpec {
    /// Status code with an empty body.
    pub fn status(code: u16) -> Self {
        ResponseSpec::Status { code, body: None }
    }

    pub fn json(code: u16, body: Value) -> Self {
        ResponseSpec::Status {
            code,
            body: Some(body),
        }
    }

    pub fn raw(payload: impl Into<RawPayload>) -> Self {
        ResponseSpec::Raw(payload.into())
    }

    /// Interpret a JSON value as a response spec.
    ///
    /// Accepted shapes: `[status, body]`, `{"status": .., "body": ..}` and `{"raw": ..}`.
    /// On failure the reason is returned for the caller to attach context to.
    pub fn from_value(value: &Value) -> Result<Self, ResponseShapeError> {
        match value {
            Value::Array(items) if items.len() == 2 => Ok(ResponseSpec::Status {
                code: status_code(&items[0])?,
                body: non_null(&items[1]),
            }),
            Value::Object(map) if map.len() == 1 && map.contains_key("raw") => {
                RawPayload::from_value(&map["raw"])
                    .map(ResponseSpec::Raw)
                    .map_err(ResponseShapeError::Payload)
            }
            Value::Object(map) if map.contains_key("status") => {
                if let Some(key) = map.keys().find(|k| !matches!(k.as_str(), "status" | "body")) {
                    return Err(ResponseShapeError::Shape(format!("unexpected key '{key}'")));
                }
                Ok(ResponseSpec::Status {
                    code: status_code(&map["status"])?,
                    body: map.get("body").and_then(non_null),
                })
            }
            other => Err(ResponseShapeError::Shape(format!(
                "expected [status, body], {{\"status\", \"body\"}} or {{\"raw\"}}, got {other}"
            ))),
        }
    }
}

impl From<(u16, Value)> for ResponseSpec {
    fn from((code, body): (u16, Value)) -> Self {
        ResponseSpec::Status {
            code,
            body: non_null(&body),
        }
    }
}

impl From<(u16, Option<Value>)> for ResponseSpec {
    fn from((code, body): (u16, Option<Value>)) -> Self {
        ResponseSpec::Status { code, body }
    }
}

impl From<RawPayload> for ResponseSpec {
    fn from(payload: RawPayload) -> Self {
        ResponseSpec::Raw(payload)
    }
}

/// Why a JSON value is not a response spec.
#[derive(Debug)]
pub enum ResponseShapeError {
    Shape(String),
    Payload(MockError),
}

fn status_code(value: &Value) -> Result<u16, ResponseShapeError> {
    value
        .as_u64()
        .and_then(|code| u16::try_from(code).ok())
        .ok_or_else(|| ResponseShapeError::Shape(format!("invalid status code {value}")))
}

fn non_null(value: &Value) -> Option<Value> {
    (!value.is_null()).then(|| value.clone())
}

/// Writes JSON with `", "` and `": "` separators, e.g. `{"id": "abc"}`.
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// Serialize a structured body the way it appears on the wire.
pub fn serialize_body(body: &Value) -> Result<Vec<u8>, MockError> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
    body.serialize(&mut serializer)?;
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Shape {
    Status {
        code: u16,
        reason: Option<&'static str>,
        body: Vec<u8>,
    },
    Raw,
}

/// Protocol response installed on a connection in place of a real one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticResponse {
    shape: Shape,
    wire: Vec<u8>,
}

impl SyntheticResponse {
    /// Minimal response carrying `code`, its standard reason phrase and the body.
    ///
    /// `code` must have three digits.
    pub fn status(code: u16, body: Option<&Value>) -> Result<Self, MockError> {
        let reason = StatusCode::from_u16(code)
            .map_err(|_| MockError::InvalidStatus(code))?
            .canonical_reason();
        let body = body.map(serialize_body).transpose()?.unwrap_or_default();

        let mut wire = match reason {
            Some(reason) => format!("HTTP/1.1 {code} {reason}\r\n"),
            None => format!("HTTP/1.1 {code} \r\n"),
        }
        .into_bytes();
        wire.extend_from_slice(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes());
        wire.extend_from_slice(&body);

        Ok(Self {
            shape: Shape::Status { code, reason, body },
            wire,
        })
    }

    /// Response for a declared host that no endpoint matched.
    pub fn default_ok() -> Self {
        let wire = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec();
        Self {
            shape: Shape::Status {
                code: 200,
                reason: Some("OK"),
                body: Vec::new(),
            },
            wire,
        }
    }

    /// Response whose stream is exactly `payload`; no structure is imposed.
    pub fn raw(payload: impl Into<RawPayload>) -> Self {
        Self {
            shape: Shape::Raw,
            wire: payload.into().as_bytes().to_vec(),
        }
    }

    pub fn from_spec(spec: &ResponseSpec) -> Result<Self, MockError> {
        match spec {
            ResponseSpec::Status { code, body } => Self::status(*code, body.as_ref()),
            ResponseSpec::Raw(payload) => Ok(Self::raw(payload.clone())),
        }
    }

    /// Status code, unless built from a raw payload.
    pub fn code(&self) -> Option<u16> {
        match &self.shape {
            Shape::Status { code, .. } => Some(*code),
            Shape::Raw => None,
        }
    }

    pub fn reason(&self) -> Option<&'static str> {
        match &self.shape {
            Shape::Status { reason, .. } => *reason,
            Shape::Raw => None,
        }
    }

    /// Serialized body, unless built from a raw payload.
    pub fn body(&self) -> Option<&[u8]> {
        match &self.shape {
            Shape::Status { body, .. } => Some(body),
            Shape::Raw => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        self.shape == Shape::Raw
    }

    /// Bytes the host parser reads.
    pub fn as_bytes(&self) -> &[u8] {
        &self.wire
    }

    /// In-memory transport carrying the response bytes.
    pub fn into_stream(self) -> ResponseStream {
        ResponseStream {
            inner: Cursor::new(self.wire),
        }
    }
}

/// Readable stand-in for the socket a response would come from.
#[derive(Debug, Clone)]
pub struct ResponseStream {
    inner: Cursor<Vec<u8>>,
}

impl Read for ResponseStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl BufRead for ResponseStream {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.inner.consume(amt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn read_all(response: SyntheticResponse) -> Vec<u8> {
        let mut out = Vec::new();
        response.into_stream().read_to_end(&mut out).unwrap();
        out
    }

    #[rstest]
    #[case(json!({"id": "abc"}), "{\"id\": \"abc\"}")]
    #[case(json!([1, 2, 3]), "[1, 2, 3]")]
    #[case(json!({"a": {"b": [true, null]}, "c": 1.5}), "{\"a\": {\"b\": [true, null]}, \"c\": 1.5}")]
    #[case(json!("text"), "\"text\"")]
    #[case(json!({}), "{}")]
    fn test_serialize_body(#[case] body: Value, #[case] expected: &str) {
        assert_eq!(serialize_body(&body).unwrap(), expected.as_bytes());
    }

    #[rstest]
    fn test_status_response_wire_format() {
        let response = SyntheticResponse::status(418, Some(&json!({"id": "abc"}))).unwrap();

        assert_eq!(response.code(), Some(418));
        assert_eq!(response.reason(), Some("I'm a teapot"));
        assert_eq!(response.body(), Some(&b"{\"id\": \"abc\"}"[..]));
        assert_eq!(
            read_all(response),
            b"HTTP/1.1 418 I'm a teapot\r\nContent-Length: 13\r\n\r\n{\"id\": \"abc\"}"
        );
    }

    #[rstest]
    fn test_null_body_is_empty() {
        let response = SyntheticResponse::status(204, None).unwrap();
        assert_eq!(response.body(), Some(&b""[..]));
        assert_eq!(
            response.as_bytes(),
            b"HTTP/1.1 204 No Content\r\nContent-Length: 0\r\n\r\n"
        );
    }

    #[rstest]
    fn test_unknown_status_has_no_reason() {
        let response = SyntheticResponse::status(599, None).unwrap();
        assert_eq!(response.reason(), None);
        assert!(response.as_bytes().starts_with(b"HTTP/1.1 599 \r\n"));
    }

    #[rstest]
    #[case(0)]
    #[case(70)]
    #[case(1000)]
    fn test_status_outside_three_digits(#[case] code: u16) {
        assert!(matches!(
            SyntheticResponse::status(code, Some(&json!({"id": "abc"}))),
            Err(MockError::InvalidStatus(c)) if c == code
        ));
    }

    #[rstest]
    fn test_default_ok_matches_status_200() {
        assert_eq!(
            SyntheticResponse::default_ok(),
            SyntheticResponse::status(200, None).unwrap()
        );
    }

    #[rstest]
    #[case(RawPayload::from("HTTP/1.1 200 OK\r\n\r\nnot json"))]
    #[case(RawPayload::from("garbage without a status line"))]
    #[case(RawPayload::from(vec![0xff, 0x00, b'\r', b'\n']))]
    fn test_raw_payload_round_trip(#[case] payload: RawPayload) {
        let response = SyntheticResponse::raw(payload.clone());
        assert!(response.is_raw());
        assert_eq!(response.code(), None);
        assert_eq!(read_all(response), payload.as_bytes());
    }

    #[rstest]
    #[case(json!([418, {"id": "abc"}]), ResponseSpec::json(418, json!({"id": "abc"})))]
    #[case(json!([204, null]), ResponseSpec::status(204))]
    #[case(json!({"status": 201}), ResponseSpec::status(201))]
    #[case(json!({"status": 200, "body": [1]}), ResponseSpec::json(200, json!([1])))]
    #[case(json!({"raw": "HTTP/1.1 200 OK\r\n\r\n"}), ResponseSpec::raw("HTTP/1.1 200 OK\r\n\r\n"))]
    #[case(json!({"raw": [104, 105]}), ResponseSpec::raw(b"hi".to_vec()))]
    fn test_response_spec_from_value(#[case] value: Value, #[case] expected: ResponseSpec) {
        assert_eq!(ResponseSpec::from_value(&value).unwrap(), expected);
    }

    #[rstest]
    #[case(json!(200))]
    #[case(json!([200]))]
    #[case(json!(["200", null]))]
    #[case(json!([70000, null]))]
    #[case(json!({"body": {}}))]
    #[case(json!({"status": 200, "headers": {}}))]
    fn test_response_spec_from_value_invalid_shape(#[case] value: Value) {
        assert!(matches!(
            ResponseSpec::from_value(&value),
            Err(ResponseShapeError::Shape(_))
        ));
    }

    #[rstest]
    #[case(json!({"raw": 12}))]
    #[case(json!({"raw": {"a": 1}}))]
    #[case(json!({"raw": [256]}))]
    fn test_response_spec_from_value_invalid_raw(#[case] value: Value) {
        assert!(matches!(
            ResponseSpec::from_value(&value),
            Err(ResponseShapeError::Payload(MockError::InvalidRawPayload(_)))
        ));
    }

    #[rstest]
    fn test_tuple_conversions() {
        assert_eq!(ResponseSpec::from((204, Value::Null)), ResponseSpec::status(204));
        assert_eq!(
            ResponseSpec::from((418, Some(json!({"id": "abc"})))),
            ResponseSpec::json(418, json!({"id": "abc"}))
        );
    }
}
