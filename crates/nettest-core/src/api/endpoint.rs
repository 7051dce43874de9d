//! Pattern-matched endpoints and the sets exposing them by identifier.

use crate::api::synth::{ResponseShapeError, ResponseSpec, SyntheticResponse};
use crate::error::MockError;
use crate::log::CallLog;
use parking_lot::RwLock;
use regex::bytes::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Named capture groups of a matched request, decoded to text.
pub type Captures = BTreeMap<String, String>;

/// Response generator of an endpoint.
pub type ResponseFn = dyn Fn(&Captures) -> ResponseSpec + Send + Sync;

#[derive(Clone)]
enum Responder {
    Func(Arc<ResponseFn>),
    /// JSON value with `{name}` placeholders, interpreted at match time
    Template(Value),
}

impl Responder {
    fn respond(&self, operation_id: &str, captures: &Captures) -> Result<ResponseSpec, MockError> {
        match self {
            Responder::Func(f) => Ok(f(captures)),
            Responder::Template(template) => {
                let rendered = render_template(template, captures);
                ResponseSpec::from_value(&rendered).map_err(|err| match err {
                    ResponseShapeError::Shape(reason) => MockError::InvalidResponse {
                        operation_id: operation_id.to_owned(),
                        reason,
                    },
                    ResponseShapeError::Payload(err) => err,
                })
            }
        }
    }
}

fn render_template(template: &Value, captures: &Captures) -> Value {
    match template {
        Value::String(text) => {
            let rendered = captures.iter().fold(text.clone(), |acc, (name, value)| {
                acc.replace(&format!("{{{name}}}"), value)
            });
            Value::String(rendered)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| render_template(item, captures))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_template(v, captures)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Mocking behaviour for one operation of an API.
///
/// The pattern is matched against the start of the raw request bytes. Each match is
/// recorded in [`invocations`](Self::invocations) before the response generator runs.
pub struct PatternEndpoint {
    operation_id: String,
    pattern: String,
    regex: Regex,
    responder: RwLock<Responder>,
    invocations: CallLog<Captures>,
}

impl PatternEndpoint {
    pub fn new<F>(operation_id: impl Into<String>, pattern: &str, response: F) -> Result<Self, MockError>
    where
        F: Fn(&Captures) -> ResponseSpec + Send + Sync + 'static,
    {
        Self::with_responder(operation_id.into(), pattern, Responder::Func(Arc::new(response)))
    }

    /// Endpoint answering with a JSON template; `{name}` in strings is replaced by captures.
    pub fn from_template(
        operation_id: impl Into<String>,
        pattern: &str,
        template: Value,
    ) -> Result<Self, MockError> {
        Self::with_responder(operation_id.into(), pattern, Responder::Template(template))
    }

    fn with_responder(operation_id: String, pattern: &str, responder: Responder) -> Result<Self, MockError> {
        let regex = Regex::new(&format!(r"\A(?:{pattern})")).map_err(|source| {
            MockError::InvalidPattern {
                operation_id: operation_id.clone(),
                source,
            }
        })?;
        Ok(Self {
            operation_id,
            pattern: pattern.to_owned(),
            regex,
            responder: RwLock::new(responder),
            invocations: CallLog::new(),
        })
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Every matched request's captures, in order.
    pub fn invocations(&self) -> &CallLog<Captures> {
        &self.invocations
    }

    /// Replace the response generator of this endpoint only.
    pub fn set_response<F>(&self, response: F)
    where
        F: Fn(&Captures) -> ResponseSpec + Send + Sync + 'static,
    {
        *self.responder.write() = Responder::Func(Arc::new(response));
    }

    /// Named captures if the request matches.
    pub fn captures(&self, data: &[u8]) -> Option<Captures> {
        let caps = self.regex.captures(data)?;
        Some(
            self.regex
                .capture_names()
                .flatten()
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (name.to_owned(), String::from_utf8_lossy(m.as_bytes()).into_owned()))
                })
                .collect(),
        )
    }

    /// Record the invocation and synthesize a response if the request matches.
    pub(crate) fn respond(&self, data: &[u8]) -> Result<Option<SyntheticResponse>, MockError> {
        let Some(captures) = self.captures(data) else {
            return Ok(None);
        };
        debug!(operation_id = %self.operation_id, ?captures, "endpoint matched");

        self.invocations.record(captures.clone());
        let responder = self.responder.read().clone();
        let spec = responder.respond(&self.operation_id, &captures)?;
        match SyntheticResponse::from_spec(&spec) {
            Ok(response) => Ok(Some(response)),
            Err(err @ MockError::InvalidStatus(_)) => Err(MockError::InvalidResponse {
                operation_id: self.operation_id.clone(),
                reason: err.to_string(),
            }),
            Err(err) => Err(err),
        }
    }
}

/// Independent copy: same pattern and generator, empty invocation record.
impl Clone for PatternEndpoint {
    fn clone(&self) -> Self {
        Self {
            operation_id: self.operation_id.clone(),
            pattern: self.pattern.clone(),
            regex: self.regex.clone(),
            responder: RwLock::new(self.responder.read().clone()),
            invocations: CallLog::new(),
        }
    }
}

impl fmt::Debug for PatternEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternEndpoint")
            .field("operation_id", &self.operation_id)
            .field("pattern", &self.pattern)
            .field("invocations", &self.invocations.count())
            .finish()
    }
}

/// Endpoints of one mock instance, in declaration order, looked up by identifier.
#[derive(Debug, Clone, Default)]
pub struct EndpointSet {
    endpoints: Vec<PatternEndpoint>,
}

impl EndpointSet {
    pub fn new(endpoints: Vec<PatternEndpoint>) -> Result<Self, MockError> {
        for (i, endpoint) in endpoints.iter().enumerate() {
            if endpoints[..i]
                .iter()
                .any(|other| other.operation_id == endpoint.operation_id)
            {
                return Err(MockError::DuplicateEndpoint(endpoint.operation_id.clone()));
            }
        }
        Ok(Self { endpoints })
    }

    pub fn get(&self, operation_id: &str) -> Result<&PatternEndpoint, MockError> {
        self.endpoints
            .iter()
            .find(|e| e.operation_id == operation_id)
            .ok_or_else(|| MockError::UnknownEndpoint(operation_id.to_owned()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PatternEndpoint> {
        self.endpoints.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.endpoints.iter().map(|e| e.operation_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// First endpoint in declaration order that matches decides the response.
    pub(crate) fn respond(&self, data: &[u8]) -> Result<Option<SyntheticResponse>, MockError> {
        for endpoint in &self.endpoints {
            if let Some(response) = endpoint.respond(data)? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }
}
