//! API mocks: scoped mocks answering requests for a set of known hostnames.

use crate::api::endpoint::{EndpointSet, PatternEndpoint};
use crate::api::host::{HostMatcher, WriteKind};
use crate::api::synth::SyntheticResponse;
use crate::error::MockError;
use crate::mocks::{HttpMock, IdentityKey, SendInterceptor, SendOutcome};
use parking_lot::Mutex;
use tracing::trace;

/// Description of a mocked API.
///
/// [`endpoints`](Self::endpoints) is called once per mock instance, so every instance
/// gets its own endpoints and per-test changes never leak between instances.
pub trait ApiDefinition: Send + Sync + 'static {
    fn hostnames(&self) -> Vec<String>;

    fn endpoints(&self) -> Result<Vec<PatternEndpoint>, MockError>;

    /// Mocks of the same API override each other while nested.
    fn identity(&self) -> IdentityKey {
        IdentityKey::of::<Self>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Idle,
    /// Headers of a declared request were handled
    Matched,
    /// At least one body write of the matched request was swallowed
    BodyConsumed,
}

/// Send interceptor of an API mock.
#[derive(Debug)]
pub struct ApiInterceptor {
    identity: IdentityKey,
    hosts: HostMatcher,
    endpoints: EndpointSet,
    state: Mutex<RequestState>,
}

impl ApiInterceptor {
    pub fn new<D: ApiDefinition>(definition: &D) -> Result<Self, MockError> {
        Ok(Self {
            identity: definition.identity(),
            hosts: HostMatcher::new(definition.hostnames()),
            endpoints: EndpointSet::new(definition.endpoints()?)?,
            state: Mutex::new(RequestState::Idle),
        })
    }

    pub fn hostnames(&self) -> &[String] {
        self.hosts.hostnames()
    }

    pub fn endpoints(&self) -> &EndpointSet {
        &self.endpoints
    }

    pub fn endpoint(&self, operation_id: &str) -> Result<&PatternEndpoint, MockError> {
        self.endpoints.get(operation_id)
    }
}

impl SendInterceptor for ApiInterceptor {
    fn on_send(&self, data: &[u8]) -> Result<SendOutcome, MockError> {
        let mut state = self.state.lock();
        match self.hosts.classify(data) {
            // Any write not ending in a blank line counts as body, including a whole
            // request sent in one write to an undeclared host.
            WriteKind::Body => match *state {
                RequestState::Idle => Ok(SendOutcome::Pass),
                RequestState::Matched | RequestState::BodyConsumed => {
                    trace!(identity = %self.identity, bytes = data.len(), "body continuation");
                    *state = RequestState::BodyConsumed;
                    Ok(SendOutcome::Cancel(None))
                }
            },
            WriteKind::Undeclared(_) | WriteKind::Anonymous => {
                *state = RequestState::Idle;
                Ok(SendOutcome::Pass)
            }
            WriteKind::Declared(hostname) => {
                *state = RequestState::Idle;
                let response = match self.endpoints.respond(data)? {
                    Some(response) => response,
                    None => {
                        trace!(%hostname, "no endpoint matched, using default response");
                        SyntheticResponse::default_ok()
                    }
                };
                *state = RequestState::Matched;
                Ok(SendOutcome::Cancel(Some(response)))
            }
        }
    }

    fn identity(&self) -> IdentityKey {
        self.identity.clone()
    }
}

/// Scoped mock for an [`ApiDefinition`].
pub type ApiMock = HttpMock<ApiInterceptor>;

impl HttpMock<ApiInterceptor> {
    /// Intercepting API mock registered with the global registry.
    pub fn from_api<D: ApiDefinition>(definition: D) -> Result<Self, MockError> {
        Ok(HttpMock::new(ApiInterceptor::new(&definition)?))
    }

    pub fn endpoints(&self) -> &EndpointSet {
        self.interceptor().endpoints()
    }

    pub fn endpoint(&self, operation_id: &str) -> Result<&PatternEndpoint, MockError> {
        self.interceptor().endpoint(operation_id)
    }
}
