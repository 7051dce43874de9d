//! API mocks: requests to declared hostnames answered by pattern-matched endpoints.

pub mod endpoint;
pub mod host;
pub mod mock;
pub mod spec;
pub mod synth;

pub use endpoint::{Captures, EndpointSet, PatternEndpoint, ResponseFn};
pub use host::{extract_hostname, is_body_continuation, HostMatcher, WriteKind};
pub use mock::{ApiDefinition, ApiInterceptor, ApiMock};
pub use spec::{ApiSpec, EndpointSpec};
pub use synth::{serialize_body, RawPayload, ResponseShapeError, ResponseSpec, ResponseStream, SyntheticResponse};
