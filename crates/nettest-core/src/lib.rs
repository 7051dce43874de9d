//! Core library for intercepting network activity in tests.
//!
//! - [`mocks`]: scoped mocks and the [`InterceptionRegistry`] routing every outbound send
//! - [`api`]: hostname/pattern based API mocks with synthesized HTTP responses
//! - [`blocker`]: [`NetworkBlocker`] guarding socket construction
//! - [`hook`]: the replaceable send and socket-construction entry points
//! - [`config`] and [`harness`]: marker presets and declarative API definitions

pub mod api;
pub mod blocker;
pub mod config;
pub mod error;
pub mod harness;
pub mod hook;
pub mod log;
pub mod mocks;

pub use api::{
    ApiDefinition, ApiInterceptor, ApiMock, ApiSpec, Captures, EndpointSet, PatternEndpoint,
    RawPayload, ResponseSpec, ResponseStream, SyntheticResponse,
};
pub use blocker::{BlockMode, CaptureControl, NetworkBlocker, StackFrame};
pub use error::{is_network_blocked, MockError, NetworkBlocked};
pub use harness::TestHarness;
pub use hook::{open_socket, send_point, socket_point, Connection, HookPoint, Socket, SocketKind, SocketRequest};
pub use log::CallLog;
pub use mocks::{
    HttpMock, IdentityKey, InterceptionRegistry, MockGuard, Mode, ScopedMock, SendInterceptor,
    SendOutcome,
};
