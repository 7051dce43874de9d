//! Scoped mocks and the registry routing outbound sends through them.
//!
//! This module provides:
//! - [`HttpMock`]: a scoped mock wrapping any [`SendInterceptor`]
//! - [`InterceptionRegistry`]: tracks active mocks and owns the send hook installation

pub mod mode;
pub mod registry;
pub mod scoped;

pub use mode::Mode;
pub use registry::{HookTransition, InterceptionRegistry, RegistryState};
pub use scoped::{
    HttpMock, HttpMockBuilder, IdentityKey, MockGuard, MockId, ScopedMock, SendInterceptor,
    SendOutcome,
};
