//! Blocking HTTP/1.1 client for tests.
//!
//! Every write goes through [`nettest_core::send_point`] and every socket is opened
//! through [`nettest_core::open_socket`], so active mocks and blockers see all of the
//! traffic this client produces.

pub mod connection;
pub mod error;
pub mod response;
pub mod url;

pub use connection::HttpConnection;
pub use error::HttpError;
pub use response::Response;
pub use url::{get, split_url};
