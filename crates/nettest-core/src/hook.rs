//! Replaceable entry points for outbound sends and socket construction.
//!
//! Host code never writes to the network directly: it calls the function currently
//! held by [`send_point()`] and opens sockets through [`open_socket()`]. Interception
//! layers swap the held function for a wrapper and put the previous one back when done.

use crate::api::SyntheticResponse;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt;
use std::io;
use std::net::{TcpStream, UdpSocket};
use std::sync::Arc;

/// Outbound connection as seen by the send entry point.
pub trait Connection {
    /// Write bytes to the real transport.
    fn transmit(&mut self, data: &[u8]) -> io::Result<()>;

    /// Replace whatever this connection would read as its next response.
    fn install_response(&mut self, response: SyntheticResponse);
}

/// Signature of the send entry point.
pub type SendFn = dyn Fn(&mut dyn Connection, &[u8]) -> io::Result<()> + Send + Sync;

/// Signature of the socket-construction entry point.
pub type SocketFactory = dyn Fn(&SocketRequest) -> io::Result<Socket> + Send + Sync;

/// A single well-known location holding the current implementation of an entry point.
pub struct HookPoint<F: ?Sized> {
    current: RwLock<Arc<F>>,
}

impl<F: ?Sized> HookPoint<F> {
    pub fn new(initial: Arc<F>) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }

    /// Function currently installed.
    pub fn current(&self) -> Arc<F> {
        self.current.read().clone()
    }

    /// Install `hook`, returning the function it replaced.
    pub fn replace(&self, hook: Arc<F>) -> Arc<F> {
        std::mem::replace(&mut *self.current.write(), hook)
    }
}

impl<F: ?Sized> fmt::Debug for HookPoint<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookPoint")
            .field("installed", &Arc::as_ptr(&*self.current.read()).cast::<()>())
            .finish()
    }
}

/// Wrap a closure as a send entry point.
pub fn send_fn<F>(f: F) -> Arc<SendFn>
where
    F: Fn(&mut dyn Connection, &[u8]) -> io::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a socket factory.
pub fn socket_factory<F>(f: F) -> Arc<SocketFactory>
where
    F: Fn(&SocketRequest) -> io::Result<Socket> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Send entry point that writes straight to the connection's transport.
pub fn direct_send() -> Arc<SendFn> {
    send_fn(|connection, data| connection.transmit(data))
}

/// Socket factory that opens real sockets.
pub fn direct_socket_factory() -> Arc<SocketFactory> {
    socket_factory(construct_socket)
}

/// Kind of socket being constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Stream,
    Datagram,
}

/// Arguments of a socket construction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketRequest {
    pub kind: SocketKind,
    /// Remote address in `host:port` form
    pub addr: String,
}

impl SocketRequest {
    pub fn stream(addr: impl Into<String>) -> Self {
        Self {
            kind: SocketKind::Stream,
            addr: addr.into(),
        }
    }

    pub fn datagram(addr: impl Into<String>) -> Self {
        Self {
            kind: SocketKind::Datagram,
            addr: addr.into(),
        }
    }
}

/// Socket handle returned by the socket factory.
#[derive(Debug)]
pub enum Socket {
    Stream(TcpStream),
    Datagram(UdpSocket),
}

fn construct_socket(request: &SocketRequest) -> io::Result<Socket> {
    match request.kind {
        SocketKind::Stream => TcpStream::connect(&request.addr).map(Socket::Stream),
        SocketKind::Datagram => {
            let socket = UdpSocket::bind("0.0.0.0:0")?;
            socket.connect(&request.addr)?;
            Ok(Socket::Datagram(socket))
        }
    }
}

static SEND_POINT: Lazy<Arc<HookPoint<SendFn>>> =
    Lazy::new(|| Arc::new(HookPoint::new(direct_send())));

static SOCKET_POINT: Lazy<Arc<HookPoint<SocketFactory>>> =
    Lazy::new(|| Arc::new(HookPoint::new(direct_socket_factory())));

/// Process-wide send entry point.
pub fn send_point() -> &'static Arc<HookPoint<SendFn>> {
    &SEND_POINT
}

/// Process-wide socket-construction entry point.
pub fn socket_point() -> &'static Arc<HookPoint<SocketFactory>> {
    &SOCKET_POINT
}

/// Construct a socket through the process-wide factory.
pub fn open_socket(request: &SocketRequest) -> io::Result<Socket> {
    let factory = socket_point().current();
    factory(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingConnection;
    use rstest::rstest;

    #[rstest]
    fn test_replace_returns_previous_hook() {
        let original = direct_send();
        let point = HookPoint::new(original.clone());

        let previous = point.replace(send_fn(|_, _| Ok(())));
        assert!(Arc::ptr_eq(&previous, &original));
        assert!(!Arc::ptr_eq(&point.current(), &original));

        point.replace(previous);
        assert!(Arc::ptr_eq(&point.current(), &original));
    }

    #[rstest]
    fn test_direct_send_transmits() {
        let point = HookPoint::new(direct_send());
        let mut connection = RecordingConnection::default();

        let send = point.current();
        send(&mut connection, b"GET / HTTP/1.1\r\n\r\n").unwrap();

        assert_eq!(connection.transmitted, vec![b"GET / HTTP/1.1\r\n\r\n".to_vec()]);
    }

    #[rstest]
    fn test_wrapper_composes_with_previous() {
        let point = HookPoint::new(direct_send());
        let previous = point.current();
        point.replace(send_fn(move |connection, data| {
            let mut tagged = b"> ".to_vec();
            tagged.extend_from_slice(data);
            previous(connection, &tagged)
        }));

        let mut connection = RecordingConnection::default();
        let send = point.current();
        send(&mut connection, b"ping").unwrap();

        assert_eq!(connection.transmitted, vec![b"> ping".to_vec()]);
    }

    #[rstest]
    #[case(SocketRequest::stream("127.0.0.1:80"), SocketKind::Stream)]
    #[case(SocketRequest::datagram("127.0.0.1:53"), SocketKind::Datagram)]
    fn test_socket_request_kind(#[case] request: SocketRequest, #[case] kind: SocketKind) {
        assert_eq!(request.kind, kind);
    }
}
