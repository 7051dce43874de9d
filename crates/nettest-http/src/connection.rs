//! One-shot HTTP/1.1 connections sending through the interception points.

use crate::error::HttpError;
use crate::response::Response;
use nettest_core::{open_socket, send_point, Connection, Socket, SocketRequest, SyntheticResponse};
use std::io::{self, BufReader, Write};
use std::net::TcpStream;
use tracing::trace;

/// Transport handed to the send entry point.
///
/// The TCP stream is opened by the first real transmit, so a request whose
/// writes are all cancelled never touches the network.
#[derive(Debug)]
struct Transport {
    addr: String,
    stream: Option<TcpStream>,
    response: Option<SyntheticResponse>,
}

impl Transport {
    fn connect(&self) -> io::Result<TcpStream> {
        match open_socket(&SocketRequest::stream(self.addr.as_str()))? {
            Socket::Stream(stream) => Ok(stream),
            Socket::Datagram(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "socket factory returned a datagram socket for a stream request",
            )),
        }
    }
}

impl Connection for Transport {
    fn transmit(&mut self, data: &[u8]) -> io::Result<()> {
        let stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                let stream = self.connect()?;
                trace!(addr = %self.addr, "connected");
                stream
            }
        };
        self.stream.insert(stream).write_all(data)
    }

    fn install_response(&mut self, response: SyntheticResponse) {
        self.response = Some(response);
    }
}

/// HTTP/1.1 connection to one host.
///
/// The request line and headers are sent in one write and the body in a second one,
/// the way common client libraries hand requests to their socket layer.
#[derive(Debug)]
pub struct HttpConnection {
    host: String,
    port: u16,
    transport: Transport,
}

impl HttpConnection {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            transport: Transport {
                addr: format!("{host}:{port}"),
                stream: None,
                response: None,
            },
            host,
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Value of the `Host` header: the port is omitted when it is 80.
    pub fn host_header(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Send a request. `Host`, `Content-Length` and `Connection: close` are added
    /// unless present in `headers`.
    pub fn request(
        &mut self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
        body: Option<&[u8]>,
    ) -> Result<(), HttpError> {
        self.transport.response = None;

        let has = |name: &str| headers.iter().any(|(key, _)| key.eq_ignore_ascii_case(name));
        let mut head = format!("{method} {path} HTTP/1.1\r\n");
        if !has("host") {
            head.push_str(&format!("Host: {}\r\n", self.host_header()));
        }
        for (name, value) in headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        if let Some(body) = body {
            if !has("content-length") {
                head.push_str(&format!("Content-Length: {}\r\n", body.len()));
            }
        }
        if !has("connection") {
            head.push_str("Connection: close\r\n");
        }
        head.push_str("\r\n");

        self.send(head.as_bytes())?;
        if let Some(body) = body.filter(|body| !body.is_empty()) {
            self.send(body)?;
        }
        Ok(())
    }

    /// Pass raw bytes to the current send entry point.
    pub fn send(&mut self, data: &[u8]) -> Result<(), HttpError> {
        let send = send_point().current();
        send(&mut self.transport, data)?;
        Ok(())
    }

    /// Read the response: a synthesized one if a mock installed it, the socket otherwise.
    pub fn get_response(&mut self) -> Result<Response, HttpError> {
        if let Some(response) = self.transport.response.take() {
            trace!(host = %self.host, "reading synthesized response");
            return Response::read_from(response.into_stream());
        }
        match self.transport.stream.as_mut() {
            Some(stream) => Response::read_from(BufReader::new(stream)),
            None => Err(HttpError::NoRequest),
        }
    }

    /// True if a real socket has been opened.
    pub fn is_connected(&self) -> bool {
        self.transport.stream.is_some()
    }
}
