#![allow(dead_code)]

use parking_lot::{Mutex, MutexGuard};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

static NETWORK: Mutex<()> = Mutex::new(());

/// Serializes tests that install mocks or blockers on the process-wide entry points.
pub fn serial() -> MutexGuard<'static, ()> {
    NETWORK.lock()
}

/// Listener on an ephemeral local port answering exactly one request.
pub struct LocalServer {
    pub port: u16,
    handle: JoinHandle<Vec<u8>>,
}

impl LocalServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    /// Bytes of the request head the server received.
    pub fn received(self) -> Vec<u8> {
        self.handle.join().unwrap()
    }
}

pub fn serve_once(response: &'static [u8]) -> LocalServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 1024];
        while !received.ends_with(b"\r\n\r\n") {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
        }
        stream.write_all(response).unwrap();
        received
    });
    LocalServer { port, handle }
}
