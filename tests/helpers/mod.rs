use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

pub const OK_RESPONSE: &str =
    "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok";

/// A raw TCP server that drops the first `failures` connections after reading
/// the request, producing a network-level error on the client, and serves
/// `raw_http_response` afterwards.
pub struct FlakyServer {
    addr: SocketAddr,
    connections: Arc<AtomicU32>,
}

impl FlakyServer {
    pub fn start(failures: u32, raw_http_response: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind failed");
        let addr = listener.local_addr().expect("no local addr");
        let connections = Arc::new(AtomicU32::new(0));

        let seen = connections.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let n = seen.fetch_add(1, Ordering::SeqCst);
                Self::handle_connection(stream, n < failures, raw_http_response);
            }
        });

        Self { addr, connections }
    }

    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn connections(&self) -> u32 {
        self.connections.load(Ordering::SeqCst)
    }

    fn handle_connection(mut stream: TcpStream, fail: bool, raw_http_response: &str) {
        // Read the request first so the client is already waiting on the
        // response when the connection is cut.
        let mut buffer = [0; 1024];
        let _ = stream.read(&mut buffer);
        if fail {
            return; // dropped without a response
        }
        let _ = stream.write_all(raw_http_response.as_bytes());
        let _ = stream.flush();
    }
}
