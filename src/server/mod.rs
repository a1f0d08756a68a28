//! Dev-server core: listener, accept loop, connection lifecycle.
//!
//! One OS thread per accepted connection; each loops parse → route →
//! respond until the peer closes or shutdown is flagged. HMR upgrades hand
//! the socket over to the stream handlers and never return to the request
//! loop.

mod context;
mod listener;

pub use context::ServerContext;

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use anyhow::Result;

use crate::http::{self, ParseError, ResponseBuilder};
use crate::mime;
use crate::router::{self, RouteAction};
use crate::{debug, log, watcher};

pub struct DevServer {
    ctx: Arc<ServerContext>,
}

impl DevServer {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    /// Bind, start the watcher, and run the accept loop until the process
    /// exits.
    pub fn run(&self) -> Result<()> {
        let (listener, addr) = listener::bind_with_retry(self.ctx.host, self.ctx.port)?;

        log!("serve"; "http://{addr}");
        let config = self.ctx.config();
        for app in &config.apps {
            log!("serve"; "  {} ({}) ← :{}", app.name, app.framework, app.port);
        }

        watcher::spawn(Arc::clone(&self.ctx));

        for stream in listener.incoming() {
            if self.ctx.is_shutdown() {
                break;
            }
            match stream {
                Ok(stream) => {
                    let ctx = Arc::clone(&self.ctx);
                    std::thread::spawn(move || handle_connection(stream, ctx));
                }
                Err(e) => {
                    debug!("serve"; "accept error: {e}");
                }
            }
        }
        Ok(())
    }
}

/// Per-connection task: keep-alive request loop.
fn handle_connection(mut stream: TcpStream, ctx: Arc<ServerContext>) {
    let mut buf: Vec<u8> = Vec::with_capacity(8 * 1024);
    let mut chunk = [0u8; 8 * 1024];

    loop {
        if ctx.is_shutdown() {
            let _ = stream.write_all(&unavailable());
            return;
        }

        // Parse a complete request, reading more bytes as needed
        let (action, consumed) = loop {
            if !buf.is_empty() {
                match http::parse(&buf) {
                    Ok(req) => {
                        let consumed = req.total_len();
                        break (router::route(&req, &ctx), consumed);
                    }
                    Err(ParseError::Incomplete) => {}
                    Err(e) => {
                        // Client protocol error: answer 400, drop the
                        // unparseable bytes, keep the connection
                        debug!("serve"; "bad request: {e}");
                        let _ = stream.write_all(&bad_request(&e));
                        buf.clear();
                    }
                }
            }
            match stream.read(&mut chunk) {
                Ok(0) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(_) => return,
            }
        };

        match action {
            RouteAction::Respond(response) => {
                if write_all(&mut stream, &response).is_err() {
                    return;
                }
                buf.drain(..consumed.min(buf.len()));
            }
            RouteAction::WsStream(key) => {
                if let Err(e) = crate::hmr::run_ws_stream(stream, &key, &ctx) {
                    debug!("hmr"; "ws stream ended: {e}");
                }
                return;
            }
            RouteAction::SseStream => {
                if let Err(e) = crate::hmr::run_sse_stream(stream, &ctx) {
                    debug!("hmr"; "sse stream ended: {e}");
                }
                return;
            }
        }
    }
}

/// Loop until every byte is on the wire.
fn write_all(stream: &mut TcpStream, mut bytes: &[u8]) -> std::io::Result<()> {
    while !bytes.is_empty() {
        let n = stream.write(bytes)?;
        if n == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::WriteZero));
        }
        bytes = &bytes[n..];
    }
    Ok(())
}

fn bad_request(e: &ParseError) -> Vec<u8> {
    ResponseBuilder::new(400)
        .content_type(mime::types::PLAIN)
        .body(format!("400 Bad Request: {e}").into_bytes())
        .finish()
}

fn unavailable() -> Vec<u8> {
    ResponseBuilder::new(503)
        .content_type(mime::types::PLAIN)
        .body(b"503 Service Unavailable".to_vec())
        .finish()
}
