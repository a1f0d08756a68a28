//! Server-Sent Events HMR stream.
//!
//! The fallback transport for clients whose WebSocket connection failed.
//! Same 100 ms polling loop as the WebSocket stream; events go out as
//! `data:` lines, heartbeats as comment lines.

use std::io::Write;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::http::ResponseBuilder;
use crate::mime;
use crate::server::ServerContext;

const POLL: Duration = Duration::from_millis(100);
const PING_EVERY: Duration = Duration::from_secs(30);

/// Send the stream head and push events until the client goes away or the
/// server shuts down. A write error just means the browser closed the tab.
pub fn run_sse_stream(mut stream: TcpStream, ctx: &ServerContext) -> Result<()> {
    let head = ResponseBuilder::new(200)
        .content_type(mime::types::EVENT_STREAM)
        .header("Cache-Control", "no-cache")
        .header("Connection", "keep-alive")
        .finish_stream_head();
    stream.write_all(&head)?;

    let mut last_counter = ctx.channel.counter();
    let mut last_ping = Instant::now();

    loop {
        if ctx.is_shutdown() {
            return Ok(());
        }

        let counter = ctx.channel.counter();
        if counter != last_counter {
            last_counter = counter;
            let event = ctx.channel.latest();
            if !event.is_empty() {
                stream.write_all(b"data: ")?;
                stream.write_all(&event)?;
                stream.write_all(b"\n\n")?;
            }
        }

        if last_ping.elapsed() >= PING_EVERY {
            last_ping = Instant::now();
            stream.write_all(b": ping\n\n")?;
        }

        std::thread::sleep(POLL);
    }
}
