//! WebSocket HMR stream.
//!
//! After the upgrade, the task interleaves outbound pushes with inbound
//! frame handling on a non-blocking socket: poll the reload counter every
//! 100 ms, ping every ~30 s, answer client pings, exit on close.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::debug;
use crate::server::ServerContext;
use crate::ws::{self, Opcode};

use super::HmrEvent;

const POLL: Duration = Duration::from_millis(100);
const PING_EVERY: Duration = Duration::from_secs(30);

/// Complete the upgrade for a validated request and run the stream until
/// the client disconnects or the server shuts down.
pub fn run_ws_stream(mut stream: TcpStream, key: &str, ctx: &ServerContext) -> Result<()> {
    let accept = ws::accept_key(key);
    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\r\n"
    );
    stream.write_all(response.as_bytes())?;
    stream.write_all(&ws::text_frame(&HmrEvent::Connected.to_json()))?;
    stream.set_nonblocking(true)?;

    let mut last_counter = ctx.channel.counter();
    let mut last_ping = Instant::now();
    let mut inbuf: Vec<u8> = Vec::new();
    let mut read_chunk = [0u8; 1024];

    loop {
        if ctx.is_shutdown() {
            let _ = write_all_nb(&mut stream, &ws::close_frame());
            return Ok(());
        }

        let counter = ctx.channel.counter();
        if counter != last_counter {
            last_counter = counter;
            let event = ctx.channel.latest();
            if !event.is_empty() {
                write_all_nb(&mut stream, &ws::text_frame(&String::from_utf8_lossy(&event)))?;
            }
        }

        if last_ping.elapsed() >= PING_EVERY {
            last_ping = Instant::now();
            write_all_nb(&mut stream, &ws::ping_frame())?;
        }

        match stream.read(&mut read_chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                inbuf.extend_from_slice(&read_chunk[..n]);
                if !drain_client_frames(&mut stream, &mut inbuf)? {
                    return Ok(());
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(_) => return Ok(()),
        }

        std::thread::sleep(POLL);
    }
}

/// Parse buffered client frames. Returns false when the stream should end.
fn drain_client_frames(stream: &mut TcpStream, inbuf: &mut Vec<u8>) -> Result<bool> {
    loop {
        match ws::parse_frame(inbuf) {
            Ok(Some((frame, used))) => {
                inbuf.drain(..used);
                match frame.opcode {
                    Opcode::Ping => {
                        write_all_nb(stream, &ws::pong_frame(&frame.payload))?;
                    }
                    Opcode::Close => {
                        let _ = write_all_nb(stream, &ws::close_frame());
                        return Ok(false);
                    }
                    // Text/binary/pong from the client carry nothing we need
                    _ => {}
                }
            }
            Ok(None) => return Ok(true),
            Err(e) => {
                debug!("hmr"; "dropping client after bad frame: {e}");
                return Ok(false);
            }
        }
    }
}

/// write_all over a non-blocking socket: retry on WouldBlock.
fn write_all_nb(stream: &mut TcpStream, mut bytes: &[u8]) -> std::io::Result<()> {
    while !bytes.is_empty() {
        match stream.write(bytes) {
            Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => bytes = &bytes[n..],
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
