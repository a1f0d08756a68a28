//! WebSocket support: RFC 6455 framing and the HTTP upgrade handshake.

mod frame;
mod handshake;

pub use frame::{Frame, FrameError, Opcode, close_frame, parse_frame, ping_frame, pong_frame, text_frame};
pub use handshake::{accept_key, validate_upgrade};
