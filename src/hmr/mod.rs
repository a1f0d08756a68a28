//! Hot-module-reload signaling.
//!
//! The watcher publishes classified change events into a shared slot and
//! bumps an atomic counter; WebSocket and SSE stream tasks poll the
//! counter and deliver the latest event to connected browsers. Readers
//! pull from the slot — the watcher never calls into the server.

mod channel;
mod event;
mod sse;
mod ws;

pub use channel::HmrChannel;
pub use event::HmrEvent;
pub use sse::run_sse_stream;
pub use ws::run_ws_stream;
