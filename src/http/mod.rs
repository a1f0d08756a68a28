//! HTTP/1.1 request parsing and response serialization.
//!
//! The parser is zero-copy: every string in a parsed [`Request`] is a
//! subslice of the connection's receive buffer and is valid only until the
//! next read on that connection.

mod parser;
mod response;

pub use parser::{Method, ParseError, Request, parse};
pub use response::ResponseBuilder;
