//! Session layer stand-in: JSON lines in, room output out

pub mod handler;
pub mod protocol;

pub use handler::{run_stdio, serve};
pub use protocol::{ClientMsg, ProtocolError, ServerMsg};
