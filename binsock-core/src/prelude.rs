//! Prelude module for binsock-core
//!
//! Re-exports the types most code touching frames or transports needs.

pub use crate::error::{CloseCode, Error, ProtocolError, Result};
pub use crate::frame::{Frame, FrameCodec, FrameKind, Role};
pub use crate::handshake::{HandshakeConfig, HandshakeKey};
pub use crate::protocol::Opcode;
pub use crate::transport::{DuplexStream, Transport, Upgraded};

pub use bytes::{Bytes, BytesMut};
