//! # Binsock Core
//!
//! Protocol layer for the binsock WebSocket client
//!
//! This crate has no notion of sessions or I/O policy. It provides:
//!
//! - Error handling and close codes
//! - The RFC 6455 frame codec (single unfragmented frames)
//! - The client side of the opening handshake
//! - Protocol constants and utilities
//! - The blocking transport abstraction

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/binsock-core/")]

pub mod error;
pub mod frame;
pub mod handshake;
pub mod protocol;
pub mod transport;

pub mod prelude;

pub use error::{CloseCode, Error, ProtocolError, Result};
pub use frame::{Frame, FrameCodec, FrameKind, Role};
pub use handshake::{HandshakeConfig, HandshakeKey};
pub use protocol::Opcode;
pub use transport::{DuplexStream, Transport, Upgraded};
