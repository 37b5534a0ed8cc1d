//! TCP Transport for binsock
//!
//! Plain `ws://` connections over blocking [`std::net::TcpStream`]s.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/binsock-transport-tcp/")]

pub mod tcp;

pub use tcp::{TcpConfig, TcpStream, TcpTransport};

/// Prelude module
pub mod prelude {
    pub use crate::tcp::{TcpConfig, TcpStream, TcpTransport};
    pub use binsock_core::transport::{DuplexStream, Transport, Upgraded};
}
