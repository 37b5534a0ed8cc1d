//! # binsock
//!
//! Blocking WebSocket client that turns a stream of binary frames into a
//! plain byte stream, for media consumers that pull bytes in arbitrary
//! chunk sizes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use binsock::prelude::*;
//! use std::io::Read;
//!
//! fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let transport = TcpTransport::new(TcpConfig::default())?;
//!     let client = Client::builder(transport)
//!         .auth(AuthToken::new("secret", 42))
//!         .build()?;
//!
//!     let mut source = client.data_source(TransferStats::default());
//!     source.open("ws://127.0.0.1:8080/stream/42")?;
//!
//!     let mut media = Vec::new();
//!     source.read_to_end(&mut media)?;
//!     source.close();
//!
//!     println!("{} bytes", source.listener().bytes_transferred);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/binsock/")]

// Re-export core components
pub use binsock_core::*;

#[cfg(feature = "transport-tcp")]
pub use binsock_transport_tcp as transport_tcp;

#[cfg(feature = "client")]
pub use binsock_client as client;

#[cfg(feature = "client")]
pub use binsock_client::{BinarySocketSource, Client, ClientBuilder, ReadOutcome, Session};

/// Prelude module with common imports
pub mod prelude {
    pub use binsock_core::prelude::*;

    #[cfg(feature = "client")]
    pub use binsock_client::prelude::*;

    #[cfg(feature = "transport-tcp")]
    pub use binsock_transport_tcp::prelude::*;
}
