//! binsock client
//!
//! Blocking WebSocket client that exposes the binary frames of a media
//! stream as a plain byte stream.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use binsock_client::prelude::*;
//! use std::io::Read;
//!
//! fn play<T: Transport>(transport: T) -> binsock_core::Result<Vec<u8>> {
//!     let client = Client::builder(transport)
//!         .auth(AuthToken::new("secret", 42))
//!         .build()?;
//!
//!     let mut source = client.data_source(NoopListener);
//!     source.open("ws://media.local/stream/42")?;
//!
//!     let mut media = Vec::new();
//!     source.read_to_end(&mut media)?;
//!     source.close();
//!     Ok(media)
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
#![doc(html_root_url = "https://docs.rs/binsock-client/")]

#[macro_use]
mod logging;

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod session;
pub mod source;

pub mod prelude;

pub use client::{Client, ClientBuilder};
pub use config::{AuthToken, ClientConfig};
pub use dispatcher::{DispatcherStats, FrameDispatcher};
pub use session::{AuthStatus, Session, Teardown};
pub use source::{
    BinarySocketSource, NoopListener, ReadOutcome, StreamCursor, TransferListener, TransferStats,
};
