//! Prelude module for binsock-client
//!
//! This module re-exports commonly used types and traits to make them
//! easily accessible for users of the library.

pub use crate::client::{Client, ClientBuilder};
pub use crate::config::{AuthToken, ClientConfig};
pub use crate::session::{AuthStatus, Session, Teardown};
pub use crate::source::{
    BinarySocketSource, NoopListener, ReadOutcome, TransferListener, TransferStats,
};

pub use binsock_core::prelude::*;
