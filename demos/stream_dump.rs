//! Stream Dump Example
//!
//! Connects to a binary WebSocket stream and copies it to a file, or to
//! stdout when no file is given.
//!
//! ```text
//! RUST_LOG=binsock_client=debug cargo run -p binsock --example stream_dump -- \
//!     ws://127.0.0.1:8080/stream/42 out.bin [token media-id]
//! ```

use binsock::prelude::*;
use std::fs::File;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .ok_or("usage: stream_dump <ws-url> [output] [token media-id]")?;
    let output = args.next().filter(|path| path != "-");
    let auth = match (args.next(), args.next()) {
        (Some(token), Some(media_id)) => Some(AuthToken::new(token, media_id.parse()?)),
        _ => None,
    };

    let transport = TcpTransport::new(TcpConfig::default())?;
    let mut builder = Client::builder(transport);
    if let Some(auth) = auth {
        builder = builder.auth(auth);
    }
    let client = builder.build()?;

    let mut source = client.data_source(TransferStats::default());
    source.open(&url)?;
    eprintln!("Connected to {}", url);

    let mut sink: Box<dyn Write> = match output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let copied = io::copy(&mut source, &mut sink)?;
    sink.flush()?;

    let teardown = source.close();
    let stats = source.listener();
    eprintln!(
        "Copied {} bytes ({} received), teardown: {:?}",
        copied, stats.bytes_transferred, teardown
    );

    Ok(())
}
