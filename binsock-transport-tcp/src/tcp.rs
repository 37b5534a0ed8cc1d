//! TCP transport implementation for binsock
//!
//! This module provides the blocking TCP transport for `ws://` URLs. TLS is
//! not handled here, so `wss://` URLs are refused.

use binsock_core::error::ConfigError;
use binsock_core::handshake::{parse_response, port_of, write_request};
use binsock_core::transport::{DuplexStream, Transport, Upgraded};
use binsock_core::{Error, Result};
use bytes::{Buf, Bytes, BytesMut};
use http::Request;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream as StdTcpStream, ToSocketAddrs};
use std::time::Duration;

const READ_CHUNK: usize = 1024;

/// Socket options applied to every connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    /// Connect timeout per resolved address, `None` blocks
    pub connect_timeout: Option<Duration>,
    /// Read timeout, `None` blocks
    pub read_timeout: Option<Duration>,
    /// Write timeout, `None` blocks
    pub write_timeout: Option<Duration>,
    /// Disable Nagle's algorithm
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(10)),
            read_timeout: None,
            write_timeout: None,
            nodelay: true,
        }
    }
}

impl TcpConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("connect_timeout", self.connect_timeout),
            ("read_timeout", self.read_timeout),
            ("write_timeout", self.write_timeout),
        ];
        for (field, timeout) in timeouts {
            if timeout.map_or(false, |timeout| timeout.is_zero()) {
                return Err(Error::Config(ConfigError::Validation(format!(
                    "{} must be greater than 0",
                    field
                ))));
            }
        }
        Ok(())
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Enable/disable `TCP_NODELAY`
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }
}

/// TCP transport implementation
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: TcpConfig,
}

impl TcpTransport {
    /// Create a new TCP transport
    pub fn new(config: TcpConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the socket options
    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    fn connect(&self, host: &str, port: u16) -> Result<StdTcpStream> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            let attempt = match self.config.connect_timeout {
                Some(timeout) => StdTcpStream::connect_timeout(&addr, timeout),
                None => StdTcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(err) => last_err = Some(err),
            }
        }

        Err(last_err
            .unwrap_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{} did not resolve to any address", host),
                )
            })
            .into())
    }
}

impl Transport for TcpTransport {
    type Stream = TcpStream;

    fn upgrade(&self, request: &Request<()>) -> Result<Upgraded<TcpStream>> {
        let uri = request.uri();
        if uri.scheme_str() != Some("ws") {
            return Err(Error::InvalidUri(format!(
                "{} needs a TLS transport, plain TCP only serves ws://",
                uri
            )));
        }
        let host = uri
            .host()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']'))
            .ok_or_else(|| Error::InvalidUri(format!("missing host in {}", uri)))?;

        let mut stream = self.connect(host, port_of(uri))?;
        stream.set_read_timeout(self.config.read_timeout)?;
        stream.set_write_timeout(self.config.write_timeout)?;
        stream.set_nodelay(self.config.nodelay)?;

        let mut head = BytesMut::new();
        write_request(request, &mut head);
        stream.write_all(&head)?;
        stream.flush()?;

        let mut buf = BytesMut::with_capacity(READ_CHUNK);
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed during handshake",
                )
                .into());
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some((response, consumed)) = parse_response(&buf)? {
                buf.advance(consumed);
                return Ok(Upgraded {
                    response,
                    stream: TcpStream::new(stream, buf.freeze()),
                });
            }
        }
    }
}

/// Upgraded TCP connection
///
/// Bytes the server sent right behind the response head are read first.
#[derive(Debug)]
pub struct TcpStream {
    inner: StdTcpStream,
    pending: Bytes,
}

impl TcpStream {
    fn new(inner: StdTcpStream, pending: Bytes) -> Self {
        Self { inner, pending }
    }

    /// Remote address
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.peer_addr()?)
    }

    /// Local address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.inner.local_addr()?)
    }

    /// Get a reference to the socket
    pub fn get_ref(&self) -> &StdTcpStream {
        &self.inner
    }
}

impl Read for TcpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return self.inner.read(buf);
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}

impl Write for TcpStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl DuplexStream for TcpStream {
    fn shutdown(&mut self) -> io::Result<()> {
        self.pending.clear();
        match self.inner.shutdown(Shutdown::Both) {
            Err(err) if err.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}
