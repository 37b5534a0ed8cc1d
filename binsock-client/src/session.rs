//! Session lifecycle
//!
//! A [`Session`] is one upgraded connection: it is created open by
//! [`Session::open`] and ends with [`Session::close`] (or drop). There is
//! no way back from closed.

use crate::config::{AuthToken, ClientConfig};
use crate::dispatcher::{DispatcherStats, FrameDispatcher};
use binsock_core::handshake::{build_request, verify_response};
use binsock_core::transport::{DuplexStream, Transport, Upgraded};
use binsock_core::{CloseCode, Error, Frame, FrameCodec, Result};

/// What happened to the authentication message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    /// No token was configured, or the media is public
    NotRequested,
    /// The auth frame was written
    Sent,
    /// Writing the auth frame failed; the session stayed open
    Failed(String),
}

/// How a call to [`Session::close`] went
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Close frame written and stream released
    Closed,
    /// Stream released, but the close frame could not be written
    CloseFrameNotSent,
    /// The session was already closed; nothing was done
    AlreadyClosed,
}

/// An open WebSocket connection
#[derive(Debug)]
pub struct Session<S: DuplexStream> {
    dispatcher: FrameDispatcher<S>,
    url: String,
    open: bool,
    broken: Option<String>,
    auth: AuthStatus,
}

impl<S: DuplexStream> Session<S> {
    /// Run the handshake against `url` and bind the resulting stream
    ///
    /// When `auth` is present and requires it, one text frame carrying the
    /// JSON auth message is written before returning. Failing to write it
    /// does not fail the open; see [`Session::auth_status`].
    #[cfg_attr(
        feature = "logging",
        tracing::instrument(level = "debug", skip_all, fields(url = %url))
    )]
    pub fn open<T>(
        transport: &T,
        url: &str,
        config: &ClientConfig,
        auth: Option<&AuthToken>,
    ) -> Result<Self>
    where
        T: Transport<Stream = S> + ?Sized,
    {
        config.validate()?;

        let (request, key) = build_request(url, &config.handshake())?;
        log_trace!("Sending upgrade request with key {}", key.key());

        let Upgraded {
            response,
            mut stream,
        } = transport.upgrade(&request)?;

        if let Err(err) = verify_response(&response, &key) {
            log_warn!("Handshake with {} rejected: {}", url, err);
            let _ = stream.shutdown();
            return Err(err.into());
        }

        let codec = FrameCodec::client().with_max_frame_size(config.max_frame_size);
        let mut session = Self {
            dispatcher: FrameDispatcher::new(stream, codec),
            url: url.to_string(),
            open: true,
            broken: None,
            auth: AuthStatus::NotRequested,
        };

        log_info!("WEBSOCKET OPENED {}", url);

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("binsock_client_sessions_opened_total").increment(1);
        }

        if let Some(token) = auth.filter(|token| token.is_required()) {
            session.auth = match session.send_auth(token) {
                Ok(()) => AuthStatus::Sent,
                Err(err) => {
                    log_warn!("Failed to send auth message: {}", err);
                    AuthStatus::Failed(err.to_string())
                }
            };
        }

        Ok(session)
    }

    fn send_auth(&mut self, token: &AuthToken) -> Result<()> {
        let json = token.to_json()?;
        self.dispatcher.write(&Frame::text(json))
    }

    /// Block until the next frame arrives
    ///
    /// The first failure leaves the stream at an unknown position inside a
    /// frame, so every later call fails with [`Error::StreamBroken`] without
    /// touching the transport. Writing and closing still work.
    pub fn read_one(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(Error::SessionClosed);
        }
        if let Some(reason) = &self.broken {
            return Err(Error::StreamBroken(reason.clone()));
        }

        match self.dispatcher.read_one() {
            Ok(frame) => Ok(frame),
            Err(err) => {
                log_error!("Read from {} failed: {}", self.url, err);
                self.broken = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Write one frame
    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        if !self.open {
            return Err(Error::SessionClosed);
        }
        self.dispatcher.write(frame)
    }

    /// Send a normal close and release the stream
    ///
    /// Only the first call does anything.
    #[cfg_attr(
        feature = "logging",
        tracing::instrument(level = "debug", skip_all, fields(url = %self.url))
    )]
    pub fn close(&mut self) -> Teardown {
        if !self.open {
            return Teardown::AlreadyClosed;
        }
        self.open = false;

        let teardown = match self.dispatcher.write(&Frame::close(CloseCode::Normal, None)) {
            Ok(()) => Teardown::Closed,
            Err(err) => {
                log_warn!("Failed to send close frame: {}", err);
                Teardown::CloseFrameNotSent
            }
        };

        if let Err(err) = self.dispatcher.shutdown() {
            log_debug!("Stream shutdown failed: {}", err);
        }

        log_info!("WEBSOCKET CLOSED {}", self.url);

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("binsock_client_sessions_closed_total").increment(1);
        }

        teardown
    }

    /// Whether `close` has not been called yet
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether a read has failed and no more frames can be read
    pub fn is_broken(&self) -> bool {
        self.broken.is_some()
    }

    /// URL this session was opened with
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Outcome of the auth message
    pub fn auth_status(&self) -> &AuthStatus {
        &self.auth
    }

    /// Frame counters of the connection
    pub fn stats(&self) -> DispatcherStats {
        self.dispatcher.stats()
    }
}

impl<S: DuplexStream> Drop for Session<S> {
    fn drop(&mut self) {
        if self.open {
            self.close();
        }
    }
}
