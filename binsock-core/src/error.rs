//! Error types for binsock
//!
//! Handshake and framing violations are [`ProtocolError`]s, transport
//! failures are plain [`std::io::Error`]s, and use-after-close is its own
//! variant so callers can tell a programming error from a dropped peer.

#![allow(missing_docs)]

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for binsock operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    /// Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The URL cannot be used for a WebSocket connection
    #[error("Invalid WebSocket URI: {0}")]
    InvalidUri(String),

    /// Operation attempted on a closed session
    #[error("Session is closed")]
    SessionClosed,

    /// Open attempted on a source that is already open
    #[error("Session is already open")]
    AlreadyOpen,

    /// An earlier read failed part way through a frame; nothing more can be
    /// read from this session
    #[error("Stream is broken after an earlier read failure: {0}")]
    StreamBroken(String),
}

impl Error {
    /// Check if this error came from the peer violating the protocol
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Check if this error is a transport failure
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            Error::Protocol(err) => io::Error::new(io::ErrorKind::InvalidData, err),
            Error::SessionClosed => io::Error::new(io::ErrorKind::NotConnected, Error::SessionClosed),
            Error::StreamBroken(reason) => {
                io::Error::new(io::ErrorKind::ConnectionAborted, Error::StreamBroken(reason))
            }
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

/// WebSocket protocol violations, raised during the handshake or while
/// decoding a frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// `Connection` header missing or not `Upgrade`
    #[error("Expected 'Connection' header value 'Upgrade' but was {0:?}")]
    BadConnectionHeader(Option<String>),

    /// `Upgrade` header missing or not `websocket`
    #[error("Expected 'Upgrade' header value 'websocket' but was {0:?}")]
    BadUpgradeHeader(Option<String>),

    /// `Sec-WebSocket-Accept` does not match the key we sent
    #[error("Expected 'Sec-WebSocket-Accept' header value '{expected}' but was {received:?}")]
    BadAcceptKey {
        expected: String,
        received: Option<String>,
    },

    /// The server negotiated an extension this client never offered
    #[error("Server negotiated unsupported extension: {0}")]
    UnsupportedExtension(String),

    /// Unexpected HTTP status
    #[error("Expected HTTP 101 response but was {0}")]
    UnexpectedStatus(u16),

    /// Malformed HTTP response head
    #[error("Malformed handshake response: {0}")]
    MalformedResponse(String),

    /// Handshake response head exceeds the size limit
    #[error("Handshake response head exceeds {max} bytes")]
    HeaderTooLarge { max: usize },

    /// Server frame carried a masking key
    #[error("Server frames must not be masked")]
    UnexpectedMask,

    /// Client frame carried no masking key
    #[error("Client frames must be masked")]
    MissingMask,

    /// Opcode outside the supported set
    #[error("Unknown opcode: {0:#x}")]
    UnknownOpcode(u8),

    /// Control frame payload over 125 bytes
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Data frame payload over the configured limit
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: u64, max: usize },

    /// FIN bit unset
    #[error("Fragmented frames are not supported")]
    FragmentedFrame,

    /// Reserved bits set in frame
    #[error("Reserved bits set in frame")]
    ReservedBitsSet,

    /// Text frame or close reason is not valid UTF-8
    #[error("Invalid UTF-8 in frame payload")]
    InvalidUtf8,

    /// Close code that may not appear on the wire
    #[error("Invalid close code: {0}")]
    InvalidCloseCode(u16),

    /// Close payload of exactly one byte
    #[error("Close frame payload must be empty or at least 2 bytes, was {0}")]
    InvalidClosePayload(usize),
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// WebSocket close codes as defined in RFC 6455
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Normal closure
    Normal,
    /// Going away
    Away,
    /// Protocol error
    ProtocolError,
    /// Unsupported data
    Unsupported,
    /// No status received
    NoStatus,
    /// Abnormal closure
    Abnormal,
    /// Invalid frame payload data
    InvalidPayload,
    /// Policy violation
    PolicyViolation,
    /// Message too big
    TooBig,
    /// Mandatory extension
    MandatoryExtension,
    /// Internal server error
    Internal,
    /// Service restart
    ServiceRestart,
    /// Try again later
    TryAgainLater,
    /// Bad gateway
    BadGateway,
    /// TLS handshake failure
    TlsHandshake,
    /// Application-specific close code (3000-4999)
    Application(u16),
    /// Anything else seen on the wire
    Other(u16),
}

impl CloseCode {
    /// Create a CloseCode from a u16
    pub fn from(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::ProtocolError,
            1003 => CloseCode::Unsupported,
            1005 => CloseCode::NoStatus,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::InvalidPayload,
            1008 => CloseCode::PolicyViolation,
            1009 => CloseCode::TooBig,
            1010 => CloseCode::MandatoryExtension,
            1011 => CloseCode::Internal,
            1012 => CloseCode::ServiceRestart,
            1013 => CloseCode::TryAgainLater,
            1014 => CloseCode::BadGateway,
            1015 => CloseCode::TlsHandshake,
            code if (3000..=4999).contains(&code) => CloseCode::Application(code),
            code => CloseCode::Other(code),
        }
    }

    /// Get the numeric value of the close code
    pub fn code(&self) -> u16 {
        match self {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::NoStatus => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::TooBig => 1009,
            CloseCode::MandatoryExtension => 1010,
            CloseCode::Internal => 1011,
            CloseCode::ServiceRestart => 1012,
            CloseCode::TryAgainLater => 1013,
            CloseCode::BadGateway => 1014,
            CloseCode::TlsHandshake => 1015,
            CloseCode::Application(code) | CloseCode::Other(code) => *code,
        }
    }

    /// Check if this code may never appear on the wire
    pub fn is_reserved(&self) -> bool {
        matches!(
            self,
            CloseCode::NoStatus | CloseCode::Abnormal | CloseCode::TlsHandshake
        )
    }

    /// Check if this close code indicates an error
    pub fn is_error(&self) -> bool {
        !matches!(self, CloseCode::Normal | CloseCode::Away)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> u16 {
        code.code()
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}
