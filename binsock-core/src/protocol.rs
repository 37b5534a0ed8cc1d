//! WebSocket protocol constants and utilities
//!
//! This module contains the protocol definitions from RFC 6455 that a
//! non-fragmenting client needs: opcodes, frame header bits, handshake
//! values and the accept-key derivation.

/// WebSocket opcodes as defined in RFC 6455 Section 5.2
///
/// Continuation (0x0) is absent: fragmented messages decode as an unknown
/// opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Text frame
    Text = 0x1,
    /// Binary frame
    Binary = 0x2,
    /// Close frame
    Close = 0x8,
    /// Ping frame
    Ping = 0x9,
    /// Pong frame
    Pong = 0xA,
}

impl Opcode {
    /// Create an Opcode from the low nibble of the first header byte
    pub fn from(value: u8) -> Option<Self> {
        match value {
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    /// Get the numeric value of the opcode
    pub fn value(&self) -> u8 {
        *self as u8
    }

    /// Check if this is a control opcode
    pub fn is_control(&self) -> bool {
        matches!(self, Opcode::Close | Opcode::Ping | Opcode::Pong)
    }

    /// Check if this is a data opcode
    pub fn is_data(&self) -> bool {
        matches!(self, Opcode::Text | Opcode::Binary)
    }
}

/// WebSocket protocol constants
pub mod constants {
    /// WebSocket protocol version
    pub const WEBSOCKET_VERSION: &str = "13";

    /// WebSocket magic string for accept calculation
    pub const WEBSOCKET_MAGIC: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

    /// Maximum data frame payload accepted by default
    pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16MB

    /// Maximum control frame payload
    pub const MAX_CONTROL_PAYLOAD: usize = 125;

    /// WebSocket key nonce length in bytes
    pub const WEBSOCKET_KEY_LEN: usize = 16;

    /// Base64 length of an encoded key
    pub const WEBSOCKET_KEY_ENCODED_LEN: usize = 24;

    /// Maximum handshake response head size
    pub const MAX_HEADER_SIZE: usize = 8192; // 8KB

    /// Maximum number of response headers parsed
    pub const MAX_HEADERS: usize = 64;

    /// Default port for `ws://`
    pub const DEFAULT_WS_PORT: u16 = 80;

    /// Default port for `wss://`
    pub const DEFAULT_WSS_PORT: u16 = 443;
}

/// Frame header bit positions and masks
pub mod frame {
    /// FIN bit position
    pub const FIN_BIT: u8 = 0x80;

    /// RSV1, RSV2 and RSV3 bits
    pub const RSV_BITS: u8 = 0x70;

    /// Opcode mask
    pub const OPCODE_MASK: u8 = 0x0F;

    /// MASK bit position
    pub const MASK_BIT: u8 = 0x80;

    /// Payload length mask for 7-bit length
    pub const PAYLOAD_LEN_MASK: u8 = 0x7F;

    /// Extended payload length (16-bit) marker
    pub const PAYLOAD_LEN_16: u8 = 126;

    /// Extended payload length (64-bit) marker
    pub const PAYLOAD_LEN_64: u8 = 127;

    /// Masking key length
    pub const MASKING_KEY_LEN: usize = 4;
}

/// HTTP status codes used in WebSocket handshake
pub mod http_status {
    /// HTTP Switching Protocols status
    pub const SWITCHING_PROTOCOLS: u16 = 101;
}

/// HTTP header values
pub mod http_value {
    /// WebSocket upgrade value
    pub const WEBSOCKET: &str = "websocket";

    /// Upgrade connection value
    pub const UPGRADE: &str = "Upgrade";
}

/// Utility functions for WebSocket protocol operations
pub mod utils {
    use base64::{engine::general_purpose, Engine as _};
    use sha1::{Digest, Sha1};

    /// Compute the `Sec-WebSocket-Accept` value for a client key
    pub fn calculate_accept(key: &str) -> String {
        let mut hasher = Sha1::new();
        hasher.update(key.as_bytes());
        hasher.update(super::constants::WEBSOCKET_MAGIC.as_bytes());
        general_purpose::STANDARD.encode(hasher.finalize())
    }

    /// Validate WebSocket key format
    pub fn validate_key(key: &str) -> bool {
        key.len() == super::constants::WEBSOCKET_KEY_ENCODED_LEN
            && general_purpose::STANDARD
                .decode(key)
                .map(|nonce| nonce.len() == super::constants::WEBSOCKET_KEY_LEN)
                .unwrap_or(false)
    }

    /// Check if a close code may be sent on the wire
    pub fn is_valid_close_code(code: u16) -> bool {
        use crate::error::CloseCode;
        matches!(
            CloseCode::from(code),
            CloseCode::Normal
                | CloseCode::Away
                | CloseCode::ProtocolError
                | CloseCode::Unsupported
                | CloseCode::InvalidPayload
                | CloseCode::PolicyViolation
                | CloseCode::TooBig
                | CloseCode::MandatoryExtension
                | CloseCode::Internal
                | CloseCode::ServiceRestart
                | CloseCode::TryAgainLater
                | CloseCode::BadGateway
                | CloseCode::Application(_)
        )
    }
}
