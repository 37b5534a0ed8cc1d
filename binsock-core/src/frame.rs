//! WebSocket frame model and codec
//!
//! Frames are always final: this codec neither produces nor accepts
//! fragmented messages. Decoding is blocking and pulls exactly one frame
//! from any [`std::io::Read`] per call, so the transport's own buffering is
//! the only queue between the peer and the consumer.

use crate::{
    error::{CloseCode, ProtocolError, Result},
    protocol::{constants::*, frame::*, utils, Opcode},
};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::io::Read;

/// A single, unfragmented RFC 6455 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text frame
    Text(String),
    /// Binary frame
    Binary(Bytes),
    /// Ping frame
    Ping(Bytes),
    /// Pong frame
    Pong(Bytes),
    /// Close frame
    Close {
        /// Status code, 1005 when the peer sent an empty close payload
        code: u16,
        /// Optional UTF-8 reason
        reason: Option<String>,
    },
}

impl Frame {
    /// Create a text frame
    pub fn text(content: impl Into<String>) -> Self {
        Frame::Text(content.into())
    }

    /// Create a binary frame
    pub fn binary(content: impl Into<Bytes>) -> Self {
        Frame::Binary(content.into())
    }

    /// Create a ping frame
    pub fn ping(content: impl Into<Bytes>) -> Self {
        Frame::Ping(content.into())
    }

    /// Create a pong frame
    pub fn pong(content: impl Into<Bytes>) -> Self {
        Frame::Pong(content.into())
    }

    /// Create a close frame
    pub fn close(code: impl Into<u16>, reason: Option<&str>) -> Self {
        Frame::Close {
            code: code.into(),
            reason: reason.map(str::to_owned),
        }
    }

    /// Close frame with status 1000 and no reason
    pub fn normal_close() -> Self {
        Frame::close(CloseCode::Normal, None)
    }

    /// Get the frame kind
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Text(_) => FrameKind::Text,
            Frame::Binary(_) => FrameKind::Binary,
            Frame::Ping(_) => FrameKind::Ping,
            Frame::Pong(_) => FrameKind::Pong,
            Frame::Close { .. } => FrameKind::Close,
        }
    }

    /// Get the opcode this frame is sent with
    pub fn opcode(&self) -> Opcode {
        match self {
            Frame::Text(_) => Opcode::Text,
            Frame::Binary(_) => Opcode::Binary,
            Frame::Ping(_) => Opcode::Ping,
            Frame::Pong(_) => Opcode::Pong,
            Frame::Close { .. } => Opcode::Close,
        }
    }

    /// Check if this is a control frame
    pub fn is_control(&self) -> bool {
        self.opcode().is_control()
    }

    /// Length of the payload as it appears on the wire
    pub fn payload_len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(data) | Frame::Ping(data) | Frame::Pong(data) => data.len(),
            Frame::Close { reason, .. } => 2 + reason.as_ref().map_or(0, String::len),
        }
    }

    fn payload(&self) -> Result<Bytes> {
        let payload = match self {
            Frame::Text(text) => Bytes::copy_from_slice(text.as_bytes()),
            Frame::Binary(data) | Frame::Ping(data) | Frame::Pong(data) => data.clone(),
            Frame::Close { code, reason } => {
                if !utils::is_valid_close_code(*code) {
                    return Err(ProtocolError::InvalidCloseCode(*code).into());
                }
                let mut payload = BytesMut::with_capacity(self.payload_len());
                payload.put_u16(*code);
                if let Some(reason) = reason {
                    payload.put_slice(reason.as_bytes());
                }
                payload.freeze()
            }
        };

        if self.is_control() && payload.len() > MAX_CONTROL_PAYLOAD {
            return Err(ProtocolError::ControlFrameTooLarge(payload.len()).into());
        }
        Ok(payload)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Text(text) => write!(f, "{}", text),
            Frame::Binary(data) => write!(f, "bin :{}", data.len()),
            Frame::Ping(data) => write!(f, "ping:{}", data.len()),
            Frame::Pong(data) => write!(f, "pong:{}", data.len()),
            Frame::Close { code, reason } => match reason.as_deref() {
                Some(reason) if !reason.is_empty() => write!(f, "close:{} {}", code, reason),
                _ => write!(f, "close:{}", code),
            },
        }
    }
}

/// Frame kind for easier matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Text frame
    Text,
    /// Binary frame
    Binary,
    /// Close frame
    Close,
    /// Ping frame
    Ping,
    /// Pong frame
    Pong,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameKind::Text => "text",
            FrameKind::Binary => "binary",
            FrameKind::Close => "close",
            FrameKind::Ping => "ping",
            FrameKind::Pong => "pong",
        };
        f.write_str(name)
    }
}

/// Which end of the connection a codec speaks for
///
/// Clients mask what they send and reject masked input; servers do the
/// opposite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Client side
    Client,
    /// Server side
    Server,
}

/// Stateless frame encoder/decoder
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    role: Role,
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec for the given role with the default frame size limit
    pub fn new(role: Role) -> Self {
        Self {
            role,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Client-side codec
    pub fn client() -> Self {
        Self::new(Role::Client)
    }

    /// Server-side codec
    pub fn server() -> Self {
        Self::new(Role::Server)
    }

    /// Set the largest data payload accepted by [`FrameCodec::decode`]
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Codec role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Maximum accepted data payload
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Serialize a frame, masking it with a fresh random key when acting
    /// as a client
    pub fn encode(&self, frame: &Frame, buf: &mut BytesMut) -> Result<()> {
        let mask = match self.role {
            Role::Client => Some(rand::random::<[u8; MASKING_KEY_LEN]>()),
            Role::Server => None,
        };
        write_frame(frame, mask, buf)
    }

    /// Serialize a frame masked with the given key, regardless of role
    pub fn encode_masked(&self, frame: &Frame, mask: [u8; 4], buf: &mut BytesMut) -> Result<()> {
        write_frame(frame, Some(mask), buf)
    }

    /// Block until one complete frame has been read from `reader`
    ///
    /// End of input before or inside a frame surfaces as an
    /// [`std::io::ErrorKind::UnexpectedEof`] I/O error.
    pub fn decode<R: Read + ?Sized>(&self, reader: &mut R) -> Result<Frame> {
        let mut head = [0u8; 2];
        reader.read_exact(&mut head)?;

        let first_byte = head[0];
        if first_byte & FIN_BIT == 0 {
            return Err(ProtocolError::FragmentedFrame.into());
        }
        if first_byte & RSV_BITS != 0 {
            return Err(ProtocolError::ReservedBitsSet.into());
        }
        let opcode = Opcode::from(first_byte & OPCODE_MASK)
            .ok_or(ProtocolError::UnknownOpcode(first_byte & OPCODE_MASK))?;

        let second_byte = head[1];
        let masked = second_byte & MASK_BIT != 0;
        match (self.role, masked) {
            (Role::Client, true) => return Err(ProtocolError::UnexpectedMask.into()),
            (Role::Server, false) => return Err(ProtocolError::MissingMask.into()),
            _ => {}
        }

        let payload_len = match second_byte & PAYLOAD_LEN_MASK {
            PAYLOAD_LEN_16 => {
                let mut len = [0u8; 2];
                reader.read_exact(&mut len)?;
                u16::from_be_bytes(len) as u64
            }
            PAYLOAD_LEN_64 => {
                let mut len = [0u8; 8];
                reader.read_exact(&mut len)?;
                u64::from_be_bytes(len)
            }
            len => len as u64,
        };

        if opcode.is_control() {
            if payload_len > MAX_CONTROL_PAYLOAD as u64 {
                return Err(ProtocolError::ControlFrameTooLarge(payload_len as usize).into());
            }
        } else if payload_len > self.max_frame_size as u64 {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: self.max_frame_size,
            }
            .into());
        }

        let mask = if masked {
            let mut mask = [0u8; MASKING_KEY_LEN];
            reader.read_exact(&mut mask)?;
            Some(mask)
        } else {
            None
        };

        let mut payload = vec![0u8; payload_len as usize];
        reader.read_exact(&mut payload)?;
        if let Some(mask) = mask {
            apply_mask(&mut payload, mask);
        }

        build_frame(opcode, payload)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::client()
    }
}

fn write_frame(frame: &Frame, mask: Option<[u8; 4]>, buf: &mut BytesMut) -> Result<()> {
    let payload = frame.payload()?;
    let payload_len = payload.len();

    buf.reserve(2 + 8 + MASKING_KEY_LEN + payload_len);
    buf.put_u8(FIN_BIT | frame.opcode().value());

    let mask_bit = if mask.is_some() { MASK_BIT } else { 0 };
    if payload_len < PAYLOAD_LEN_16 as usize {
        buf.put_u8(mask_bit | payload_len as u8);
    } else if payload_len <= u16::MAX as usize {
        buf.put_u8(mask_bit | PAYLOAD_LEN_16);
        buf.put_u16(payload_len as u16);
    } else {
        buf.put_u8(mask_bit | PAYLOAD_LEN_64);
        buf.put_u64(payload_len as u64);
    }

    if let Some(mask) = mask {
        buf.put_slice(&mask);
    }
    let start = buf.len();
    buf.put_slice(&payload);
    if let Some(mask) = mask {
        apply_mask(&mut buf[start..], mask);
    }
    Ok(())
}

fn build_frame(opcode: Opcode, payload: Vec<u8>) -> Result<Frame> {
    let frame = match opcode {
        Opcode::Text => {
            Frame::Text(String::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?)
        }
        Opcode::Binary => Frame::Binary(Bytes::from(payload)),
        Opcode::Ping => Frame::Ping(Bytes::from(payload)),
        Opcode::Pong => Frame::Pong(Bytes::from(payload)),
        Opcode::Close => match payload.len() {
            0 => Frame::Close {
                code: CloseCode::NoStatus.code(),
                reason: None,
            },
            1 => return Err(ProtocolError::InvalidClosePayload(1).into()),
            _ => {
                let code = u16::from_be_bytes([payload[0], payload[1]]);
                if !utils::is_valid_close_code(code) {
                    return Err(ProtocolError::InvalidCloseCode(code).into());
                }
                let reason = std::str::from_utf8(&payload[2..])
                    .map_err(|_| ProtocolError::InvalidUtf8)?;
                Frame::Close {
                    code,
                    reason: (!reason.is_empty()).then(|| reason.to_owned()),
                }
            }
        },
    };
    Ok(frame)
}

/// XOR `data` in place with `mask`, cycling every four bytes
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % MASKING_KEY_LEN];
    }
}
