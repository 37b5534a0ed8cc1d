//! Byte-stream adapter
//!
//! [`BinarySocketSource`] turns the binary frames of a session into a plain
//! pull-based byte stream. Callers ask for up to `length` bytes at a time and
//! get back a [`ReadOutcome`] that says exactly what happened; frame
//! boundaries are invisible to them.
//!
//! ```rust,no_run
//! # fn demo<T: binsock_core::Transport>(client: binsock_client::Client<T>) -> binsock_core::Result<()> {
//! use binsock_client::{ReadOutcome, TransferStats};
//!
//! let mut source = client.data_source(TransferStats::default());
//! source.open("ws://media.local/stream/1")?;
//!
//! let mut buf = [0u8; 4096];
//! loop {
//!     match source.read(&mut buf, 0, 4096) {
//!         ReadOutcome::Copied(n) => { /* consume buf[..n] */ }
//!         ReadOutcome::EndOfStream => break,
//!         ReadOutcome::UnrecognizedFrame(_) => continue,
//!         ReadOutcome::Failed(err) => return Err(err),
//!     }
//! }
//! source.close();
//! # Ok(())
//! # }
//! ```

use crate::client::Client;
use crate::dispatcher::DispatcherStats;
use crate::session::{AuthStatus, Session, Teardown};
use binsock_core::transport::Transport;
use binsock_core::{Error, Frame, FrameKind, Result};
use bytes::{Buf, Bytes};
use std::io;

/// Result of one [`BinarySocketSource::read`] call
#[derive(Debug)]
pub enum ReadOutcome {
    /// This many bytes were written into the caller's buffer
    Copied(usize),
    /// The server closed the stream; every further read returns this
    EndOfStream,
    /// The next frame was not binary and carried no stream data
    UnrecognizedFrame(FrameKind),
    /// Reading failed; once a frame read has failed, every further read
    /// fails with [`Error::StreamBroken`] until the source is closed
    Failed(Error),
}

impl ReadOutcome {
    /// Bytes copied, zero for anything but [`ReadOutcome::Copied`]
    pub fn copied(&self) -> usize {
        match self {
            ReadOutcome::Copied(n) => *n,
            _ => 0,
        }
    }

    /// Check if the stream has ended
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, ReadOutcome::EndOfStream)
    }
}

/// Unread remainder of the current binary payload
#[derive(Debug, Clone, Default)]
pub struct StreamCursor {
    data: Bytes,
}

impl StreamCursor {
    /// Start reading a new payload
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    /// Bytes not yet handed out
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    /// Check if the payload is used up
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy as much as fits into `dest` and advance past it
    pub fn copy_to(&mut self, dest: &mut [u8]) -> usize {
        let n = dest.len().min(self.data.len());
        dest[..n].copy_from_slice(&self.data[..n]);
        self.data.advance(n);
        n
    }

    /// Drop whatever is left
    pub fn clear(&mut self) {
        self.data = Bytes::new();
    }
}

/// Observer of transfer progress
///
/// Every method defaults to doing nothing.
pub trait TransferListener {
    /// A stream is about to be opened
    fn on_transfer_initializing(&mut self, _url: &str) {}

    /// The stream is open and data may follow
    fn on_transfer_started(&mut self, _url: &str) {}

    /// A binary payload of `bytes` bytes arrived
    fn on_bytes_transferred(&mut self, _bytes: usize) {}

    /// The stream was closed
    fn on_transfer_ended(&mut self) {}
}

impl<L: TransferListener + ?Sized> TransferListener for &mut L {
    fn on_transfer_initializing(&mut self, url: &str) {
        (**self).on_transfer_initializing(url)
    }

    fn on_transfer_started(&mut self, url: &str) {
        (**self).on_transfer_started(url)
    }

    fn on_bytes_transferred(&mut self, bytes: usize) {
        (**self).on_bytes_transferred(bytes)
    }

    fn on_transfer_ended(&mut self) {
        (**self).on_transfer_ended()
    }
}

/// Listener that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl TransferListener for NoopListener {}

/// Listener that counts transfers and bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Streams that were opened
    pub transfers_started: u64,
    /// Streams that were closed
    pub transfers_ended: u64,
    /// Binary payload bytes received over all streams
    pub bytes_transferred: u64,
    /// URL of the stream in progress
    pub current_url: Option<String>,
}

impl TransferListener for TransferStats {
    fn on_transfer_started(&mut self, url: &str) {
        self.transfers_started += 1;
        self.current_url = Some(url.to_string());
    }

    fn on_bytes_transferred(&mut self, bytes: usize) {
        self.bytes_transferred += bytes as u64;
    }

    fn on_transfer_ended(&mut self) {
        self.transfers_ended += 1;
        self.current_url = None;
    }
}

/// Pull-based byte stream over the binary frames of one session at a time
#[derive(Debug)]
pub struct BinarySocketSource<T: Transport, L: TransferListener = NoopListener> {
    client: Client<T>,
    listener: L,
    session: Option<Session<T::Stream>>,
    cursor: StreamCursor,
    ended: bool,
}

impl<T: Transport, L: TransferListener> BinarySocketSource<T, L> {
    /// Create an unopened source
    pub fn new(client: Client<T>, listener: L) -> Self {
        Self {
            client,
            listener,
            session: None,
            cursor: StreamCursor::default(),
            ended: false,
        }
    }

    /// Connect to `url`
    pub fn open(&mut self, url: &str) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::AlreadyOpen);
        }

        self.listener.on_transfer_initializing(url);
        let session = self.client.connect(url)?;

        self.session = Some(session);
        self.cursor.clear();
        self.ended = false;
        self.listener.on_transfer_started(url);
        Ok(())
    }

    /// Copy up to `length` stream bytes into `buffer[offset..]`
    ///
    /// Blocks for at most one frame when the current payload is used up.
    /// A range reaching past the end of `buffer` is cut off at the end.
    pub fn read(&mut self, buffer: &mut [u8], offset: usize, length: usize) -> ReadOutcome {
        let start = offset.min(buffer.len());
        let end = offset.saturating_add(length).min(buffer.len());
        if start == end {
            return ReadOutcome::Copied(0);
        }

        let session = match self.session.as_mut() {
            Some(session) => session,
            None => return ReadOutcome::Failed(Error::SessionClosed),
        };

        if self.ended {
            return ReadOutcome::EndOfStream;
        }

        while self.cursor.is_empty() {
            match session.read_one() {
                Ok(Frame::Binary(data)) => {
                    if data.is_empty() {
                        continue;
                    }
                    self.listener.on_bytes_transferred(data.len());
                    self.cursor = StreamCursor::new(data);
                }
                Ok(Frame::Close { code, reason }) => {
                    log_debug!(
                        "Stream ended by server: {} {}",
                        code,
                        reason.as_deref().unwrap_or("")
                    );
                    self.ended = true;
                    return ReadOutcome::EndOfStream;
                }
                Ok(frame) => return ReadOutcome::UnrecognizedFrame(frame.kind()),
                Err(err) => return ReadOutcome::Failed(err),
            }
        }

        ReadOutcome::Copied(self.cursor.copy_to(&mut buffer[start..end]))
    }

    /// Close the current stream
    ///
    /// Returns [`Teardown::AlreadyClosed`] when nothing was open.
    pub fn close(&mut self) -> Teardown {
        let Some(mut session) = self.session.take() else {
            return Teardown::AlreadyClosed;
        };

        let teardown = session.close();
        self.cursor.clear();
        self.ended = false;
        self.listener.on_transfer_ended();
        teardown
    }

    /// Check if a stream is open
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// URL of the open stream
    pub fn uri(&self) -> Option<&str> {
        self.session.as_ref().map(Session::url)
    }

    /// Auth outcome of the open stream
    pub fn auth_status(&self) -> Option<&AuthStatus> {
        self.session.as_ref().map(Session::auth_status)
    }

    /// Frame counters of the open stream
    pub fn stats(&self) -> Option<DispatcherStats> {
        self.session.as_ref().map(Session::stats)
    }

    /// Bytes of the current payload not yet read
    pub fn buffered(&self) -> usize {
        self.cursor.remaining()
    }

    /// Get a reference to the listener
    pub fn listener(&self) -> &L {
        &self.listener
    }
}

impl<T: Transport, L: TransferListener> io::Read for BinarySocketSource<T, L> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = buf.len();
        match BinarySocketSource::read(self, buf, 0, len) {
            ReadOutcome::Copied(n) => Ok(n),
            ReadOutcome::EndOfStream => Ok(0),
            ReadOutcome::UnrecognizedFrame(kind) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected {} frame in binary stream", kind),
            )),
            ReadOutcome::Failed(err) => Err(err.into()),
        }
    }
}

impl<T: Transport, L: TransferListener> Drop for BinarySocketSource<T, L> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientBuilder;
    use crate::config::AuthToken;
    use binsock_core::transport::mock::{MockProbe, MockTransport};
    use binsock_core::ProtocolError;
    use proptest::prelude::*;
    use std::io::Read;

    const URL: &str = "ws://media.local/stream/1";

    fn source(transport: MockTransport) -> (BinarySocketSource<MockTransport, TransferStats>, MockProbe) {
        let probe = transport.probe();
        let client = Client::new(transport);
        (client.data_source(TransferStats::default()), probe)
    }

    fn opened(frames: &[Frame]) -> (BinarySocketSource<MockTransport, TransferStats>, MockProbe) {
        let (mut source, probe) = source(MockTransport::with_frames(frames));
        source.open(URL).unwrap();
        (source, probe)
    }

    fn copied(outcome: ReadOutcome) -> usize {
        match outcome {
            ReadOutcome::Copied(n) => n,
            other => panic!("expected Copied, got {:?}", other),
        }
    }

    #[test]
    fn test_chunked_reads_across_frames() {
        let (mut source, _) = opened(&[
            Frame::binary(vec![1u8, 2, 3]),
            Frame::binary(vec![4u8, 5]),
            Frame::close(1000u16, None),
        ]);
        let mut buf = [0u8; 2];

        assert_eq!(copied(source.read(&mut buf, 0, 2)), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(copied(source.read(&mut buf, 0, 2)), 1);
        assert_eq!(buf[0], 3);
        assert_eq!(copied(source.read(&mut buf, 0, 2)), 2);
        assert_eq!(buf, [4, 5]);
        assert!(source.read(&mut buf, 0, 2).is_end_of_stream());

        assert_eq!(source.listener().bytes_transferred, 5);
    }

    #[test]
    fn test_zero_length_read_does_no_io() {
        let (mut source, probe) = opened(&[Frame::binary(vec![1u8, 2, 3])]);
        let reads = probe.reads();
        let mut buf = [0u8; 8];

        assert_eq!(copied(source.read(&mut buf, 0, 0)), 0);
        assert_eq!(copied(source.read(&mut buf, 8, 4)), 0);
        assert_eq!(probe.reads(), reads);
        assert_eq!(source.stats().unwrap().frames_received, 0);
    }

    #[test]
    fn test_end_of_stream_is_sticky() {
        let (mut source, probe) = opened(&[Frame::normal_close(), Frame::binary(vec![1u8])]);
        let mut buf = [0u8; 4];

        assert!(source.read(&mut buf, 0, 4).is_end_of_stream());
        let reads = probe.reads();
        for _ in 0..3 {
            assert!(source.read(&mut buf, 0, 4).is_end_of_stream());
        }
        assert_eq!(probe.reads(), reads);
    }

    #[test]
    fn test_non_binary_frames_are_unrecognized() {
        let (mut source, _) = opened(&[
            Frame::ping(vec![1u8]),
            Frame::text("meta"),
            Frame::binary(vec![7u8]),
        ]);
        let mut buf = [0u8; 4];

        assert!(matches!(
            source.read(&mut buf, 0, 4),
            ReadOutcome::UnrecognizedFrame(FrameKind::Ping)
        ));
        assert!(matches!(
            source.read(&mut buf, 0, 4),
            ReadOutcome::UnrecognizedFrame(FrameKind::Text)
        ));
        assert_eq!(copied(source.read(&mut buf, 0, 4)), 1);
        assert_eq!(buf[0], 7);
    }

    #[test]
    fn test_empty_binary_frames_are_skipped() {
        let (mut source, _) = opened(&[
            Frame::binary(Vec::<u8>::new()),
            Frame::binary(vec![9u8]),
        ]);
        let mut buf = [0u8; 4];

        assert_eq!(copied(source.read(&mut buf, 0, 4)), 1);
        assert_eq!(buf[0], 9);
    }

    #[test]
    fn test_offset_and_clamping() {
        let (mut source, _) = opened(&[Frame::binary(vec![1u8, 2, 3, 4, 5])]);
        let mut buf = [0u8; 4];

        assert_eq!(copied(source.read(&mut buf, 2, 10)), 2);
        assert_eq!(buf, [0, 0, 1, 2]);
        assert_eq!(source.buffered(), 3);
    }

    #[test]
    fn test_read_failure() {
        let (mut source, _) = opened(&[]);
        let mut buf = [0u8; 4];
        assert!(matches!(
            source.read(&mut buf, 0, 4),
            ReadOutcome::Failed(Error::Io(_))
        ));
    }

    #[test]
    fn test_unknown_opcode_breaks_stream() {
        // the 4 payload bytes of the opcode 0x3 frame would decode as `bin :1`
        let (mut source, probe) = source(MockTransport::new(vec![
            0x83, 0x04, 0x82, 0x01, 0xAA, 0x00,
        ]));
        source.open(URL).unwrap();
        let mut buf = [0u8; 4];

        assert!(matches!(
            source.read(&mut buf, 0, 4),
            ReadOutcome::Failed(Error::Protocol(ProtocolError::UnknownOpcode(3)))
        ));
        let reads = probe.reads();
        for _ in 0..2 {
            assert!(matches!(
                source.read(&mut buf, 0, 4),
                ReadOutcome::Failed(Error::StreamBroken(_))
            ));
        }
        assert_eq!(probe.reads(), reads);
        assert_eq!(buf, [0u8; 4]);
        assert_eq!(source.listener().bytes_transferred, 0);

        assert_eq!(source.close(), Teardown::Closed);
        assert!(matches!(
            source.read(&mut buf, 0, 4),
            ReadOutcome::Failed(Error::SessionClosed)
        ));
    }

    #[test]
    fn test_oversized_frame_breaks_stream() {
        let mut payload = vec![0x82u8, 0x01, 0x55];
        payload.resize(32, 0);
        let transport = MockTransport::with_frames(&[Frame::binary(payload)]);
        let probe = transport.probe();
        let client = ClientBuilder::new(transport)
            .max_frame_size(16)
            .build()
            .unwrap();
        let mut source = client.data_source(NoopListener);
        source.open(URL).unwrap();
        let mut buf = [0u8; 4];

        assert!(matches!(
            source.read(&mut buf, 0, 4),
            ReadOutcome::Failed(Error::Protocol(ProtocolError::FrameTooLarge { size: 32, max: 16 }))
        ));
        let reads = probe.reads();
        assert!(matches!(
            source.read(&mut buf, 0, 4),
            ReadOutcome::Failed(Error::StreamBroken(_))
        ));
        assert_eq!(probe.reads(), reads);
        assert_eq!(buf, [0u8; 4]);

        let err = Read::read(&mut source, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[test]
    fn test_try_again_later_close_ends_stream() {
        let (mut source, _) = source(MockTransport::new(vec![0x88, 0x02, 0x03, 0xF5]));
        source.open(URL).unwrap();
        let mut buf = [0u8; 4];

        assert!(source.read(&mut buf, 0, 4).is_end_of_stream());
        assert!(source.read(&mut buf, 0, 4).is_end_of_stream());
    }

    #[test]
    fn test_read_before_open_and_after_close() {
        let (mut source, probe) = source(MockTransport::with_frames(&[Frame::binary(vec![1u8])]));
        let mut buf = [0u8; 4];

        assert!(matches!(
            source.read(&mut buf, 0, 4),
            ReadOutcome::Failed(Error::SessionClosed)
        ));

        source.open(URL).unwrap();
        assert_eq!(source.close(), Teardown::Closed);
        assert!(matches!(
            source.read(&mut buf, 0, 4),
            ReadOutcome::Failed(Error::SessionClosed)
        ));
        assert_eq!(probe.reads(), 0);
    }

    #[test]
    fn test_open_twice() {
        let (mut source, _) = opened(&[]);
        assert!(matches!(source.open(URL), Err(Error::AlreadyOpen)));
        assert_eq!(source.uri(), Some(URL));
    }

    #[test]
    fn test_close_notifies_once() {
        let (mut source, probe) = opened(&[Frame::binary(vec![1u8])]);
        assert_eq!(source.listener().transfers_started, 1);
        assert_eq!(source.listener().current_url.as_deref(), Some(URL));

        assert_eq!(source.close(), Teardown::Closed);
        assert_eq!(source.close(), Teardown::AlreadyClosed);

        assert_eq!(source.listener().transfers_ended, 1);
        assert_eq!(source.uri(), None);
        assert!(probe.is_shut_down());
        assert_eq!(probe.written_frames(), vec![Frame::normal_close()]);
    }

    #[test]
    fn test_failed_open_does_not_start_transfer() {
        let (mut source, _) = source(MockTransport::new(Vec::new()).with_status(404));
        assert!(source.open(URL).is_err());
        assert!(!source.is_open());
        assert_eq!(source.listener().transfers_started, 0);
        assert_eq!(source.close(), Teardown::AlreadyClosed);
        assert_eq!(source.listener().transfers_ended, 0);
    }

    #[test]
    fn test_auth_is_sent_on_open() {
        let transport = MockTransport::new(Vec::new());
        let probe = transport.probe();
        let client = ClientBuilder::new(transport)
            .auth(AuthToken::new("tok", 5))
            .build()
            .unwrap();
        let mut source = client.data_source(NoopListener);
        source.open(URL).unwrap();

        assert_eq!(source.auth_status(), Some(&AuthStatus::Sent));
        assert_eq!(
            probe.written_frames(),
            vec![Frame::text(r#"{"token":"tok","mediaId":5}"#)]
        );
    }

    #[test]
    fn test_io_read() {
        let (mut source, _) = opened(&[
            Frame::binary(vec![1u8, 2, 3]),
            Frame::binary(vec![4u8]),
            Frame::normal_close(),
        ]);
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);

        let (mut source, _) = opened(&[Frame::pong(vec![1u8])]);
        let err = Read::read(&mut source, &mut [0u8; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    proptest! {
        #[test]
        fn prop_chunking_preserves_bytes(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..12),
            chunk in 1usize..32,
        ) {
            let mut frames: Vec<Frame> = payloads.iter().cloned().map(Frame::binary).collect();
            frames.push(Frame::normal_close());
            let (mut source, _) = opened(&frames);

            let mut out = Vec::new();
            let mut buf = vec![0u8; chunk];
            loop {
                match source.read(&mut buf, 0, chunk) {
                    ReadOutcome::Copied(n) => {
                        prop_assert!(n > 0 && n <= chunk);
                        out.extend_from_slice(&buf[..n]);
                    }
                    ReadOutcome::EndOfStream => break,
                    other => return Err(TestCaseError::fail(format!("{:?}", other))),
                }
            }

            prop_assert_eq!(out, payloads.concat());
        }
    }
}
