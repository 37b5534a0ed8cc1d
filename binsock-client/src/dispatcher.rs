//! One-frame-at-a-time I/O over an upgraded stream

use binsock_core::transport::DuplexStream;
use binsock_core::{Frame, FrameCodec, Result};
use bytes::BytesMut;
use std::io::Write;

/// Frame and payload byte counters of one connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    /// Frames written
    pub frames_sent: u64,
    /// Frames decoded
    pub frames_received: u64,
    /// Payload bytes written
    pub bytes_sent: u64,
    /// Payload bytes decoded
    pub bytes_received: u64,
}

/// Reads and writes whole frames on a [`DuplexStream`]
///
/// There is no queue: every [`read_one`](Self::read_one) decodes exactly one
/// frame from the stream and hands it back.
#[derive(Debug)]
pub struct FrameDispatcher<S> {
    stream: S,
    codec: FrameCodec,
    write_buf: BytesMut,
    stats: DispatcherStats,
}

impl<S: DuplexStream> FrameDispatcher<S> {
    /// Bind a dispatcher to an upgraded stream
    pub fn new(stream: S, codec: FrameCodec) -> Self {
        Self {
            stream,
            codec,
            write_buf: BytesMut::new(),
            stats: DispatcherStats::default(),
        }
    }

    /// Block until one complete frame has been decoded
    pub fn read_one(&mut self) -> Result<Frame> {
        let frame = self.codec.decode(&mut self.stream)?;
        let len = frame.payload_len() as u64;

        self.stats.frames_received += 1;
        self.stats.bytes_received += len;

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("binsock_client_frames_received_total").increment(1);
            metrics::counter!("binsock_client_bytes_received_total").increment(len);
        }

        log_debug!("<--\t{}", frame);
        Ok(frame)
    }

    /// Encode, write and flush one frame
    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        self.write_buf.clear();
        self.codec.encode(frame, &mut self.write_buf)?;
        self.stream.write_all(&self.write_buf)?;
        self.stream.flush()?;

        let len = frame.payload_len() as u64;
        self.stats.frames_sent += 1;
        self.stats.bytes_sent += len;

        #[cfg(feature = "metrics")]
        {
            metrics::counter!("binsock_client_frames_sent_total").increment(1);
            metrics::counter!("binsock_client_bytes_sent_total").increment(len);
        }

        log_debug!("-->\t{}", frame);
        Ok(())
    }

    /// Shut the stream down
    pub fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown()?;
        Ok(())
    }

    /// Counters so far
    pub fn stats(&self) -> DispatcherStats {
        self.stats
    }

    /// Get a reference to the underlying stream
    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}
