//! Transport layer abstraction
//!
//! A [`Transport`] performs the HTTP Upgrade exchange and hands back the
//! server's response together with raw duplex access to the connection.
//! Everything above it (framing, sessions, the byte stream) only ever sees
//! [`DuplexStream`].

use crate::error::Result;
use http::{Request, Response};
use std::io::{self, Read, Write};

/// A connected, full-duplex byte stream
pub trait DuplexStream: Read + Write + Send {
    /// Shut down both directions of the stream
    ///
    /// Shutting down unblocks any pending read on the same connection.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl<S: DuplexStream + ?Sized> DuplexStream for Box<S> {
    fn shutdown(&mut self) -> io::Result<()> {
        (**self).shutdown()
    }
}

/// Result of a successful Upgrade exchange
///
/// "Successful" only means the server answered; the response still has to
/// be verified before any frame I/O.
#[derive(Debug)]
pub struct Upgraded<S> {
    /// Response head, body-less
    pub response: Response<()>,
    /// Raw connection positioned right after the response head
    pub stream: S,
}

/// Capability to open a connection and run the HTTP Upgrade exchange
pub trait Transport: Send + Sync {
    /// The stream type produced by this transport
    type Stream: DuplexStream;

    /// Send `request` and return the response head plus the raw stream
    fn upgrade(&self, request: &Request<()>) -> Result<Upgraded<Self::Stream>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    type Stream = T::Stream;

    fn upgrade(&self, request: &Request<()>) -> Result<Upgraded<Self::Stream>> {
        (**self).upgrade(request)
    }
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    type Stream = T::Stream;

    fn upgrade(&self, request: &Request<()>) -> Result<Upgraded<Self::Stream>> {
        (**self).upgrade(request)
    }
}

/// Scripted in-memory transport for tests
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use crate::frame::{Frame, FrameCodec};
    use crate::protocol::utils::calculate_accept;
    use bytes::BytesMut;
    use http::header::{CONNECTION, SEC_WEBSOCKET_ACCEPT, SEC_WEBSOCKET_KEY, UPGRADE};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Encode frames the way a server would send them
    pub fn server_bytes(frames: &[Frame]) -> Vec<u8> {
        let codec = FrameCodec::server();
        let mut buf = BytesMut::new();
        for frame in frames {
            codec
                .encode(frame, &mut buf)
                .expect("test frame must be encodable");
        }
        buf.to_vec()
    }

    /// Shared view of what happened on a mock connection
    #[derive(Debug, Clone, Default)]
    pub struct MockProbe {
        written: Arc<Mutex<Vec<u8>>>,
        reads: Arc<AtomicUsize>,
        shut_down: Arc<AtomicBool>,
        requests: Arc<Mutex<Vec<Request<()>>>>,
    }

    impl MockProbe {
        /// Raw bytes the client wrote
        pub fn written(&self) -> Vec<u8> {
            self.written.lock().unwrap().clone()
        }

        /// Frames the client wrote, unmasked
        pub fn written_frames(&self) -> Vec<Frame> {
            let written = self.written();
            let codec = FrameCodec::server();
            let mut cursor = Cursor::new(&written[..]);
            let mut frames = Vec::new();
            while (cursor.position() as usize) < written.len() {
                frames.push(codec.decode(&mut cursor).expect("client wrote a bad frame"));
            }
            frames
        }

        /// Number of `read` calls that reached the stream
        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        /// Whether the stream was shut down
        pub fn is_shut_down(&self) -> bool {
            self.shut_down.load(Ordering::SeqCst)
        }

        /// Upgrade requests received so far
        pub fn requests(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        /// Header value of the last upgrade request
        pub fn last_request_header(&self, name: &str) -> Option<String> {
            self.requests
                .lock()
                .unwrap()
                .last()
                .and_then(|request| request.headers().get(name))
                .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        }
    }

    /// In-memory stream reading from a script
    #[derive(Debug)]
    pub struct MockStream {
        inbound: Cursor<Vec<u8>>,
        fail_writes: bool,
        probe: MockProbe,
    }

    impl MockStream {
        /// Create a stream that yields `inbound` and then EOF
        pub fn new(inbound: Vec<u8>) -> Self {
            Self {
                inbound: Cursor::new(inbound),
                fail_writes: false,
                probe: MockProbe::default(),
            }
        }

        /// Make every write fail with `BrokenPipe`
        pub fn failing_writes(mut self) -> Self {
            self.fail_writes = true;
            self
        }

        /// Shared probe for this stream
        pub fn probe(&self) -> MockProbe {
            self.probe.clone()
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.probe.reads.fetch_add(1, Ordering::SeqCst);
            if self.probe.is_shut_down() {
                return Err(io::ErrorKind::NotConnected.into());
            }
            self.inbound.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes || self.probe.is_shut_down() {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            self.probe.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl DuplexStream for MockStream {
        fn shutdown(&mut self) -> io::Result<()> {
            self.probe.shut_down.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Transport answering every upgrade with a scripted response
    ///
    /// By default the response is a valid `101` for whatever key the
    /// request carried.
    #[derive(Debug)]
    pub struct MockTransport {
        inbound: Mutex<Option<Vec<u8>>>,
        status: u16,
        accept: Option<String>,
        headers: Vec<(String, String)>,
        fail_writes: bool,
        refuse: bool,
        probe: MockProbe,
    }

    impl MockTransport {
        /// Accept the upgrade; the stream then yields `inbound`
        pub fn new(inbound: Vec<u8>) -> Self {
            Self {
                inbound: Mutex::new(Some(inbound)),
                status: 101,
                accept: None,
                headers: Vec::new(),
                fail_writes: false,
                refuse: false,
                probe: MockProbe::default(),
            }
        }

        /// Accept the upgrade; the stream then yields `frames`
        pub fn with_frames(frames: &[Frame]) -> Self {
            Self::new(server_bytes(frames))
        }

        /// Answer with a different status code
        pub fn with_status(mut self, status: u16) -> Self {
            self.status = status;
            self
        }

        /// Answer with a fixed `Sec-WebSocket-Accept` value
        pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
            self.accept = Some(accept.into());
            self
        }

        /// Add a response header
        pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
            self.headers.push((name.into(), value.into()));
            self
        }

        /// Streams fail every write
        pub fn failing_writes(mut self) -> Self {
            self.fail_writes = true;
            self
        }

        /// Fail the upgrade itself with `ConnectionRefused`
        pub fn refusing(mut self) -> Self {
            self.refuse = true;
            self
        }

        /// Shared probe for the connection
        pub fn probe(&self) -> MockProbe {
            self.probe.clone()
        }
    }

    impl Transport for MockTransport {
        type Stream = MockStream;

        fn upgrade(&self, request: &Request<()>) -> Result<Upgraded<MockStream>> {
            let mut recorded = Request::builder()
                .method(request.method().clone())
                .uri(request.uri().clone())
                .body(())
                .expect("copy of a valid request");
            *recorded.headers_mut() = request.headers().clone();
            self.probe.requests.lock().unwrap().push(recorded);

            if self.refuse {
                return Err(io::Error::from(io::ErrorKind::ConnectionRefused).into());
            }

            let accept = match &self.accept {
                Some(accept) => accept.clone(),
                None => request
                    .headers()
                    .get(SEC_WEBSOCKET_KEY)
                    .and_then(|key| key.to_str().ok())
                    .map(calculate_accept)
                    .unwrap_or_default(),
            };

            let mut builder = Response::builder()
                .status(self.status)
                .header(UPGRADE, "websocket")
                .header(CONNECTION, "Upgrade")
                .header(SEC_WEBSOCKET_ACCEPT, accept);
            for (name, value) in &self.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            let response = builder.body(()).expect("scripted response must be valid");

            let inbound = self.inbound.lock().unwrap().take().unwrap_or_default();
            let mut stream = MockStream::new(inbound);
            stream.fail_writes = self.fail_writes;
            stream.probe = self.probe.clone();

            Ok(Upgraded { response, stream })
        }
    }
}
