//! WebSocket opening handshake, client side
//!
//! [`build_request`] produces the HTTP Upgrade request together with the
//! [`HandshakeKey`] it was built from; [`verify_response`] checks the
//! server's answer against that key as described in RFC 6455 section 4.1.
//! The raw-wire helpers at the bottom are for transports that speak HTTP/1.1
//! themselves.

use crate::error::{ConfigError, Error, ProtocolError, Result};
use crate::protocol::constants::*;
use crate::protocol::http_status::SWITCHING_PROTOCOLS;
use crate::protocol::{http_value, utils};
use base64::{engine::general_purpose, Engine as _};
use bytes::{BufMut, BytesMut};
use http::header::{
    HeaderMap, HeaderName, HeaderValue, CONNECTION, HOST, ORIGIN, SEC_WEBSOCKET_ACCEPT,
    SEC_WEBSOCKET_EXTENSIONS, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_PROTOCOL, SEC_WEBSOCKET_VERSION,
    UPGRADE, USER_AGENT,
};
use http::{Method, Request, Response, Uri};
use rand::RngCore;

/// The `Sec-WebSocket-Key` sent with one connection attempt and the
/// accept value the server must answer with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeKey {
    key: String,
    accept: String,
}

impl HandshakeKey {
    /// Fresh key from a random 16-byte nonce
    pub fn generate() -> Self {
        let mut nonce = [0u8; WEBSOCKET_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self::from_nonce(nonce)
    }

    /// Key derived from a caller-chosen nonce
    pub fn from_nonce(nonce: [u8; WEBSOCKET_KEY_LEN]) -> Self {
        let key = general_purpose::STANDARD.encode(nonce);
        let accept = utils::calculate_accept(&key);
        Self { key, accept }
    }

    /// Base64 value of the `Sec-WebSocket-Key` header
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value the server must send back in `Sec-WebSocket-Accept`
    pub fn expected_accept(&self) -> &str {
        &self.accept
    }
}

/// Optional request headers
#[derive(Debug, Clone, Default)]
pub struct HandshakeConfig {
    /// `Origin` header
    pub origin: Option<String>,
    /// `User-Agent` header
    pub user_agent: Option<String>,
    /// Subprotocols offered in `Sec-WebSocket-Protocol`
    pub protocols: Vec<String>,
    /// Additional headers, appended last
    pub extra_headers: Vec<(String, String)>,
}

/// Build an Upgrade request for `url` with a freshly generated key
pub fn build_request(url: &str, config: &HandshakeConfig) -> Result<(Request<()>, HandshakeKey)> {
    let key = HandshakeKey::generate();
    let request = build_request_with_key(url, &key, config)?;
    Ok((request, key))
}

/// Build an Upgrade request for `url` carrying the given key
pub fn build_request_with_key(
    url: &str,
    key: &HandshakeKey,
    config: &HandshakeConfig,
) -> Result<Request<()>> {
    let uri = parse_ws_uri(url)?;
    let host = match (uri.host(), uri.port_u16()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(Error::InvalidUri(format!("missing host in {}", url))),
    };

    let mut builder = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(HOST, host)
        .header(UPGRADE, http_value::WEBSOCKET)
        .header(CONNECTION, http_value::UPGRADE)
        .header(SEC_WEBSOCKET_KEY, key.key())
        .header(SEC_WEBSOCKET_VERSION, WEBSOCKET_VERSION);

    if let Some(origin) = &config.origin {
        builder = builder.header(ORIGIN, origin.as_str());
    }

    if let Some(user_agent) = &config.user_agent {
        builder = builder.header(USER_AGENT, user_agent.as_str());
    }

    if !config.protocols.is_empty() {
        builder = builder.header(SEC_WEBSOCKET_PROTOCOL, config.protocols.join(", "));
    }

    for (name, value) in &config.extra_headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder.body(()).map_err(|err| {
        Error::Config(ConfigError::InvalidValue {
            field: "headers".to_string(),
            value: err.to_string(),
        })
    })
}

/// Parse and check a `ws://` or `wss://` URL
pub fn parse_ws_uri(url: &str) -> Result<Uri> {
    let uri: Uri = url
        .parse()
        .map_err(|err: http::uri::InvalidUri| Error::InvalidUri(format!("{}: {}", url, err)))?;

    match uri.scheme_str() {
        Some("ws") | Some("wss") => {}
        _ => return Err(Error::InvalidUri(format!("unsupported scheme in {}", url))),
    }
    if uri.host().map_or(true, str::is_empty) {
        return Err(Error::InvalidUri(format!("missing host in {}", url)));
    }
    Ok(uri)
}

/// Default port for a parsed WebSocket URI
pub fn port_of(uri: &Uri) -> u16 {
    uri.port_u16().unwrap_or(match uri.scheme_str() {
        Some("wss") => DEFAULT_WSS_PORT,
        _ => DEFAULT_WS_PORT,
    })
}

/// Check the server's response headers against `key`
///
/// The checks run in a fixed order and the first failure wins:
/// `Connection`, `Upgrade`, `Sec-WebSocket-Accept`, then extensions. No
/// extension is ever offered, so any negotiated one is rejected.
pub fn verify(headers: &HeaderMap, key: &HandshakeKey) -> std::result::Result<(), ProtocolError> {
    let connection = header_string(headers, &CONNECTION);
    if !connection
        .as_deref()
        .is_some_and(|value| value.eq_ignore_ascii_case(http_value::UPGRADE))
    {
        return Err(ProtocolError::BadConnectionHeader(connection));
    }

    let upgrade = header_string(headers, &UPGRADE);
    if !upgrade
        .as_deref()
        .is_some_and(|value| value.eq_ignore_ascii_case(http_value::WEBSOCKET))
    {
        return Err(ProtocolError::BadUpgradeHeader(upgrade));
    }

    let accept = header_string(headers, &SEC_WEBSOCKET_ACCEPT);
    if accept.as_deref() != Some(key.expected_accept()) {
        return Err(ProtocolError::BadAcceptKey {
            expected: key.expected_accept().to_string(),
            received: accept,
        });
    }

    if let Some(extensions) = header_string(headers, &SEC_WEBSOCKET_EXTENSIONS) {
        if !extensions.trim().is_empty() {
            return Err(ProtocolError::UnsupportedExtension(extensions));
        }
    }

    Ok(())
}

/// Check the status line, then the headers, of a handshake response
pub fn verify_response(
    response: &Response<()>,
    key: &HandshakeKey,
) -> std::result::Result<(), ProtocolError> {
    if response.status().as_u16() != SWITCHING_PROTOCOLS {
        return Err(ProtocolError::UnexpectedStatus(response.status().as_u16()));
    }
    verify(response.headers(), key)
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// Serialize the request head as HTTP/1.1
pub fn write_request(request: &Request<()>, buf: &mut BytesMut) {
    let target = request
        .uri()
        .path_and_query()
        .map_or("/", |path| path.as_str());

    buf.put_slice(request.method().as_str().as_bytes());
    buf.put_u8(b' ');
    buf.put_slice(target.as_bytes());
    buf.put_slice(b" HTTP/1.1\r\n");
    for (name, value) in request.headers() {
        buf.put_slice(name.as_str().as_bytes());
        buf.put_slice(b": ");
        buf.put_slice(value.as_bytes());
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(b"\r\n");
}

/// Parse an HTTP/1.1 response head from the start of `buf`
///
/// Returns `Ok(None)` while the head is incomplete, otherwise the response
/// and the number of bytes it occupied. Anything after that belongs to the
/// WebSocket stream.
pub fn parse_response(
    buf: &[u8],
) -> std::result::Result<Option<(Response<()>, usize)>, ProtocolError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Response::new(&mut headers);

    let len = match parsed.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => {
            if buf.len() > MAX_HEADER_SIZE {
                return Err(ProtocolError::HeaderTooLarge {
                    max: MAX_HEADER_SIZE,
                });
            }
            return Ok(None);
        }
        Err(err) => return Err(ProtocolError::MalformedResponse(err.to_string())),
    };

    let status = parsed
        .code
        .ok_or_else(|| ProtocolError::MalformedResponse("missing status code".to_string()))?;
    let mut builder = Response::builder().status(status);
    for header in parsed.headers.iter() {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|err| ProtocolError::MalformedResponse(err.to_string()))?;
        let value = HeaderValue::from_bytes(header.value)
            .map_err(|err| ProtocolError::MalformedResponse(err.to_string()))?;
        builder = builder.header(name, value);
    }
    let response = builder
        .body(())
        .map_err(|err| ProtocolError::MalformedResponse(err.to_string()))?;

    Ok(Some((response, len)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE_NONCE: [u8; 16] = *b"the sample nonce";

    fn accepted_headers(key: &HandshakeKey) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("Upgrade"));
        headers.insert(UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert(
            SEC_WEBSOCKET_ACCEPT,
            HeaderValue::from_str(key.expected_accept()).unwrap(),
        );
        headers
    }

    #[test]
    fn test_key_generation() {
        let key = HandshakeKey::generate();
        assert_eq!(key.key().len(), 24);
        assert!(utils::validate_key(key.key()));
        assert_ne!(key, HandshakeKey::generate());
    }

    #[test]
    fn test_fixed_nonce_is_deterministic() {
        let key = HandshakeKey::from_nonce(SAMPLE_NONCE);
        assert_eq!(key.key(), "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(key.expected_accept(), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");

        let config = HandshakeConfig::default();
        let first = build_request_with_key("ws://example.com/live", &key, &config).unwrap();
        let second = build_request_with_key("ws://example.com/live", &key, &config).unwrap();
        assert_eq!(
            first.headers().get(SEC_WEBSOCKET_KEY),
            second.headers().get(SEC_WEBSOCKET_KEY)
        );
    }

    #[test]
    fn test_client_handshake_creation() {
        let config = HandshakeConfig {
            origin: Some("https://example.com".to_string()),
            protocols: vec!["media".to_string(), "media.v2".to_string()],
            extra_headers: vec![("X-Session".to_string(), "42".to_string())],
            ..Default::default()
        };

        let (request, key) = build_request("ws://example.com:8080/stream?id=7", &config).unwrap();
        let headers = request.headers();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(headers[HOST], "example.com:8080");
        assert_eq!(headers[UPGRADE], "websocket");
        assert_eq!(headers[CONNECTION], "Upgrade");
        assert_eq!(headers[SEC_WEBSOCKET_KEY], key.key());
        assert_eq!(headers[SEC_WEBSOCKET_VERSION], "13");
        assert_eq!(headers[ORIGIN], "https://example.com");
        assert_eq!(headers[SEC_WEBSOCKET_PROTOCOL], "media, media.v2");
        assert_eq!(headers["x-session"], "42");
        assert!(headers.get(SEC_WEBSOCKET_EXTENSIONS).is_none());
    }

    #[test]
    fn test_invalid_urls() {
        let config = HandshakeConfig::default();
        for url in ["http://example.com/", "example.com", "ws:///path", "not a url"] {
            assert!(
                matches!(build_request(url, &config), Err(Error::InvalidUri(_))),
                "{} should be rejected",
                url
            );
        }
    }

    #[test]
    fn test_invalid_extra_header() {
        let config = HandshakeConfig {
            extra_headers: vec![("Bad Header".to_string(), "x".to_string())],
            ..Default::default()
        };
        assert!(matches!(
            build_request("ws://example.com/", &config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(port_of(&parse_ws_uri("ws://a.example/").unwrap()), 80);
        assert_eq!(port_of(&parse_ws_uri("wss://a.example/").unwrap()), 443);
        assert_eq!(port_of(&parse_ws_uri("ws://a.example:9000/").unwrap()), 9000);
    }

    #[test]
    fn test_verify_accepts_valid_response() {
        let key = HandshakeKey::from_nonce(SAMPLE_NONCE);
        let mut headers = accepted_headers(&key);
        assert_eq!(verify(&headers, &key), Ok(()));

        headers.insert(CONNECTION, HeaderValue::from_static("upgrade"));
        headers.insert(UPGRADE, HeaderValue::from_static("WebSocket"));
        assert_eq!(verify(&headers, &key), Ok(()));
    }

    #[test]
    fn test_verify_check_order() {
        let key = HandshakeKey::from_nonce(SAMPLE_NONCE);

        // Every check fails; the connection header is reported
        let headers = HeaderMap::new();
        assert_eq!(
            verify(&headers, &key),
            Err(ProtocolError::BadConnectionHeader(None))
        );

        let mut headers = accepted_headers(&key);
        headers.insert(UPGRADE, HeaderValue::from_static("h2c"));
        headers.remove(SEC_WEBSOCKET_ACCEPT);
        assert_eq!(
            verify(&headers, &key),
            Err(ProtocolError::BadUpgradeHeader(Some("h2c".to_string())))
        );

        let mut headers = accepted_headers(&key);
        headers.remove(SEC_WEBSOCKET_ACCEPT);
        assert_eq!(
            verify(&headers, &key),
            Err(ProtocolError::BadAcceptKey {
                expected: key.expected_accept().to_string(),
                received: None,
            })
        );
    }

    proptest! {
        #[test]
        fn prop_accept_for_another_nonce_fails(
            nonce in any::<[u8; 16]>(),
            other in any::<[u8; 16]>(),
        ) {
            prop_assume!(nonce != other);
            let key = HandshakeKey::from_nonce(nonce);
            let wrong = HandshakeKey::from_nonce(other);

            let mut headers = accepted_headers(&key);
            headers.insert(
                SEC_WEBSOCKET_ACCEPT,
                HeaderValue::from_str(wrong.expected_accept()).unwrap(),
            );
            prop_assert!(
                matches!(verify(&headers, &key), Err(ProtocolError::BadAcceptKey { .. })),
                "accept of another nonce passed"
            );
        }

        #[test]
        fn prop_arbitrary_accept_fails(
            nonce in any::<[u8; 16]>(),
            accept in "[A-Za-z0-9+/=]{0,40}",
        ) {
            let key = HandshakeKey::from_nonce(nonce);
            prop_assume!(accept != key.expected_accept());

            let mut headers = accepted_headers(&key);
            headers.insert(SEC_WEBSOCKET_ACCEPT, HeaderValue::from_str(&accept).unwrap());
            prop_assert!(
                matches!(verify(&headers, &key), Err(ProtocolError::BadAcceptKey { .. })),
                "arbitrary accept passed"
            );
        }
    }

    #[test]
    fn test_verify_rejects_negotiated_extension() {
        let key = HandshakeKey::from_nonce(SAMPLE_NONCE);
        let mut headers = accepted_headers(&key);
        headers.insert(
            SEC_WEBSOCKET_EXTENSIONS,
            HeaderValue::from_static("permessage-deflate"),
        );
        assert_eq!(
            verify(&headers, &key),
            Err(ProtocolError::UnsupportedExtension(
                "permessage-deflate".to_string()
            ))
        );
    }

    #[test]
    fn test_verify_response_status() {
        let key = HandshakeKey::from_nonce(SAMPLE_NONCE);
        let response = Response::builder().status(403).body(()).unwrap();
        assert_eq!(
            verify_response(&response, &key),
            Err(ProtocolError::UnexpectedStatus(403))
        );
    }

    #[test]
    fn test_write_request() {
        let key = HandshakeKey::from_nonce(SAMPLE_NONCE);
        let request =
            build_request_with_key("ws://example.com/chat?x=1", &key, &HandshakeConfig::default())
                .unwrap();
        let mut buf = BytesMut::new();
        write_request(&request, &mut buf);

        let text = std::str::from_utf8(&buf).unwrap();
        assert!(text.starts_with("GET /chat?x=1 HTTP/1.1\r\n"));
        assert!(text.contains("host: example.com\r\n"));
        assert!(text.contains("sec-websocket-key: dGhlIHNhbXBsZSBub25jZQ==\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_parse_response() {
        let raw = b"HTTP/1.1 101 Switching Protocols\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
\r\n\x82\x01\x2a";

        assert!(parse_response(&raw[..20]).unwrap().is_none());

        let (response, len) = parse_response(raw).unwrap().unwrap();
        assert_eq!(response.status().as_u16(), 101);
        assert_eq!(&raw[len..], b"\x82\x01\x2a");
        let key = HandshakeKey::from_nonce(SAMPLE_NONCE);
        assert_eq!(verify_response(&response, &key), Ok(()));
    }

    #[test]
    fn test_parse_response_errors() {
        assert!(matches!(
            parse_response(b"SMTP ready\r\n\r\n"),
            Err(ProtocolError::MalformedResponse(_))
        ));

        let mut huge = b"HTTP/1.1 101 Switching Protocols\r\nX-Padding: ".to_vec();
        huge.extend(std::iter::repeat(b'a').take(MAX_HEADER_SIZE));
        assert!(matches!(
            parse_response(&huge),
            Err(ProtocolError::HeaderTooLarge { max: MAX_HEADER_SIZE })
        ));
    }
}
