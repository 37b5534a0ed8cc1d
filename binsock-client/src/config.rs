//! Client configuration for binsock
//!
//! This module provides configuration options for WebSocket clients and the
//! authentication message some media servers expect right after the upgrade.

use binsock_core::error::ConfigError;
use binsock_core::handshake::HandshakeConfig;
use binsock_core::protocol::constants::DEFAULT_MAX_FRAME_SIZE;
use binsock_core::{Error, Result};
use http::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Maximum inbound data frame payload in bytes
    pub max_frame_size: usize,
    /// User agent string
    pub user_agent: String,
    /// Origin header
    pub origin: Option<String>,
    /// WebSocket subprotocols
    pub protocols: Vec<String>,
    /// Custom headers
    pub headers: Vec<(String, String)>,
    /// Token sent as the first frame of every session
    pub auth: Option<AuthToken>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            user_agent: format!("binsock-client/{}", env!("CARGO_PKG_VERSION")),
            origin: None,
            protocols: Vec::new(),
            headers: Vec::new(),
            auth: None,
        }
    }
}

impl ClientConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_frame_size == 0 {
            return Err(Error::Config(ConfigError::Validation(
                "max_frame_size must be greater than 0".to_string(),
            )));
        }

        if HeaderValue::from_str(&self.user_agent).is_err() {
            return Err(invalid("user_agent", &self.user_agent));
        }

        if let Some(origin) = &self.origin {
            if HeaderValue::from_str(origin).is_err() {
                return Err(invalid("origin", origin));
            }
        }

        for (name, value) in &self.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                return Err(invalid("header name", name));
            }
            if HeaderValue::from_str(value).is_err() {
                return Err(invalid("header value", value));
            }
        }

        Ok(())
    }

    /// Set maximum frame size
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Set origin
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    /// Add a subprotocol
    pub fn add_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Add a custom header
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the authentication token
    pub fn auth(mut self, auth: AuthToken) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Request headers derived from this configuration
    pub fn handshake(&self) -> HandshakeConfig {
        HandshakeConfig {
            origin: self.origin.clone(),
            user_agent: Some(self.user_agent.clone()),
            protocols: self.protocols.clone(),
            extra_headers: self.headers.clone(),
        }
    }
}

fn invalid(field: &str, value: &str) -> Error {
    Error::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Credentials for the media stream
///
/// Serialized as `{"token":"...","mediaId":42}`. A `media_id` of zero means
/// the stream is public and nothing is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// Opaque token issued by the server
    pub token: String,
    /// Identifier of the requested media
    #[serde(rename = "mediaId")]
    pub media_id: i64,
}

impl AuthToken {
    /// Create a new token
    pub fn new(token: impl Into<String>, media_id: i64) -> Self {
        Self {
            token: token.into(),
            media_id,
        }
    }

    /// Whether this token should be sent at all
    pub fn is_required(&self) -> bool {
        self.media_id != 0
    }

    /// The JSON text of the auth message
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| {
            Error::Config(ConfigError::InvalidValue {
                field: "auth".to_string(),
                value: err.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.max_frame_size, 16 * 1024 * 1024);
        assert!(config.user_agent.starts_with("binsock-client/"));
        assert!(config.auth.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_config_validation() {
        let config = ClientConfig::default().max_frame_size(0);
        assert!(config.validate().is_err());

        let config = ClientConfig::default().add_header("bad header", "value");
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidValue { .. }))
        ));

        let config = ClientConfig::default().add_header("X-Trace", "line\nbreak");
        assert!(config.validate().is_err());

        let config = ClientConfig::default()
            .origin("http://player.local")
            .add_protocol("media")
            .add_header("X-Trace", "abc");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_handshake_config() {
        let config = ClientConfig::default()
            .user_agent("player/2.0")
            .add_header("Cookie", "a=b");
        let handshake = config.handshake();
        assert_eq!(handshake.user_agent.as_deref(), Some("player/2.0"));
        assert_eq!(handshake.extra_headers, vec![("Cookie".to_string(), "a=b".to_string())]);
    }

    #[test]
    fn test_auth_token_json() {
        let token = AuthToken::new("abc", 42);
        assert_eq!(token.to_json().unwrap(), r#"{"token":"abc","mediaId":42}"#);
        assert!(token.is_required());
        assert!(!AuthToken::new("abc", 0).is_required());

        let parsed: AuthToken = serde_json::from_str(r#"{"token":"t","mediaId":-7}"#).unwrap();
        assert_eq!(parsed, AuthToken::new("t", -7));
    }
}
