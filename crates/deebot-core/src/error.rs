// ── Core error types ──
//
// User-facing errors from deebot-core. Consumers never see reqwest or
// rumqttc errors directly; the `From<deebot_api::Error>` impl translates
// wire-level failures into the categories a caller can act on.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// Backbone failure after the session was up.
    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Not connected")]
    NotConnected,

    // ── Command errors ───────────────────────────────────────────────
    /// The command could not be rendered for the device's dialect.
    /// Nothing was sent.
    #[error("Cannot encode {command}: {reason}")]
    Encoding { command: String, reason: String },

    /// The device-command gateway rejected the call.
    #[error("Command rejected: {message}")]
    Gateway {
        message: String,
        errno: Option<String>,
    },

    /// "set token error" persisted through every attempt.
    #[error("Session token could not be renegotiated after {attempts} attempts")]
    TransientAuth { attempts: u32 },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    /// An inbound payload could not be decoded.
    #[error("Cannot parse device payload: {message}")]
    Parse { message: String },

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    pub(crate) fn encoding(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encoding {
            command: command.into(),
            reason: reason.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<deebot_api::Error> for CoreError {
    fn from(err: deebot_api::Error) -> Self {
        match err {
            deebot_api::Error::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        endpoint: e
                            .url()
                            .map(|u| u.to_string())
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Gateway {
                        message: e.to_string(),
                        errno: e.status().map(|s| s.as_u16().to_string()),
                    }
                }
            }
            deebot_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            deebot_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                endpoint: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            deebot_api::Error::Io(e) => CoreError::Transport {
                message: e.to_string(),
            },
            deebot_api::Error::Gateway { message, errno } => CoreError::Gateway { message, errno },
            deebot_api::Error::TokenRetriesExhausted { attempts } => {
                CoreError::TransientAuth { attempts }
            }
            deebot_api::Error::Encoding(reason) => CoreError::Encoding {
                command: String::new(),
                reason,
            },
            deebot_api::Error::Markup(message) => CoreError::Parse { message },
            deebot_api::Error::MqttConnect(reason) => CoreError::ConnectionFailed {
                endpoint: "mqtt".into(),
                reason,
            },
            deebot_api::Error::SubscriptionRejected { topic } => CoreError::ConnectionFailed {
                endpoint: "mqtt".into(),
                reason: format!("subscription rejected for {topic}"),
            },
            deebot_api::Error::StreamNegotiation(reason) => CoreError::ConnectionFailed {
                endpoint: "xmpp".into(),
                reason,
            },
            deebot_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            deebot_api::Error::StreamClosed => CoreError::Transport {
                message: "stanza stream closed".into(),
            },
            err @ deebot_api::Error::FrameTooLarge { .. } => CoreError::Parse {
                message: err.to_string(),
            },
            deebot_api::Error::Deserialization { message, body: _ } => CoreError::Parse { message },
        }
    }
}
