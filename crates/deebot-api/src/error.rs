use thiserror::Error;

/// Top-level error type for the `deebot-api` crate.
///
/// Covers every failure mode of the wire layer: HTTP transport, the
/// device-command gateway, payload encoding, and both message backbones.
/// `deebot-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Socket-level I/O failure on a backbone connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Gateway ─────────────────────────────────────────────────────
    /// The device-command endpoint rejected the call.
    #[error("Gateway rejected command: {message}")]
    Gateway {
        message: String,
        errno: Option<String>,
    },

    /// "set token error" persisted through every permitted attempt.
    #[error("Token error persisted after {attempts} attempts")]
    TokenRetriesExhausted { attempts: u32 },

    // ── Encoding ────────────────────────────────────────────────────
    /// A payload could not be rendered for the wire.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Markup that could not be parsed.
    #[error("Malformed markup: {0}")]
    Markup(String),

    // ── MQTT ────────────────────────────────────────────────────────
    /// Broker connection failed or dropped.
    #[error("MQTT connection failed: {0}")]
    MqttConnect(String),

    /// The broker refused the device topic subscription.
    #[error("MQTT subscription rejected for {topic}")]
    SubscriptionRejected { topic: String },

    // ── XMPP ────────────────────────────────────────────────────────
    /// Stream negotiation failed (TLS upgrade, SASL, bind).
    #[error("XMPP negotiation failed: {0}")]
    StreamNegotiation(String),

    /// Server refused the account credentials.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The stanza stream was closed by the server.
    #[error("XMPP stream closed")]
    StreamClosed,

    /// Buffered stream data grew past `limit` bytes without completing a stanza.
    #[error("XMPP frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` for connection-level failures that a caller may
    /// want to retry by reconnecting.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Io(_) | Self::MqttConnect(_) | Self::StreamClosed => true,
            _ => false,
        }
    }

    /// Returns `true` when the gateway reported the renegotiable
    /// "set token error" condition.
    pub fn is_token_error(&self) -> bool {
        match self {
            Self::Gateway { message, .. } => is_token_error_message(message),
            Self::TokenRetriesExhausted { .. } => true,
            _ => false,
        }
    }
}

/// Matches the gateway's transient token failure text, which arrives
/// with varying case and a trailing period.
pub(crate) fn is_token_error_message(message: &str) -> bool {
    message
        .trim()
        .trim_end_matches('.')
        .eq_ignore_ascii_case("set token error")
}
