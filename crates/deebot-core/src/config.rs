// ── Runtime session configuration ──
//
// These types describe *which* robot to talk to and *how*. They carry
// the credentials handed over by the login collaborator and connection
// tuning, but never touch disk. Callers (or `deebot-config`) build a
// `SessionConfig` and hand it in.

use std::time::Duration;

use deebot_api::transport::{TlsMode, TransportConfig};
use deebot_api::{AccountIdentity, Continent, DeviceAddress};
use url::Url;

use crate::model::DeviceGeneration;

/// Default keepalive period for the stanza backbone.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(30);

/// One robot as returned by device discovery.
#[derive(Debug, Clone)]
pub struct DeviceDescriptor {
    pub address: DeviceAddress,
    /// Display name, if the owner set one.
    pub nickname: Option<String>,
    /// `true` for devices reached over MQTT + REST gateway, `false` for
    /// the XMPP stream.
    pub uses_mqtt: bool,
    pub generation: DeviceGeneration,
}

impl DeviceDescriptor {
    pub fn new(address: DeviceAddress, uses_mqtt: bool, generation: DeviceGeneration) -> Self {
        Self {
            address,
            nickname: None,
            uses_mqtt,
            generation,
        }
    }

    /// Nickname if set, otherwise the device id.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.address.did)
    }
}

/// Explicit backbone host, bypassing the continent-derived default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOverride {
    pub host: String,
    pub port: Option<u16>,
}

/// Configuration for one robot session.
///
/// Built by the caller and passed to `VacBot`; core never reads config
/// files.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub identity: AccountIdentity,
    pub device: DeviceDescriptor,
    pub continent: Continent,
    /// Two-letter country code, sent with clean-log queries.
    pub country: String,
    /// TLS verification for the REST gateway.
    pub tls: TlsMode,
    /// Request timeout for gateway calls.
    pub timeout: Duration,
    /// Liveness ping period (stanza backbone only).
    pub keepalive_interval: Duration,
    /// Backbone host override.
    pub server: Option<ServerOverride>,
    /// Portal base URL override (must end with `/`).
    pub portal_base: Option<Url>,
}

impl SessionConfig {
    pub fn new(
        identity: AccountIdentity,
        device: DeviceDescriptor,
        continent: Continent,
        country: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            device,
            continent,
            country: country.into(),
            tls: TlsMode::default(),
            timeout: Duration::from_secs(30),
            keepalive_interval: DEFAULT_KEEPALIVE,
            server: None,
            portal_base: None,
        }
    }

    pub(crate) fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }

    /// Backbone host and port for this device's transport.
    pub(crate) fn backbone_endpoint(&self) -> (String, Option<u16>) {
        match &self.server {
            Some(server) => (server.host.clone(), server.port),
            None if self.device.uses_mqtt => (self.continent.mqtt_host(), None),
            None => (self.continent.xmpp_host(), None),
        }
    }
}
