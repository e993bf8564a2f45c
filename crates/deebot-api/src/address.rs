// ── Account and device addressing ──
//
// Every backbone endpoint is derived from the account's continent code,
// and every message is addressed by the device's id/class/resource
// triple. Both are plain data handed over by the login collaborator.

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Realm every account lives under.
pub const DEFAULT_REALM: &str = "ecouser.net";

/// Domain suffix for device XMPP addresses.
const ROBOT_DOMAIN: &str = "ecorobot.net";

/// Resource every robot binds its XMPP session to.
const ROBOT_RESOURCE: &str = "atom";

pub const MQTT_PORT: u16 = 8883;
pub const XMPP_PORT: u16 = 5223;

// ── Continent ────────────────────────────────────────────────────────

/// Region code selecting the cloud shard (`eu`, `na`, `as`, `ww`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Continent(String);

impl Continent {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base URL of the REST portal: `https://portal-{continent}.ecouser.net/api/`.
    pub fn portal_base(&self) -> String {
        format!("https://portal-{}.{DEFAULT_REALM}/api/", self.0)
    }

    /// MQTT broker host.
    pub fn mqtt_host(&self) -> String {
        format!("mq-{}.{DEFAULT_REALM}", self.0)
    }

    /// XMPP server host.
    pub fn xmpp_host(&self) -> String {
        format!("msg-{}.{DEFAULT_REALM}", self.0)
    }
}

impl fmt::Display for Continent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── AccountIdentity ──────────────────────────────────────────────────

/// Credentials issued by the login collaborator for one client session.
#[derive(Debug, Clone)]
pub struct AccountIdentity {
    pub user_id: String,
    /// Access-token derived secret.
    pub token: SecretString,
    /// Client resource id, unique per installation.
    pub resource: String,
    /// Authentication realm, normally [`DEFAULT_REALM`].
    pub realm: String,
}

impl AccountIdentity {
    pub fn new(user_id: impl Into<String>, token: SecretString, resource: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token,
            resource: resource.into(),
            realm: DEFAULT_REALM.into(),
        }
    }

    /// Short domain: the realm up to its first dot (`ecouser`).
    pub fn domain(&self) -> &str {
        self.realm.split('.').next().unwrap_or(&self.realm)
    }

    /// Broker identity, `userId@domain`.
    pub fn identity(&self) -> String {
        format!("{}@{}", self.user_id, self.domain())
    }

    /// Broker client id, `identity/resource`.
    pub fn client_id(&self) -> String {
        format!("{}/{}", self.identity(), self.resource)
    }

    /// Bare XMPP JID, `userId@realm`.
    pub fn bare_jid(&self) -> String {
        format!("{}@{}", self.user_id, self.realm)
    }

    /// Full XMPP JID including the bound resource.
    pub fn full_jid(&self) -> String {
        format!("{}/{}", self.bare_jid(), self.resource)
    }
}

// ── DeviceAddress ────────────────────────────────────────────────────

/// The `(did, class, resource)` triple addressing one robot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress {
    pub did: String,
    pub class: String,
    pub resource: String,
}

impl DeviceAddress {
    pub fn new(did: impl Into<String>, class: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            class: class.into(),
            resource: resource.into(),
        }
    }

    /// Subscription filter for every report the device publishes.
    pub fn report_topic(&self) -> String {
        format!("iot/atr/+/{}/{}/{}/+", self.did, self.class, self.resource)
    }

    /// The robot's XMPP address, `did@class.ecorobot.net/atom`.
    pub fn jid(&self) -> String {
        format!("{}@{}.{ROBOT_DOMAIN}/{ROBOT_RESOURCE}", self.did, self.class)
    }
}
