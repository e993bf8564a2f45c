//! Shared configuration for Deebot sessions.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `deebot_core::SessionConfig`. Each profile names one
//! account and one robot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use deebot_core::{
    AccountIdentity, Continent, DeviceAddress, DeviceDescriptor, DeviceGeneration, ServerOverride,
    SessionConfig, TlsMode,
};

const KEYRING_SERVICE: &str = "deebot";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no token configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("unknown profile '{profile}'")]
    UnknownProfile { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named robot profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name, falling back to the default profile.
    pub fn profile<'a>(&'a self, name: Option<&'a str>) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default)]
    pub insecure: bool,

    /// Gateway request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Stanza keepalive period in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            insecure: false,
            timeout: default_timeout(),
            keepalive: default_keepalive(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_keepalive() -> u64 {
    deebot_core::DEFAULT_KEEPALIVE.as_secs()
}

/// One account and one robot.
#[derive(Debug, Deserialize, Serialize)]
pub struct Profile {
    /// Account user id.
    pub user_id: String,

    /// Session token (plaintext; prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable name containing the token.
    pub token_env: Option<String>,

    /// Client resource id.
    #[serde(default = "default_resource")]
    pub resource: String,

    /// Authentication realm override.
    pub realm: Option<String>,

    /// Continent code, e.g. "eu" or "ww".
    pub continent: String,

    /// Two-letter country code.
    pub country: String,

    pub device: DeviceProfile,

    /// Backbone host override.
    pub server: Option<String>,

    pub server_port: Option<u16>,

    /// Portal base URL override.
    pub portal_url: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override keepalive period.
    pub keepalive: Option<u64>,
}

fn default_resource() -> String {
    "deebotrs".into()
}

/// Robot addressing as returned by device discovery.
#[derive(Debug, Deserialize, Serialize)]
pub struct DeviceProfile {
    pub did: String,
    /// Model class, e.g. "ls1ok3".
    pub class: String,
    pub resource: String,
    pub nickname: Option<String>,
    /// Reached over MQTT + REST gateway; otherwise XMPP.
    #[serde(default)]
    pub mqtt: bool,
    #[serde(default)]
    pub generation: DeviceGeneration,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "deebot", "deebot").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("deebot");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. `DEEBOT_`-prefixed variables override
/// file values; nested keys are separated by `__`
/// (`DEEBOT_DEFAULTS__TIMEOUT=10`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("DEEBOT_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the session token from the credential chain.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a token in the system keyring for `profile_name`.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token"))
        .and_then(|entry| entry.set_password(token))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `SessionConfig` from a profile and the global defaults.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    if profile.user_id.is_empty() {
        return Err(ConfigError::Validation {
            field: "user_id".into(),
            reason: "must not be empty".into(),
        });
    }
    if profile.country.len() != 2 {
        return Err(ConfigError::Validation {
            field: "country".into(),
            reason: format!("expected a two-letter code, got '{}'", profile.country),
        });
    }

    let token = resolve_token(profile, profile_name)?;
    let mut identity = AccountIdentity::new(&profile.user_id, token, &profile.resource);
    if let Some(ref realm) = profile.realm {
        identity.realm.clone_from(realm);
    }

    let device = &profile.device;
    let mut descriptor = DeviceDescriptor::new(
        DeviceAddress::new(&device.did, &device.class, &device.resource),
        device.mqtt,
        device.generation,
    );
    descriptor.nickname.clone_from(&device.nickname);

    let mut config = SessionConfig::new(
        identity,
        descriptor,
        Continent::new(&profile.continent),
        &profile.country,
    );

    config.tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.keepalive_interval =
        Duration::from_secs(profile.keepalive.unwrap_or(defaults.keepalive));
    config.server = profile.server.as_ref().map(|host| ServerOverride {
        host: host.clone(),
        port: profile.server_port,
    });
    config.portal_base = profile
        .portal_url
        .as_deref()
        .map(|raw| {
            raw.parse::<url::Url>().map_err(|_| ConfigError::Validation {
                field: "portal_url".into(),
                reason: format!("invalid URL: {raw}"),
            })
        })
        .transpose()?;

    Ok(config)
}
