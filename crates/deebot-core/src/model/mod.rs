// ── Domain model ──
//
// Plain data types shared by device state, the map assembler and the
// public event stream.

mod map;

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::dictionary::CleanMode;

pub use map::{BoundaryKind, MapInfo, SpotAreaInfo, VirtualBoundary, VirtualBoundaryInfo};

/// Wire dialect a model family speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceGeneration {
    /// `<ctl>` markup over XMPP or the REST gateway.
    #[default]
    Legacy,
    /// `{header, body}` JSON envelopes over the REST gateway.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Idle,
    Charging,
    Returning,
}

/// What the robot is doing, as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanStatus {
    Cleaning(CleanMode),
    Paused,
    Stopped,
    /// Resting after a run, docked or not.
    Idle,
    Returning,
}

impl CleanStatus {
    /// Rest states that leave the dock question open.
    pub fn is_at_rest(self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }
}

impl fmt::Display for CleanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cleaning(mode) => write!(f, "{mode}"),
            Self::Paused => f.write_str("pause"),
            Self::Stopped => f.write_str("stop"),
            Self::Idle => f.write_str("idle"),
            Self::Returning => f.write_str("returning"),
        }
    }
}

/// A robot or dock pose on the active map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
    pub angle: i64,
    pub is_invalid: bool,
    /// Spot area containing the point, or `"unknown"`.
    pub spot_area_id: String,
}

impl Position {
    pub const UNKNOWN_AREA: &'static str = "unknown";

    pub fn area_unresolved(&self) -> bool {
        self.spot_area_id == Self::UNKNOWN_AREA
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetInfo {
    pub ip: Option<String>,
    pub ssid: Option<String>,
    pub rssi: Option<String>,
    pub mac: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanSum {
    /// Square metres over the robot's lifetime.
    pub area: u64,
    pub seconds: u64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanLogEntry {
    pub id: String,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub square_meters: Option<u64>,
    pub duration_secs: Option<u64>,
    pub clean_type: Option<String>,
    pub stop_reason: Option<i64>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub description: String,
}
