// ── Static vendor dictionaries ──
//
// Read-only lookup tables translating vendor codes in both wire dialects
// into the crate's vocabulary and back. Unknown codes resolve to `None`
// and callers decide how to degrade.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

// ── Components ───────────────────────────────────────────────────────

/// Wear parts whose remaining life the robot reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Component {
    MainBrush,
    SideBrush,
    Filter,
}

impl Component {
    pub const ALL: [Component; 3] = [Self::MainBrush, Self::SideBrush, Self::Filter];

    /// Component code used by legacy markup firmware.
    pub fn legacy_code(self) -> &'static str {
        match self {
            Self::MainBrush => "Brush",
            Self::SideBrush => "SideBrush",
            Self::Filter => "DustCaseHeap",
        }
    }

    /// Component code used by JSON firmware.
    pub fn json_code(self) -> &'static str {
        match self {
            Self::MainBrush => "brush",
            Self::SideBrush => "sideBrush",
            Self::Filter => "heap",
        }
    }

    /// Resolve a code from either dialect, ignoring case.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| {
            code.eq_ignore_ascii_case(c.legacy_code()) || code.eq_ignore_ascii_case(c.json_code())
        })
    }
}

// ── Clean modes and actions ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CleanMode {
    Auto,
    Edge,
    Spot,
    SpotArea,
    SingleRoom,
    CustomArea,
}

impl CleanMode {
    pub fn legacy_code(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Edge => "border",
            Self::Spot => "spot",
            Self::SpotArea => "SpotArea",
            Self::SingleRoom => "singleroom",
            Self::CustomArea => "customArea",
        }
    }

    pub fn json_code(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Edge => "border",
            Self::Spot => "spot",
            Self::SpotArea => "spotArea",
            Self::SingleRoom => "singleRoom",
            Self::CustomArea => "customArea",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        [
            Self::Auto,
            Self::Edge,
            Self::Spot,
            Self::SpotArea,
            Self::SingleRoom,
            Self::CustomArea,
        ]
        .into_iter()
        .find(|m| code.eq_ignore_ascii_case(m.legacy_code()) || code.eq_ignore_ascii_case(m.json_code()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CleanAction {
    #[default]
    Start,
    Pause,
    Resume,
    Stop,
}

impl CleanAction {
    pub fn legacy_code(self) -> &'static str {
        match self {
            Self::Start => "s",
            Self::Pause => "p",
            Self::Resume => "r",
            Self::Stop => "h",
        }
    }

    pub fn json_code(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
        }
    }

    pub fn from_legacy_code(code: &str) -> Option<Self> {
        match code {
            "s" => Some(Self::Start),
            "p" => Some(Self::Pause),
            "r" => Some(Self::Resume),
            "h" => Some(Self::Stop),
            _ => None,
        }
    }
}

// ── Fan speed ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CleanSpeed {
    Quiet,
    Normal,
    Max,
    MaxPlus,
}

impl CleanSpeed {
    /// Legacy firmware only knows two levels.
    pub fn legacy_code(self) -> &'static str {
        match self {
            Self::Quiet | Self::Normal => "standard",
            Self::Max | Self::MaxPlus => "strong",
        }
    }

    pub fn json_code(self) -> i64 {
        match self {
            Self::Quiet => 1000,
            Self::Normal => 0,
            Self::Max => 1,
            Self::MaxPlus => 2,
        }
    }

    pub fn from_legacy_code(code: &str) -> Option<Self> {
        match code {
            "standard" => Some(Self::Normal),
            "strong" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn from_json_code(code: i64) -> Option<Self> {
        match code {
            1000 => Some(Self::Quiet),
            0 => Some(Self::Normal),
            1 => Some(Self::Max),
            2 => Some(Self::MaxPlus),
            _ => None,
        }
    }
}

// ── Water level ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WaterLevel {
    Low,
    Medium,
    High,
    UltraHigh,
}

impl WaterLevel {
    pub fn code(self) -> i64 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
            Self::UltraHigh => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Low),
            2 => Some(Self::Medium),
            3 => Some(Self::High),
            4 => Some(Self::UltraHigh),
            _ => None,
        }
    }
}

// ── Movement ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveDirection {
    Forward,
    Backward,
    SpinLeft,
    SpinRight,
    TurnAround,
    Stop,
}

impl MoveDirection {
    pub fn code(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
            Self::SpinLeft => "SpinLeft",
            Self::SpinRight => "SpinRight",
            Self::TurnAround => "TurnAround",
            Self::Stop => "stop",
        }
    }
}

// ── Error codes ──────────────────────────────────────────────────────

const ERROR_CODES: &[(&str, &str)] = &[
    ("-3", "Error parsing response data"),
    ("-2", "Internal error"),
    ("-1", "Host not installed?"),
    ("0", "NoError: Robot is operational"),
    ("3", "RequestOAuthError: Authentication error"),
    ("7", "log data is not found"),
    ("100", "NoError: Robot is operational"),
    ("101", "BatteryLow: Low battery"),
    ("102", "HostHang: Robot is off the floor"),
    ("103", "WheelAbnormal: Driving Wheel malfunction"),
    ("104", "DownSensorAbnormal: Excess dust on the Anti-Drop Sensors"),
    ("105", "Stuck: Robot is stuck"),
    ("106", "SideBrushExhausted: Side Brushes have expired"),
    ("107", "DustCaseHeapExhausted: Dust case filter expired"),
    ("108", "SideAbnormal: Side Brushes are tangled"),
    ("109", "RollAbnormal: Main Brush is tangled"),
    ("110", "NoDustBox: Dust Bin Not installed"),
    ("111", "BumpAbnormal: Bump sensor stuck"),
    ("112", "LDS: LDS \"Laser Distance Sensor\" malfunction"),
    ("113", "MainBrushExhausted: Main brush has expired"),
    ("114", "DustCaseFilled: Dust bin full"),
    ("115", "BatteryError"),
    ("116", "ForwardLookingError"),
    ("117", "GyroscopeError"),
    ("118", "StrainerBlock"),
    ("119", "FanError"),
    ("120", "WaterBoxError"),
    ("201", "AirFilterUninstall"),
    ("202", "UltrasonicComponentAbnormal"),
    ("203", "SmallWheelError"),
    ("204", "WheelHang"),
    ("205", "IonSterilizeExhausted"),
    ("206", "IonSterilizeAbnormal"),
    ("207", "IonSterilizeFault"),
    ("312", "Please replace the Dust Bag."),
    ("404", "Recipient unavailable"),
    ("500", "Request Timeout"),
    ("601", "ClosedAIVISideAbnormal"),
    ("602", "ClosedAIVIRollAbnormal"),
    ("20003", "Task type not supported"),
    ("20007", "Mop plug-in not installed"),
    ("20011", "Map is unsupported"),
    ("20012", "Get point count is out of range"),
    ("20015", "Map point does not exist"),
    ("20017", "Map point data is invalid"),
    ("20030", "Invalid parameter"),
];

/// Human description of a robot error code.
pub fn error_description(code: &str) -> Option<&'static str> {
    ERROR_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, description)| *description)
}
