// ── Canonical events ──
//
// Every inbound payload, whatever its dialect or transport, decodes to
// an `Event`: a canonical type plus the report's data as a JSON value.
// Raw report names go through one normalization table.

use serde_json::Value;
use tracing::debug;

/// Canonical report kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    CleanReport,
    ChargeState,
    BatteryInfo,
    LifeSpan,
    NetInfo,
    Position,
    /// Dock pose reported on its own (legacy).
    ChargePosition,
    MapSet,
    MapSubset,
    /// The account's map list.
    Maps,
    Error,
    CleanSpeed,
    WaterInfo,
    CleanSum,
    CleanLogs,
    LastCleanLog,
    Volume,
    SleepStatus,
    AutoEmpty,
    RelocationState,
    /// A report with no handler, carrying its raw name.
    Other(String),
}

impl EventType {
    /// Normalize a raw report name: a wire tag, command name or topic
    /// segment. Matching ignores case, a leading `Get`, a leading `on`
    /// (JSON push topics) and any `Server` marker.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        let without_on = match trimmed.strip_prefix("on") {
            Some(rest) if rest.starts_with(|c: char| c.is_ascii_uppercase()) => rest,
            _ => trimmed,
        };
        let lower = without_on.to_ascii_lowercase().replace("server", "");
        let token = lower.strip_prefix("get").unwrap_or(&lower);

        match token {
            "cleanreport" | "clean" | "cleaninfo" | "cleanstate" => Self::CleanReport,
            "chargestate" | "charge" => Self::ChargeState,
            "batteryinfo" | "battery" => Self::BatteryInfo,
            "lifespan" => Self::LifeSpan,
            "netinfo" => Self::NetInfo,
            "pos" | "position" | "deebotpos" => Self::Position,
            "chargerpos" | "chargepos" => Self::ChargePosition,
            "mapset" => Self::MapSet,
            "mapsubset" | "pullm" => Self::MapSubset,
            "cachedmapinfo" | "maps" => Self::Maps,
            "error" | "errors" => Self::Error,
            "speed" | "cleanspeed" => Self::CleanSpeed,
            "waterinfo" | "waterpermeability" | "waterlevel" => Self::WaterInfo,
            "totalstats" | "cleansum" => Self::CleanSum,
            "cleanlogs" => Self::CleanLogs,
            "lastcleanlog" => Self::LastCleanLog,
            "volume" => Self::Volume,
            "sleep" | "sleepstatus" => Self::SleepStatus,
            "autoempty" => Self::AutoEmpty,
            "relocationstate" => Self::RelocationState,
            _ => {
                debug!(raw, "unrecognized report name");
                Self::Other(raw.to_owned())
            }
        }
    }

    /// Canonical name, as used for public events.
    pub fn name(&self) -> &str {
        match self {
            Self::CleanReport => "CleanReport",
            Self::ChargeState => "ChargeState",
            Self::BatteryInfo => "BatteryInfo",
            Self::LifeSpan => "LifeSpan",
            Self::NetInfo => "NetInfo",
            Self::Position => "Position",
            Self::ChargePosition => "ChargePosition",
            Self::MapSet => "MapSet",
            Self::MapSubset => "MapSubset",
            Self::Maps => "Maps",
            Self::Error => "Error",
            Self::CleanSpeed => "CleanSpeed",
            Self::WaterInfo => "WaterInfo",
            Self::CleanSum => "CleanSum",
            Self::CleanLogs => "CleanLogs",
            Self::LastCleanLog => "LastCleanLog",
            Self::Volume => "Volume",
            Self::SleepStatus => "SleepStatus",
            Self::AutoEmpty => "AutoEmpty",
            Self::RelocationState => "RelocationState",
            Self::Other(raw) => raw,
        }
    }
}

/// One decoded report.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_type: EventType,
    /// `false` when the device answered with a failure status. Only
    /// charge replies are decoded in that case.
    pub success: bool,
    /// Device failure code, when one was given.
    pub result_code: Option<String>,
    pub data: Value,
}

impl Event {
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self {
            event_type,
            success: true,
            result_code: None,
            data,
        }
    }

    /// String view of a data field; numbers are rendered.
    pub fn str_field(&self, key: &str) -> Option<String> {
        value_str(self.data.get(key)?)
    }

    /// Numeric view of a data field; numeric strings are parsed.
    pub fn num_field(&self, key: &str) -> Option<f64> {
        value_num(self.data.get(key)?)
    }
}

/// Outcome of decoding one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Event(Event),
    /// Nothing actionable, e.g. a bare acknowledgement.
    Skip,
    /// The device refused the command.
    Rejected {
        code: Option<String>,
        message: String,
    },
}

// ── Value helpers ────────────────────────────────────────────────────

pub(crate) fn value_str(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn value_num(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn prefixes_and_case_are_ignored() {
        assert_eq!(EventType::from_raw("GetBatteryInfo"), EventType::BatteryInfo);
        assert_eq!(EventType::from_raw("getBattery"), EventType::BatteryInfo);
        assert_eq!(EventType::from_raw("battery"), EventType::BatteryInfo);
        assert_eq!(EventType::from_raw("onBattery"), EventType::BatteryInfo);
        assert_eq!(EventType::from_raw("CleanReportServer"), EventType::CleanReport);
        assert_eq!(EventType::from_raw("getCleanInfo"), EventType::CleanReport);
        assert_eq!(EventType::from_raw("getCachedMapInfo"), EventType::Maps);
        assert_eq!(EventType::from_raw("getMapSubSet"), EventType::MapSubset);
    }

    #[test]
    fn on_prefix_needs_a_capital() {
        // "one..." is not an "on" topic
        assert_eq!(
            EventType::from_raw("oneShot"),
            EventType::Other("oneShot".into())
        );
    }

    #[test]
    fn unknown_names_pass_through() {
        let ty = EventType::from_raw("onFwBuryPoint");
        assert_eq!(ty, EventType::Other("onFwBuryPoint".into()));
        assert_eq!(ty.name(), "onFwBuryPoint");
    }

    #[test]
    fn field_views() {
        let event = Event::new(EventType::BatteryInfo, json!({"power": "87", "value": 42}));
        assert_eq!(event.num_field("power"), Some(87.0));
        assert_eq!(event.str_field("value").as_deref(), Some("42"));
        assert_eq!(event.num_field("missing"), None);
    }
}
