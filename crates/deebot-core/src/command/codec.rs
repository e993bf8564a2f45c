// Command codec
//
// Renders a `Command` for one wire dialect. Legacy firmware takes a
// `<ctl td="Name">` element with attributes and at most one child; JSON
// firmware takes a camel-case command name and an argument value that
// goes into the `{header, body: {data}}` envelope. Commands a dialect
// has no rendering for fail with `CoreError::Encoding` and nothing is
// sent.

use deebot_api::envelope::ROUTING_ATTR;
use deebot_api::{Element, Endpoint, JsonEnvelope, Payload};
use serde_json::{Value, json};

use super::Command;
use crate::dictionary::{CleanAction, CleanMode};
use crate::error::CoreError;
use crate::model::DeviceGeneration;

/// Fan speed attribute legacy clean commands always carry.
const LEGACY_SPEED: &str = "standard";

/// A command rendered for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedCommand {
    /// Wire command name; also the context the normalizer uses to type
    /// the reply.
    pub name: String,
    pub payload: Payload,
    pub endpoint: Endpoint,
}

/// Render `command` for `generation`.
pub fn encode(command: &Command, generation: DeviceGeneration) -> Result<EncodedCommand, CoreError> {
    match generation {
        DeviceGeneration::Legacy => {
            let ctl = legacy_ctl(command)?;
            // Render once so a payload that cannot be serialized is
            // rejected here rather than by the transport.
            ctl.to_xml()
                .map_err(|e| CoreError::encoding(command.name(), e.to_string()))?;
            let name = ctl.attr(ROUTING_ATTR).unwrap_or_default().to_owned();
            Ok(EncodedCommand {
                name,
                payload: Payload::Markup(ctl),
                endpoint: Endpoint::DevManager,
            })
        }
        DeviceGeneration::Json => {
            let (name, args, endpoint) = json_command(command)?;
            Ok(EncodedCommand {
                name: name.to_owned(),
                payload: Payload::Json(JsonEnvelope::new(args)),
                endpoint,
            })
        }
    }
}

fn unsupported(command: &Command, generation: DeviceGeneration) -> CoreError {
    CoreError::encoding(
        command.name(),
        format!("not available on {generation} firmware"),
    )
}

// ── Legacy markup ────────────────────────────────────────────────────

fn ctl(name: &str) -> Element {
    Element::new("ctl").with_attr(ROUTING_ATTR, name)
}

fn legacy_clean(kind: &str, action: Option<CleanAction>) -> Element {
    Element::new("clean")
        .with_attr("type", kind)
        .with_attr("speed", LEGACY_SPEED)
        .with_attr("act", action.unwrap_or_default().legacy_code())
}

fn legacy_ctl(command: &Command) -> Result<Element, CoreError> {
    let element = match command {
        Command::Clean { mode, action } => {
            ctl("Clean").with_child(legacy_clean(mode.legacy_code(), *action))
        }
        Command::SpotArea {
            area_ids,
            cleanings,
            action,
        } => ctl("Clean").with_child(
            legacy_clean(CleanMode::SpotArea.legacy_code(), *action)
                .with_attr("mid", area_ids.join(","))
                .with_attr("deep", cleanings.to_string()),
        ),
        Command::CustomArea {
            coordinates,
            cleanings,
            action,
        } => ctl("Clean").with_child(
            legacy_clean(CleanMode::SpotArea.legacy_code(), *action)
                .with_attr("p", coordinates.as_str())
                .with_attr("deep", cleanings.to_string()),
        ),
        Command::Pause => ctl("Clean").with_child(legacy_clean("auto", Some(CleanAction::Pause))),
        Command::Resume => {
            ctl("Clean").with_child(legacy_clean("auto", Some(CleanAction::Resume)))
        }
        Command::Stop => ctl("Clean").with_child(legacy_clean("stop", Some(CleanAction::Stop))),
        Command::Charge => ctl("Charge").with_child(Element::new("charge").with_attr("type", "go")),
        Command::Move(direction) => {
            ctl("Move").with_child(Element::new("move").with_attr("action", direction.code()))
        }
        Command::PlaySound { sid } => ctl("PlaySound").with_attr("sid", sid.to_string()),
        Command::SetCleanSpeed(speed) => ctl("SetCleanSpeed")
            .with_child(Element::new("clean").with_attr("speed", speed.legacy_code())),
        Command::SetWaterLevel(level) => {
            ctl("SetWaterPermeability").with_attr("v", level.code().to_string())
        }
        Command::ResetLifeSpan(component) => {
            ctl("ResetLifeSpan").with_attr("type", component.legacy_code())
        }
        Command::SetTime {
            timestamp,
            timezone,
        } => ctl("SetTime").with_child(
            Element::new("time")
                .with_attr("t", timestamp.to_string())
                .with_attr("tz", timezone.to_string()),
        ),
        Command::GetCleanState => ctl("GetCleanState"),
        Command::GetCleanSpeed => ctl("GetCleanSpeed"),
        Command::GetCleanSum => ctl("GetCleanSum"),
        Command::GetChargeState => ctl("GetChargeState"),
        Command::GetBatteryState => ctl("GetBatteryInfo"),
        Command::GetLifeSpan(component) => {
            ctl("GetLifeSpan").with_attr("type", component.legacy_code())
        }
        Command::GetWaterInfo => ctl("GetWaterPermeability"),
        Command::GetPosition => ctl("GetPos"),
        Command::GetChargerPosition => ctl("GetChargerPos"),
        Command::GetError => ctl("GetError"),
        Command::GetSpotAreas { .. } => ctl("GetMapSet").with_attr("tp", "sa"),
        Command::GetVirtualBoundaries { kind, .. } => {
            ctl("GetMapSet").with_attr("tp", kind.code())
        }
        Command::GetSpotAreaInfo { map_id, area_id } => ctl("PullM")
            .with_attr("tp", "sa")
            .with_attr("msid", map_id.as_str())
            .with_attr("mid", area_id.as_str())
            .with_attr("seq", "0"),
        Command::GetVirtualBoundaryInfo {
            map_id,
            kind,
            boundary_id,
        } => ctl("PullM")
            .with_attr("tp", kind.code())
            .with_attr("msid", map_id.as_str())
            .with_attr("mid", boundary_id.as_str())
            .with_attr("seq", "0"),
        Command::GetCleanLogs { count } => ctl("GetCleanLogs").with_attr("count", count.to_string()),
        Command::Relocate
        | Command::SetVolume(_)
        | Command::SetAutoEmpty(_)
        | Command::GetNetInfo
        | Command::GetSleepStatus
        | Command::GetVolume
        | Command::GetAutoEmpty
        | Command::GetMaps
        | Command::AddVirtualBoundary { .. }
        | Command::DeleteVirtualBoundary { .. }
        | Command::GetLastCleanLog => {
            return Err(unsupported(command, DeviceGeneration::Legacy));
        }
    };
    Ok(element)
}

// ── JSON envelope ────────────────────────────────────────────────────

fn json_clean(kind: &str, action: Option<CleanAction>) -> Value {
    json!({ "act": action.unwrap_or_default().json_code(), "type": kind })
}

fn json_command(command: &Command) -> Result<(&'static str, Value, Endpoint), CoreError> {
    use Endpoint::{DevManager, Log};

    let rendered = match command {
        Command::Clean { mode, action } => ("clean", json_clean(mode.json_code(), *action), DevManager),
        Command::SpotArea {
            area_ids,
            cleanings,
            action,
        } => (
            "clean",
            json!({
                "act": action.unwrap_or_default().json_code(),
                "content": area_ids.join(","),
                "count": cleanings,
                "type": CleanMode::SpotArea.json_code(),
            }),
            DevManager,
        ),
        Command::CustomArea {
            coordinates,
            cleanings,
            action,
        } => (
            "clean",
            json!({
                "act": action.unwrap_or_default().json_code(),
                "content": coordinates,
                "count": cleanings,
                "type": CleanMode::CustomArea.json_code(),
            }),
            DevManager,
        ),
        Command::Pause => ("clean", json!({ "act": CleanAction::Pause.json_code() }), DevManager),
        Command::Resume => ("clean", json!({ "act": CleanAction::Resume.json_code() }), DevManager),
        Command::Stop => ("clean", json!({ "act": CleanAction::Stop.json_code() }), DevManager),
        Command::Charge => ("charge", json!({ "act": "go" }), DevManager),
        Command::Move(direction) => ("move", json!({ "act": direction.code() }), DevManager),
        Command::Relocate => ("setRelocationState", json!({ "mode": "manu" }), DevManager),
        Command::PlaySound { sid } => ("playSound", json!({ "count": 1, "sid": sid }), DevManager),
        Command::SetCleanSpeed(speed) => ("setSpeed", json!({ "speed": speed.json_code() }), DevManager),
        Command::SetWaterLevel(level) => (
            "setWaterInfo",
            json!({ "amount": level.code(), "enable": 0 }),
            DevManager,
        ),
        Command::ResetLifeSpan(component) => (
            "resetLifeSpan",
            json!({ "type": component.json_code() }),
            DevManager,
        ),
        Command::SetVolume(volume) => ("setVolume", json!({ "volume": volume }), DevManager),
        Command::SetAutoEmpty(enable) => (
            "setAutoEmpty",
            json!({ "enable": u8::from(*enable) }),
            DevManager,
        ),
        Command::GetCleanState => ("getCleanInfo", Value::Null, DevManager),
        Command::GetCleanSpeed => ("getSpeed", Value::Null, DevManager),
        Command::GetCleanSum => ("getTotalStats", Value::Null, DevManager),
        Command::GetChargeState => ("getChargeState", Value::Null, DevManager),
        Command::GetBatteryState => ("getBattery", Value::Null, DevManager),
        Command::GetLifeSpan(component) => ("getLifeSpan", json!([component.json_code()]), DevManager),
        Command::GetWaterInfo => ("getWaterInfo", Value::Null, DevManager),
        Command::GetNetInfo => ("getNetInfo", Value::Null, DevManager),
        Command::GetPosition => ("getPos", json!(["chargePos", "deebotPos"]), DevManager),
        Command::GetChargerPosition => ("getPos", json!(["chargePos"]), DevManager),
        Command::GetError => ("getError", Value::Null, DevManager),
        Command::GetSleepStatus => ("getSleep", Value::Null, DevManager),
        Command::GetVolume => ("getVolume", Value::Null, DevManager),
        Command::GetAutoEmpty => ("getAutoEmpty", Value::Null, DevManager),
        Command::GetMaps => ("getCachedMapInfo", Value::Null, DevManager),
        Command::GetSpotAreas { map_id } => (
            "getMapSet",
            json!({ "mid": map_id, "type": "ar" }),
            DevManager,
        ),
        Command::GetVirtualBoundaries { map_id, kind } => (
            "getMapSet",
            json!({ "mid": map_id, "type": kind.code() }),
            DevManager,
        ),
        Command::GetSpotAreaInfo { map_id, area_id } => (
            "getMapSubSet",
            json!({ "mid": map_id, "mssid": area_id, "type": "ar" }),
            DevManager,
        ),
        Command::GetVirtualBoundaryInfo {
            map_id,
            kind,
            boundary_id,
        } => (
            "getMapSubSet",
            json!({ "mid": map_id, "mssid": boundary_id, "type": kind.code() }),
            DevManager,
        ),
        Command::AddVirtualBoundary {
            map_id,
            kind,
            coordinates,
        } => (
            "setMapSubSet",
            json!({ "act": "add", "mid": map_id, "type": kind.code(), "value": coordinates }),
            DevManager,
        ),
        Command::DeleteVirtualBoundary {
            map_id,
            kind,
            boundary_id,
        } => (
            "setMapSubSet",
            json!({ "act": "del", "mid": map_id, "mssid": boundary_id, "type": kind.code() }),
            DevManager,
        ),
        Command::GetCleanLogs { count } => ("GetCleanLogs", json!({ "count": count }), Log),
        Command::GetLastCleanLog => ("GetLastCleanLog", Value::Null, Log),
        Command::SetTime { .. } => return Err(unsupported(command, DeviceGeneration::Json)),
    };
    Ok(rendered)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::dictionary::{CleanSpeed, Component, MoveDirection};
    use crate::model::BoundaryKind;

    fn markup(command: &Command) -> (String, Element) {
        let encoded = encode(command, DeviceGeneration::Legacy).unwrap();
        assert_eq!(encoded.endpoint, Endpoint::DevManager);
        match encoded.payload {
            Payload::Markup(element) => (encoded.name, element),
            Payload::Json(_) => panic!("expected markup"),
        }
    }

    fn json_body(command: &Command) -> (String, Value, Endpoint) {
        let encoded = encode(command, DeviceGeneration::Json).unwrap();
        let value = encoded.payload.to_gateway_value().unwrap();
        (encoded.name, value, encoded.endpoint)
    }

    #[test]
    fn json_clean_without_action_starts() {
        let (name, value, _) = json_body(&Command::clean());
        assert_eq!(name, "clean");
        assert_eq!(value["body"]["data"], json!({"act": "start", "type": "auto"}));
        assert_eq!(value["header"]["pri"], "1");
    }

    #[test]
    fn legacy_clean_without_action_starts() {
        let (name, ctl) = markup(&Command::clean());
        assert_eq!(name, "Clean");
        assert_eq!(
            ctl.to_xml().unwrap(),
            r#"<ctl td="Clean"><clean type="auto" speed="standard" act="s"/></ctl>"#
        );
    }

    #[test]
    fn explicit_action_is_kept() {
        let (_, value, _) = json_body(&Command::Clean {
            mode: CleanMode::Edge,
            action: Some(CleanAction::Pause),
        });
        assert_eq!(value["body"]["data"]["act"], "pause");
        assert_eq!(value["body"]["data"]["type"], "border");
    }

    #[test]
    fn spot_area_carries_content_and_count() {
        let (_, value, _) = json_body(&Command::spot_area(["1", "4"], 2));
        assert_eq!(
            value["body"]["data"],
            json!({"act": "start", "content": "1,4", "count": 2, "type": "spotArea"})
        );

        let (_, ctl) = markup(&Command::spot_area(["1", "4"], 2));
        let clean = ctl.first_child().unwrap();
        assert_eq!(clean.attr("type"), Some("SpotArea"));
        assert_eq!(clean.attr("mid"), Some("1,4"));
        assert_eq!(clean.attr("deep"), Some("2"));
    }

    #[test]
    fn queries_without_arguments_omit_body() {
        let (name, value, _) = json_body(&Command::GetBatteryState);
        assert_eq!(name, "getBattery");
        assert!(value.get("body").is_none());
    }

    #[test]
    fn list_arguments() {
        let (name, value, _) = json_body(&Command::GetLifeSpan(Component::SideBrush));
        assert_eq!(name, "getLifeSpan");
        assert_eq!(value["body"]["data"], json!(["sideBrush"]));
    }

    #[test]
    fn legacy_attributes_on_ctl() {
        let (name, ctl) = markup(&Command::GetLifeSpan(Component::Filter));
        assert_eq!(name, "GetLifeSpan");
        assert_eq!(ctl.attr("type"), Some("DustCaseHeap"));

        let (_, ctl) = markup(&Command::SetCleanSpeed(CleanSpeed::Max));
        assert_eq!(ctl.first_child().unwrap().attr("speed"), Some("strong"));

        let (_, ctl) = markup(&Command::Move(MoveDirection::SpinLeft));
        assert_eq!(ctl.first_child().unwrap().attr("action"), Some("SpinLeft"));
    }

    #[test]
    fn routing_attribute_never_reaches_the_gateway() {
        let encoded = encode(&Command::GetChargeState, DeviceGeneration::Legacy).unwrap();
        assert_eq!(
            encoded.payload.to_gateway_value().unwrap(),
            json!("<ctl/>")
        );
    }

    #[test]
    fn map_queries() {
        let (name, value, _) = json_body(&Command::GetVirtualBoundaries {
            map_id: "7".into(),
            kind: BoundaryKind::NoMopZone,
        });
        assert_eq!(name, "getMapSet");
        assert_eq!(value["body"]["data"], json!({"mid": "7", "type": "mw"}));

        let (name, value, _) = json_body(&Command::GetSpotAreaInfo {
            map_id: "7".into(),
            area_id: "2".into(),
        });
        assert_eq!(name, "getMapSubSet");
        assert_eq!(value["body"]["data"]["mssid"], "2");
    }

    #[test]
    fn clean_logs_go_to_the_log_endpoint() {
        let (name, value, endpoint) = json_body(&Command::GetCleanLogs { count: 20 });
        assert_eq!(name, "GetCleanLogs");
        assert_eq!(endpoint, Endpoint::Log);
        assert_eq!(value["body"]["data"]["count"], 20);
    }

    #[test]
    fn unsupported_combinations_fail_to_encode() {
        let err = encode(&Command::GetMaps, DeviceGeneration::Legacy).unwrap_err();
        assert!(matches!(err, CoreError::Encoding { ref command, .. } if command == "GetMaps"));

        let err = encode(
            &Command::SetTime {
                timestamp: 0,
                timezone: 0,
            },
            DeviceGeneration::Json,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Encoding { .. }));
    }
}
