// Per-report state handlers.
//
// Each handler reads one canonical event, updates the fields it owns and
// returns the public events to emit. Anything unreadable is logged and
// the previous value stays.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use super::DeviceState;
use crate::dictionary::{CleanAction, CleanMode, CleanSpeed, Component, WaterLevel, error_description};
use crate::event::{Event, value_num, value_str};
use crate::map::MapAssembler;
use crate::model::{
    ChargeStatus, CleanLogEntry, CleanStatus, CleanSum, DeviceGeneration, ErrorInfo, NetInfo,
    Position,
};
use crate::router::VacBotEvent;

/// Failure codes a charge command returns when the robot already sits
/// on the dock: legacy errno and JSON body code.
const ALREADY_CHARGING: [&str; 2] = ["8", "30007"];

impl DeviceState {
    // ── Power ────────────────────────────────────────────────────────

    pub(crate) fn apply_battery(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let level = event.num_field("value").or_else(|| event.num_field("power"));
        match level {
            Some(level) if (0.0..=100.0).contains(&level) => {
                let fraction = level / 100.0;
                self.battery = Some(fraction);
                vec![VacBotEvent::BatteryInfo(fraction)]
            }
            _ => {
                warn!(data = %event.data, "unreadable battery report");
                Vec::new()
            }
        }
    }

    pub(crate) fn apply_charge_state(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let status = if event.success {
            charge_status(event)
        } else if event
            .result_code
            .as_deref()
            .is_some_and(|code| ALREADY_CHARGING.contains(&code))
        {
            Some(ChargeStatus::Charging)
        } else {
            warn!(code = ?event.result_code, "charge command failed");
            None
        };

        match status {
            Some(status) => self.set_charge_status(status),
            None => Vec::new(),
        }
    }

    fn set_charge_status(&mut self, status: ChargeStatus) -> Vec<VacBotEvent> {
        self.charge_status = Some(status);
        vec![VacBotEvent::ChargeState(status)]
    }

    // ── Cleaning ─────────────────────────────────────────────────────

    pub(crate) fn apply_clean_report(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let mut events = Vec::new();
        let status = match self.generation {
            DeviceGeneration::Legacy => {
                if let Some(speed) = event
                    .str_field("speed")
                    .and_then(|s| CleanSpeed::from_legacy_code(&s))
                {
                    self.clean_speed = Some(speed);
                    events.push(VacBotEvent::CleanSpeed(speed));
                }
                legacy_clean_status(event)
            }
            DeviceGeneration::Json => self.json_clean_status(event),
        };

        let Some(status) = status else {
            warn!(data = %event.data, "unreadable clean report");
            return events;
        };
        self.clean_status = Some(status);
        events.push(VacBotEvent::CleanReport(status));
        if status == CleanStatus::Returning {
            events.extend(self.set_charge_status(ChargeStatus::Returning));
        }
        events
    }

    fn json_clean_status(&mut self, event: &Event) -> Option<CleanStatus> {
        match event.str_field("state")?.as_str() {
            "idle" => Some(CleanStatus::Idle),
            "goCharging" => Some(CleanStatus::Returning),
            "clean" => {
                let clean_state = event.data.get("cleanState")?;
                let motion = clean_state.get("motionState").and_then(Value::as_str);
                match motion {
                    Some("pause") => return Some(CleanStatus::Paused),
                    Some("stop") => return Some(CleanStatus::Stopped),
                    _ => {}
                }
                let mode = CleanMode::from_code(clean_state.get("type").and_then(Value::as_str)?)?;
                if mode == CleanMode::CustomArea {
                    self.custom_area = clean_state.get("content").and_then(value_str);
                }
                Some(CleanStatus::Cleaning(mode))
            }
            other => {
                warn!(state = other, "unknown clean state");
                None
            }
        }
    }

    pub(crate) fn apply_clean_speed(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let speed = match self.generation {
            DeviceGeneration::Legacy => event
                .str_field("speed")
                .and_then(|s| CleanSpeed::from_legacy_code(&s)),
            DeviceGeneration::Json => event
                .num_field("speed")
                .and_then(|n| CleanSpeed::from_json_code(n as i64)),
        };
        match speed {
            Some(speed) => {
                self.clean_speed = Some(speed);
                vec![VacBotEvent::CleanSpeed(speed)]
            }
            None => {
                warn!(data = %event.data, "unknown clean speed");
                Vec::new()
            }
        }
    }

    pub(crate) fn apply_water_info(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let mut events = Vec::new();
        let level = event
            .num_field("amount")
            .or_else(|| event.num_field("v"))
            .and_then(|n| WaterLevel::from_code(n as i64));
        match level {
            Some(level) => {
                self.water_level = Some(level);
                events.push(VacBotEvent::WaterLevel(level));
            }
            None => warn!(data = %event.data, "unknown water level"),
        }
        if let Some(enable) = event.num_field("enable") {
            let attached = enable != 0.0;
            self.water_box_attached = Some(attached);
            events.push(VacBotEvent::WaterBoxInfo(attached));
        }
        events
    }

    // ── Wear and faults ──────────────────────────────────────────────

    pub(crate) fn apply_lifespan(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let entries: Vec<&Value> = match &event.data {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let mut events = Vec::new();
        for entry in entries {
            let Some(code) = entry.get("type").and_then(value_str) else {
                warn!(entry = %entry, "lifespan entry without a component");
                continue;
            };
            let Some(component) = Component::from_code(&code) else {
                warn!(code = %code, "unknown component");
                continue;
            };
            let Some(percent) = lifespan_percent(entry) else {
                warn!(entry = %entry, "lifespan entry without a reading");
                continue;
            };
            self.lifespans.insert(component, percent);
            events.push(VacBotEvent::LifeSpan { component, percent });
        }
        events
    }

    pub(crate) fn apply_error(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let raw = ["code", "errs", "error", "errno"]
            .iter()
            .find_map(|key| event.data.get(*key));
        let code = match raw {
            Some(Value::Array(items)) => Some(items.first().and_then(value_str).unwrap_or_else(|| "0".into())),
            Some(value) => value_str(value).map(|s| {
                let first = s.split(',').next().unwrap_or_default().trim();
                if first.is_empty() { "0".to_owned() } else { first.to_owned() }
            }),
            None => None,
        };
        let Some(code) = code else {
            warn!(data = %event.data, "error report without a code");
            return Vec::new();
        };

        let description = error_description(&code)
            .map_or_else(|| format!("unknown errorCode: {code}"), str::to_owned);
        let info = ErrorInfo { code, description };
        self.error = Some(info.clone());
        vec![VacBotEvent::Error(info)]
    }

    // ── Position ─────────────────────────────────────────────────────

    /// Robot and dock poses. A pose only counts as changed when some
    /// field differs; the spot area is re-resolved on every report so an
    /// `"unknown"` area resolves as soon as the geometry allows.
    pub(crate) fn apply_position(&mut self, event: &Event, maps: &MapAssembler) -> Vec<VacBotEvent> {
        let mut events = Vec::new();

        let robot = event.data.get("deebotPos").unwrap_or(&event.data);
        match pose(robot, maps) {
            Some(position) => {
                // An unresolved spot area counts as a change until it resolves.
                let stale = self
                    .position
                    .as_ref()
                    .is_none_or(|prev| *prev != position || prev.area_unresolved());
                if stale {
                    self.position = Some(position.clone());
                    events.push(VacBotEvent::Position(position));
                }
            }
            None if event.data.get("chargePos").is_none() => {
                warn!(data = %event.data, "unreadable position report");
            }
            None => {}
        }

        if let Some(chargers) = event.data.get("chargePos") {
            events.extend(self.set_charger_positions(chargers, maps));
        }
        events
    }

    pub(crate) fn apply_charge_position(&mut self, event: &Event, maps: &MapAssembler) -> Vec<VacBotEvent> {
        self.set_charger_positions(&event.data, maps)
    }

    fn set_charger_positions(&mut self, value: &Value, maps: &MapAssembler) -> Vec<VacBotEvent> {
        let chargers: Vec<Position> = match value {
            Value::Array(items) => items.iter().filter_map(|v| pose(v, maps)).collect(),
            other => pose(other, maps).into_iter().collect(),
        };
        if chargers.is_empty() || chargers == self.charger_positions {
            return Vec::new();
        }
        self.charger_positions.clone_from(&chargers);
        vec![VacBotEvent::ChargePosition(chargers)]
    }

    // ── Connectivity and settings ────────────────────────────────────

    pub(crate) fn apply_net_info(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let info = NetInfo {
            ip: event.str_field("ip"),
            ssid: event.str_field("ssid"),
            rssi: event.str_field("rssi"),
            mac: event.str_field("mac"),
        };
        if info == NetInfo::default() {
            warn!(data = %event.data, "empty network report");
            return Vec::new();
        }
        self.net_info = Some(info.clone());
        vec![VacBotEvent::NetInfo(info)]
    }

    pub(crate) fn apply_volume(&mut self, event: &Event) -> Vec<VacBotEvent> {
        match event.num_field("volume") {
            Some(volume) if (0.0..=255.0).contains(&volume) => {
                let volume = volume as u8;
                self.volume = Some(volume);
                vec![VacBotEvent::Volume(volume)]
            }
            _ => {
                warn!(data = %event.data, "unreadable volume");
                Vec::new()
            }
        }
    }

    pub(crate) fn apply_sleep_status(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let Some(enable) = event.num_field("enable") else {
            warn!(data = %event.data, "unreadable sleep status");
            return Vec::new();
        };
        let sleeping = enable != 0.0;
        self.sleeping = Some(sleeping);
        vec![VacBotEvent::SleepStatus(sleeping)]
    }

    pub(crate) fn apply_auto_empty(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let Some(enable) = event.num_field("enable") else {
            warn!(data = %event.data, "unreadable auto-empty status");
            return Vec::new();
        };
        let enabled = enable != 0.0;
        self.auto_empty = Some(enabled);
        vec![VacBotEvent::AutoEmpty(enabled)]
    }

    pub(crate) fn apply_relocation_state(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let state = match event.data.get("state") {
            Some(Value::Array(items)) => items
                .first()
                .and_then(|item| item.get("state"))
                .and_then(value_str),
            Some(other) => value_str(other),
            None => None,
        };
        let Some(state) = state else {
            warn!(data = %event.data, "unreadable relocation state");
            return Vec::new();
        };
        let required = state != "ok";
        self.relocation_required = Some(required);
        vec![VacBotEvent::RelocationState(required)]
    }

    // ── Statistics and logs ──────────────────────────────────────────

    pub(crate) fn apply_clean_sum(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let field = |json: &str, legacy: &str| {
            event
                .num_field(json)
                .or_else(|| event.num_field(legacy))
                .map(|n| n.max(0.0) as u64)
        };
        let (Some(area), Some(seconds), Some(count)) =
            (field("area", "a"), field("time", "l"), field("count", "c"))
        else {
            warn!(data = %event.data, "incomplete clean statistics");
            return Vec::new();
        };
        let sum = CleanSum { area, seconds, count };
        self.clean_sum = Some(sum);
        vec![VacBotEvent::CleanSum(sum)]
    }

    pub(crate) fn apply_clean_logs(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let items = event
            .data
            .get("logs")
            .or_else(|| event.data.get("items"))
            .and_then(Value::as_array);
        let Some(items) = items else {
            warn!("clean log reply without entries");
            return Vec::new();
        };

        let entries: Vec<CleanLogEntry> = items.iter().filter_map(clean_log_entry).collect();
        for entry in &entries {
            self.clean_logs.insert(entry.id.clone(), entry.clone());
        }
        let newest = self
            .clean_logs
            .values()
            .max_by_key(|entry| entry.timestamp)
            .cloned();
        if newest.is_some() {
            self.last_clean_log = newest;
        }
        vec![VacBotEvent::CleanLogs(entries)]
    }

    pub(crate) fn apply_last_clean_log(&mut self, event: &Event) -> Vec<VacBotEvent> {
        let Some(entry) = event.data.get("log").and_then(clean_log_entry) else {
            warn!(data = %event.data, "unreadable last clean log");
            return Vec::new();
        };
        self.clean_logs.insert(entry.id.clone(), entry.clone());
        self.last_clean_log = Some(entry.clone());
        vec![VacBotEvent::LastCleanLog(entry)]
    }
}

// ── Field readers ────────────────────────────────────────────────────

fn charge_status(event: &Event) -> Option<ChargeStatus> {
    if let Some(flag) = event.num_field("isCharging") {
        return match flag as i64 {
            1 => Some(ChargeStatus::Charging),
            0 => Some(ChargeStatus::Idle),
            _ => {
                warn!(flag, "unknown isCharging value");
                None
            }
        };
    }
    let kind = event.str_field("type")?;
    match kind.to_ascii_lowercase().as_str() {
        "going" => Some(ChargeStatus::Returning),
        "slotcharging" | "wirecharging" => Some(ChargeStatus::Charging),
        "idle" => Some(ChargeStatus::Idle),
        _ => {
            warn!(kind = %kind, "unknown charge state");
            None
        }
    }
}

fn legacy_clean_status(event: &Event) -> Option<CleanStatus> {
    let action = event
        .str_field("st")
        .or_else(|| event.str_field("act"))
        .and_then(|code| CleanAction::from_legacy_code(&code));
    match action {
        Some(CleanAction::Stop) => return Some(CleanStatus::Stopped),
        Some(CleanAction::Pause) => return Some(CleanStatus::Paused),
        _ => {}
    }
    let kind = event.str_field("type")?;
    match kind.to_ascii_lowercase().as_str() {
        "stop" => Some(CleanStatus::Stopped),
        "idle" => Some(CleanStatus::Idle),
        "going" => Some(CleanStatus::Returning),
        _ => CleanMode::from_code(&kind).map(CleanStatus::Cleaning),
    }
}

/// Remaining life in percent. `val` readings are hundredths of a
/// percent without a total; `left` readings are minutes without one.
fn lifespan_percent(entry: &Value) -> Option<f64> {
    let total = entry
        .get("total")
        .and_then(value_num)
        .filter(|total| *total > 0.0);
    if let Some(val) = entry.get("val").and_then(value_num) {
        return Some(total.map_or(val / 100.0, |total| val / total * 100.0));
    }
    let left = entry.get("left").and_then(value_num)?;
    Some(total.map_or(left / 60.0, |total| left / total * 100.0))
}

/// One pose from `{x, y, a, invalid}` (JSON) or `{p: "x,y", a}` (legacy).
fn pose(value: &Value, maps: &MapAssembler) -> Option<Position> {
    let (x, y) = match value.get("p").and_then(Value::as_str) {
        Some(p) => {
            let (x, y) = p.split_once(',')?;
            (x.trim().parse::<f64>().ok()?, y.trim().parse::<f64>().ok()?)
        }
        None => (
            value.get("x").and_then(value_num)?,
            value.get("y").and_then(value_num)?,
        ),
    };
    let angle = value.get("a").and_then(value_num).unwrap_or(0.0);
    let is_invalid = value
        .get("invalid")
        .and_then(value_num)
        .is_some_and(|flag| flag != 0.0);
    let spot_area_id = maps
        .spot_area_at(x, y)
        .unwrap_or_else(|| Position::UNKNOWN_AREA.to_owned());

    Some(Position {
        x: x.round() as i64,
        y: y.round() as i64,
        angle: angle.round() as i64,
        is_invalid,
        spot_area_id,
    })
}

fn clean_log_entry(value: &Value) -> Option<CleanLogEntry> {
    let get = |json: &str, legacy: &str| value.get(json).or_else(|| value.get(legacy));
    let timestamp_secs = get("ts", "s").and_then(value_num).map(|n| n as i64);
    let id = value
        .get("id")
        .and_then(value_str)
        .or_else(|| timestamp_secs.map(|ts| ts.to_string()))?;

    Some(CleanLogEntry {
        id,
        timestamp: timestamp_secs.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        square_meters: get("area", "a").and_then(value_num).map(|n| n.max(0.0) as u64),
        duration_secs: get("last", "l").and_then(value_num).map(|n| n.max(0.0) as u64),
        clean_type: get("type", "t").and_then(value_str),
        stop_reason: value.get("stopReason").and_then(value_num).map(|n| n as i64),
        image_url: value.get("imageUrl").and_then(value_str),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::event::EventType;

    fn legacy() -> DeviceState {
        DeviceState::new(DeviceGeneration::Legacy)
    }

    fn json_state() -> DeviceState {
        DeviceState::new(DeviceGeneration::Json)
    }

    fn ev(event_type: EventType, data: Value) -> Event {
        Event::new(event_type, data)
    }

    // ── Battery ──

    #[test]
    fn battery_is_stored_as_fraction() {
        let mut state = json_state();
        let events = state.apply_battery(&ev(EventType::BatteryInfo, json!({"value": 42, "isLow": 0})));
        assert_eq!(state.battery, Some(0.42));
        assert_eq!(state.battery_percent(), Some(42));
        assert_eq!(events, vec![VacBotEvent::BatteryInfo(0.42)]);

        let mut state = legacy();
        state.apply_battery(&ev(EventType::BatteryInfo, json!({"power": "082"})));
        assert_eq!(state.battery_percent(), Some(82));
    }

    #[test]
    fn non_numeric_battery_keeps_previous_value() {
        let mut state = json_state();
        state.apply_battery(&ev(EventType::BatteryInfo, json!({"value": 55})));
        let events = state.apply_battery(&ev(EventType::BatteryInfo, json!({"value": "full"})));
        assert!(events.is_empty());
        assert_eq!(state.battery_percent(), Some(55));
    }

    // ── Charge ──

    #[test]
    fn legacy_charge_types() {
        let mut state = legacy();
        let events = state.apply_charge_state(&ev(EventType::ChargeState, json!({"type": "SlotCharging"})));
        assert_eq!(state.charge_status, Some(ChargeStatus::Charging));
        assert_eq!(events, vec![VacBotEvent::ChargeState(ChargeStatus::Charging)]);

        state.apply_charge_state(&ev(EventType::ChargeState, json!({"type": "Going"})));
        assert_eq!(state.charge_status, Some(ChargeStatus::Returning));

        state.apply_charge_state(&ev(EventType::ChargeState, json!({"type": "WireCharging"})));
        assert_eq!(state.charge_status, Some(ChargeStatus::Charging));

        state.apply_charge_state(&ev(EventType::ChargeState, json!({"type": "Idle"})));
        assert_eq!(state.charge_status, Some(ChargeStatus::Idle));
    }

    #[test]
    fn unknown_charge_value_leaves_state() {
        let mut state = legacy();
        state.apply_charge_state(&ev(EventType::ChargeState, json!({"type": "Going"})));
        let events = state.apply_charge_state(&ev(EventType::ChargeState, json!({"type": "Flying"})));
        assert!(events.is_empty());
        assert_eq!(state.charge_status, Some(ChargeStatus::Returning));
    }

    #[test]
    fn json_charging_flag() {
        let mut state = json_state();
        state.apply_charge_state(&ev(EventType::ChargeState, json!({"isCharging": 1, "mode": "slot"})));
        assert_eq!(state.charge_status, Some(ChargeStatus::Charging));
        state.apply_charge_state(&ev(EventType::ChargeState, json!({"isCharging": 0})));
        assert_eq!(state.charge_status, Some(ChargeStatus::Idle));
    }

    #[test]
    fn failed_charge_on_dock_means_charging() {
        let mut state = json_state();
        let event = Event {
            event_type: EventType::ChargeState,
            success: false,
            result_code: Some("30007".into()),
            data: json!({}),
        };
        state.apply_charge_state(&event);
        assert_eq!(state.charge_status, Some(ChargeStatus::Charging));
    }

    // ── Clean report ──

    #[test]
    fn legacy_clean_report_with_speed() {
        let mut state = legacy();
        let events = state.apply_clean_report(&ev(
            EventType::CleanReport,
            json!({"type": "auto", "speed": "strong", "st": "s"}),
        ));
        assert_eq!(state.clean_status, Some(CleanStatus::Cleaning(CleanMode::Auto)));
        assert_eq!(state.clean_speed, Some(CleanSpeed::Max));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn stop_action_overrides_mode() {
        let mut state = legacy();
        state.apply_clean_report(&ev(EventType::CleanReport, json!({"type": "border", "st": "h"})));
        assert_eq!(state.clean_status, Some(CleanStatus::Stopped));
        state.apply_clean_report(&ev(EventType::CleanReport, json!({"type": "border", "act": "p"})));
        assert_eq!(state.clean_status, Some(CleanStatus::Paused));
    }

    #[test]
    fn json_clean_info() {
        let mut state = json_state();
        state.apply_clean_report(&ev(
            EventType::CleanReport,
            json!({"trigger": "app", "state": "clean",
                   "cleanState": {"type": "customArea", "content": "1,2,3,4", "motionState": "working"}}),
        ));
        assert_eq!(state.clean_status, Some(CleanStatus::Cleaning(CleanMode::CustomArea)));
        assert_eq!(state.custom_area.as_deref(), Some("1,2,3,4"));

        state.apply_clean_report(&ev(
            EventType::CleanReport,
            json!({"state": "clean", "cleanState": {"type": "auto", "motionState": "pause"}}),
        ));
        assert_eq!(state.clean_status, Some(CleanStatus::Paused));
    }

    #[test]
    fn returning_also_sets_charge_status() {
        let mut state = json_state();
        let events = state.apply_clean_report(&ev(EventType::CleanReport, json!({"state": "goCharging"})));
        assert_eq!(state.charge_status, Some(ChargeStatus::Returning));
        assert_eq!(
            events,
            vec![
                VacBotEvent::CleanReport(CleanStatus::Returning),
                VacBotEvent::ChargeState(ChargeStatus::Returning)
            ]
        );
    }

    // ── Lifespan ──

    #[test]
    fn lifespan_left_over_total() {
        let mut state = json_state();
        let events = state.apply_lifespan(&ev(
            EventType::LifeSpan,
            json!([{"type": "brush", "left": 9000, "total": 18000},
                   {"type": "heap", "left": 60, "total": 240}]),
        ));
        assert_eq!(events.len(), 2);
        assert_eq!(state.lifespan(Component::MainBrush), Some(50.0));
        assert_eq!(state.lifespan(Component::Filter), Some(25.0));
    }

    #[test]
    fn lifespan_fallback_scales() {
        let mut state = legacy();
        state.apply_lifespan(&ev(EventType::LifeSpan, json!({"type": "SideBrush", "val": "9650"})));
        assert_eq!(state.lifespan(Component::SideBrush), Some(96.5));
        state.apply_lifespan(&ev(EventType::LifeSpan, json!({"type": "Brush", "left": "120"})));
        assert_eq!(state.lifespan(Component::MainBrush), Some(2.0));
    }

    #[test]
    fn unknown_component_is_skipped() {
        let mut state = json_state();
        let events = state.apply_lifespan(&ev(
            EventType::LifeSpan,
            json!([{"type": "unitCare", "left": 1, "total": 2}, {"type": "sideBrush", "left": 1, "total": 4}]),
        ));
        assert_eq!(events, vec![VacBotEvent::LifeSpan { component: Component::SideBrush, percent: 25.0 }]);
    }

    // ── Error ──

    #[test]
    fn error_codes_resolve() {
        let mut state = json_state();
        state.apply_error(&ev(EventType::Error, json!({"code": [105]})));
        assert_eq!(state.error.as_ref().unwrap().description, "Stuck: Robot is stuck");

        let mut state = legacy();
        state.apply_error(&ev(EventType::Error, json!({"errs": "4242"})));
        let error = state.error.unwrap();
        assert_eq!(error.code, "4242");
        assert_eq!(error.description, "unknown errorCode: 4242");
    }

    #[test]
    fn empty_error_list_is_no_error() {
        let mut state = json_state();
        state.apply_error(&ev(EventType::Error, json!({"code": []})));
        assert_eq!(state.error.unwrap().code, "0");
    }

    // ── Position ──

    fn maps_with_kitchen() -> MapAssembler {
        let mut maps = MapAssembler::new();
        maps.apply_maps(&ev(EventType::Maps, json!({"info": [{"mid": "1", "using": 1}]})));
        maps.apply_map_subset(&ev(
            EventType::MapSubset,
            json!({"type": "ar", "mid": "1", "mssid": "kitchen", "value": "0,0;100,0;100,100;0,100"}),
        ));
        maps
    }

    #[test]
    fn identical_position_does_not_notify() {
        let maps = maps_with_kitchen();
        let mut state = json_state();
        let report = ev(EventType::Position, json!({"deebotPos": {"x": 10, "y": 20, "a": 90, "invalid": 0}}));

        let first = state.apply_position(&report, &maps);
        assert_eq!(first.len(), 1);
        assert_eq!(state.position.as_ref().unwrap().spot_area_id, "kitchen");

        assert!(state.apply_position(&report, &maps).is_empty());

        let turned = ev(EventType::Position, json!({"deebotPos": {"x": 10, "y": 20, "a": 180, "invalid": 0}}));
        assert_eq!(state.apply_position(&turned, &maps).len(), 1);
    }

    #[test]
    fn unknown_area_resolves_once_geometry_arrives() {
        let mut maps = MapAssembler::new();
        let mut state = legacy();
        let report = ev(EventType::Position, json!({"p": "10,20", "a": "0"}));

        state.apply_position(&report, &maps);
        assert!(state.position.as_ref().unwrap().area_unresolved());

        // no geometry yet: the repeat is still reported
        let repeat = state.apply_position(&report, &maps);
        assert_eq!(repeat.len(), 1);
        assert!(state.position.as_ref().unwrap().area_unresolved());

        maps = maps_with_kitchen();
        let events = state.apply_position(&report, &maps);
        assert_eq!(events.len(), 1);
        assert_eq!(state.position.as_ref().unwrap().spot_area_id, "kitchen");
    }

    #[test]
    fn charger_positions() {
        let maps = MapAssembler::new();
        let mut state = json_state();
        let events = state.apply_position(
            &ev(EventType::Position, json!({"chargePos": [{"x": 1, "y": 2, "a": 0}]})),
            &maps,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(state.charger_positions.len(), 1);
        assert!(state.position.is_none());
    }

    // ── Statistics and logs ──

    #[test]
    fn clean_sum_from_both_dialects() {
        let mut state = json_state();
        state.apply_clean_sum(&ev(EventType::CleanSum, json!({"area": 1200, "time": 36000, "count": 50})));
        assert_eq!(state.clean_sum, Some(CleanSum { area: 1200, seconds: 36000, count: 50 }));

        let mut state = legacy();
        state.apply_clean_sum(&ev(EventType::CleanSum, json!({"a": "30", "l": "1800", "c": "2"})));
        assert_eq!(state.clean_sum.unwrap().count, 2);
    }

    #[test]
    fn clean_logs_keyed_by_id() {
        let mut state = json_state();
        state.apply_clean_logs(&ev(
            EventType::CleanLogs,
            json!({"logs": [
                {"id": "a", "ts": 1_600_000_000, "last": 1200, "area": 20, "type": "auto", "imageUrl": "http://x/a.png"},
                {"id": "b", "ts": 1_700_000_000, "last": 600, "area": 10, "type": "spotArea", "stopReason": 1}
            ]}),
        ));
        assert_eq!(state.clean_logs.len(), 2);
        assert_eq!(state.last_clean_log.as_ref().unwrap().id, "b");

        state.apply_last_clean_log(&ev(
            EventType::LastCleanLog,
            json!({"log": {"id": "c", "ts": 1_800_000_000, "last": 60, "area": 1}}),
        ));
        assert_eq!(state.clean_logs.len(), 3);
        assert_eq!(state.last_clean_log.unwrap().id, "c");
    }

    // ── Settings ──

    #[test]
    fn water_and_toggles() {
        let mut state = json_state();
        state.apply_water_info(&ev(EventType::WaterInfo, json!({"amount": 3, "enable": 1})));
        assert_eq!(state.water_level, Some(WaterLevel::High));
        assert_eq!(state.water_box_attached, Some(true));

        state.apply_volume(&ev(EventType::Volume, json!({"volume": 7, "total": 10})));
        assert_eq!(state.volume, Some(7));

        state.apply_sleep_status(&ev(EventType::SleepStatus, json!({"enable": 0})));
        assert_eq!(state.sleeping, Some(false));

        state.apply_auto_empty(&ev(EventType::AutoEmpty, json!({"enable": 1})));
        assert_eq!(state.auto_empty, Some(true));

        state.apply_relocation_state(&ev(
            EventType::RelocationState,
            json!({"state": [{"type": "manu", "state": "ok"}]}),
        ));
        assert_eq!(state.relocation_required, Some(false));

        state.apply_net_info(&ev(EventType::NetInfo, json!({"ip": "10.0.0.5", "ssid": "home", "rssi": "-50"})));
        assert_eq!(state.net_info.as_ref().unwrap().ssid.as_deref(), Some("home"));
    }
}
