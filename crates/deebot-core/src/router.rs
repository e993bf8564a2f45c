// ── Event router ──
//
// Single writer of device state and map assembly. Each canonical event
// type maps to exactly one handler; the handler's result is re-emitted
// as a named public event.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::command::Command;
use crate::dictionary::{CleanSpeed, Component, WaterLevel};
use crate::event::{Decoded, Event, EventType};
use crate::map::{MapAssembler, MapSnapshot, MapUpdate};
use crate::model::{
    ChargeStatus, CleanLogEntry, CleanStatus, CleanSum, DeviceGeneration, ErrorInfo, MapInfo,
    NetInfo, Position, SpotAreaInfo, VirtualBoundary, VirtualBoundaryInfo,
};
use crate::state::DeviceState;

// ── Public events ────────────────────────────────────────────────────

/// Named notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum VacBotEvent {
    /// The backbone session is established and subscribed.
    Ready,
    /// The backbone reported a failure.
    SessionError(String),
    /// The backbone session ended.
    Closed,
    CleanReport(CleanStatus),
    ChargeState(ChargeStatus),
    /// Battery level as a fraction in `[0, 1]`.
    BatteryInfo(f64),
    LifeSpan {
        component: Component,
        percent: f64,
    },
    NetInfo(NetInfo),
    Position(Position),
    ChargePosition(Vec<Position>),
    Error(ErrorInfo),
    CleanSpeed(CleanSpeed),
    WaterLevel(WaterLevel),
    WaterBoxInfo(bool),
    CleanSum(CleanSum),
    CleanLogs(Vec<CleanLogEntry>),
    LastCleanLog(CleanLogEntry),
    Volume(u8),
    SleepStatus(bool),
    AutoEmpty(bool),
    RelocationState(bool),
    Maps(Vec<MapInfo>),
    SpotAreas {
        map_id: String,
        area_ids: Vec<String>,
    },
    VirtualBoundaries {
        map_id: String,
        boundaries: Vec<VirtualBoundary>,
    },
    SpotAreaInfo(SpotAreaInfo),
    VirtualBoundaryInfo(VirtualBoundaryInfo),
}

impl VacBotEvent {
    /// Public event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::SessionError(_) => "error",
            Self::Closed => "closed",
            Self::CleanReport(_) => "CleanReport",
            Self::ChargeState(_) => "ChargeState",
            Self::BatteryInfo(_) => "BatteryInfo",
            Self::LifeSpan { .. } => "LifeSpan",
            Self::NetInfo(_) => "NetInfo",
            Self::Position(_) => "Position",
            Self::ChargePosition(_) => "ChargePosition",
            Self::Error(_) => "Error",
            Self::CleanSpeed(_) => "CleanSpeed",
            Self::WaterLevel(_) => "WaterLevel",
            Self::WaterBoxInfo(_) => "WaterBoxInfo",
            Self::CleanSum(_) => "CleanSum",
            Self::CleanLogs(_) => "CleanLogs",
            Self::LastCleanLog(_) => "LastCleanLog",
            Self::Volume(_) => "Volume",
            Self::SleepStatus(_) => "SleepStatus",
            Self::AutoEmpty(_) => "AutoEmpty",
            Self::RelocationState(_) => "RelocationState",
            Self::Maps(_) => "Maps",
            Self::SpotAreas { .. } => "MapSpotAreas",
            Self::VirtualBoundaries { .. } => "MapVirtualBoundaries",
            Self::SpotAreaInfo(_) => "MapSpotAreaInfo",
            Self::VirtualBoundaryInfo(_) => "MapVirtualBoundaryInfo",
        }
    }
}

fn map_events(update: MapUpdate) -> Vec<VacBotEvent> {
    let event = match update {
        MapUpdate::Skip => return Vec::new(),
        MapUpdate::Maps(maps) => VacBotEvent::Maps(maps),
        MapUpdate::SpotAreas { map_id, area_ids } => VacBotEvent::SpotAreas { map_id, area_ids },
        MapUpdate::VirtualBoundaries { map_id, boundaries } => {
            VacBotEvent::VirtualBoundaries { map_id, boundaries }
        }
        MapUpdate::SpotAreaInfo(info) => VacBotEvent::SpotAreaInfo(info),
        MapUpdate::VirtualBoundaryInfo(info) => VacBotEvent::VirtualBoundaryInfo(info),
    };
    vec![event]
}

// ── Router ───────────────────────────────────────────────────────────

/// What routing one event produced.
#[derive(Debug, Default, PartialEq)]
pub struct RouteOutcome {
    pub events: Vec<VacBotEvent>,
    /// Query to issue next, e.g. the dock status after a run ends.
    pub follow_up: Option<Command>,
}

#[derive(Debug)]
pub struct EventRouter {
    state: DeviceState,
    maps: MapAssembler,
}

impl EventRouter {
    pub fn new(generation: DeviceGeneration) -> Self {
        Self {
            state: DeviceState::new(generation),
            maps: MapAssembler::new(),
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn maps(&self) -> &MapAssembler {
        &self.maps
    }

    /// Owned snapshots for publishing to readers.
    pub fn snapshots(&self) -> (Arc<DeviceState>, Arc<MapSnapshot>) {
        (Arc::new(self.state.clone()), Arc::new(self.maps.snapshot()))
    }

    pub fn reset_boundaries(&mut self, map_id: &str) {
        self.maps.reset_boundaries(map_id);
    }

    /// Route a decoder outcome. Rejections and skips produce nothing.
    pub fn route_decoded(&mut self, decoded: Decoded) -> RouteOutcome {
        match decoded {
            Decoded::Event(event) => self.route(&event),
            Decoded::Skip => RouteOutcome::default(),
            Decoded::Rejected { code, message } => {
                warn!(code = ?code, message = %message, "device rejected a command");
                RouteOutcome::default()
            }
        }
    }

    /// Apply one canonical event.
    pub fn route(&mut self, event: &Event) -> RouteOutcome {
        let was_at_rest = self.at_rest();
        let state = &mut self.state;

        let events = match &event.event_type {
            EventType::CleanReport => state.apply_clean_report(event),
            EventType::ChargeState => state.apply_charge_state(event),
            EventType::BatteryInfo => state.apply_battery(event),
            EventType::LifeSpan => state.apply_lifespan(event),
            EventType::NetInfo => state.apply_net_info(event),
            EventType::Position => state.apply_position(event, &self.maps),
            EventType::ChargePosition => state.apply_charge_position(event, &self.maps),
            EventType::Error => state.apply_error(event),
            EventType::CleanSpeed => state.apply_clean_speed(event),
            EventType::WaterInfo => state.apply_water_info(event),
            EventType::CleanSum => state.apply_clean_sum(event),
            EventType::CleanLogs => state.apply_clean_logs(event),
            EventType::LastCleanLog => state.apply_last_clean_log(event),
            EventType::Volume => state.apply_volume(event),
            EventType::SleepStatus => state.apply_sleep_status(event),
            EventType::AutoEmpty => state.apply_auto_empty(event),
            EventType::RelocationState => state.apply_relocation_state(event),
            EventType::Maps => map_events(self.maps.apply_maps(event)),
            EventType::MapSet => map_events(self.maps.apply_map_set(event)),
            EventType::MapSubset => map_events(self.maps.apply_map_subset(event)),
            EventType::Other(name) => {
                debug!(event = %name, "no handler for event");
                Vec::new()
            }
        };

        let follow_up = self
            .needs_dock_query(&event.event_type, was_at_rest)
            .then_some(Command::GetChargeState);
        RouteOutcome { events, follow_up }
    }

    fn at_rest(&self) -> bool {
        self.state.clean_status.is_some_and(CleanStatus::is_at_rest)
    }

    /// A run just ended, or a rest report arrived while the robot was
    /// last seen heading home (the return may have been cancelled).
    fn needs_dock_query(&self, event_type: &EventType, was_at_rest: bool) -> bool {
        if !self.at_rest() {
            return false;
        }
        let still_returning = *event_type == EventType::CleanReport
            && self.state.charge_status == Some(ChargeStatus::Returning);
        !was_at_rest || still_returning
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::dictionary::CleanMode;
    use crate::normalize::{Context, Normalizer};

    fn legacy_router() -> EventRouter {
        EventRouter::new(DeviceGeneration::Legacy)
    }

    #[test]
    fn charge_report_reemits_status() {
        let mut router = legacy_router();
        let outcome = router.route(&Event::new(EventType::ChargeState, json!({"type": "SlotCharging"})));
        assert_eq!(outcome.events, vec![VacBotEvent::ChargeState(ChargeStatus::Charging)]);
        assert_eq!(outcome.events[0].name(), "ChargeState");
        assert_eq!(router.state().charge_status, Some(ChargeStatus::Charging));
    }

    #[test]
    fn unknown_events_are_dropped() {
        let mut router = legacy_router();
        let outcome = router.route(&Event::new(EventType::Other("Sched".into()), json!({"a": 1})));
        assert_eq!(outcome, RouteOutcome::default());
    }

    #[test]
    fn rejections_produce_nothing() {
        let mut router = legacy_router();
        let outcome = router.route_decoded(Decoded::Rejected {
            code: Some("3".into()),
            message: "auth".into(),
        });
        assert!(outcome.events.is_empty());
    }

    #[test]
    fn run_ending_queries_the_dock() {
        let mut router = legacy_router();
        let cleaning = router.route(&Event::new(EventType::CleanReport, json!({"type": "auto"})));
        assert_eq!(
            cleaning.events,
            vec![VacBotEvent::CleanReport(CleanStatus::Cleaning(CleanMode::Auto))]
        );
        assert_eq!(cleaning.follow_up, None);

        let stopped = router.route(&Event::new(EventType::CleanReport, json!({"type": "stop"})));
        assert_eq!(stopped.follow_up, Some(Command::GetChargeState));

        // still at rest: no repeat
        let idle = router.route(&Event::new(EventType::CleanReport, json!({"type": "idle"})));
        assert_eq!(idle.follow_up, None);
    }

    #[test]
    fn cancelled_return_queries_the_dock_again() {
        let mut router = legacy_router();
        router.route(&Event::new(EventType::CleanReport, json!({"type": "idle"})));
        let going = router.route(&Event::new(EventType::ChargeState, json!({"type": "Going"})));
        assert_eq!(going.follow_up, None);
        assert_eq!(router.state().charge_status, Some(ChargeStatus::Returning));

        let idle = router.route(&Event::new(EventType::CleanReport, json!({"type": "idle"})));
        assert_eq!(idle.follow_up, Some(Command::GetChargeState));

        router.route(&Event::new(EventType::ChargeState, json!({"type": "SlotCharging"})));
        let docked = router.route(&Event::new(EventType::CleanReport, json!({"type": "idle"})));
        assert_eq!(docked.follow_up, None);
    }

    #[test]
    fn result_data_battery_reply_is_stored() {
        let decoded = Normalizer::Json
            .normalize(
                r#"{"resultCode":"0","resultData":{"value":42}}"#,
                Context::Command("getBattery"),
            )
            .unwrap();
        let outcome = EventRouter::new(DeviceGeneration::Json).route_decoded(decoded);
        assert_eq!(outcome.events, vec![VacBotEvent::BatteryInfo(0.42)]);
    }

    #[test]
    fn map_events_flow_through_the_assembler() {
        let mut router = EventRouter::new(DeviceGeneration::Json);
        let outcome = router.route(&Event::new(
            EventType::Maps,
            json!({"info": [{"mid": "7", "using": 1, "built": 1}]}),
        ));
        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].name(), "Maps");

        let walls = router.route(&Event::new(
            EventType::MapSet,
            json!({"type": "vw", "mid": "7", "subsets": [{"mssid": "1"}]}),
        ));
        assert!(walls.events.is_empty());

        let zones = router.route(&Event::new(
            EventType::MapSet,
            json!({"type": "mw", "mid": "7", "subsets": []}),
        ));
        assert_eq!(zones.events.len(), 1);
        assert_eq!(zones.events[0].name(), "MapVirtualBoundaries");
    }

    #[test]
    fn snapshots_are_detached() {
        let mut router = EventRouter::new(DeviceGeneration::Json);
        let (before, _) = router.snapshots();
        router.route(&Event::new(EventType::BatteryInfo, json!({"value": 80})));
        assert_eq!(before.battery, None);
        assert_eq!(router.snapshots().0.battery_percent(), Some(80));
    }
}
