// ── Device state ──
//
// The last known value of every robot field. Fields update
// independently; a report that cannot be read leaves its field alone.
// Only the event router writes; readers get cloned snapshots.

mod handlers;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::dictionary::{CleanSpeed, Component, WaterLevel};
use crate::model::{
    ChargeStatus, CleanLogEntry, CleanStatus, CleanSum, DeviceGeneration, ErrorInfo, NetInfo,
    Position,
};

/// Snapshot of everything known about one robot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceState {
    pub generation: DeviceGeneration,
    /// Battery level as a fraction in `[0, 1]`.
    pub battery: Option<f64>,
    pub charge_status: Option<ChargeStatus>,
    pub clean_status: Option<CleanStatus>,
    /// Coordinates of the last custom-area run.
    pub custom_area: Option<String>,
    pub clean_speed: Option<CleanSpeed>,
    pub water_level: Option<WaterLevel>,
    pub water_box_attached: Option<bool>,
    /// Remaining life per component, in percent.
    pub lifespans: BTreeMap<Component, f64>,
    pub error: Option<ErrorInfo>,
    pub net_info: Option<NetInfo>,
    pub volume: Option<u8>,
    pub sleeping: Option<bool>,
    pub auto_empty: Option<bool>,
    pub relocation_required: Option<bool>,
    pub position: Option<Position>,
    pub charger_positions: Vec<Position>,
    pub clean_sum: Option<CleanSum>,
    /// Clean log entries keyed by log id.
    pub clean_logs: BTreeMap<String, CleanLogEntry>,
    pub last_clean_log: Option<CleanLogEntry>,
}

impl DeviceState {
    pub fn new(generation: DeviceGeneration) -> Self {
        Self {
            generation,
            ..Self::default()
        }
    }

    /// Battery level in whole percent.
    pub fn battery_percent(&self) -> Option<u8> {
        self.battery
            .map(|fraction| (fraction * 100.0).round().clamp(0.0, 100.0) as u8)
    }

    pub fn lifespan(&self, component: Component) -> Option<f64> {
        self.lifespans.get(&component).copied()
    }
}
