// ── Command API ──
//
// Every outbound operation is a `Command` variant carrying its own typed
// arguments. The codec renders a variant for the device's dialect; the
// session routes the rendered payload to the gateway or the stanza
// stream.

pub mod codec;

use strum::IntoStaticStr;

use crate::dictionary::{CleanAction, CleanMode, CleanSpeed, Component, MoveDirection, WaterLevel};
use crate::error::CoreError;
use crate::model::BoundaryKind;
use crate::router::VacBotEvent;

pub use codec::{EncodedCommand, encode};

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All operations a robot accepts.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
pub enum Command {
    // ── Cleaning ─────────────────────────────────────────────────────
    /// Start or change a cleaning run. A missing action means `start`.
    Clean {
        mode: CleanMode,
        action: Option<CleanAction>,
    },
    SpotArea {
        area_ids: Vec<String>,
        cleanings: u8,
        action: Option<CleanAction>,
    },
    CustomArea {
        /// `x1,y1,x2,y2` rectangle in map coordinates.
        coordinates: String,
        cleanings: u8,
        action: Option<CleanAction>,
    },
    Pause,
    Resume,
    Stop,
    Charge,
    Move(MoveDirection),
    Relocate,
    PlaySound { sid: u32 },

    // ── Settings ─────────────────────────────────────────────────────
    SetCleanSpeed(CleanSpeed),
    SetWaterLevel(WaterLevel),
    ResetLifeSpan(Component),
    SetVolume(u8),
    SetAutoEmpty(bool),
    SetTime {
        timestamp: i64,
        /// Offset from UTC in hours.
        timezone: i32,
    },

    // ── Status queries ───────────────────────────────────────────────
    GetCleanState,
    GetCleanSpeed,
    GetCleanSum,
    GetChargeState,
    GetBatteryState,
    GetLifeSpan(Component),
    GetWaterInfo,
    GetNetInfo,
    GetPosition,
    GetChargerPosition,
    GetError,
    GetSleepStatus,
    GetVolume,
    GetAutoEmpty,

    // ── Maps ─────────────────────────────────────────────────────────
    GetMaps,
    GetSpotAreas {
        map_id: String,
    },
    GetSpotAreaInfo {
        map_id: String,
        area_id: String,
    },
    GetVirtualBoundaries {
        map_id: String,
        kind: BoundaryKind,
    },
    GetVirtualBoundaryInfo {
        map_id: String,
        kind: BoundaryKind,
        boundary_id: String,
    },
    AddVirtualBoundary {
        map_id: String,
        kind: BoundaryKind,
        coordinates: String,
    },
    DeleteVirtualBoundary {
        map_id: String,
        kind: BoundaryKind,
        boundary_id: String,
    },

    // ── Clean logs ───────────────────────────────────────────────────
    GetCleanLogs { count: u32 },
    GetLastCleanLog,
}

impl Command {
    /// Auto clean with the default action.
    pub fn clean() -> Self {
        Self::Clean {
            mode: CleanMode::Auto,
            action: None,
        }
    }

    pub fn clean_mode(mode: CleanMode) -> Self {
        Self::Clean { mode, action: None }
    }

    pub fn edge() -> Self {
        Self::clean_mode(CleanMode::Edge)
    }

    pub fn spot() -> Self {
        Self::clean_mode(CleanMode::Spot)
    }

    pub fn spot_area<I, S>(area_ids: I, cleanings: u8) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::SpotArea {
            area_ids: area_ids.into_iter().map(Into::into).collect(),
            cleanings,
            action: None,
        }
    }

    pub fn custom_area(coordinates: impl Into<String>, cleanings: u8) -> Self {
        Self::CustomArea {
            coordinates: coordinates.into(),
            cleanings,
            action: None,
        }
    }

    /// Logical command name, independent of the wire dialect.
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Result of a command execution.
#[derive(Debug)]
pub enum CommandResult {
    /// Pushed onto the stanza stream; the reply arrives as a report.
    Sent,
    /// The gateway reply was applied; these are the public events it
    /// produced (possibly none for plain acknowledgements).
    Applied(Vec<VacBotEvent>),
}
