// deebot-core: Typed commands, event normalization and device state on top of deebot-api.

pub mod command;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod event;
pub mod geometry;
pub mod map;
pub mod model;
pub mod normalize;
pub mod router;
pub mod state;
pub mod stream;
pub mod vacbot;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult, EncodedCommand, encode};
pub use config::{DEFAULT_KEEPALIVE, DeviceDescriptor, ServerOverride, SessionConfig};
pub use error::CoreError;
pub use event::{Decoded, Event, EventType};
pub use map::{MapAssembler, MapSnapshot, MapUpdate};
pub use normalize::{Context, Normalizer};
pub use router::{EventRouter, RouteOutcome, VacBotEvent};
pub use state::DeviceState;
pub use stream::{StateStream, StateWatchStream};
pub use vacbot::{ConnectionState, VacBot};

// Re-export model and dictionary types at the crate root for ergonomics.
pub use dictionary::{
    CleanAction, CleanMode, CleanSpeed, Component, MoveDirection, WaterLevel, error_description,
};
pub use model::{
    BoundaryKind, ChargeStatus, CleanLogEntry, CleanStatus, CleanSum, DeviceGeneration, ErrorInfo,
    MapInfo, NetInfo, Position, SpotAreaInfo, VirtualBoundary, VirtualBoundaryInfo,
};

// Wire-level types callers need to build a `SessionConfig`.
pub use deebot_api::transport::TlsMode;
pub use deebot_api::{AccountIdentity, Continent, DeviceAddress};
