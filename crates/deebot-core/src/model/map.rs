use serde::{Deserialize, Serialize};

/// One entry of the account's map list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapInfo {
    pub id: String,
    pub index: i64,
    pub name: String,
    pub status: i64,
    pub is_active: bool,
    pub is_built: bool,
}

/// Boundary flavour; each arrives in its own `MapSet` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryKind {
    /// `vw`: a no-go line.
    VirtualWall,
    /// `mw`: a no-mop zone.
    NoMopZone,
}

impl BoundaryKind {
    /// Both kinds, in request order.
    pub const ALL: [BoundaryKind; 2] = [Self::VirtualWall, Self::NoMopZone];

    pub fn code(self) -> &'static str {
        match self {
            Self::VirtualWall => "vw",
            Self::NoMopZone => "mw",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "vw" => Some(Self::VirtualWall),
            "mw" => Some(Self::NoMopZone),
            _ => None,
        }
    }

    /// Slot in the per-map completion vector.
    pub(crate) fn slot(self) -> usize {
        match self {
            Self::VirtualWall => 0,
            Self::NoMopZone => 1,
        }
    }
}

/// Boundary id and its flavour, as listed by a `MapSet` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualBoundary {
    pub id: String,
    pub kind: BoundaryKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotAreaInfo {
    pub map_id: String,
    pub id: String,
    /// `x1,y1;x2,y2;...` polygon.
    pub boundary: String,
    pub subtype: Option<String>,
    pub connections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualBoundaryInfo {
    pub map_id: String,
    pub id: String,
    pub kind: BoundaryKind,
    /// `x1,y1;x2,y2;...` line or polygon.
    pub coordinates: String,
}
