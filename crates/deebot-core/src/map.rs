// ── Map assembler ──
//
// Map data arrives as independent partial replies: the map list, one
// id listing per subset kind (`ar` spot areas, `vw` walls, `mw` no-mop
// zones) and one detail reply per subset. Each map id gets an assembly
// record; boundary listings are only surfaced once both kinds have been
// received since the record was last reset.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::event::{Event, value_num, value_str};
use crate::geometry::{parse_polygon, point_in_polygon};
use crate::model::{BoundaryKind, MapInfo, SpotAreaInfo, VirtualBoundary, VirtualBoundaryInfo};

/// Outcome of folding one map event.
#[derive(Debug, Clone, PartialEq)]
pub enum MapUpdate {
    /// Incomplete, duplicate or unusable; nothing to surface.
    Skip,
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

/// Per-map assembly record.
#[derive(Debug, Clone, Default)]
struct MapAssembly {
    spot_areas: Vec<String>,
    boundaries: Vec<VirtualBoundary>,
    /// One slot per boundary kind.
    received: [bool; 2],
    surfaced: bool,
}

/// Read-only view of everything assembled so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapSnapshot {
    pub maps: Vec<MapInfo>,
    pub spot_areas: BTreeMap<String, BTreeMap<String, SpotAreaInfo>>,
    pub virtual_boundaries: BTreeMap<String, BTreeMap<String, VirtualBoundaryInfo>>,
}

#[derive(Debug, Default)]
pub struct MapAssembler {
    maps: Vec<MapInfo>,
    records: HashMap<String, MapAssembly>,
    spot_area_details: BTreeMap<String, BTreeMap<String, SpotAreaInfo>>,
    boundary_details: BTreeMap<String, BTreeMap<String, VirtualBoundaryInfo>>,
}

impl MapAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn maps(&self) -> &[MapInfo] {
        &self.maps
    }

    pub fn active_map_id(&self) -> Option<&str> {
        self.maps.iter().find(|m| m.is_active).map(|m| m.id.as_str())
    }

    pub fn snapshot(&self) -> MapSnapshot {
        MapSnapshot {
            maps: self.maps.clone(),
            spot_areas: self.spot_area_details.clone(),
            virtual_boundaries: self.boundary_details.clone(),
        }
    }

    /// Clear the boundary record for `map_id` ahead of a fresh request.
    pub fn reset_boundaries(&mut self, map_id: &str) {
        let record = self.records.entry(map_id.to_owned()).or_default();
        record.boundaries.clear();
        record.received = [false; 2];
        record.surfaced = false;
        debug!(map_id, "boundary assembly reset");
    }

    /// Map id of a reply; legacy firmware sometimes sends a placeholder,
    /// which stands for the active map.
    fn resolve_map_id(&self, raw: Option<String>) -> Option<String> {
        match raw {
            Some(id) if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) => Some(id),
            _ => self.active_map_id().map(str::to_owned),
        }
    }

    // ── Map list ─────────────────────────────────────────────────────

    /// Replace the map list. The whole list is refreshed every time.
    pub fn apply_maps(&mut self, event: &Event) -> MapUpdate {
        let Some(entries) = event
            .data
            .get("info")
            .or_else(|| event.data.get("maps"))
            .and_then(Value::as_array)
        else {
            warn!("map list without entries");
            return MapUpdate::Skip;
        };

        let maps: Vec<MapInfo> = entries
            .iter()
            .filter_map(|entry| {
                Some(MapInfo {
                    id: entry.get("mid").and_then(value_str)?,
                    index: entry.get("index").and_then(value_num).map_or(0, |n| n as i64),
                    name: entry.get("name").and_then(value_str).unwrap_or_default(),
                    status: entry.get("status").and_then(value_num).map_or(0, |n| n as i64),
                    is_active: flag(entry.get("using")),
                    is_built: flag(entry.get("built")),
                })
            })
            .collect();
        self.maps.clone_from(&maps);
        MapUpdate::Maps(maps)
    }

    // ── Subset listings ──────────────────────────────────────────────

    pub fn apply_map_set(&mut self, event: &Event) -> MapUpdate {
        let data = &event.data;
        let Some(kind) = data.get("type").or_else(|| data.get("tp")).and_then(value_str) else {
            warn!("map set without a type");
            return MapUpdate::Skip;
        };
        let raw_id = data.get("mid").or_else(|| data.get("msid")).and_then(value_str);
        let Some(map_id) = self.resolve_map_id(raw_id) else {
            debug!("map set for an unknown map with no active map");
            return MapUpdate::Skip;
        };
        let ids = subset_ids(data);

        if kind == "ar" || kind == "sa" {
            let record = self.records.entry(map_id.clone()).or_default();
            record.spot_areas.clone_from(&ids);
            return MapUpdate::SpotAreas {
                map_id,
                area_ids: ids,
            };
        }

        let Some(kind) = BoundaryKind::from_code(&kind) else {
            warn!(kind = %kind, "unknown map set type");
            return MapUpdate::Skip;
        };
        let record = self.records.entry(map_id.clone()).or_default();
        record.boundaries.retain(|b| b.kind != kind);
        record
            .boundaries
            .extend(ids.into_iter().map(|id| VirtualBoundary { id, kind }));
        record.received[kind.slot()] = true;

        if record.surfaced || !record.received.iter().all(|r| *r) {
            return MapUpdate::Skip;
        }
        record.surfaced = true;
        MapUpdate::VirtualBoundaries {
            map_id,
            boundaries: record.boundaries.clone(),
        }
    }

    // ── Subset details ───────────────────────────────────────────────

    pub fn apply_map_subset(&mut self, event: &Event) -> MapUpdate {
        let data = &event.data;
        let kind = data
            .get("type")
            .or_else(|| data.get("tp"))
            .and_then(value_str)
            .unwrap_or_else(|| "ar".to_owned());
        let raw_id = data.get("mid").or_else(|| data.get("msid")).and_then(value_str);
        let Some(map_id) = self.resolve_map_id(raw_id) else {
            debug!("map subset for an unknown map with no active map");
            return MapUpdate::Skip;
        };
        let Some(id) = data.get("mssid").and_then(value_str) else {
            warn!(map_id = %map_id, "map subset without an id");
            return MapUpdate::Skip;
        };
        let value = ["value", "m", "p"]
            .iter()
            .find_map(|key| data.get(*key).and_then(value_str))
            .unwrap_or_default();

        if kind == "ar" || kind == "sa" {
            let info = SpotAreaInfo {
                map_id: map_id.clone(),
                id: id.clone(),
                boundary: value,
                subtype: data.get("subtype").and_then(value_str),
                connections: connections(data.get("connections")),
            };
            self.spot_area_details
                .entry(map_id)
                .or_default()
                .insert(id, info.clone());
            return MapUpdate::SpotAreaInfo(info);
        }

        let Some(kind) = BoundaryKind::from_code(&kind) else {
            warn!(kind = %kind, "unknown map subset type");
            return MapUpdate::Skip;
        };
        let info = VirtualBoundaryInfo {
            map_id: map_id.clone(),
            id: id.clone(),
            kind,
            coordinates: value,
        };
        self.boundary_details
            .entry(map_id)
            .or_default()
            .insert(id, info.clone());
        MapUpdate::VirtualBoundaryInfo(info)
    }

    // ── Geometry ─────────────────────────────────────────────────────

    /// Spot area of the active map containing the point.
    pub fn spot_area_at(&self, x: f64, y: f64) -> Option<String> {
        let areas = self.spot_area_details.get(self.active_map_id()?)?;
        areas
            .values()
            .find(|area| point_in_polygon((x, y), &parse_polygon(&area.boundary)))
            .map(|area| area.id.clone())
    }
}

fn flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(other) => value_num(other).is_some_and(|n| n != 0.0),
        None => false,
    }
}

/// Subset ids from `subsets: [{mssid}]` (JSON) or `items: [{mid}]`
/// (legacy).
fn subset_ids(data: &Value) -> Vec<String> {
    if let Some(subsets) = data.get("subsets").and_then(Value::as_array) {
        return subsets
            .iter()
            .filter_map(|s| s.get("mssid").and_then(value_str))
            .collect();
    }
    data.get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("mid").and_then(value_str))
                .collect()
        })
        .unwrap_or_default()
}

fn connections(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(value_str).collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect(),
        _ => Vec::new(),
    }
}
