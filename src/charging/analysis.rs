//! Station filtering by district and power, and proximity to traffic nodes.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tracing::info;

use super::geo::{Districts, Point, TrafficNode};
use super::register::{ChargingRegister, ChargingStation};
use crate::error::DataError;

/// Threshold used by the fast-charging filter (kW).
pub const DEFAULT_MIN_POWER_KW: f64 = 50.0;
/// Buffer around traffic nodes; 0.005° is roughly 500 m in Berlin.
pub const DEFAULT_BUFFER_DEG: f64 = 0.005;

/// Analysis options.
#[derive(Debug, Clone)]
pub struct ChargingQuery {
    /// Restrict stations and nodes to this district; all of them when `None`.
    pub district: Option<String>,
    /// Keep only stations rated at least this power (kW).
    pub min_power_kw: Option<f64>,
    /// Radius around each traffic node (degrees).
    pub buffer_deg: f64,
}

impl Default for ChargingQuery {
    fn default() -> Self {
        Self {
            district: None,
            min_power_kw: None,
            buffer_deg: DEFAULT_BUFFER_DEG,
        }
    }
}

/// Outcome of [`analyze`].
#[derive(Debug, Clone, Serialize)]
pub struct ChargingAnalysis {
    pub district: Option<String>,
    /// Stations passing the district and power filters.
    pub stations: Vec<ChargingStation>,
    /// Subset of `stations` within the buffer of any traffic node.
    pub near_nodes: Vec<ChargingStation>,
    /// Traffic nodes considered after the district filter.
    pub node_count: usize,
    /// Register rows dropped for missing coordinates.
    pub skipped_rows: usize,
}

/// Uniform grid over node positions with cell size equal to the search radius.
struct NodeGrid {
    cell: f64,
    cells: HashMap<(i64, i64), Vec<Point>>,
}

impl NodeGrid {
    fn new(points: impl Iterator<Item = Point>, cell: f64) -> Self {
        let mut grid = Self {
            cell,
            cells: HashMap::new(),
        };
        for p in points {
            let key = grid.key(&p);
            grid.cells.entry(key).or_default().push(p);
        }
        grid
    }

    fn key(&self, p: &Point) -> (i64, i64) {
        (
            (p.lon / self.cell).floor() as i64,
            (p.lat / self.cell).floor() as i64,
        )
    }

    fn any_within(&self, p: &Point, radius: f64) -> bool {
        let (cx, cy) = self.key(p);
        (cx - 1..=cx + 1).any(|x| {
            (cy - 1..=cy + 1).any(|y| {
                self.cells
                    .get(&(x, y))
                    .is_some_and(|pts| pts.iter().any(|q| q.distance(p) <= radius))
            })
        })
    }
}

/// Filters the register and finds stations close to traffic nodes.
///
/// A station counts as near a node when its distance to the node is at most
/// `buffer_deg`.
///
/// # Errors
///
/// Returns `DataError::Invalid` if a district is requested but `districts`
/// is missing or does not contain it, or if `buffer_deg` is negative.
pub fn analyze(
    register: &ChargingRegister,
    districts: Option<&Districts>,
    nodes: &[TrafficNode],
    query: &ChargingQuery,
) -> Result<ChargingAnalysis, DataError> {
    if !(query.buffer_deg >= 0.0) {
        return Err(DataError::Invalid("buffer radius must be >= 0".to_string()));
    }

    let area = match &query.district {
        Some(name) => {
            let d = districts.and_then(|ds| ds.get(name)).ok_or_else(|| {
                DataError::Invalid(format!("unknown district \"{name}\""))
            })?;
            Some(d)
        }
        None => None,
    };
    let in_area = |p: &Point| area.is_none_or(|d| d.contains(p));

    let stations: Vec<ChargingStation> = register
        .stations
        .iter()
        .filter(|s| in_area(&Point::new(s.longitude, s.latitude)))
        .filter(|s| {
            query
                .min_power_kw
                .is_none_or(|min| s.power_kw.is_some_and(|p| p >= min))
        })
        .cloned()
        .collect();

    let node_points: Vec<Point> = nodes
        .iter()
        .map(TrafficNode::point)
        .filter(|p| in_area(p))
        .collect();
    let node_count = node_points.len();

    let near_nodes: Vec<ChargingStation> = if node_points.is_empty() {
        Vec::new()
    } else {
        let grid = NodeGrid::new(node_points.into_iter(), query.buffer_deg.max(1e-9));
        stations
            .iter()
            .filter(|s| grid.any_within(&Point::new(s.longitude, s.latitude), query.buffer_deg))
            .cloned()
            .collect()
    };

    info!(
        district = query.district.as_deref().unwrap_or("all"),
        stations = stations.len(),
        near_nodes = near_nodes.len(),
        nodes = node_count,
        "charging analysis finished"
    );

    Ok(ChargingAnalysis {
        district: query.district.clone(),
        stations,
        near_nodes,
        node_count,
        skipped_rows: register.skipped,
    })
}

impl fmt::Display for ChargingAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Charging Infrastructure Report ---")?;
        writeln!(
            f,
            "District:                  {}",
            self.district.as_deref().unwrap_or("all districts")
        )?;
        writeln!(f, "Existing stations:         {}", self.stations.len())?;
        writeln!(f, "Stations near nodes:       {}", self.near_nodes.len())?;
        writeln!(f, "Traffic nodes considered:  {}", self.node_count)?;
        if self.skipped_rows > 0 {
            writeln!(f, "Rows without coordinates:  {}", self.skipped_rows)?;
        }
        Ok(())
    }
}
