//! Minimal planar geometry over WGS84 degrees: district polygons from GeoJSON
//! and traffic nodes from CSV.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::DataError;

/// Longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Euclidean distance in degrees.
    pub fn distance(&self, other: &Point) -> f64 {
        (self.lon - other.lon).hypot(self.lat - other.lat)
    }
}

/// Polygon with an exterior ring and optional holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub exterior: Vec<Point>,
    pub holes: Vec<Vec<Point>>,
}

/// Even-odd ray casting against one ring.
fn ring_contains(ring: &[Point], p: &Point) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&ring[i], &ring[j]);
        if (a.lat > p.lat) != (b.lat > p.lat)
            && p.lon < (b.lon - a.lon) * (p.lat - a.lat) / (b.lat - a.lat) + a.lon
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

impl Polygon {
    pub fn contains(&self, p: &Point) -> bool {
        ring_contains(&self.exterior, p) && !self.holes.iter().any(|h| ring_contains(h, p))
    }
}

/// Named area made of one or more polygons.
#[derive(Debug, Clone, PartialEq)]
pub struct District {
    pub name: String,
    pub polygons: Vec<Polygon>,
}

impl District {
    pub fn contains(&self, p: &Point) -> bool {
        self.polygons.iter().any(|poly| poly.contains(p))
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Value,
    geometry: Option<Geometry>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon { coordinates: Vec<Vec<Vec<f64>>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Vec<f64>>>> },
    #[serde(other)]
    Unsupported,
}

fn ring(coords: &[Vec<f64>]) -> Result<Vec<Point>, DataError> {
    coords
        .iter()
        .map(|pos| match pos.as_slice() {
            [lon, lat, ..] => Ok(Point::new(*lon, *lat)),
            _ => Err(DataError::Invalid(
                "GeoJSON position needs two coordinates".to_string(),
            )),
        })
        .collect()
}

fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Option<Polygon>, DataError> {
    let Some((exterior, holes)) = rings.split_first() else {
        return Ok(None);
    };
    Ok(Some(Polygon {
        exterior: ring(exterior)?,
        holes: holes.iter().map(|h| ring(h)).collect::<Result<_, _>>()?,
    }))
}

/// District polygons keyed by the feature's `name` property.
#[derive(Debug, Clone, Default)]
pub struct Districts {
    pub districts: Vec<District>,
}

impl Districts {
    /// Reads a GeoJSON FeatureCollection from disk.
    ///
    /// # Errors
    ///
    /// Returns a `DataError` if the file cannot be read or is not valid GeoJSON.
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        let text = fs::read_to_string(path).map_err(|e| DataError::io(path, e))?;
        Self::from_geojson_str(&text)
    }

    /// Parses a FeatureCollection of Polygon and MultiPolygon features.
    /// Features without a `name` property or with other geometry types are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Json` for malformed JSON and `DataError::Invalid`
    /// for malformed coordinates.
    pub fn from_geojson_str(text: &str) -> Result<Self, DataError> {
        let collection: FeatureCollection = serde_json::from_str(text)?;
        let mut districts = Vec::new();
        for feature in collection.features {
            let Some(name) = feature.properties.get("name").and_then(Value::as_str) else {
                continue;
            };
            let polygons: Vec<Polygon> = match feature.geometry {
                Some(Geometry::Polygon { coordinates }) => {
                    polygon(&coordinates)?.into_iter().collect()
                }
                Some(Geometry::MultiPolygon { coordinates }) => coordinates
                    .iter()
                    .map(|rings| polygon(rings))
                    .collect::<Result<Vec<_>, _>>()?
                    .into_iter()
                    .flatten()
                    .collect(),
                Some(Geometry::Unsupported) | None => continue,
            };
            districts.push(District {
                name: name.to_string(),
                polygons,
            });
        }
        debug!(districts = districts.len(), "read district polygons");
        Ok(Self { districts })
    }

    pub fn get(&self, name: &str) -> Option<&District> {
        self.districts.iter().find(|d| d.name == name)
    }

    /// District names in file order, without duplicates.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for d in &self.districts {
            if !names.contains(&d.name.as_str()) {
                names.push(&d.name);
            }
        }
        names
    }
}

/// Road-network node, e.g. an OpenStreetMap intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficNode {
    pub osmid: String,
    /// Longitude.
    pub x: f64,
    /// Latitude.
    pub y: f64,
}

impl TrafficNode {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Reads traffic nodes from a CSV with columns `osmid,x,y`.
///
/// # Errors
///
/// Returns `DataError::Csv` on malformed rows.
pub fn read_nodes(reader: impl Read) -> Result<Vec<TrafficNode>, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let nodes = rdr
        .deserialize::<TrafficNode>()
        .collect::<Result<Vec<_>, _>>()?;
    debug!(nodes = nodes.len(), "read traffic nodes");
    Ok(nodes)
}

/// Reads traffic nodes from disk. See [`read_nodes`].
///
/// # Errors
///
/// Returns a `DataError` if the file cannot be opened or parsed.
pub fn read_nodes_path(path: &Path) -> Result<Vec<TrafficNode>, DataError> {
    let file = File::open(path).map_err(|e| DataError::io(path, e))?;
    read_nodes(file)
}
