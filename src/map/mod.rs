//! Keyframe map for Wayfinder
//!
//! The SLAM pipeline exports its keyframes as a delimited table. This module
//! turns that table into an id-keyed [`KeyframeStore`] and builds the
//! [`ProximityGraph`] the planner searches over.

pub mod graph;

pub use graph::{Edge, ProximityGraph};

use log::{info, warn};
use nalgebra::{Matrix3, Point3, Quaternion, Rotation3, UnitQuaternion};
use std::collections::HashMap;
use std::path::Path;

/// Externally assigned keyframe identifier
pub type KeyframeId = i64;

/// A known landmark pose in the map
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    /// Unique keyframe id
    pub id: KeyframeId,
    /// World-frame position in meters
    pub position: Point3<f64>,
    /// Optional world-frame yaw in degrees
    pub yaw: Option<f64>,
}

impl Keyframe {
    /// Create a keyframe without orientation
    pub fn new(id: KeyframeId, x: f64, y: f64, z: f64) -> Self {
        Keyframe {
            id,
            position: Point3::new(x, y, z),
            yaw: None,
        }
    }

    /// Attach a yaw (degrees) to the keyframe
    pub fn with_yaw(mut self, yaw: f64) -> Self {
        self.yaw = Some(yaw);
        self
    }
}

/// Map loading errors
#[derive(Debug)]
pub enum MapError {
    /// The keyframe table could not be read
    Io(String),
}

impl std::fmt::Display for MapError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MapError::Io(msg) => write!(f, "Map I/O error: {}", msg),
        }
    }
}

impl std::error::Error for MapError {}

/// Id-keyed keyframe storage that remembers file order
#[derive(Debug, Clone, Default)]
pub struct KeyframeStore {
    keyframes: Vec<Keyframe>,
    index: HashMap<KeyframeId, usize>,
}

impl KeyframeStore {
    /// Create an empty store
    pub fn new() -> Self {
        KeyframeStore::default()
    }

    /// Build a store from keyframes, keeping the first occurrence of each id
    pub fn from_keyframes<I: IntoIterator<Item = Keyframe>>(keyframes: I) -> Self {
        let mut store = KeyframeStore::new();
        for keyframe in keyframes {
            let id = keyframe.id;
            if !store.insert(keyframe) {
                warn!("Duplicate keyframe {} ignored", id);
            }
        }
        store
    }

    /// Insert a keyframe; returns false if the id is already present
    pub fn insert(&mut self, keyframe: Keyframe) -> bool {
        if self.index.contains_key(&keyframe.id) {
            return false;
        }
        self.index.insert(keyframe.id, self.keyframes.len());
        self.keyframes.push(keyframe);
        true
    }

    /// Load the keyframe table from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MapError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MapError::Io(format!("{}: {}", path.display(), e)))?;

        let store = KeyframeStore::parse(&text);
        info!("Loaded {} keyframes from {}", store.len(), path.display());
        Ok(store)
    }

    /// Parse keyframe table text: `id, timestamp, x, y, z, rotation...`
    ///
    /// Malformed rows are skipped with a warning; a table with no usable rows
    /// yields an empty store.
    pub fn parse(text: &str) -> Self {
        let mut store = KeyframeStore::new();

        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            match parse_row(trimmed) {
                Ok(keyframe) => {
                    let id = keyframe.id;
                    if !store.insert(keyframe) {
                        warn!("Skipping row {}: duplicate keyframe id {}", line_no + 1, id);
                    }
                }
                Err(reason) => warn!("Skipping row {}: {}", line_no + 1, reason),
            }
        }

        store
    }

    /// Look up a keyframe by id
    pub fn get(&self, id: KeyframeId) -> Option<&Keyframe> {
        self.index.get(&id).map(|&i| &self.keyframes[i])
    }

    /// Position of a keyframe by id
    pub fn position(&self, id: KeyframeId) -> Option<Point3<f64>> {
        self.get(id).map(|kf| kf.position)
    }

    /// Whether the id is a known keyframe
    pub fn contains(&self, id: KeyframeId) -> bool {
        self.index.contains_key(&id)
    }

    /// Number of keyframes
    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    /// Whether the store holds no keyframes
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    /// Keyframes in stored (file) order
    pub fn iter(&self) -> impl Iterator<Item = &Keyframe> {
        self.keyframes.iter()
    }
}

fn parse_row(line: &str) -> Result<Keyframe, String> {
    let fields: Vec<&str> = line.splitn(6, ',').map(str::trim).collect();
    if fields.len() < 5 {
        return Err(format!("expected at least 5 fields, found {}", fields.len()));
    }

    let id: KeyframeId = fields[0]
        .parse()
        .map_err(|_| format!("invalid keyframe id {:?}", fields[0]))?;

    let mut coords = [0.0f64; 3];
    for (slot, text) in coords.iter_mut().zip(&fields[2..5]) {
        let value: f64 = text
            .parse()
            .map_err(|_| format!("invalid coordinate {:?}", text))?;
        if !value.is_finite() {
            return Err(format!("non-finite coordinate {:?}", text));
        }
        *slot = value;
    }

    let mut keyframe = Keyframe::new(id, coords[0], coords[1], coords[2]);
    keyframe.yaw = fields.get(5).and_then(|rotation| parse_yaw(rotation));
    Ok(keyframe)
}

/// Extract a yaw (degrees, about +z) from the rotation column.
///
/// Accepts a bare angle, a `qx qy qz qw` quaternion or a row-major 3x3
/// rotation matrix, with any mix of commas, whitespace and brackets.
pub(crate) fn parse_yaw(text: &str) -> Option<f64> {
    let values: Vec<f64> = text
        .split(|c: char| c == ',' || c == ';' || c.is_whitespace() || "[](){}".contains(c))
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>())
        .collect::<Result<_, _>>()
        .ok()?;

    if values.iter().any(|v| !v.is_finite()) {
        return None;
    }

    match values.len() {
        1 => Some(values[0]),
        4 => {
            let q = Quaternion::new(values[3], values[0], values[1], values[2]);
            if q.norm() < 1e-9 {
                return None;
            }
            let (_, _, yaw) = UnitQuaternion::from_quaternion(q).euler_angles();
            Some(yaw.to_degrees())
        }
        9 => {
            let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_row_slice(&values));
            let (_, _, yaw) = rotation.euler_angles();
            Some(yaw.to_degrees())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_skips_malformed_rows() {
        let text = "\
# id, timestamp, x, y, z, rotation
0, 1.0, 0.0, 0.0, 0.0
1, 1.1, 1.0, 0.0, 0.0, 90
bad, 1.2, 2.0, 0.0, 0.0
2, 1.3, x, 0.0, 0.0
3, 1.4, 3.0
4, 1.5, 4.0, 0.5, -0.25, [0 0 0 1]

1, 1.6, 9.0, 9.0, 9.0
";
        let store = KeyframeStore::parse(text);

        assert_eq!(store.len(), 3);
        assert!(store.contains(0));
        assert_eq!(store.get(1).unwrap().yaw, Some(90.0));
        assert_eq!(store.position(1), Some(Point3::new(1.0, 0.0, 0.0)));
        assert_eq!(store.position(4), Some(Point3::new(4.0, 0.5, -0.25)));
        assert!(!store.contains(2));
        assert!(!store.contains(3));
    }

    #[test]
    fn stored_order_follows_file_order() {
        let store = KeyframeStore::parse("7,0,0,0,0\n3,0,1,0,0\n5,0,2,0,0\n");
        let ids: Vec<KeyframeId> = store.iter().map(|kf| kf.id).collect();
        assert_eq!(ids, vec![7, 3, 5]);
    }

    #[test]
    fn yaw_from_quaternion_and_matrix() {
        // 90 degrees about z
        let half = std::f64::consts::FRAC_1_SQRT_2;
        let yaw = parse_yaw(&format!("{} {} {} {}", 0.0, 0.0, half, half)).unwrap();
        assert!((yaw - 90.0).abs() < 1e-9);

        let yaw = parse_yaw("[0, -1, 0, 1, 0, 0, 0, 0, 1]").unwrap();
        assert!((yaw - 90.0).abs() < 1e-9);

        assert_eq!(parse_yaw("0 0 0 0"), None);
        assert_eq!(parse_yaw("1 2"), None);
        assert_eq!(parse_yaw("identity"), None);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = KeyframeStore::load("/nonexistent/keyframes.csv").unwrap_err();
        assert!(matches!(err, MapError::Io(_)));
    }
}
