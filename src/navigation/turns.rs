//! Turn classification along a route
//!
//! Orientation changes between consecutive route nodes are banded into
//! slight / normal / sharp / u-turn severities. A turn is reported at an
//! interior node only when the change into it and the change out of it agree
//! on a non-straight direction, which filters out single-waypoint jitter.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Direction of an orientation change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnDirection {
    /// Negative orientation change
    Left,
    /// Positive orientation change
    Right,
    /// Below the slight-turn threshold
    Straight,
}

/// Severity band, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TurnSeverity {
    /// No turn
    None,
    /// At least the slight threshold
    Slight,
    /// At least the normal threshold
    Normal,
    /// At least the sharp threshold
    Sharp,
    /// At least the u-turn threshold
    UTurn,
}

impl std::fmt::Display for TurnDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TurnDirection::Left => write!(f, "left"),
            TurnDirection::Right => write!(f, "right"),
            TurnDirection::Straight => write!(f, "straight"),
        }
    }
}

impl std::fmt::Display for TurnSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TurnSeverity::None => write!(f, "none"),
            TurnSeverity::Slight => write!(f, "slight"),
            TurnSeverity::Normal => write!(f, "normal"),
            TurnSeverity::Sharp => write!(f, "sharp"),
            TurnSeverity::UTurn => write!(f, "u-turn"),
        }
    }
}

/// A classified direction change at a route position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Turn {
    /// Index into the route's node sequence (not a keyframe id)
    pub index: usize,
    /// Turn direction
    pub direction: TurnDirection,
    /// Turn severity
    pub severity: TurnSeverity,
    /// Absolute orientation change in degrees
    pub angle: f64,
}

/// Severity thresholds in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnThresholds {
    /// Minimum change for a slight turn
    pub slight: f64,
    /// Minimum change for a normal turn
    pub normal: f64,
    /// Minimum change for a sharp turn
    pub sharp: f64,
    /// Minimum change for a u-turn
    pub u_turn: f64,
}

impl Default for TurnThresholds {
    fn default() -> Self {
        TurnThresholds {
            slight: 15.0,
            normal: 45.0,
            sharp: 90.0,
            u_turn: 150.0,
        }
    }
}

impl TurnThresholds {
    /// Thresholds must be positive and strictly increasing
    pub fn is_valid(&self) -> bool {
        0.0 < self.slight
            && self.slight < self.normal
            && self.normal < self.sharp
            && self.sharp < self.u_turn
    }
}

/// Detects and grades direction changes along a route
#[derive(Debug, Clone, Default)]
pub struct TurnClassifier {
    thresholds: TurnThresholds,
}

impl TurnClassifier {
    /// Create a classifier with the given thresholds
    pub fn new(thresholds: TurnThresholds) -> Self {
        TurnClassifier { thresholds }
    }

    /// Active thresholds
    pub fn thresholds(&self) -> &TurnThresholds {
        &self.thresholds
    }

    /// Reduce an angle to (-180, 180]
    pub fn normalize_angle(angle: f64) -> f64 {
        if !angle.is_finite() {
            return angle;
        }
        let mut a = angle % 360.0;
        if a > 180.0 {
            a -= 360.0;
        } else if a <= -180.0 {
            a += 360.0;
        }
        a
    }

    /// Classify the change from `prev` to `current` (degrees).
    ///
    /// Returns direction, severity and the absolute normalized change.
    pub fn classify(&self, prev: f64, current: f64) -> (TurnDirection, TurnSeverity, f64) {
        let delta = Self::normalize_angle(current - prev);
        let magnitude = delta.abs();
        let t = &self.thresholds;

        if magnitude < t.slight {
            return (TurnDirection::Straight, TurnSeverity::None, magnitude);
        }

        let direction = if delta > 0.0 {
            TurnDirection::Right
        } else {
            TurnDirection::Left
        };

        let severity = if magnitude >= t.u_turn {
            TurnSeverity::UTurn
        } else if magnitude >= t.sharp {
            TurnSeverity::Sharp
        } else if magnitude >= t.normal {
            TurnSeverity::Normal
        } else {
            TurnSeverity::Slight
        };

        (direction, severity, magnitude)
    }

    /// Find turns along `positions`.
    ///
    /// Orientations default to [`derive_orientations`] when not supplied or
    /// when their length does not match the positions.
    pub fn analyze(&self, positions: &[Point3<f64>], orientations: Option<&[f64]>) -> Vec<Turn> {
        if positions.len() < 3 {
            return Vec::new();
        }

        let derived;
        let orientations = match orientations {
            Some(o) if o.len() == positions.len() => o,
            _ => {
                derived = derive_orientations(positions);
                derived.as_slice()
            }
        };

        let mut turns = Vec::new();
        for i in 1..positions.len() - 1 {
            let (dir_in, sev_in, angle_in) = self.classify(orientations[i - 1], orientations[i]);
            let (dir_out, sev_out, angle_out) = self.classify(orientations[i], orientations[i + 1]);

            if dir_in != dir_out || dir_in == TurnDirection::Straight {
                continue;
            }

            let (severity, angle) = if sev_in > sev_out {
                (sev_in, angle_in)
            } else {
                (sev_out, angle_out)
            };

            log::debug!("Turn at node {}: {} {} ({:.1} degrees)", i, dir_in, severity, angle);
            turns.push(Turn {
                index: i,
                direction: dir_in,
                severity,
                angle,
            });
        }

        turns
    }
}

/// Bearing from `from` to `to` in degrees, `atan2(dy, dx)`
pub fn bearing(from: &Point3<f64>, to: &Point3<f64>) -> f64 {
    (to.y - from.y).atan2(to.x - from.x).to_degrees()
}

/// Facing orientation per position, derived from path geometry.
///
/// The first node faces the second; interior nodes use the central
/// difference `i-1 -> i+1`; the last node keeps the heading of the final
/// segment. A single position faces 0.
pub fn derive_orientations(positions: &[Point3<f64>]) -> Vec<f64> {
    let n = positions.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..n)
            .map(|i| {
                if i == 0 {
                    bearing(&positions[0], &positions[1])
                } else if i == n - 1 {
                    bearing(&positions[n - 2], &positions[n - 1])
                } else {
                    bearing(&positions[i - 1], &positions[i + 1])
                }
            })
            .collect(),
    }
}
