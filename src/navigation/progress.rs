// src/navigation/progress.rs
// Distance bookkeeping along an active route: total length, distance to the
// next turn, distance left to the goal, and the spoken rounding of those
// numbers.

use nalgebra::Point3;

/// Tracks distances along a route and throttles distance reports
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    update_threshold: f64,
    last_announced_distance: f64,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        ProgressTracker::new(1.0)
    }
}

impl ProgressTracker {
    /// Create a tracker reporting changes of at least `update_threshold` meters
    pub fn new(update_threshold: f64) -> Self {
        ProgressTracker {
            update_threshold,
            last_announced_distance: 0.0,
        }
    }

    /// Sum of consecutive segment lengths
    pub fn path_distance(positions: &[Point3<f64>]) -> f64 {
        positions
            .windows(2)
            .map(|w| nalgebra::distance(&w[0], &w[1]))
            .sum()
    }

    /// Snap `position` to the closest path index; ties take the lowest index.
    ///
    /// Returns the index and the snap distance, or `None` for an empty path.
    pub fn nearest_index(position: &Point3<f64>, path: &[Point3<f64>]) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, point) in path.iter().enumerate() {
            let d = nalgebra::distance(position, point);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((i, d)),
            }
        }
        best
    }

    /// Distance to the first turn strictly ahead of the snapped position.
    ///
    /// Returns `(distance, turn_index)`, or `None` when no turn lies ahead.
    pub fn distance_to_turn(
        position: &Point3<f64>,
        path: &[Point3<f64>],
        turn_indices: &[usize],
    ) -> Option<(f64, usize)> {
        let (nearest, snap) = Self::nearest_index(position, path)?;
        let next_turn = turn_indices
            .iter()
            .copied()
            .filter(|&t| t > nearest && t < path.len())
            .min()?;

        let along = Self::path_distance(&path[nearest..=next_turn]);
        Some((snap + along, next_turn))
    }

    /// Snap distance plus the route length from the snapped index to the end
    pub fn remaining_distance(position: &Point3<f64>, path: &[Point3<f64>]) -> Option<f64> {
        let (nearest, snap) = Self::nearest_index(position, path)?;
        Some(snap + Self::path_distance(&path[nearest..]))
    }

    /// Report `new_distance` only if it moved at least the threshold away from
    /// the last reported value; a report updates the baseline.
    pub fn should_announce(&mut self, new_distance: f64) -> bool {
        if (new_distance - self.last_announced_distance).abs() >= self.update_threshold {
            self.last_announced_distance = new_distance;
            true
        } else {
            false
        }
    }

    /// Baseline of the last report
    pub fn last_announced_distance(&self) -> f64 {
        self.last_announced_distance
    }

    /// Reset the report baseline to zero
    pub fn reset(&mut self) {
        self.last_announced_distance = 0.0;
    }

    /// Spoken form of a distance.
    ///
    /// Under 10 m whole meters, then nearest 5 m up to 100 m, nearest 10 m up
    /// to 1 km, and tenths of a kilometer beyond. Halfway values round to
    /// the even step, so 12.5 m is "10 meters" and 17.5 m is "20 meters".
    pub fn describe(distance: f64) -> String {
        let distance = distance.max(0.0);
        if distance < 10.0 {
            format!("{} meters", distance.trunc() as i64)
        } else if distance < 100.0 {
            format!("{} meters", ((distance / 5.0).round_ties_even() * 5.0) as i64)
        } else if distance < 1000.0 {
            format!("{} meters", ((distance / 10.0).round_ties_even() * 10.0) as i64)
        } else {
            format!("{:.1} kilometers", distance / 1000.0)
        }
    }
}
