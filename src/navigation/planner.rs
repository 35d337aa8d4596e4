// src/navigation/planner.rs
// Plans routes over the keyframe proximity graph with A*, and snaps raw
// position fixes onto the nearest keyframe.

use super::turns::derive_orientations;
use super::NavigationError;
use crate::map::{KeyframeId, KeyframeStore, ProximityGraph};
use log::{debug, info, warn};
use nalgebra::Point3;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

/// Ordered keyframe ids from start to goal, with a facing orientation per id
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    ids: Vec<KeyframeId>,
    orientations: Vec<f64>,
    cost: f64,
}

impl Route {
    /// Keyframe ids in travel order
    pub fn ids(&self) -> &[KeyframeId] {
        &self.ids
    }

    /// Facing orientation (degrees) per route node
    pub fn orientations(&self) -> &[f64] {
        &self.orientations
    }

    /// Total edge weight in meters
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// Number of route nodes
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Routes always contain at least the start node
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// First keyframe
    pub fn start(&self) -> Option<KeyframeId> {
        self.ids.first().copied()
    }

    /// Final keyframe
    pub fn goal(&self) -> Option<KeyframeId> {
        self.ids.last().copied()
    }

    /// Resolve node positions through the store; `None` if any id is unknown
    pub fn positions(&self, store: &KeyframeStore) -> Option<Vec<Point3<f64>>> {
        self.ids.iter().map(|&id| store.position(id)).collect()
    }
}

/// Open-set entry; the heap pops the lowest `f`, then the earliest insert
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    f: f64,
    g: f64,
    seq: u64,
    id: KeyframeId,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest-path search over the keyframe graph
pub struct PathFinder {
    store: Arc<KeyframeStore>,
    graph: ProximityGraph,
}

impl PathFinder {
    /// Build the proximity graph for `store` and wrap it in a path finder
    pub fn new(store: Arc<KeyframeStore>, threshold: f64) -> Self {
        let graph = ProximityGraph::build(&store, threshold);
        PathFinder { store, graph }
    }

    /// Use a prebuilt graph
    pub fn with_graph(store: Arc<KeyframeStore>, graph: ProximityGraph) -> Self {
        PathFinder { store, graph }
    }

    /// Backing keyframe store
    pub fn store(&self) -> &KeyframeStore {
        &self.store
    }

    /// Proximity graph searched by [`PathFinder::astar`]
    pub fn graph(&self) -> &ProximityGraph {
        &self.graph
    }

    /// Keyframe closest to `position`; ties go to the first in store order.
    ///
    /// `None` only for an empty store.
    pub fn nearest_keyframe(&self, position: &Point3<f64>) -> Option<KeyframeId> {
        let mut best: Option<(KeyframeId, f64)> = None;
        for keyframe in self.store.iter() {
            let d = nalgebra::distance(position, &keyframe.position);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((keyframe.id, d)),
            }
        }
        best.map(|(id, _)| id)
    }

    /// A* from `start` to `goal`.
    ///
    /// Edge weights and the heuristic are both Euclidean distances, so the
    /// first time the goal is popped its route is optimal. Returns `None`
    /// when either id is unknown or the two lie in different components.
    pub fn astar(&self, start: KeyframeId, goal: KeyframeId) -> Option<Route> {
        let goal_position = self.store.position(goal)?;
        if !self.store.contains(start) {
            return None;
        }

        let heuristic = |id: KeyframeId| {
            self.store
                .position(id)
                .map(|p| nalgebra::distance(&p, &goal_position))
                .unwrap_or(0.0)
        };

        let mut open = BinaryHeap::new();
        let mut g_score: HashMap<KeyframeId, f64> = HashMap::new();
        let mut came_from: HashMap<KeyframeId, KeyframeId> = HashMap::new();
        let mut closed: HashSet<KeyframeId> = HashSet::new();
        let mut seq = 0u64;

        g_score.insert(start, 0.0);
        open.push(OpenEntry {
            f: heuristic(start),
            g: 0.0,
            seq,
            id: start,
        });

        while let Some(current) = open.pop() {
            if current.id == goal {
                let ids = reconstruct(&came_from, goal);
                debug!("A* reached {} after expanding {} nodes", goal, closed.len());
                return Some(self.make_route(ids, current.g));
            }

            // Stale duplicate of an already expanded node
            if !closed.insert(current.id) {
                continue;
            }

            for edge in self.graph.neighbors(current.id) {
                if closed.contains(&edge.to) {
                    continue;
                }
                let tentative = current.g + edge.weight;
                let known = g_score.get(&edge.to).copied().unwrap_or(f64::INFINITY);
                if tentative < known {
                    came_from.insert(edge.to, current.id);
                    g_score.insert(edge.to, tentative);
                    seq += 1;
                    open.push(OpenEntry {
                        f: tentative + heuristic(edge.to),
                        g: tentative,
                        seq,
                        id: edge.to,
                    });
                }
            }
        }

        None
    }

    /// Snap `position` to the nearest keyframe and route from there to `goal`
    pub fn plan(&self, position: &Point3<f64>, goal: KeyframeId) -> Result<Route, NavigationError> {
        if !self.store.contains(goal) {
            return Err(NavigationError::InvalidDestination(goal));
        }

        // A non-empty store always has a nearest keyframe
        let start = self
            .nearest_keyframe(position)
            .ok_or(NavigationError::InvalidDestination(goal))?;
        match self.astar(start, goal) {
            Some(route) => {
                info!(
                    "Planned route {} -> {}: {} nodes, {:.1}m",
                    start,
                    goal,
                    route.len(),
                    route.cost()
                );
                Ok(route)
            }
            None => {
                warn!("No path from keyframe {} to {}", start, goal);
                Err(NavigationError::NoPathFound { start, goal })
            }
        }
    }

    fn make_route(&self, ids: Vec<KeyframeId>, cost: f64) -> Route {
        let map_yaws: Option<Vec<f64>> = ids
            .iter()
            .map(|&id| self.store.get(id).and_then(|kf| kf.yaw))
            .collect();

        let orientations = match map_yaws {
            Some(yaws) => yaws,
            None => {
                let positions: Vec<Point3<f64>> =
                    ids.iter().filter_map(|&id| self.store.position(id)).collect();
                derive_orientations(&positions)
            }
        };

        Route {
            ids,
            orientations,
            cost,
        }
    }
}

fn reconstruct(came_from: &HashMap<KeyframeId, KeyframeId>, goal: KeyframeId) -> Vec<KeyframeId> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
