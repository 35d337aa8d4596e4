// src/map/graph.rs
// Undirected proximity graph over the keyframe store. Two keyframes are
// connected when they lie closer than the configured threshold; the edge
// weight is their Euclidean distance.

use super::{KeyframeId, KeyframeStore};
use log::info;
use std::collections::HashMap;

/// Weighted edge to a neighbouring keyframe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Neighbour keyframe id
    pub to: KeyframeId,
    /// Euclidean distance in meters
    pub weight: f64,
}

/// Keyframe adjacency built from pairwise distances
#[derive(Debug, Clone, Default)]
pub struct ProximityGraph {
    adjacency: HashMap<KeyframeId, Vec<Edge>>,
    threshold: f64,
    edge_count: usize,
}

impl ProximityGraph {
    /// Connect every pair of distinct keyframes closer than `threshold`.
    ///
    /// Quadratic in the number of keyframes, which is fine for maps in the
    /// hundreds to low thousands.
    pub fn build(store: &KeyframeStore, threshold: f64) -> Self {
        let keyframes: Vec<_> = store.iter().collect();
        let mut adjacency: HashMap<KeyframeId, Vec<Edge>> =
            keyframes.iter().map(|kf| (kf.id, Vec::new())).collect();
        let mut edge_count = 0;

        for (i, a) in keyframes.iter().enumerate() {
            for b in &keyframes[i + 1..] {
                let weight = nalgebra::distance(&a.position, &b.position);
                if weight < threshold {
                    adjacency.entry(a.id).or_default().push(Edge { to: b.id, weight });
                    adjacency.entry(b.id).or_default().push(Edge { to: a.id, weight });
                    edge_count += 1;
                }
            }
        }

        info!(
            "Built proximity graph: {} nodes, {} edges (threshold {:.2}m)",
            adjacency.len(),
            edge_count,
            threshold
        );

        ProximityGraph {
            adjacency,
            threshold,
            edge_count,
        }
    }

    /// Edges leaving `id`, in keyframe store order
    pub fn neighbors(&self, id: KeyframeId) -> &[Edge] {
        self.adjacency.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Weight of the edge between `a` and `b`, if connected
    pub fn edge_weight(&self, a: KeyframeId, b: KeyframeId) -> Option<f64> {
        self.neighbors(a).iter().find(|e| e.to == b).map(|e| e.weight)
    }

    /// Connection threshold in meters
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Number of keyframes in the graph
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}
