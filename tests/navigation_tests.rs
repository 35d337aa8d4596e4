// tests/navigation_tests.rs
// Integration tests for map loading, route planning and turn detection.

use nalgebra::Point3;
use rstest::{fixture, rstest};
use std::sync::Arc;
use wayfinder::map::{Keyframe, KeyframeStore};
use wayfinder::navigation::{
    NavigationError, PathFinder, ProgressTracker, TurnClassifier, TurnDirection, TurnSeverity,
};

// Straight east for ten meters, then north
#[fixture]
fn corner_map() -> Arc<KeyframeStore> {
    Arc::new(KeyframeStore::parse(
        "# id, timestamp, x, y, z, rotation\n\
         0, 0.0, 0.0, 0.0, 0.0, []\n\
         1, 0.5, 5.0, 0.0, 0.0, []\n\
         2, 1.0, 10.0, 0.0, 0.0, []\n\
         3, 1.5, 10.0, 5.0, 0.0, []\n",
    ))
}

// Deterministic scatter of points in a 12x12 square
fn scattered_store(seed: u64, count: i64) -> KeyframeStore {
    let mut state = seed;
    let mut next = || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((state >> 33) as f64 / (1u64 << 31) as f64) * 12.0
    };
    KeyframeStore::from_keyframes((0..count).map(|id| {
        let x = next();
        let y = next();
        Keyframe::new(id, x, y, 0.0)
    }))
}

// All-pairs shortest distances over the same proximity graph
fn floyd_warshall(finder: &PathFinder, count: usize) -> Vec<Vec<f64>> {
    let mut dist = vec![vec![f64::INFINITY; count]; count];
    for (i, row) in dist.iter_mut().enumerate() {
        row[i] = 0.0;
        for edge in finder.graph().neighbors(i as i64) {
            row[edge.to as usize] = edge.weight;
        }
    }
    for k in 0..count {
        for i in 0..count {
            for j in 0..count {
                let via = dist[i][k] + dist[k][j];
                if via < dist[i][j] {
                    dist[i][j] = via;
                }
            }
        }
    }
    dist
}

#[rstest]
fn corner_route_has_one_right_turn(corner_map: Arc<KeyframeStore>) {
    // Plan from just beside the first keyframe
    let finder = PathFinder::new(corner_map.clone(), 6.0);
    let route = finder.plan(&Point3::new(0.3, -0.2, 0.0), 3).unwrap();
    assert_eq!(route.ids(), &[0, 1, 2, 3]);
    assert!((route.cost() - 15.0).abs() < 1e-9);

    // Orientations come from the geometry when the map has no yaw
    let expected = [0.0, 0.0, 45.0, 90.0];
    for (got, want) in route.orientations().iter().zip(expected) {
        assert!((got - want).abs() < 1e-9, "{:?}", route.orientations());
    }

    let positions = route.positions(&corner_map).unwrap();
    let turns = TurnClassifier::default().analyze(&positions, Some(route.orientations()));
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].index, 2);
    assert_eq!(turns[0].direction, TurnDirection::Right);
    assert_eq!(turns[0].severity, TurnSeverity::Normal);

    // From the start the turn is ten meters ahead
    let turn_indices: Vec<usize> = turns.iter().map(|t| t.index).collect();
    let (distance, index) =
        ProgressTracker::distance_to_turn(&Point3::new(0.0, 0.0, 0.0), &positions, &turn_indices)
            .unwrap();
    assert_eq!(index, 2);
    assert!((distance - 10.0).abs() < 1e-9);
    assert_eq!(ProgressTracker::describe(distance), "10 meters");
}

#[rstest]
fn map_yaw_overrides_derived_orientation() {
    let store = Arc::new(KeyframeStore::parse(
        "0, 0, 0, 0, 0, 0\n\
         1, 0, 2, 0, 0, -30\n\
         2, 0, 4, 0, 0, -60\n",
    ));
    let finder = PathFinder::new(store.clone(), 2.5);
    let route = finder.plan(&Point3::origin(), 2).unwrap();
    assert_eq!(route.orientations(), &[0.0, -30.0, -60.0]);

    let positions = route.positions(&store).unwrap();
    let turns = TurnClassifier::default().analyze(&positions, Some(route.orientations()));
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].direction, TurnDirection::Left);
    assert_eq!(turns[0].severity, TurnSeverity::Slight);
}

#[rstest]
fn planning_errors(corner_map: Arc<KeyframeStore>) {
    let finder = PathFinder::new(corner_map, 4.0);
    assert_eq!(
        finder.plan(&Point3::origin(), 77),
        Err(NavigationError::InvalidDestination(77))
    );
    // Every gap is five meters, so nothing connects below four
    assert_eq!(
        finder.plan(&Point3::origin(), 3),
        Err(NavigationError::NoPathFound { start: 0, goal: 3 })
    );
    // Start equal to goal is a single-node route
    let route = finder.plan(&Point3::new(10.1, 5.0, 0.0), 3).unwrap();
    assert_eq!(route.ids(), &[3]);
    assert_eq!(route.cost(), 0.0);
}

#[rstest]
#[case(1, 10, 3.0)]
#[case(7, 12, 3.5)]
#[case(42, 9, 4.0)]
#[case(1234, 14, 2.5)]
fn astar_matches_brute_force(#[case] seed: u64, #[case] count: i64, #[case] threshold: f64) {
    let finder = PathFinder::new(Arc::new(scattered_store(seed, count)), threshold);
    let dist = floyd_warshall(&finder, count as usize);

    for start in 0..count {
        for goal in 0..count {
            let best = dist[start as usize][goal as usize];
            match finder.astar(start, goal) {
                Some(route) => {
                    assert!(best.is_finite(), "{} -> {} should be unreachable", start, goal);
                    assert!((route.cost() - best).abs() < 1e-9);
                    assert_eq!(route.start(), Some(start));
                    assert_eq!(route.goal(), Some(goal));

                    // Every hop is a graph edge and the hops add up to the cost
                    let total: f64 = route
                        .ids()
                        .windows(2)
                        .map(|w| finder.graph().edge_weight(w[0], w[1]).unwrap())
                        .sum();
                    assert!((total - route.cost()).abs() < 1e-9);
                }
                None => assert!(best.is_infinite(), "{} -> {} should be reachable", start, goal),
            }
        }
    }
}

#[test]
fn nearest_keyframe_prefers_first_on_ties() {
    let store = KeyframeStore::from_keyframes(vec![
        Keyframe::new(5, 1.0, 0.0, 0.0),
        Keyframe::new(2, -1.0, 0.0, 0.0),
    ]);
    let finder = PathFinder::new(Arc::new(store), 3.0);
    assert_eq!(finder.nearest_keyframe(&Point3::origin()), Some(5));
    assert_eq!(
        PathFinder::new(Arc::new(KeyframeStore::new()), 3.0).nearest_keyframe(&Point3::origin()),
        None
    );
}

#[test]
fn load_reports_missing_file() {
    let err = KeyframeStore::load("does/not/exist.csv").unwrap_err();
    assert!(err.to_string().contains("does/not/exist.csv"));
}
