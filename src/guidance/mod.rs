//! Guidance session for Wayfinder
//!
//! [`GuidanceSession`] ties the planner, the turn classifier and the progress
//! tracker together. The control context drives it through
//! `set_destination` / `calculate_path` / `start_navigation` /
//! `stop_navigation`; a position-delivery context writes fixes through a
//! [`PositionHandle`]; and a background loop evaluates the live position
//! against the cached route at a fixed interval, queueing announcements for
//! the speaker thread.
//!
//! Position, destination, state and the active plan live behind one mutex.
//! The route and its turn list are swapped together as a single
//! `Arc<GuidancePlan>`, so a tick never mixes results from two plannings.

pub mod announcer;
pub mod signal;
pub mod state;

pub use announcer::{
    announcement_channel, spawn_speaker, Announcement, AnnouncementReceiver, Announcer, LogSpeech,
    Priority, SpeechOutput,
};
pub use signal::StopSignal;
pub use state::{SessionEvent, SessionState};

use crate::config::GuidanceConfig;
use crate::map::KeyframeId;
use crate::navigation::{NavigationError, PathFinder, ProgressTracker, Route, Turn, TurnClassifier};
use log::{debug, info, warn};
use nalgebra::Point3;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Instant;

/// A position/orientation fix, written into the session as one unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    /// World-frame position in meters
    pub position: Point3<f64>,
    /// Heading in degrees
    pub orientation: f64,
}

impl PositionFix {
    /// Create a fix from coordinates and heading
    pub fn new(x: f64, y: f64, z: f64, orientation: f64) -> Self {
        PositionFix {
            position: Point3::new(x, y, z),
            orientation,
        }
    }

    /// All components are finite
    pub fn is_finite(&self) -> bool {
        self.position.coords.iter().all(|c| c.is_finite()) && self.orientation.is_finite()
    }
}

/// A computed route together with the turns found along it
#[derive(Debug, Clone, PartialEq)]
pub struct GuidancePlan {
    /// Route from the snapped start to the destination
    pub route: Route,
    /// Turns along the route, ascending by index
    pub turns: Vec<Turn>,
}

/// Snapshot of the session for status queries
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    /// Current state
    pub state: SessionState,
    /// Destination keyframe
    pub destination: Option<KeyframeId>,
    /// Last known fix
    pub position: Option<PositionFix>,
    /// Keyframe nearest to the last fix
    pub nearest_keyframe: Option<KeyframeId>,
    /// Route node count
    pub route_len: usize,
    /// Turns on the route
    pub turn_count: usize,
    /// Distance left along the route from the last fix
    pub remaining_distance: Option<f64>,
}

/// Errors isolated inside a single tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickError {
    /// No fix has been received
    MissingPosition,
    /// The latest fix has non-finite components
    InvalidPosition,
    /// The cached plan does not resolve against the map
    CorruptPlan(String),
}

impl std::fmt::Display for TickError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            TickError::MissingPosition => write!(f, "no position fix available"),
            TickError::InvalidPosition => write!(f, "position fix is not finite"),
            TickError::CorruptPlan(msg) => write!(f, "corrupt plan: {}", msg),
        }
    }
}

impl std::error::Error for TickError {}

#[derive(Debug)]
struct SessionShared {
    state: SessionState,
    fix: Option<PositionFix>,
    destination: Option<KeyframeId>,
    plan: Option<Arc<GuidancePlan>>,
}

type Shared = Arc<Mutex<SessionShared>>;

fn lock(shared: &Shared) -> MutexGuard<'_, SessionShared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable writer for the position-delivery context
#[derive(Debug, Clone)]
pub struct PositionHandle {
    shared: Shared,
}

impl PositionHandle {
    /// Replace the current fix
    pub fn update(&self, fix: PositionFix) {
        lock(&self.shared).fix = Some(fix);
    }

    /// Last known fix
    pub fn latest(&self) -> Option<PositionFix> {
        lock(&self.shared).fix
    }
}

struct Worker {
    stop: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

/// Navigation state machine and control loop owner
pub struct GuidanceSession {
    finder: Arc<PathFinder>,
    classifier: TurnClassifier,
    config: GuidanceConfig,
    announcer: Announcer,
    shared: Shared,
    worker: Option<Worker>,
}

impl GuidanceSession {
    /// Create an idle session
    pub fn new(
        finder: Arc<PathFinder>,
        classifier: TurnClassifier,
        config: GuidanceConfig,
        announcer: Announcer,
    ) -> Self {
        GuidanceSession {
            finder,
            classifier,
            config,
            announcer,
            shared: Arc::new(Mutex::new(SessionShared {
                state: SessionState::Idle,
                fix: None,
                destination: None,
                plan: None,
            })),
            worker: None,
        }
    }

    /// Writer handle for the position feed
    pub fn position_handle(&self) -> PositionHandle {
        PositionHandle {
            shared: self.shared.clone(),
        }
    }

    /// Record the latest position fix
    pub fn set_current_position(&self, fix: PositionFix) {
        lock(&self.shared).fix = Some(fix);
    }

    /// Select a destination keyframe; clears any computed route
    pub fn set_destination(&self, id: KeyframeId) -> Result<(), NavigationError> {
        if !self.finder.store().contains(id) {
            warn!("Destination keyframe {} not found", id);
            return Err(NavigationError::InvalidDestination(id));
        }

        let mut shared = lock(&self.shared);
        if !state::apply(&mut shared.state, SessionEvent::DestinationSet) {
            return Err(NavigationError::SessionActive);
        }
        shared.destination = Some(id);
        shared.plan = None;
        info!("Destination set to keyframe {}", id);
        Ok(())
    }

    /// Plan a route from the current position to the destination.
    ///
    /// On failure the session is left exactly as it was.
    pub fn calculate_path(&self) -> Result<(), NavigationError> {
        let (fix, destination) = {
            let shared = lock(&self.shared);
            if shared.state == SessionState::Navigating {
                warn!("Cannot re-plan while navigating; stop navigation first");
                return Err(NavigationError::SessionActive);
            }
            (shared.fix, shared.destination)
        };

        let fix = fix.ok_or_else(|| {
            warn!("Cannot plan: current position not set");
            NavigationError::MissingPosition
        })?;
        let destination = destination.ok_or_else(|| {
            warn!("Cannot plan: destination not set");
            NavigationError::MissingDestination
        })?;

        let route = self.finder.plan(&fix.position, destination)?;
        let positions = route
            .positions(self.finder.store())
            .ok_or(NavigationError::InvalidDestination(destination))?;
        let turns = self.classifier.analyze(&positions, Some(route.orientations()));
        info!("Route has {} nodes and {} turns", route.len(), turns.len());

        let mut shared = lock(&self.shared);
        if !state::apply(&mut shared.state, SessionEvent::PathCalculated) {
            return Err(NavigationError::SessionActive);
        }
        shared.plan = Some(Arc::new(GuidancePlan { route, turns }));
        Ok(())
    }

    /// Start the control loop; a no-op if it is already running
    pub fn start_navigation(&mut self) -> Result<(), NavigationError> {
        let plan = {
            let mut shared = lock(&self.shared);
            if shared.state == SessionState::Navigating {
                info!("Navigation already in progress");
                return Ok(());
            }
            let plan = match (&shared.plan, shared.state) {
                (Some(plan), SessionState::Routed) => plan.clone(),
                _ => {
                    warn!("No path calculated; call calculate_path first");
                    return Err(NavigationError::NotRouted);
                }
            };
            state::apply(&mut shared.state, SessionEvent::NavigationStarted);
            plan
        };

        self.reap_worker();
        self.announcer
            .announce(announcer::START_MESSAGE, Priority::High);

        let stop = Arc::new(StopSignal::new());
        let guidance_loop = GuidanceLoop {
            shared: self.shared.clone(),
            finder: self.finder.clone(),
            plan,
            config: self.config.clone(),
            announcer: self.announcer.clone(),
            stop: stop.clone(),
            last_turn: None,
            last_progress: None,
        };
        let handle = std::thread::spawn(move || guidance_loop.run());
        self.worker = Some(Worker { stop, handle });
        Ok(())
    }

    /// Cancel navigation; only acts while navigating
    pub fn stop_navigation(&mut self) {
        {
            let mut shared = lock(&self.shared);
            if shared.state != SessionState::Navigating {
                drop(shared);
                self.reap_worker();
                return;
            }
            state::apply(&mut shared.state, SessionEvent::NavigationStopped);
        }

        self.reap_worker();
        self.announcer.announce(announcer::STOP_MESSAGE, Priority::High);
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        lock(&self.shared).state
    }

    /// Active plan, if any
    pub fn plan(&self) -> Option<Arc<GuidancePlan>> {
        lock(&self.shared).plan.clone()
    }

    /// Snapshot for status queries
    pub fn status(&self) -> SessionStatus {
        let (state, destination, fix, plan) = {
            let shared = lock(&self.shared);
            (shared.state, shared.destination, shared.fix, shared.plan.clone())
        };

        let nearest_keyframe = fix.and_then(|f| self.finder.nearest_keyframe(&f.position));
        let remaining_distance = match (&fix, &plan) {
            (Some(fix), Some(plan)) => plan
                .route
                .positions(self.finder.store())
                .and_then(|positions| ProgressTracker::remaining_distance(&fix.position, &positions)),
            _ => None,
        };

        SessionStatus {
            state,
            destination,
            position: fix,
            nearest_keyframe,
            route_len: plan.as_ref().map_or(0, |p| p.route.len()),
            turn_count: plan.as_ref().map_or(0, |p| p.turns.len()),
            remaining_distance,
        }
    }

    /// Block until the control loop exits on its own (arrival) or is stopped
    pub fn wait_for_completion(&mut self) {
        if let Some(worker) = self.worker.take() {
            if worker.handle.join().is_err() {
                warn!("Navigation loop panicked");
            }
        }
    }

    fn reap_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.stop();
            if worker.handle.join().is_err() {
                warn!("Navigation loop panicked");
            }
        }
    }
}

impl Drop for GuidanceSession {
    fn drop(&mut self) {
        self.reap_worker();
    }
}

enum TickOutcome {
    Continue,
    Arrived,
    Halted,
}

struct GuidanceLoop {
    shared: Shared,
    finder: Arc<PathFinder>,
    plan: Arc<GuidancePlan>,
    config: GuidanceConfig,
    announcer: Announcer,
    stop: Arc<StopSignal>,
    last_turn: Option<usize>,
    last_progress: Option<Instant>,
}

impl GuidanceLoop {
    fn run(mut self) {
        info!("Navigation loop started");
        while !self.stop.is_stopped() {
            let pause = match self.tick() {
                Ok(TickOutcome::Continue) => self.config.tick_interval(),
                Ok(TickOutcome::Arrived) | Ok(TickOutcome::Halted) => break,
                Err(e) => {
                    warn!("Navigation tick failed: {}", e);
                    self.config.error_backoff()
                }
            };
            if self.stop.wait(pause) {
                break;
            }
        }
        info!("Navigation loop finished");
    }

    fn tick(&mut self) -> Result<TickOutcome, TickError> {
        let fix = {
            let shared = lock(&self.shared);
            if shared.state != SessionState::Navigating {
                return Ok(TickOutcome::Halted);
            }
            shared.fix.ok_or(TickError::MissingPosition)?
        };
        if !fix.is_finite() {
            return Err(TickError::InvalidPosition);
        }

        let positions = self
            .plan
            .route
            .positions(self.finder.store())
            .ok_or_else(|| TickError::CorruptPlan("route references unknown keyframe".into()))?;
        let goal = positions
            .last()
            .ok_or_else(|| TickError::CorruptPlan("empty route".into()))?;

        let to_goal = nalgebra::distance(&fix.position, goal);
        if to_goal < self.config.arrival_radius {
            {
                let mut shared = lock(&self.shared);
                if !state::apply(&mut shared.state, SessionEvent::DestinationReached) {
                    return Ok(TickOutcome::Halted);
                }
            }
            self.announcer
                .announce(announcer::ARRIVAL_MESSAGE, Priority::High);
            return Ok(TickOutcome::Arrived);
        }

        let turn_indices: Vec<usize> = self.plan.turns.iter().map(|t| t.index).collect();
        if let Some((distance, index)) =
            ProgressTracker::distance_to_turn(&fix.position, &positions, &turn_indices)
        {
            if self.last_turn != Some(index) {
                let turn = self
                    .plan
                    .turns
                    .iter()
                    .find(|t| t.index == index)
                    .ok_or_else(|| TickError::CorruptPlan(format!("no turn at index {}", index)))?;
                let text = announcer::turn_instruction(
                    turn.direction,
                    turn.severity,
                    &ProgressTracker::describe(distance),
                );
                if !self.announce_while_navigating(text, Priority::Medium) {
                    return Ok(TickOutcome::Halted);
                }
                self.last_turn = Some(index);
            }
        }

        let progress_due = self
            .last_progress
            .map_or(true, |at| at.elapsed() >= self.config.progress_interval());
        if progress_due {
            if let Some(remaining) = ProgressTracker::remaining_distance(&fix.position, &positions) {
                let text = announcer::distance_update(&ProgressTracker::describe(remaining));
                if !self.announce_while_navigating(text, Priority::Low) {
                    return Ok(TickOutcome::Halted);
                }
                self.last_progress = Some(Instant::now());
            }
        }

        debug!("Tick: {:.1}m to goal, last turn {:?}", to_goal, self.last_turn);
        Ok(TickOutcome::Continue)
    }

    /// Queue `text` only if the session is still navigating.
    ///
    /// The state check and the send share one lock hold, so a concurrent
    /// `stop_navigation` either sees the line queued before its stop message
    /// or suppresses it.
    fn announce_while_navigating(&self, text: String, priority: Priority) -> bool {
        let shared = lock(&self.shared);
        if shared.state != SessionState::Navigating {
            debug!("Dropping {:?} after navigation ended", text);
            return false;
        }
        self.announcer.announce(text, priority);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Keyframe, KeyframeStore};
    use std::time::Duration;

    fn session(capacity: usize) -> (GuidanceSession, AnnouncementReceiver) {
        let config = GuidanceConfig {
            tick_interval_ms: 10,
            error_backoff_ms: 10,
            ..GuidanceConfig::default()
        };
        session_with(config, capacity)
    }

    fn session_with(
        config: GuidanceConfig,
        capacity: usize,
    ) -> (GuidanceSession, AnnouncementReceiver) {
        let store = KeyframeStore::from_keyframes(vec![
            Keyframe::new(0, 0.0, 0.0, 0.0),
            Keyframe::new(1, 5.0, 0.0, 0.0),
            Keyframe::new(2, 10.0, 0.0, 0.0),
            Keyframe::new(3, 10.0, 5.0, 0.0),
            Keyframe::new(9, 100.0, 100.0, 0.0),
        ]);
        let finder = Arc::new(PathFinder::new(Arc::new(store), 6.0));
        let (announcer, rx) = announcement_channel(capacity);
        (
            GuidanceSession::new(finder, TurnClassifier::default(), config, announcer),
            rx,
        )
    }

    #[test]
    fn planning_preconditions() {
        let (session, _rx) = session(8);
        assert_eq!(session.calculate_path(), Err(NavigationError::MissingPosition));

        session.set_current_position(PositionFix::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(session.calculate_path(), Err(NavigationError::MissingDestination));
        assert_eq!(session.set_destination(42), Err(NavigationError::InvalidDestination(42)));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn unreachable_destination_keeps_state() {
        let (session, _rx) = session(8);
        session.set_current_position(PositionFix::new(0.0, 0.0, 0.0, 0.0));
        session.set_destination(3).unwrap();
        session.calculate_path().unwrap();
        assert_eq!(session.state(), SessionState::Routed);

        session.set_destination(9).unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(matches!(
            session.calculate_path(),
            Err(NavigationError::NoPathFound { start: 0, goal: 9 })
        ));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.plan().is_none());
    }

    #[test]
    fn start_requires_route() {
        let (mut session, rx) = session(8);
        assert_eq!(session.start_navigation(), Err(NavigationError::NotRouted));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stop_emits_single_message_and_blocks_replanning_until_then() {
        let (mut session, rx) = session(64);
        session.set_current_position(PositionFix::new(0.0, 0.0, 0.0, 0.0));
        session.set_destination(3).unwrap();
        session.calculate_path().unwrap();
        session.start_navigation().unwrap();
        session.start_navigation().unwrap();

        assert_eq!(session.calculate_path(), Err(NavigationError::SessionActive));
        assert_eq!(session.set_destination(2), Err(NavigationError::SessionActive));

        std::thread::sleep(Duration::from_millis(50));
        session.stop_navigation();
        session.stop_navigation();
        assert_eq!(session.state(), SessionState::Stopped);

        let texts: Vec<String> = rx.try_iter().map(|a| a.text).collect();
        assert_eq!(texts.first().map(String::as_str), Some(announcer::START_MESSAGE));
        assert_eq!(texts.last().map(String::as_str), Some(announcer::STOP_MESSAGE));
        assert_eq!(texts.iter().filter(|t| *t == announcer::START_MESSAGE).count(), 1);
        assert_eq!(texts.iter().filter(|t| *t == announcer::STOP_MESSAGE).count(), 1);
        // One turn at keyframe 2, announced once
        assert_eq!(texts.iter().filter(|t| t.contains("turn right")).count(), 1);
    }

    #[test]
    fn tick_failure_is_not_fatal() {
        let (mut session, rx) = session(64);
        let handle = session.position_handle();
        handle.update(PositionFix::new(0.0, 0.0, 0.0, 0.0));
        session.set_destination(3).unwrap();
        session.calculate_path().unwrap();

        handle.update(PositionFix::new(f64::NAN, 0.0, 0.0, 0.0));
        session.start_navigation().unwrap();
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(session.state(), SessionState::Navigating);

        handle.update(PositionFix::new(10.0, 4.5, 0.0, 90.0));
        session.wait_for_completion();
        assert_eq!(session.state(), SessionState::Arrived);

        let texts: Vec<String> = rx.try_iter().map(|a| a.text).collect();
        assert_eq!(texts, vec![announcer::START_MESSAGE, announcer::ARRIVAL_MESSAGE]);
    }

    #[test]
    fn progress_follows_turn_at_interval() {
        let config = GuidanceConfig {
            tick_interval_ms: 10,
            progress_interval_ms: 100,
            ..GuidanceConfig::default()
        };
        let (mut session, rx) = session_with(config, 64);
        session.set_current_position(PositionFix::new(0.0, 0.0, 0.0, 0.0));
        session.set_destination(3).unwrap();
        session.calculate_path().unwrap();

        session.start_navigation().unwrap();
        std::thread::sleep(Duration::from_millis(350));
        session.stop_navigation();

        let lines: Vec<Announcement> = rx.try_iter().collect();
        let (first, rest) = lines.split_first().unwrap();
        assert_eq!(first.text, announcer::START_MESSAGE);
        assert_eq!(first.priority, Priority::High);

        // Turn before progress within the first tick
        assert_eq!(rest[0].text, "In 10 meters, turn right");
        assert_eq!(rest[0].priority, Priority::Medium);

        let (last, middle) = rest[1..].split_last().unwrap();
        assert_eq!(last.text, announcer::STOP_MESSAGE);
        assert!(!middle.is_empty());
        for line in middle {
            assert_eq!(line.text, "Continue for 15 meters");
            assert_eq!(line.priority, Priority::Low);
        }
        // About 35 ticks ran; the interval keeps progress to one per 100ms
        assert!((2..=5).contains(&middle.len()), "{:?}", middle);
    }

    #[test]
    fn long_interval_gives_single_progress_line() {
        let (mut session, rx) = session(64);
        session.set_current_position(PositionFix::new(0.0, 0.0, 0.0, 0.0));
        session.set_destination(3).unwrap();
        session.calculate_path().unwrap();

        session.start_navigation().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        session.stop_navigation();

        let progress = rx
            .try_iter()
            .filter(|a| a.priority == Priority::Low)
            .count();
        assert_eq!(progress, 1);
    }

    #[test]
    fn nothing_follows_stop_message() {
        let config = GuidanceConfig {
            tick_interval_ms: 1,
            progress_interval_ms: 0,
            ..GuidanceConfig::default()
        };
        let (mut session, rx) = session_with(config, 1024);
        session.set_current_position(PositionFix::new(0.0, 0.0, 0.0, 0.0));
        session.set_destination(3).unwrap();

        for round in 0..25 {
            session.calculate_path().unwrap();
            session.start_navigation().unwrap();
            std::thread::sleep(Duration::from_millis(round % 4));
            session.stop_navigation();

            let texts: Vec<String> = rx.try_iter().map(|a| a.text).collect();
            assert_eq!(texts.last().map(String::as_str), Some(announcer::STOP_MESSAGE));
            assert_eq!(texts.iter().filter(|t| *t == announcer::STOP_MESSAGE).count(), 1);
        }
    }
}
