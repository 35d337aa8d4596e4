//! Wayfinder - keyframe-map path planning and spoken guidance
//!
//! This library plans walking routes over a SLAM keyframe map, finds the
//! turns along them and runs a guidance loop that turns the user's live
//! position into queued spoken instructions.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod config;
pub mod guidance;
pub mod interface;
pub mod map;
pub mod navigation;

// Re-export commonly used items for easier access
pub use config::{ConfigError, GuideConfig};
pub use guidance::{
    announcement_channel, spawn_speaker, Announcement, AnnouncementReceiver, Announcer,
    GuidanceSession, LogSpeech, PositionFix, PositionHandle, Priority, SessionState,
    SessionStatus, SpeechOutput,
};
pub use interface::{recognize, Command};
pub use map::{Keyframe, KeyframeId, KeyframeStore, MapError, ProximityGraph};
pub use navigation::{NavigationError, PathFinder, Route, TurnClassifier};

use log::info;
use navigation::ProgressTracker;
use std::path::Path;
use std::sync::Arc;

/// Primary entry point: map, planner, session and announcement queue
pub struct GuideSystem {
    config: GuideConfig,
    finder: Arc<PathFinder>,
    session: GuidanceSession,
    announcer: Announcer,
    announcements: Option<AnnouncementReceiver>,
}

impl GuideSystem {
    /// Load the keyframe map named in `config` and build the system
    pub fn new(config: GuideConfig) -> Result<Self, GuideError> {
        config.validate()?;
        let store = KeyframeStore::load(&config.map.keyframe_file)?;
        Ok(Self::with_store(config, store))
    }

    /// Read a YAML config file, then build as [`GuideSystem::new`]
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> Result<Self, GuideError> {
        let config = GuideConfig::from_yaml_file(path)?;
        Self::new(config)
    }

    /// Build around an already loaded map
    pub fn with_store(config: GuideConfig, store: KeyframeStore) -> Self {
        info!("Initializing Wayfinder with {} keyframes", store.len());
        let finder = Arc::new(PathFinder::new(
            Arc::new(store),
            config.map.proximity_threshold,
        ));
        let (announcer, announcements) =
            announcement_channel(config.guidance.announcement_capacity);
        let session = GuidanceSession::new(
            finder.clone(),
            TurnClassifier::new(config.turns),
            config.guidance.clone(),
            announcer.clone(),
        );

        GuideSystem {
            config,
            finder,
            session,
            announcer,
            announcements: Some(announcements),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &GuideConfig {
        &self.config
    }

    /// Shared planner
    pub fn finder(&self) -> &Arc<PathFinder> {
        &self.finder
    }

    /// Guidance session
    pub fn session(&self) -> &GuidanceSession {
        &self.session
    }

    /// Guidance session, mutably (start/stop)
    pub fn session_mut(&mut self) -> &mut GuidanceSession {
        &mut self.session
    }

    /// Writer for the position feed
    pub fn position_handle(&self) -> PositionHandle {
        self.session.position_handle()
    }

    /// Hand the announcement queue to its consumer; `None` after the first call
    pub fn take_announcements(&mut self) -> Option<AnnouncementReceiver> {
        self.announcements.take()
    }

    /// Session snapshot
    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    /// Act on a user command. Spoken replies are queued and also returned.
    pub fn handle_command(&mut self, command: Command) -> Result<Option<String>, GuideError> {
        match command {
            Command::Navigate(id) => {
                self.session.stop_navigation();
                self.session.set_destination(id)?;
                self.session.calculate_path()?;
                self.session.start_navigation()?;
                Ok(None)
            }
            Command::Stop => {
                self.session.stop_navigation();
                Ok(None)
            }
            Command::Resume => {
                if self.session.state() != SessionState::Navigating {
                    self.session.calculate_path()?;
                    self.session.start_navigation()?;
                }
                Ok(None)
            }
            Command::WhereAmI => Ok(Some(self.reply(self.describe_location()))),
            Command::Help => Ok(Some(self.reply(interface::HELP_TEXT.to_string()))),
            Command::Unrecognized => Ok(Some(
                self.reply("Sorry, I did not catch the destination number.".to_string()),
            )),
        }
    }

    fn describe_location(&self) -> String {
        let status = self.session.status();
        let mut text = match status.nearest_keyframe {
            Some(id) => format!("You are near keyframe {}", id),
            None => return "Your location is not known yet.".to_string(),
        };
        if let Some(remaining) = status.remaining_distance {
            text.push_str(&format!(
                ", {} from your destination",
                ProgressTracker::describe(remaining)
            ));
        }
        text.push('.');
        text
    }

    fn reply(&self, text: String) -> String {
        self.announcer.announce(text.clone(), Priority::High);
        text
    }

    /// Stop guidance and wait for the loop to exit
    pub fn shutdown(&mut self) {
        info!("Shutting down Wayfinder...");
        self.session.stop_navigation();
    }
}

/// Wayfinder error types
#[derive(Debug)]
pub enum GuideError {
    /// Keyframe map error
    Map(MapError),
    /// Planning or session error
    Navigation(NavigationError),
    /// Configuration error
    Config(ConfigError),
    /// Position feed error
    Feed(String),
}

impl std::fmt::Display for GuideError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            GuideError::Map(e) => write!(f, "Map error: {}", e),
            GuideError::Navigation(e) => write!(f, "Navigation error: {}", e),
            GuideError::Config(e) => write!(f, "Configuration error: {}", e),
            GuideError::Feed(msg) => write!(f, "Position feed error: {}", msg),
        }
    }
}

impl std::error::Error for GuideError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GuideError::Map(e) => Some(e),
            GuideError::Navigation(e) => Some(e),
            GuideError::Config(e) => Some(e),
            GuideError::Feed(_) => None,
        }
    }
}

impl From<MapError> for GuideError {
    fn from(e: MapError) -> Self {
        GuideError::Map(e)
    }
}

impl From<NavigationError> for GuideError {
    fn from(e: NavigationError) -> Self {
        GuideError::Navigation(e)
    }
}

impl From<ConfigError> for GuideError {
    fn from(e: ConfigError) -> Self {
        GuideError::Config(e)
    }
}

impl From<std::io::Error> for GuideError {
    fn from(e: std::io::Error) -> Self {
        GuideError::Feed(e.to_string())
    }
}
