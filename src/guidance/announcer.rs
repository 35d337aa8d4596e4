//! Spoken announcements
//!
//! The guidance loop submits `(text, priority)` pairs into a bounded FIFO
//! channel. A single speaker thread drains it in submission order and hands
//! each line to a [`SpeechOutput`] backend. Priorities travel with the text
//! but never reorder the queue.

use crate::navigation::{TurnDirection, TurnSeverity};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, info, warn};
use std::thread::JoinHandle;

/// Spoken when navigation begins
pub const START_MESSAGE: &str = "Starting navigation. Please follow the instructions.";
/// Spoken when the user cancels navigation
pub const STOP_MESSAGE: &str = "Navigation stopped.";
/// Spoken on arrival
pub const ARRIVAL_MESSAGE: &str = "You have reached your destination";

/// Announcement priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Periodic progress updates
    Low,
    /// Upcoming turns
    Medium,
    /// Start, stop and arrival
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
        }
    }
}

/// A line of text to be spoken
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Text to speak
    pub text: String,
    /// Priority tag for the speech backend
    pub priority: Priority,
}

/// Receiving end handed to the speaker thread
pub type AnnouncementReceiver = Receiver<Announcement>;

/// Submitting end of the announcement queue
#[derive(Debug, Clone)]
pub struct Announcer {
    tx: Sender<Announcement>,
}

/// Create a bounded announcement queue
pub fn announcement_channel(capacity: usize) -> (Announcer, AnnouncementReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    (Announcer { tx }, rx)
}

impl Announcer {
    /// Queue an announcement.
    ///
    /// Low-priority lines are dropped when the queue is full; medium and
    /// high wait for room. Returns whether the line was queued.
    pub fn announce(&self, text: impl Into<String>, priority: Priority) -> bool {
        let announcement = Announcement {
            text: text.into(),
            priority,
        };
        debug!("Queueing [{}] {}", priority, announcement.text);

        if priority == Priority::Low {
            match self.tx.try_send(announcement) {
                Ok(()) => true,
                Err(TrySendError::Full(a)) => {
                    warn!("Announcement queue full, dropping: {}", a.text);
                    false
                }
                Err(TrySendError::Disconnected(a)) => {
                    warn!("No speech consumer, dropping: {}", a.text);
                    false
                }
            }
        } else {
            match self.tx.send(announcement) {
                Ok(()) => true,
                Err(e) => {
                    warn!("No speech consumer, dropping: {}", e.into_inner().text);
                    false
                }
            }
        }
    }
}

/// Turn instruction, e.g. "In 15 meters, slight left"
pub fn turn_instruction(direction: TurnDirection, severity: TurnSeverity, distance: &str) -> String {
    match severity {
        TurnSeverity::UTurn => format!("In {}, make a U-turn", distance),
        TurnSeverity::Normal | TurnSeverity::None => format!("In {}, turn {}", distance, direction),
        _ => format!("In {}, {} {}", distance, severity, direction),
    }
}

/// Periodic progress update
pub fn distance_update(distance: &str) -> String {
    format!("Continue for {}", distance)
}

/// Speech synthesis backend
#[cfg_attr(test, mockall::automock)]
pub trait SpeechOutput {
    /// Speak one announcement; called serially in queue order
    fn say(&mut self, announcement: &Announcement);
}

/// Backend that writes announcements to the log
#[derive(Debug, Default)]
pub struct LogSpeech;

impl SpeechOutput for LogSpeech {
    fn say(&mut self, announcement: &Announcement) {
        info!("[speech:{}] {}", announcement.priority, announcement.text);
    }
}

/// Drain `receiver` into `output` until every [`Announcer`] is dropped
pub fn spawn_speaker(
    receiver: AnnouncementReceiver,
    mut output: Box<dyn SpeechOutput + Send>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for announcement in receiver.iter() {
            output.say(&announcement);
        }
        debug!("Speaker stopped: announcement queue closed");
    })
}
