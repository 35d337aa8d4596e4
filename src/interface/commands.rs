// src/interface/commands.rs
// Keyword command recognition for transcribed speech or typed input.

use crate::map::KeyframeId;
use log::{debug, info};

/// A recognized user command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Guide to a keyframe
    Navigate(KeyframeId),
    /// Cancel guidance
    Stop,
    /// Re-plan from the current position and start again
    Resume,
    /// Report the current location
    WhereAmI,
    /// List available commands
    Help,
    /// A navigate request without a usable destination
    Unrecognized,
}

// Checked in order; stop comes first so "stop going" halts
const STOP_KEYWORDS: &[&str] = &["stop", "halt", "pause"];
const NAVIGATE_KEYWORDS: &[&str] = &["navigate", "go", "take me"];
const RESUME_KEYWORDS: &[&str] = &["restart", "resume", "continue"];
const WHERE_KEYWORDS: &[&str] = &["where am i", "location", "position"];
const HELP_KEYWORDS: &[&str] = &["help", "assistance", "commands"];

/// Spoken summary of the command set
pub const HELP_TEXT: &str = "Available commands: navigate to a keyframe number, stop, \
resume, where am I, and help.";

fn mentions(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Last integer token in `text`, ignoring trailing punctuation
fn trailing_id(text: &str) -> Option<KeyframeId> {
    text.split_whitespace()
        .rev()
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_digit() && c != '-'))
        .find_map(|token| token.parse::<KeyframeId>().ok())
}

/// Match `text` against the command keywords (case-insensitive)
pub fn recognize(text: &str) -> Option<Command> {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }

    let command = if mentions(&text, STOP_KEYWORDS) {
        Command::Stop
    } else if mentions(&text, NAVIGATE_KEYWORDS) {
        trailing_id(&text).map_or(Command::Unrecognized, Command::Navigate)
    } else if mentions(&text, RESUME_KEYWORDS) {
        Command::Resume
    } else if mentions(&text, WHERE_KEYWORDS) {
        Command::WhereAmI
    } else if mentions(&text, HELP_KEYWORDS) {
        Command::Help
    } else {
        debug!("No command in {:?}", text);
        return None;
    };

    info!("Identified command {:?}", command);
    Some(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Navigate to 12", Some(Command::Navigate(12)))]
    #[case("take me to keyframe 7.", Some(Command::Navigate(7)))]
    #[case("go somewhere nice", Some(Command::Unrecognized))]
    #[case("STOP going", Some(Command::Stop))]
    #[case("please pause", Some(Command::Stop))]
    #[case("resume", Some(Command::Resume))]
    #[case("Where am I?", Some(Command::WhereAmI))]
    #[case("what is my location", Some(Command::WhereAmI))]
    #[case("help", Some(Command::Help))]
    #[case("list commands", Some(Command::Help))]
    #[case("hello there", None)]
    #[case("   ", None)]
    fn recognizes_keywords(#[case] text: &str, #[case] expected: Option<Command>) {
        assert_eq!(recognize(text), expected);
    }
}
