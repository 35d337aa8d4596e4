// src/main.rs
// Entry point for Wayfinder: loads the keyframe map, listens for position
// fixes over UDP, speaks announcements through the log, and takes commands
// line by line from stdin until EOF.

use log::{error, info, warn};
use std::error::Error;
use std::io::BufRead;
use std::sync::Arc;
use wayfinder::{
    guidance::StopSignal,
    interface::{recognize, spawn_position_pump, UdpPositionFeed},
    spawn_speaker, GuideConfig, GuideError, GuideSystem, LogSpeech,
};

/// Runs Wayfinder with an optional config path as the only argument
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    info!("Starting Wayfinder...");

    let config = match std::env::args().nth(1) {
        Some(path) => GuideConfig::from_yaml_file(&path)?,
        None => {
            info!("No config file given; using defaults");
            GuideConfig::default()
        }
    };
    let feed_config = config.feed.clone();
    let mut system = GuideSystem::new(config)?;

    let announcements = system
        .take_announcements()
        .ok_or_else(|| GuideError::Feed("announcement queue already taken".into()))?;
    let speaker = spawn_speaker(announcements, Box::new(LogSpeech));

    let feed = UdpPositionFeed::bind(&feed_config.bind_address)?;
    let pump_stop = Arc::new(StopSignal::new());
    let pump = spawn_position_pump(
        feed,
        system.position_handle(),
        pump_stop.clone(),
        feed_config.fix_timeout(),
    );

    info!("Ready for commands (navigate to <id>, stop, resume, where am I, help)");
    for line in std::io::stdin().lock().lines() {
        let line = line?;
        let Some(command) = recognize(&line) else {
            warn!("No command recognized in {:?}", line.trim());
            continue;
        };
        match system.handle_command(command) {
            Ok(Some(reply)) => info!("{}", reply),
            Ok(None) => {}
            Err(e) => error!("Command {:?} failed: {}", command, e),
        }
    }

    system.shutdown();
    pump_stop.stop();
    if pump.join().is_err() {
        error!("Position pump panicked");
    }

    // Dropping the system closes the queue so the speaker can drain and exit
    drop(system);
    if speaker.join().is_err() {
        error!("Speaker thread panicked");
    }

    info!("Wayfinder stopped");
    Ok(())
}
