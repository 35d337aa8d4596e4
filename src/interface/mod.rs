//! Collaborator interfaces: the position feed coming from localization and
//! the command surface coming from the user.

pub mod commands;
pub mod position;

pub use commands::{recognize, Command, HELP_TEXT};
pub use position::{
    parse_fix, spawn_position_pump, ChannelPositionFeed, PositionFeed, UdpPositionFeed,
};
