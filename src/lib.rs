//! A maze-chase engine where the player and every ghost run their own
//! control loop against one shared, locked grid.

pub mod actor;
pub mod audio;
pub mod broker;
pub mod chase;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod ghost;
pub mod grid;
pub mod input;
pub mod layout;
pub mod level;
pub mod player;
pub mod probe;
pub mod world;

pub use audio::{AudioBackend, SoundEffect, SoundPlayer, TimedBackend};
pub use components::{Dir, Occupant, Pos};
pub use config::Tuning;
pub use error::{LevelError, LevelResult};
pub use input::KeySource;
pub use layout::Layout;
pub use level::{Level, LevelHandle, LevelOptions, LevelReport, Outcome};
pub use world::{Appearance, Sprite, World};
