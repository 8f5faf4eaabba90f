//! Camera input: head positions from the tracker or from manual override

use glam::Vec3;

use crate::coordinator::DisplayId;

/// Where a head position came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    /// Raw tracker coordinates in metres; converted before use
    Tracker,
    /// Already in room units (keyboard/console override)
    Manual,
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputSource::Tracker => write!(f, "tracker"),
            InputSource::Manual => write!(f, "manual"),
        }
    }
}

/// A single head position event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPosition {
    pub position: Vec3,
    pub source: InputSource,
}

impl HeadPosition {
    pub fn tracked(position: Vec3) -> Self {
        Self {
            position,
            source: InputSource::Tracker,
        }
    }

    pub fn manual(position: Vec3) -> Self {
        Self {
            position,
            source: InputSource::Manual,
        }
    }

    pub fn is_manual(&self) -> bool {
        self.source == InputSource::Manual
    }
}

/// Manual nudge direction, relative to the primary screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward the primary screen (-z)
    Up,
    /// Away from the primary screen (+z)
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit step in room axes
    pub fn offset(&self) -> Vec3 {
        match self {
            Direction::Up => -Vec3::Z,
            Direction::Down => Vec3::Z,
            Direction::Left => -Vec3::X,
            Direction::Right => Vec3::X,
        }
    }
}

/// Discrete override commands from the operator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ManualCommand {
    /// Step the eye by the configured manual step
    Nudge(Direction),
    /// Place the head at a room-space position
    Position(Vec3),
    /// Load a camera preset on one display
    Preset { display: DisplayId, index: usize },
    /// Return both cameras to their baseline eyes
    ResetEyes,
}

impl ManualCommand {
    /// Parse a console line such as `left`, `pos 0 0 900` or `preset b 2`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let command = words.next()?.to_ascii_lowercase();
        let parsed = match command.as_str() {
            "up" | "w" => ManualCommand::Nudge(Direction::Up),
            "down" | "s" => ManualCommand::Nudge(Direction::Down),
            "left" | "a" => ManualCommand::Nudge(Direction::Left),
            "right" | "d" => ManualCommand::Nudge(Direction::Right),
            "reset" => ManualCommand::ResetEyes,
            "pos" | "position" => {
                let mut coord = || words.next()?.parse::<f32>().ok();
                let (x, y, z) = (coord()?, coord()?, coord()?);
                ManualCommand::Position(Vec3::new(x, y, z))
            }
            "preset" => {
                let display = match words.next()?.to_ascii_lowercase().as_str() {
                    "a" | "primary" => DisplayId::Primary,
                    "b" | "secondary" => DisplayId::Secondary,
                    _ => return None,
                };
                let index = words.next()?.parse().ok()?;
                ManualCommand::Preset { display, index }
            }
            _ => return None,
        };
        if words.next().is_some() {
            return None;
        }
        Some(parsed)
    }
}
