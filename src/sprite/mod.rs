pub mod runner;

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Animation state of the runner. Each pose binds a sprite strip, a crop
/// geometry, and a display width; the active pose is an explicit tag, never
/// inferred from which image happens to be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pose {
    StandLeft,
    StandRight,
    RunLeft,
    RunRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Crop geometry and cycle length for one pose.
/// - `crop_width` is the width of a single frame inside the sprite strip;
///   drawing samples the strip at `crop_width * frame`.
/// - `logical_width` is the on-canvas width of the runner in this pose.
/// - `cycle` is the cosmetic animation-cycle length, not physics.
#[derive(Debug, Clone, Copy)]
pub struct SpriteMetadata {
    pub crop_width: f32,
    pub crop_height: f32,
    pub logical_width: f32,
    pub cycle: u8,
}

static METADATA: Lazy<HashMap<Pose, SpriteMetadata>> = Lazy::new(|| {
    let stand = SpriteMetadata {
        crop_width: 177.0,
        crop_height: 400.0,
        logical_width: 66.0,
        cycle: 60,
    };
    let run = SpriteMetadata {
        crop_width: 341.0,
        crop_height: 400.0,
        logical_width: 127.875,
        cycle: 30,
    };
    HashMap::from([
        (Pose::StandLeft, stand),
        (Pose::StandRight, stand),
        (Pose::RunLeft, run),
        (Pose::RunRight, run),
    ])
});

impl Pose {
    pub fn metadata(&self) -> &'static SpriteMetadata {
        METADATA.get(self).expect("Metadata not found for pose")
    }
}

/// ┌─────────────────── Pose selection ───────────────────┐
/// │  held          last     current        →  next       │
/// ├──────────────────────────────────────────────────────┤
/// │  right         Right    not RunRight   →  RunRight   │
/// │  left          Left     not RunLeft    →  RunLeft    │
/// │  (left up)     Left     not StandLeft  →  StandLeft  │
/// │  (right up)    Right    not StandRight →  StandRight │
/// │  anything else                         →  unchanged  │
/// └──────────────────────────────────────────────────────┘
/// First match wins. With no last-direction marker yet (no direction key
/// ever pressed) the current pose always holds.
pub fn next_pose(current: Pose, left_held: bool, right_held: bool, last: Option<Direction>) -> Pose {
    if right_held && last == Some(Direction::Right) && current != Pose::RunRight {
        Pose::RunRight
    } else if left_held && last == Some(Direction::Left) && current != Pose::RunLeft {
        Pose::RunLeft
    } else if !left_held && last == Some(Direction::Left) && current != Pose::StandLeft {
        Pose::StandLeft
    } else if !right_held && last == Some(Direction::Right) && current != Pose::StandRight {
        Pose::StandRight
    } else {
        current
    }
}
