use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::MorphError;

/// Pointer events delivered by a trigger source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerEvent {
    Down,
    Up,
    Enter,
    Leave,
}

impl FromStr for PointerEvent {
    type Err = MorphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "down" | "mousedown" => Ok(Self::Down),
            "up" | "mouseup" => Ok(Self::Up),
            "enter" | "mouseover" => Ok(Self::Enter),
            "leave" | "mouseout" => Ok(Self::Leave),
            other => Err(MorphError::msg(format!("unknown pointer event `{other}`"))),
        }
    }
}

impl fmt::Display for PointerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Down => "down",
            Self::Up => "up",
            Self::Enter => "enter",
            Self::Leave => "leave",
        })
    }
}

/// Parses a comma separated event script such as `down,up,down`.
pub fn parse_script(script: &str) -> crate::Result<Vec<PointerEvent>> {
    script
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Which button edges start a morph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerEdges {
    pub down: bool,
    pub up: bool,
}

impl Default for TriggerEdges {
    fn default() -> Self {
        Self { down: true, up: true }
    }
}

impl TriggerEdges {
    pub fn triggers(&self, event: PointerEvent) -> bool {
        match event {
            PointerEvent::Down => self.down,
            PointerEvent::Up => self.up,
            PointerEvent::Enter | PointerEvent::Leave => false,
        }
    }
}
