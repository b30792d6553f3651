use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{MorphError, Result, ShapeGeometry, TriggerEdges};

/// Top-level configuration structure for a morphing view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphConfig {
    pub fade: FadeConfig,
    pub policy: TriggerPolicy,
    pub triggers: TriggerEdges,
    pub geometry: ShapeGeometry,
    pub canvas: CanvasConfig,
}

impl MorphConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        let g = &self.geometry;
        if g.circle_radius <= 0.0 || g.rect_width <= 0.0 || g.rect_height <= 0.0 {
            return Err(MorphError::msg("shape geometry must be strictly positive"));
        }
        if self.fade.frame_interval_ms == 0 {
            return Err(MorphError::msg("fade frame interval must be non-zero"));
        }
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(MorphError::msg("canvas must have a non-zero size"));
        }
        Ok(())
    }
}

/// Timing of the fade-out and fade-in phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeConfig {
    pub duration_ms: u64,
    pub delay_ms: u64,
    /// Step used by the timer driven animator.
    pub frame_interval_ms: u64,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            duration_ms: 200,
            delay_ms: 0,
            frame_interval_ms: 16,
        }
    }
}

impl FadeConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// What happens to a trigger that arrives while a morph is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Drop the trigger.
    Debounce,
    /// Keep a single follow-up and run it once the in-flight cycle completes.
    #[default]
    Coalesce,
}

/// Size of the hosting `<svg>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo_constants() {
        let config = MorphConfig::default();
        assert_eq!(config.fade.duration(), Duration::from_millis(200));
        assert_eq!(config.fade.delay(), Duration::ZERO);
        assert_eq!(config.policy, TriggerPolicy::Coalesce);
        assert_eq!(config.geometry.circle_radius, 40.0);
        assert_eq!(config.geometry.rect_width, 80.0);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config = MorphConfig::from_json_str(
            r#"{"policy":"debounce","fade":{"duration_ms":50},"triggers":{"up":false}}"#,
        )
        .unwrap();
        assert_eq!(config.policy, TriggerPolicy::Debounce);
        assert_eq!(config.fade.duration_ms, 50);
        assert_eq!(config.fade.frame_interval_ms, 16);
        assert_eq!(config.canvas, CanvasConfig::default());
        assert_eq!(
            config.triggers,
            TriggerEdges {
                down: true,
                up: false
            }
        );
    }

    #[test]
    fn rejects_degenerate_geometry() {
        let err = MorphConfig::from_json_str(
            r#"{"geometry":{"origin":{"x":0,"y":0},"circle_radius":0,"rect_width":80,"rect_height":80}}"#,
        )
        .unwrap_err();
        assert!(format!("{err}").contains("geometry"));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = MorphConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, MorphError::Config(_)));
    }
}
