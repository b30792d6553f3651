use std::fmt;

use serde::{Deserialize, Serialize};

/// The two kinds of primitive the sequencer morphs between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Circle,
    Rectangle,
}

impl ShapeKind {
    /// Returns the kind a morph from `self` produces.
    pub fn opposite(self) -> Self {
        match self {
            Self::Circle => Self::Rectangle,
            Self::Rectangle => Self::Circle,
        }
    }

    /// SVG element name used when rendering this kind.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Circle => "circle",
            Self::Rectangle => "rect",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Circle => "circle",
            Self::Rectangle => "rectangle",
        })
    }
}

/// Anchor point of a shape on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Fixed sizes used for each kind of shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeGeometry {
    pub origin: Position,
    pub circle_radius: f32,
    pub rect_width: f32,
    pub rect_height: f32,
}

impl Default for ShapeGeometry {
    fn default() -> Self {
        Self {
            origin: Position::new(0.0, 0.0),
            circle_radius: 40.0,
            rect_width: 80.0,
            rect_height: 80.0,
        }
    }
}

impl ShapeGeometry {
    /// Size of a shape of `kind` expressed as a [`Size`].
    pub fn size_of(&self, kind: ShapeKind) -> Size {
        match kind {
            ShapeKind::Circle => Size::Radius(self.circle_radius),
            ShapeKind::Rectangle => Size::Extent {
                width: self.rect_width,
                height: self.rect_height,
            },
        }
    }
}

/// Kind specific dimensions of a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Size {
    Radius(f32),
    Extent { width: f32, height: f32 },
}

/// Identity of a shape instance, handed out by a [`crate::ShapeFactory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub u64);

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape-{}", self.0)
    }
}

/// A displayed geometric primitive.
///
/// Shapes are created by a factory and owned by the sequencer while they are
/// current. `position` is the bounding-box origin for both kinds, so a circle
/// and the rectangle replacing it cover the same area.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    pub visible: bool,
    pub position: Position,
    pub size: Size,
}

impl Shape {
    /// Centre point of the shape, derived from its bounding box.
    pub fn center(&self) -> Position {
        match self.size {
            Size::Radius(r) => Position::new(self.position.x + r, self.position.y + r),
            Size::Extent { width, height } => Position::new(
                self.position.x + width * 0.5,
                self.position.y + height * 0.5,
            ),
        }
    }
}

/// Progress of a morph cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MorphPhase {
    #[default]
    Idle,
    FadingOut,
    Swapped,
    FadingIn,
}

/// State owned by the sequencer. Only the sequencer mutates it.
#[derive(Debug, Clone)]
pub struct MorphState {
    pub current: Shape,
    pub phase: MorphPhase,
    /// A coalesced follow-up trigger is waiting for the in-flight cycle.
    pub pending: bool,
    pub disposed: bool,
    pub highlighted: bool,
}

impl MorphState {
    pub fn new(current: Shape) -> Self {
        Self {
            current,
            phase: MorphPhase::Idle,
            pending: false,
            disposed: false,
            highlighted: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.phase == MorphPhase::Idle
    }
}
