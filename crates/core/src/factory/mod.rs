use crate::{Position, Result, Shape, ShapeKind};

/// Creates and removes displayed shapes.
///
/// Implementations own the rendering surface. The sequencer decides when a
/// shape is created or removed and keeps the only reference to the current
/// one, so no lookup by element id is ever needed.
pub trait ShapeFactory: Send + Sync {
    /// Creates a shape of `kind` anchored at `position`, fully opaque when
    /// `visible` is set and fully transparent otherwise.
    fn create(&self, kind: ShapeKind, visible: bool, position: Position) -> Result<Shape>;

    /// Removes `shape` from the surface. Removing an unknown shape is a no-op.
    fn remove(&self, shape: &Shape);

    /// Switches the hover fill of `shape`.
    fn set_highlight(&self, _shape: &Shape, _highlighted: bool) {}
}
