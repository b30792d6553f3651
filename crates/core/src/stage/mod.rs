use std::{
    fmt::Write as _,
    sync::{Mutex, MutexGuard},
};

use crate::{
    CanvasConfig, MorphError, OpacityTarget, Position, Result, Shape, ShapeFactory,
    ShapeGeometry, ShapeId, ShapeKind, Size,
};

const STROKE: &str = "gray";
const FILL: &str = "white";
const HOVER_FILL: &str = "aliceblue";

/// A live element on the stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageElement {
    pub shape: Shape,
    pub opacity: f32,
    pub highlighted: bool,
}

#[derive(Debug, Default)]
struct StageInner {
    next_id: u64,
    elements: Vec<StageElement>,
    failures: Vec<String>,
    created: usize,
}

/// In-memory stand-in for a single `<svg>` canvas.
///
/// Acts as the [`ShapeFactory`] and the [`OpacityTarget`] of a morphing view
/// and can render its current contents as SVG markup.
#[derive(Debug)]
pub struct SvgStage {
    canvas: CanvasConfig,
    geometry: ShapeGeometry,
    inner: Mutex<StageInner>,
}

impl SvgStage {
    pub fn new(canvas: CanvasConfig, geometry: ShapeGeometry) -> Self {
        Self {
            canvas,
            geometry,
            inner: Mutex::new(StageInner::default()),
        }
    }

    /// Makes the next call to [`ShapeFactory::create`] fail with `reason`.
    /// Failures queue up and are consumed in order.
    pub fn fail_next_creation(&self, reason: impl Into<String>) -> Result<()> {
        self.lock()?.failures.push(reason.into());
        Ok(())
    }

    /// Snapshot of the live elements in paint order.
    pub fn elements(&self) -> Result<Vec<StageElement>> {
        Ok(self.lock()?.elements.clone())
    }

    pub fn element(&self, id: ShapeId) -> Result<Option<StageElement>> {
        Ok(self
            .lock()?
            .elements
            .iter()
            .find(|element| element.shape.id == id)
            .cloned())
    }

    /// Number of successful creations since the stage was built.
    pub fn created_count(&self) -> Result<usize> {
        Ok(self.lock()?.created)
    }

    /// Renders the canvas and its elements as an SVG document.
    pub fn render_svg(&self) -> Result<String> {
        let inner = self.lock()?;
        let (width, height) = (self.canvas.width, self.canvas.height);
        let mut out = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">\n"
        );
        for element in &inner.elements {
            write_element(&mut out, element)
                .map_err(|_| MorphError::msg("failed to format svg element"))?;
        }
        out.push_str("</svg>\n");
        Ok(out)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StageInner>> {
        self.inner.lock().map_err(|_| MorphError::Poisoned("svg stage"))
    }
}

fn write_element(out: &mut String, element: &StageElement) -> std::fmt::Result {
    let shape = &element.shape;
    let tag = shape.kind.tag();
    let fill = if element.highlighted { HOVER_FILL } else { FILL };
    let style = format!(
        "stroke: {STROKE}; fill: {fill}; opacity: {}",
        format_number(element.opacity)
    );
    match shape.size {
        Size::Radius(r) => {
            let center = shape.center();
            writeln!(
                out,
                "  <{tag} id=\"{}\" cx=\"{}\" cy=\"{}\" r=\"{}\" style=\"{style}\"/>",
                shape.id,
                format_number(center.x),
                format_number(center.y),
                format_number(r),
            )
        }
        Size::Extent { width, height } => writeln!(
            out,
            "  <{tag} id=\"{}\" x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" style=\"{style}\"/>",
            shape.id,
            format_number(shape.position.x),
            format_number(shape.position.y),
            format_number(width),
            format_number(height),
        ),
    }
}

fn format_number(value: f32) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

impl ShapeFactory for SvgStage {
    fn create(&self, kind: ShapeKind, visible: bool, position: Position) -> Result<Shape> {
        let mut inner = self.lock()?;
        if !inner.failures.is_empty() {
            let reason = inner.failures.remove(0);
            return Err(MorphError::creation_failed(kind, reason));
        }

        inner.next_id += 1;
        let shape = Shape {
            id: ShapeId(inner.next_id),
            kind,
            visible,
            position,
            size: self.geometry.size_of(kind),
        };
        inner.elements.push(StageElement {
            shape: shape.clone(),
            opacity: if visible { 1.0 } else { 0.0 },
            highlighted: false,
        });
        inner.created += 1;
        Ok(shape)
    }

    fn remove(&self, shape: &Shape) {
        match self.lock() {
            Ok(mut inner) => inner.elements.retain(|element| element.shape.id != shape.id),
            Err(err) => tracing::warn!(%err, shape = %shape.id, "could not remove shape"),
        }
    }

    fn set_highlight(&self, shape: &Shape, highlighted: bool) {
        if let Ok(mut inner) = self.lock() {
            if let Some(element) = inner
                .elements
                .iter_mut()
                .find(|element| element.shape.id == shape.id)
            {
                element.highlighted = highlighted;
            }
        }
    }
}

impl OpacityTarget for SvgStage {
    fn set_opacity(&self, id: ShapeId, opacity: f32) {
        if let Ok(mut inner) = self.lock() {
            if let Some(element) = inner.elements.iter_mut().find(|e| e.shape.id == id) {
                element.opacity = opacity.clamp(0.0, 1.0);
                element.shape.visible = element.opacity > 0.0;
            }
        }
    }
}
