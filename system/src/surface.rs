use crate::error::SnapshotError;
use crate::{Color, Point, Snapshot};

/// Paint used by a single tool application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    pub color: Color,
    pub width: f32,
}

/// The locally rendered drawing surface a participant edits.
///
/// Pixel-level tool rendering lives behind this trait; the session logic only
/// decides *when* to draw, snapshot and restore.
pub trait Surface {
    fn snapshot(&self) -> Result<Snapshot, SnapshotError>;

    /// Replaces the surface content with `snapshot`. On error the surface is left as it was.
    fn restore(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError>;

    fn clear(&mut self);

    /// Changes the surface dimensions, keeping content anchored at the origin.
    fn resize(&mut self, width: u32, height: u32);

    fn stroke(&mut self, from: Point, to: Point, brush: &Brush);

    fn rectangle(&mut self, corner: Point, opposite: Point, brush: &Brush);

    /// Circle centred on `center` passing through `edge`.
    fn ellipse(&mut self, center: Point, edge: Point, brush: &Brush);

    fn text(&mut self, at: Point, text: &str, brush: &Brush);
}
