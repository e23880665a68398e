//! The contracts between the tray and whatever draws the bar.

use std::path::Path;

pub use crate::Bounds;
use crate::Pixmap;

/// What to draw for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon<'a> {
    /// A `.png` file.
    File(&'a Path),
    Pixmap(&'a Pixmap),
    /// Nothing better was found.
    Placeholder,
}

pub trait Canvas {
    fn fill_background(&mut self, bounds: Bounds);

    /// Draw `icon` scaled to `size`x`size` with its top left corner at `x`, `y`.
    fn draw_icon(&mut self, icon: Icon<'_>, x: i32, y: i32, size: i32);
}

/// Part of the bar's render pipeline.
pub trait PipelineListener {
    /// Horizontal space needed at the next render.
    fn width(&self) -> i32;

    /// Draw starting at `x`, `y`, advancing `x` past whatever was drawn.
    fn render(&mut self, canvas: &mut dyn Canvas, x: &mut i32, y: &mut i32);
}

/// Something that reacts to pointer clicks within its bounds.
pub trait HotspotListener {
    fn bounds(&self) -> Bounds;

    fn click(&mut self, button: u32, x: f64, y: f64);
}
