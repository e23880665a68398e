use systray::render::{Bounds, Canvas, Icon};

/// A [`Canvas`] that logs what it is asked to draw, for running the tray without a bar.
#[derive(Debug, Default)]
pub struct LogCanvas {
    drawn: usize,
}

impl LogCanvas {
    /// Number of icons drawn since the last call.
    pub fn take_drawn(&mut self) -> usize {
        std::mem::take(&mut self.drawn)
    }
}

impl Canvas for LogCanvas {
    fn fill_background(&mut self, bounds: Bounds) {
        log::trace!("background at {:?}", bounds);
    }

    fn draw_icon(&mut self, icon: Icon<'_>, x: i32, y: i32, size: i32) {
        self.drawn += 1;
        match icon {
            Icon::File(path) => log::info!("icon {} at {},{} ({}px)", path.display(), x, y, size),
            Icon::Pixmap(pixmap) => log::info!("{}px pixmap at {},{} ({}px)", pixmap.size, x, y, size),
            Icon::Placeholder => log::info!("placeholder at {},{} ({}px)", x, y, size),
        }
    }
}
