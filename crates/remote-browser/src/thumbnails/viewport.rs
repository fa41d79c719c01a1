//! Viewport geometry: scroll position, item layout, and the prefetch range.

use std::ops::Range;

/// The scrolled window onto a list or grid, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Distance from the top of the content to the top of the window
    pub scroll_top: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(scroll_top: f32, width: f32, height: f32) -> Self {
        Self {
            scroll_top,
            width,
            height,
        }
    }

    /// How far down the content the window is, from 0 to 1.
    /// Content that fits in the window can't scroll, so that's 0.
    pub fn scroll_fraction(&self, content_height: f32) -> f32 {
        let max_scroll = content_height - self.height;
        if max_scroll <= 0.0 {
            return 0.0;
        }
        (self.scroll_top / max_scroll).clamp(0.0, 1.0)
    }
}

/// Cell layout of a view mode. List mode is a grid with one full-width column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridMetrics {
    /// `None` means one column spanning the viewport
    pub cell_width: Option<u32>,
    pub cell_height: u32,
    /// Requested thumbnail box
    pub icon_size: u32,
}

impl GridMetrics {
    pub fn columns(&self, viewport_width: f32) -> usize {
        match self.cell_width {
            Some(cell) if cell > 0 => ((viewport_width / cell as f32).floor() as usize).max(1),
            _ => 1,
        }
    }

    pub fn content_height(&self, item_count: usize, viewport_width: f32) -> f32 {
        let rows = item_count.div_ceil(self.columns(viewport_width));
        rows as f32 * self.cell_height as f32
    }

    /// Indices of items intersecting the viewport expanded by half its height above and below.
    pub fn prefetch_range(&self, viewport: &Viewport, item_count: usize) -> Range<usize> {
        if item_count == 0 || self.cell_height == 0 || viewport.height <= 0.0 {
            return 0..0;
        }
        let buffer = viewport.height / 2.0;
        let top = (viewport.scroll_top - buffer).max(0.0);
        let bottom = viewport.scroll_top + viewport.height + buffer;
        if bottom <= 0.0 {
            return 0..0;
        }

        let cell = self.cell_height as f32;
        let columns = self.columns(viewport.width);
        let first_row = (top / cell).floor() as usize;
        let end_row = (bottom / cell).ceil() as usize;
        let start = (first_row * columns).min(item_count);
        let end = (end_row * columns).min(item_count);
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THUMBS: GridMetrics = GridMetrics {
        cell_width: Some(150),
        cell_height: 140,
        icon_size: 112,
    };

    const LIST: GridMetrics = GridMetrics {
        cell_width: None,
        cell_height: 24,
        icon_size: 16,
    };

    #[test]
    fn test_scroll_fraction() {
        let viewport = Viewport::new(400.0, 600.0, 200.0);
        assert!((viewport.scroll_fraction(1200.0) - 0.4).abs() < f32::EPSILON);
        assert_eq!(viewport.scroll_fraction(150.0), 0.0);
    }

    #[test]
    fn test_columns_follow_width() {
        assert_eq!(THUMBS.columns(620.0), 4);
        assert_eq!(THUMBS.columns(100.0), 1);
        assert_eq!(LIST.columns(2000.0), 1);
        assert_eq!(THUMBS.content_height(9, 620.0), 420.0);
    }

    #[test]
    fn test_prefetch_range_at_top_includes_half_a_screen_below() {
        // Rows 0 and 1 fill the 280px window, the buffer reaches 420px and adds row 2
        let viewport = Viewport::new(0.0, 600.0, 280.0);
        assert_eq!(THUMBS.prefetch_range(&viewport, 100), 0..12);
    }

    #[test]
    fn test_prefetch_range_scrolled() {
        // Window 2400..2640, buffer 120 each side: 2280..2760, rows 95..115
        let viewport = Viewport::new(2400.0, 800.0, 240.0);
        assert_eq!(LIST.prefetch_range(&viewport, 1000), 95..115);
        assert_eq!(LIST.prefetch_range(&viewport, 100), 95..100);
        assert_eq!(LIST.prefetch_range(&viewport, 0), 0..0);
    }
}
