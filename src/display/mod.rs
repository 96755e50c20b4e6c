//! Pixel panel capability and the fixed status layout drawn on it.

pub mod panel;
pub mod renderer;

pub use panel::{MemoryPanel, PanelOp};
pub use renderer::Renderer;

use crate::Result;

/// RGB565 color as used by HUB75 matrix panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color(pub u16);

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color((((r as u16) & 0xF8) << 8) | (((g as u16) & 0xFC) << 3) | ((b as u16) >> 3))
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

impl Rect {
    pub const fn new(x: u16, y: u16, w: u16, h: u16) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> u16 {
        self.x.saturating_add(self.w)
    }

    pub fn bottom(&self) -> u16 {
        self.y.saturating_add(self.h)
    }

    pub fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Glyph cell of the built-in 5x7 font at text size 1, spacing included.
pub const GLYPH_WIDTH: u16 = 6;
pub const GLYPH_HEIGHT: u16 = 8;

/// Panel geometry of a single 64x32 module.
pub const PANEL_WIDTH: u16 = 64;
pub const PANEL_HEIGHT: u16 = 32;

/// Top row: wall clock.
pub const CLOCK_REGION: Rect = Rect::new(0, 0, PANEL_WIDTH, GLYPH_HEIGHT);
/// Everything below the clock: cadence and playback position.
pub const TELEMETRY_REGION: Rect =
    Rect::new(0, GLYPH_HEIGHT, PANEL_WIDTH, PANEL_HEIGHT - GLYPH_HEIGHT);

/// Drawing primitives of the external display driver.
///
/// Callers must hold exclusive access for the duration of one logical draw.
pub trait Surface: Send {
    fn width(&self) -> u16;
    fn height(&self) -> u16;
    fn clear(&mut self) -> Result<()>;
    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<()>;
    fn set_cursor(&mut self, x: u16, y: u16) -> Result<()>;
    fn set_text_size(&mut self, size: u8) -> Result<()>;
    fn set_text_color(&mut self, color: Color) -> Result<()>;
    fn print(&mut self, text: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_matches_rgb565_packing() {
        assert_eq!(Color::BLACK, Color(0x0000));
        assert_eq!(Color::WHITE, Color(0xFFFF));
        assert_eq!(Color::RED, Color(0xF800));
        assert_eq!(Color::GREEN, Color(0x07E0));
        assert_eq!(Color::BLUE, Color(0x001F));
    }

    #[test]
    fn regions_are_disjoint_and_cover_panel() {
        assert!(!CLOCK_REGION.intersects(&TELEMETRY_REGION));
        assert_eq!(CLOCK_REGION.bottom(), TELEMETRY_REGION.y);
        assert_eq!(TELEMETRY_REGION.bottom(), PANEL_HEIGHT);
        assert_eq!(CLOCK_REGION.w, PANEL_WIDTH);
    }

    #[test]
    fn rect_contains_is_half_open() {
        let r = Rect::new(0, 8, 64, 24);
        assert!(r.contains(0, 8));
        assert!(r.contains(63, 31));
        assert!(!r.contains(64, 8));
        assert!(!r.contains(0, 7));
    }
}
