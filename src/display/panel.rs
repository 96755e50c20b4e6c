use super::{Color, Rect, Surface, GLYPH_HEIGHT, GLYPH_WIDTH, PANEL_HEIGHT, PANEL_WIDTH};
use crate::{Error, Result};

/// Primitive calls as the panel received them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelOp {
    Clear,
    Fill(Rect),
    Text { x: u16, y: u16, text: String },
}

/// Most ops kept in the log; older half is dropped once the log fills.
pub const OP_LOG_LIMIT: usize = 8_192;

/// A string drawn at a position; erased by any fill that overlaps it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub x: u16,
    pub y: u16,
    pub size: u8,
    pub color: Color,
    pub text: String,
}

impl TextRun {
    fn bounds(&self) -> Rect {
        let size = self.size.max(1) as u16;
        let chars = self.text.chars().count() as u16;
        Rect::new(
            self.x,
            self.y,
            chars.saturating_mul(GLYPH_WIDTH * size),
            GLYPH_HEIGHT * size,
        )
    }
}

/// In-memory stand-in for the matrix panel.
///
/// Tracks fills per pixel and text as runs so tests can read back what a region shows.
#[derive(Debug, Clone)]
pub struct MemoryPanel {
    width: u16,
    height: u16,
    pixels: Vec<Color>,
    runs: Vec<TextRun>,
    cursor: (u16, u16),
    text_size: u8,
    text_color: Color,
    ops: Vec<PanelOp>,
    op_limit: usize,
}

impl Default for MemoryPanel {
    fn default() -> Self {
        Self::new(PANEL_WIDTH, PANEL_HEIGHT)
    }
}

impl MemoryPanel {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::BLACK; width as usize * height as usize],
            runs: Vec::new(),
            cursor: (0, 0),
            text_size: 1,
            text_color: Color::WHITE,
            ops: Vec::new(),
            op_limit: OP_LOG_LIMIT,
        }
    }

    /// Same panel with a different op log bound (minimum 2).
    pub fn with_op_limit(mut self, limit: usize) -> Self {
        self.op_limit = limit.max(2);
        self
    }

    /// Text runs whose origin lies inside `rect`, top-to-bottom then left-to-right.
    pub fn text_in(&self, rect: Rect) -> Vec<String> {
        let mut runs: Vec<&TextRun> = self
            .runs
            .iter()
            .filter(|run| rect.contains(run.x, run.y))
            .collect();
        runs.sort_by_key(|run| (run.y, run.x));
        runs.into_iter().map(|run| run.text.clone()).collect()
    }

    pub fn runs(&self) -> &[TextRun] {
        &self.runs
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn ops(&self) -> &[PanelOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<PanelOp> {
        std::mem::take(&mut self.ops)
    }

    fn record(&mut self, op: PanelOp) {
        if self.ops.len() >= self.op_limit {
            self.ops.drain(..self.op_limit / 2);
        }
        self.ops.push(op);
    }

    fn check_bounds(&self, rect: &Rect) -> Result<()> {
        if rect.right() > self.width || rect.bottom() > self.height {
            return Err(Error::InvalidArgs(format!(
                "rect {rect:?} out of bounds for {}x{} panel",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

impl Surface for MemoryPanel {
    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn clear(&mut self) -> Result<()> {
        self.pixels.fill(Color::BLACK);
        self.runs.clear();
        self.cursor = (0, 0);
        self.record(PanelOp::Clear);
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<()> {
        self.check_bounds(&rect)?;
        for y in rect.y..rect.bottom() {
            let row = y as usize * self.width as usize;
            for x in rect.x..rect.right() {
                self.pixels[row + x as usize] = color;
            }
        }
        self.runs.retain(|run| !run.bounds().intersects(&rect));
        self.record(PanelOp::Fill(rect));
        Ok(())
    }

    fn set_cursor(&mut self, x: u16, y: u16) -> Result<()> {
        if x >= self.width || y >= self.height {
            return Err(Error::InvalidArgs(format!(
                "cursor ({x}, {y}) out of bounds for {}x{} panel",
                self.width, self.height
            )));
        }
        self.cursor = (x, y);
        Ok(())
    }

    fn set_text_size(&mut self, size: u8) -> Result<()> {
        self.text_size = size.max(1);
        Ok(())
    }

    fn set_text_color(&mut self, color: Color) -> Result<()> {
        self.text_color = color;
        Ok(())
    }

    fn print(&mut self, text: &str) -> Result<()> {
        let (x, y) = self.cursor;
        let run = TextRun {
            x,
            y,
            size: self.text_size,
            color: self.text_color,
            text: text.to_string(),
        };
        // No wrapping: the cursor keeps advancing past the right edge like the panel driver.
        self.cursor.0 = x.saturating_add(run.bounds().w);
        self.runs.push(run);
        self.record(PanelOp::Text {
            x,
            y,
            text: text.to_string(),
        });
        Ok(())
    }
}
