//! Screen - a physical terminal holding a stack of windows

use crate::ui::{Backend, Painter};

use super::geometry;
use super::window::WindowId;

/// Unique identifier for a screen
pub type ScreenId = u64;

/// Reason for reflow (logged with every geometry change)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReflowReason {
    Open,
    Close,
    Hide,
    Show,
    Resize,
    Rebalance,
    TerminalResized,
}

pub struct Screen<B: Backend> {
    /// Unique identifier
    pub id: ScreenId,
    /// Writer role for this terminal
    pub painter: Painter<B>,
    pub rows: usize,
    pub cols: usize,
    /// Windows top to bottom
    pub windows: Vec<WindowId>,
    /// Window receiving input
    pub current: Option<WindowId>,
    input: String,
    input_dirty: bool,
    /// Whole terminal must be cleared before the next repaint
    clear: bool,
    /// Incremented on each geometry change
    pub layout_generation: u64,
}

impl<B: Backend> Screen<B> {
    pub fn new(id: ScreenId, painter: Painter<B>, cols: usize, rows: usize) -> Self {
        Self {
            id,
            painter,
            rows,
            cols,
            windows: Vec::new(),
            current: None,
            input: String::new(),
            input_dirty: true,
            clear: true,
            layout_generation: 0,
        }
    }

    /// Rows windows may use (everything above the input row)
    pub fn window_rows(&self) -> usize {
        geometry::window_rows(self.rows)
    }

    pub fn input_row(&self) -> usize {
        self.rows.saturating_sub(geometry::INPUT_ROWS)
    }

    pub fn position_of(&self, window: WindowId) -> Option<usize> {
        self.windows.iter().position(|&w| w == window)
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: &str) {
        if self.input != text {
            self.input = text.to_string();
            self.input_dirty = true;
        }
    }

    pub fn take_input_dirty(&mut self) -> bool {
        std::mem::take(&mut self.input_dirty)
    }

    pub fn request_clear(&mut self) {
        self.clear = true;
        self.input_dirty = true;
    }

    pub fn take_clear(&mut self) -> bool {
        std::mem::take(&mut self.clear)
    }
}
