//! Window - a viewport with its own scrollback on a screen

use crate::core::layout::{self, LayoutOptions};

use super::scrollback::{FlowOptions, LineId, Scrollback};
use super::screen::ScreenId;

/// Unique identifier for a window
pub type WindowId = u64;

/// What happened to one physical line pushed into a window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEffect {
    /// Kept in scrollback but not shown (hold, or scrolled back)
    Held,
    /// Shown on `row` after the view scrolled by `scrolled` rows
    Shown { row: usize, scrolled: usize },
}

pub struct Window {
    /// Unique identifier
    pub id: WindowId,
    /// Optional name shown in the status row
    pub name: Option<String>,
    /// Screen the window is on; `None` while hidden
    pub screen: Option<ScreenId>,
    /// First screen row of the display area
    pub top: usize,
    /// Display rows, status row excluded
    pub height: usize,
    pub columns: usize,
    /// Never resized by rebalance or reflow
    pub fixed: bool,
    pub scrollback: Scrollback,
    layout: LayoutOptions,
    /// Whole display area must be repainted
    redraw: bool,
    status_dirty: bool,
}

impl Window {
    pub fn new(id: WindowId, columns: usize, layout: LayoutOptions, flow: FlowOptions) -> Self {
        Self {
            id,
            name: None,
            screen: None,
            top: 0,
            height: 0,
            columns,
            fixed: false,
            scrollback: Scrollback::new(0, flow),
            layout: layout.with_width(columns),
            redraw: true,
            status_dirty: true,
        }
    }

    /// Get display title
    pub fn display_title(&self) -> String {
        match &self.name {
            Some(name) => format!("[{}] {}", self.id, name),
            None => format!("[{}]", self.id),
        }
    }

    /// Status row text
    pub fn status_line(&self, current: bool) -> String {
        let mut line = self.display_title();
        if current {
            line.push_str(" *");
        }
        if self.scrollback.is_scrolled_back() {
            line.push_str(" (Scrolled back)");
        }
        let held = self.scrollback.held_indicator();
        if self.scrollback.hold_mode() || held > 0 {
            line.push_str(&format!(" (Held: {})", held));
        }
        line
    }

    pub fn layout(&self) -> &LayoutOptions {
        &self.layout
    }

    /// Row just below the display area
    pub fn status_row(&self) -> usize {
        self.top + self.height
    }

    /// Move the display area without changing its size
    pub fn move_to(&mut self, top: usize) {
        if self.top != top {
            self.top = top;
            self.redraw = true;
            self.status_dirty = true;
        }
    }

    /// Resize the display area
    pub fn resize(&mut self, height: usize) {
        if self.height != height {
            self.height = height;
            self.scrollback.set_height(height);
            self.redraw = true;
            self.status_dirty = true;
        }
    }

    /// Re-wrap scrollback when the screen width changes
    pub fn set_columns(&mut self, columns: usize) {
        if self.columns != columns {
            self.columns = columns;
            self.layout.width = columns;
            self.scrollback.rewrap(&self.layout);
            self.redraw = true;
            self.status_dirty = true;
        }
    }

    /// Wrap one normalized logical line into scrollback
    pub fn add_line(&mut self, normalized: &str) -> Vec<(LineId, LineEffect)> {
        let logical = self.scrollback.begin_logical(normalized);
        let mut effects = Vec::new();
        for text in layout::wrap(normalized, &self.layout) {
            let top_before = self.scrollback.top();
            let id = self.scrollback.append(text, logical);
            let effect = if self.scrollback.admit() {
                LineEffect::Shown {
                    row: self.scrollback.cursor().saturating_sub(1),
                    scrolled: (self.scrollback.top() - top_before) as usize,
                }
            } else {
                LineEffect::Held
            };
            effects.push((id, effect));
        }
        effects
    }

    pub fn mark_redraw(&mut self) {
        self.redraw = true;
    }

    pub fn mark_status(&mut self) {
        self.status_dirty = true;
    }

    /// Whether a full repaint is due
    pub fn needs_redraw(&self) -> bool {
        self.redraw || self.scrollback.redraw_pending()
    }

    pub fn take_redraw(&mut self) -> bool {
        let scrolled = self.scrollback.take_redraw();
        std::mem::take(&mut self.redraw) || scrolled
    }

    pub fn take_status_dirty(&mut self) -> bool {
        let flow = self.scrollback.take_status_dirty();
        std::mem::take(&mut self.status_dirty) || flow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(height: usize, columns: usize) -> Window {
        let mut w = Window::new(1, columns, LayoutOptions::default(), FlowOptions::default());
        w.resize(height);
        w
    }

    #[test]
    fn test_add_line_wraps_and_admits() {
        let mut w = window(3, 9);
        let effects = w.add_line("AAAA BBBB CCCC");
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].1, LineEffect::Shown { row: 0, scrolled: 0 });
        assert_eq!(effects[1].1, LineEffect::Shown { row: 1, scrolled: 0 });
    }

    #[test]
    fn test_scrolling_reported() {
        let mut w = window(2, 20);
        w.add_line("one");
        w.add_line("two");
        let effects = w.add_line("three");
        assert_eq!(effects[0].1, LineEffect::Shown { row: 1, scrolled: 1 });
    }

    #[test]
    fn test_held_lines() {
        let mut w = window(1, 20);
        w.scrollback.set_hold_mode(true);
        w.add_line("one");
        let effects = w.add_line("two");
        assert_eq!(effects[0].1, LineEffect::Held);
    }

    #[test]
    fn test_status_line() {
        let mut w = window(1, 20);
        w.name = Some("main".to_string());
        assert_eq!(w.status_line(false), "[1] main");
        w.scrollback.set_hold_mode(true);
        assert_eq!(w.status_line(true), "[1] main * (Held: 0)");
    }

    #[test]
    fn test_columns_change_rewraps() {
        let mut w = window(5, 20);
        w.add_line("AAAA BBBB CCCC");
        assert_eq!(w.scrollback.len(), 1);
        w.set_columns(9);
        assert_eq!(w.scrollback.len(), 2);
        assert!(w.take_redraw());
    }
}
