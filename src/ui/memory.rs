//! In-memory backend
//!
//! Keeps a character grid and a log of every call. Used by the demo mode and
//! by tests that need to look at what the compositor drew.

use std::io;

use unicode_width::UnicodeWidthChar;

use super::backend::{Attribute, Backend, Capabilities};
use crate::core::markers::AttrFlags;

/// Marks the second column of a wide character
const WIDE_TAIL: char = '\0';

/// Attribute and color state of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub attrs: AttrFlags,
    pub fg: Option<u8>,
    pub bg: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: Style::default(),
        }
    }
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    MoveTo(u16, u16),
    ClearEol,
    ClearScreen,
    Scroll { top: u16, bottom: u16, count: i16 },
    InsertLines(u16),
    DeleteLines(u16),
    Attribute(Attribute, bool),
    Color(Option<u8>, Option<u8>),
    Text(String),
    Bell,
    Flush,
}

pub struct MemoryBackend {
    cols: u16,
    rows: u16,
    grid: Vec<Vec<Cell>>,
    row: u16,
    col: u16,
    style: Style,
    caps: Capabilities,
    ops: Vec<Op>,
    bells: usize,
    flushes: usize,
}

impl MemoryBackend {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_capabilities(cols, rows, Capabilities::ansi())
    }

    pub fn with_capabilities(cols: u16, rows: u16, caps: Capabilities) -> Self {
        Self {
            cols,
            rows,
            grid: vec![vec![Cell::default(); cols as usize]; rows as usize],
            row: 0,
            col: 0,
            style: Style::default(),
            caps,
            ops: Vec::new(),
            bells: 0,
            flushes: 0,
        }
    }

    /// Change the simulated terminal size; the grid is cropped or padded
    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.grid.resize(rows as usize, vec![Cell::default(); cols as usize]);
        for line in &mut self.grid {
            line.resize(cols as usize, Cell::default());
        }
        self.cols = cols;
        self.rows = rows;
        self.row = self.row.min(rows.saturating_sub(1));
        self.col = self.col.min(cols);
    }

    #[cfg(test)]
    pub fn cell(&self, row: u16, col: u16) -> Option<Cell> {
        self.grid.get(row as usize)?.get(col as usize).copied()
    }

    /// Text of a row with trailing blanks removed
    pub fn row_text(&self, row: u16) -> String {
        let Some(line) = self.grid.get(row as usize) else {
            return String::new();
        };
        let text: String = line
            .iter()
            .map(|c| c.ch)
            .filter(|&ch| ch != WIDE_TAIL)
            .collect();
        text.trim_end().to_string()
    }

    pub fn lines(&self) -> Vec<String> {
        (0..self.rows).map(|r| self.row_text(r)).collect()
    }

    pub fn cursor(&self) -> (u16, u16) {
        (self.row, self.col)
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn bells(&self) -> usize {
        self.bells
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }

    /// Framed dump of the grid
    pub fn render(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("=== Screen {}x{} ===\n", self.cols, self.rows));
        output.push_str(&"─".repeat(self.cols as usize));
        output.push('\n');
        for line in self.lines() {
            output.push_str(&line);
            output.push('\n');
        }
        output.push_str(&"─".repeat(self.cols as usize));
        output.push('\n');
        output
    }

    fn blank_row(&self) -> Vec<Cell> {
        vec![Cell::default(); self.cols as usize]
    }

    fn shift_up(&mut self, top: usize, bottom: usize, count: usize) {
        for _ in 0..count.min(bottom + 1 - top) {
            self.grid.remove(top);
            let blank = self.blank_row();
            self.grid.insert(bottom, blank);
        }
    }

    fn shift_down(&mut self, top: usize, bottom: usize, count: usize) {
        for _ in 0..count.min(bottom + 1 - top) {
            self.grid.remove(bottom);
            let blank = self.blank_row();
            self.grid.insert(top, blank);
        }
    }
}

impl Backend for MemoryBackend {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        Ok((self.cols, self.rows))
    }

    fn move_to(&mut self, row: u16, col: u16) -> io::Result<()> {
        self.ops.push(Op::MoveTo(row, col));
        self.row = row.min(self.rows.saturating_sub(1));
        self.col = col.min(self.cols);
        Ok(())
    }

    fn clear_to_eol(&mut self) -> io::Result<()> {
        self.ops.push(Op::ClearEol);
        let col = self.col as usize;
        if let Some(line) = self.grid.get_mut(self.row as usize) {
            for cell in line.iter_mut().skip(col) {
                *cell = Cell::default();
            }
        }
        Ok(())
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        self.ops.push(Op::ClearScreen);
        for line in &mut self.grid {
            line.fill(Cell::default());
        }
        Ok(())
    }

    fn scroll_region(&mut self, top: u16, bottom: u16, count: i16) -> io::Result<()> {
        self.ops.push(Op::Scroll { top, bottom, count });
        let bottom = bottom.min(self.rows.saturating_sub(1)) as usize;
        let top = top as usize;
        if top > bottom {
            return Ok(());
        }
        if count > 0 {
            self.shift_up(top, bottom, count as usize);
        } else {
            self.shift_down(top, bottom, count.unsigned_abs() as usize);
        }
        Ok(())
    }

    fn insert_lines(&mut self, count: u16) -> io::Result<()> {
        self.ops.push(Op::InsertLines(count));
        let last = self.rows.saturating_sub(1) as usize;
        self.shift_down(self.row as usize, last, count as usize);
        Ok(())
    }

    fn delete_lines(&mut self, count: u16) -> io::Result<()> {
        self.ops.push(Op::DeleteLines(count));
        let last = self.rows.saturating_sub(1) as usize;
        self.shift_up(self.row as usize, last, count as usize);
        Ok(())
    }

    fn set_attribute(&mut self, attr: Attribute, on: bool) -> io::Result<()> {
        self.ops.push(Op::Attribute(attr, on));
        self.style.attrs.set(attr.flag(), on);
        Ok(())
    }

    fn set_color(&mut self, fg: Option<u8>, bg: Option<u8>) -> io::Result<()> {
        self.ops.push(Op::Color(fg, bg));
        self.style.fg = fg;
        self.style.bg = bg;
        Ok(())
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.ops.push(Op::Text(text.to_string()));
        let style = self.style;
        let Some(line) = self.grid.get_mut(self.row as usize) else {
            return Ok(());
        };
        for ch in text.chars() {
            let width = ch.width().unwrap_or(0) as u16;
            if width == 0 {
                continue;
            }
            // no autowrap
            if self.col + width > self.cols {
                break;
            }
            line[self.col as usize] = Cell { ch, style };
            if width == 2 {
                line[self.col as usize + 1] = Cell {
                    ch: WIDE_TAIL,
                    style,
                };
            }
            self.col += width;
        }
        Ok(())
    }

    fn bell(&mut self) -> io::Result<()> {
        self.ops.push(Op::Bell);
        self.bells += 1;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ops.push(Op::Flush);
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_clear() {
        let mut b = MemoryBackend::new(10, 3);
        b.move_to(1, 2).unwrap();
        b.write_text("hello world").unwrap();
        assert_eq!(b.row_text(1), "  hello wo");
        b.move_to(1, 4).unwrap();
        b.clear_to_eol().unwrap();
        assert_eq!(b.row_text(1), "  he");
    }

    #[test]
    fn test_scroll_region() {
        let mut b = MemoryBackend::new(5, 4);
        for (row, text) in ["a", "b", "c", "d"].iter().enumerate() {
            b.move_to(row as u16, 0).unwrap();
            b.write_text(text).unwrap();
        }
        b.scroll_region(0, 2, 1).unwrap();
        assert_eq!(b.lines(), vec!["b", "c", "", "d"]);
        b.scroll_region(0, 2, -1).unwrap();
        assert_eq!(b.lines(), vec!["", "b", "c", "d"]);
    }

    #[test]
    fn test_insert_delete_lines() {
        let mut b = MemoryBackend::new(5, 3);
        for (row, text) in ["a", "b", "c"].iter().enumerate() {
            b.move_to(row as u16, 0).unwrap();
            b.write_text(text).unwrap();
        }
        b.move_to(0, 0).unwrap();
        b.delete_lines(1).unwrap();
        assert_eq!(b.lines(), vec!["b", "c", ""]);
        b.insert_lines(1).unwrap();
        assert_eq!(b.lines(), vec!["", "b", "c"]);
    }

    #[test]
    fn test_style_recorded_per_cell() {
        let mut b = MemoryBackend::new(5, 1);
        b.set_attribute(Attribute::Bold, true).unwrap();
        b.set_color(Some(1), None).unwrap();
        b.write_text("x").unwrap();
        b.set_attribute(Attribute::Bold, false).unwrap();
        b.write_text("y").unwrap();
        let x = b.cell(0, 0).unwrap();
        assert!(x.style.attrs.contains(AttrFlags::BOLD));
        assert_eq!(x.style.fg, Some(1));
        assert!(!b.cell(0, 1).unwrap().style.attrs.contains(AttrFlags::BOLD));
    }

    #[test]
    fn test_wide_chars() {
        let mut b = MemoryBackend::new(5, 1);
        b.write_text("日本語").unwrap();
        assert_eq!(b.row_text(0), "日本");
        assert_eq!(b.cursor(), (0, 4));
    }
}
