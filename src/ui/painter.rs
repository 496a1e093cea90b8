//! Painter: turns stored display lines into backend calls
//!
//! The painter is the only thing that writes to a backend. It owns the
//! render-attribute cache (what the terminal is currently set to) and only
//! emits an attribute or color when it actually changes. Features the
//! backend lacks are masked here, never attempted.

use std::io;

use unicode_width::UnicodeWidthChar;

use super::backend::{Attribute, Backend, Capabilities};
use crate::core::glyphs;
use crate::core::markers::{self, AttrFlags, AttrState, Token};

/// Terminal-side attribute state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RenderState {
    flags: AttrFlags,
    fg: Option<u8>,
    bg: Option<u8>,
}

pub struct Painter<B: Backend> {
    backend: B,
    caps: Capabilities,
    current: RenderState,
}

impl<B: Backend> Painter<B> {
    pub fn new(backend: B) -> Self {
        let caps = backend.capabilities();
        Self {
            backend,
            caps,
            current: RenderState::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// What the terminal can actually show for a marker state
    fn target(&self, state: &AttrState) -> RenderState {
        let mut flags = AttrFlags::empty();
        for attr in Attribute::ALL {
            let flag = attr.flag();
            if state.flags.contains(flag) && self.caps.supports(attr) {
                flags |= flag;
            }
        }
        let color = self.caps.contains(Capabilities::COLOR);
        RenderState {
            flags,
            fg: if color { state.fg_slot() } else { None },
            bg: if color { state.bg_slot() } else { None },
        }
    }

    /// Emit only what differs from the cache
    fn sync(&mut self, want: RenderState) -> io::Result<()> {
        if want == self.current {
            return Ok(());
        }
        for attr in Attribute::ALL {
            let flag = attr.flag();
            let on = want.flags.contains(flag);
            if on != self.current.flags.contains(flag) {
                self.backend.set_attribute(attr, on)?;
            }
        }
        if want.fg != self.current.fg || want.bg != self.current.bg {
            self.backend.set_color(want.fg, want.bg)?;
        }
        self.current = want;
        Ok(())
    }

    fn plain(&mut self) -> io::Result<()> {
        self.sync(RenderState::default())
    }

    /// Blank the rest of the current row, starting at `col`
    fn clear_rest(&mut self, col: u16, width: u16) -> io::Result<()> {
        self.plain()?;
        if self.caps.contains(Capabilities::CLEAR_EOL) {
            self.backend.clear_to_eol()
        } else if col < width {
            self.backend.write_text(&" ".repeat((width - col) as usize))
        } else {
            Ok(())
        }
    }

    /// Paint one stored line on `row`, at most `width` columns.
    ///
    /// Bells in the line only ring when `live` is set, so a repaint of old
    /// output stays quiet.
    pub fn paint_line(&mut self, row: u16, text: &str, width: u16, live: bool) -> io::Result<()> {
        self.backend.move_to(row, 0)?;
        self.clear_rest(0, width)?;
        self.backend.move_to(row, 0)?;

        let mut state = AttrState::default();
        let mut col: u16 = 0;
        let mut run = String::new();

        for (token, raw) in markers::tokens(text) {
            let (shown, cols) = match token {
                Token::Char(c) => (Some(c), c.width().unwrap_or(0) as u16),
                Token::Glyph(code) => (Some(glyphs::native(code)), 1),
                Token::Tab => (Some(' '), 1),
                Token::NdSpace => (None, 1),
                Token::Toggle(_) | Token::AllOff | Token::Color(_) => {
                    let before = self.target(&state);
                    state.apply(&token);
                    if self.target(&state) != before {
                        self.write_run(&mut run)?;
                    }
                    continue;
                }
                Token::Bell => {
                    if live {
                        self.write_run(&mut run)?;
                        self.backend.bell()?;
                    }
                    continue;
                }
                Token::Control(_) => {
                    self.write_run(&mut run)?;
                    self.backend.write_text(raw)?;
                    continue;
                }
                Token::Newline => continue,
            };

            if col + cols > width {
                break;
            }
            match shown {
                Some(c) => {
                    if run.is_empty() {
                        let want = self.target(&state);
                        self.sync(want)?;
                    }
                    run.push(c);
                }
                None => {
                    // non-destructive: step over the column
                    self.write_run(&mut run)?;
                    self.backend.move_to(row, col + cols)?;
                }
            }
            col += cols;
        }
        self.write_run(&mut run)?;
        self.plain()
    }

    fn write_run(&mut self, run: &mut String) -> io::Result<()> {
        if run.is_empty() {
            return Ok(());
        }
        self.backend.write_text(run)?;
        run.clear();
        Ok(())
    }

    /// Reverse-video status row padded to the full width
    pub fn paint_status(&mut self, row: u16, text: &str, width: u16) -> io::Result<()> {
        self.backend.move_to(row, 0)?;
        let mut shown = String::new();
        let mut col = 0u16;
        for c in text.chars() {
            let w = c.width().unwrap_or(0) as u16;
            if col + w > width {
                break;
            }
            shown.push(c);
            col += w;
        }
        shown.push_str(&" ".repeat(width.saturating_sub(col) as usize));

        self.sync(RenderState {
            flags: if self.caps.supports(Attribute::Reverse) {
                AttrFlags::REVERSE
            } else {
                AttrFlags::empty()
            },
            fg: None,
            bg: None,
        })?;
        self.backend.write_text(&shown)?;
        self.plain()
    }

    /// Blank `count` rows starting at `top`
    pub fn clear_rows(&mut self, top: u16, count: u16, width: u16) -> io::Result<()> {
        for row in top..top + count {
            self.backend.move_to(row, 0)?;
            self.clear_rest(0, width)?;
        }
        Ok(())
    }

    /// Scroll rows `top..=bottom` up by `count`.
    ///
    /// Returns false when the backend has no way to scroll part of the
    /// screen; the caller then repaints the rows instead.
    pub fn scroll(&mut self, top: u16, bottom: u16, count: u16) -> io::Result<bool> {
        if count == 0 || top > bottom {
            return Ok(true);
        }
        self.plain()?;
        if self.caps.contains(Capabilities::SCROLL_REGION) {
            self.backend.scroll_region(top, bottom, count as i16)?;
            return Ok(true);
        }
        if self.caps.contains(Capabilities::INSERT_DELETE_LINE) {
            let count = count.min(bottom - top + 1);
            self.backend.move_to(top, 0)?;
            self.backend.delete_lines(count)?;
            // put back the rows below the region
            self.backend.move_to(bottom + 1 - count, 0)?;
            self.backend.insert_lines(count)?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn clear_screen(&mut self) -> io::Result<()> {
        self.plain()?;
        self.backend.clear_screen()
    }

    pub fn move_cursor(&mut self, row: u16, col: u16) -> io::Result<()> {
        self.backend.move_to(row, col)
    }

    pub fn write_plain(&mut self, text: &str) -> io::Result<()> {
        self.plain()?;
        self.backend.write_text(text)
    }

    pub fn bell(&mut self) -> io::Result<()> {
        self.backend.bell()
    }

    /// End a frame
    pub fn flush(&mut self) -> io::Result<()> {
        self.plain()?;
        self.backend.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::memory::{MemoryBackend, Op};

    fn painter(caps: Capabilities) -> Painter<MemoryBackend> {
        Painter::new(MemoryBackend::with_capabilities(20, 4, caps))
    }

    #[test]
    fn test_paint_line_applies_markers() {
        let mut p = painter(Capabilities::ansi());
        p.paint_line(0, "a\x02b\x02c", 20, true).unwrap();
        let b = p.backend();
        assert_eq!(b.row_text(0), "abc");
        assert!(!b.cell(0, 0).unwrap().style.attrs.contains(AttrFlags::BOLD));
        assert!(b.cell(0, 1).unwrap().style.attrs.contains(AttrFlags::BOLD));
        assert!(!b.cell(0, 2).unwrap().style.attrs.contains(AttrFlags::BOLD));
    }

    #[test]
    fn test_only_changes_are_emitted() {
        let mut p = painter(Capabilities::ansi());
        p.paint_line(0, "\x02a\x02\x02b", 20, true).unwrap();
        let bold_on = p
            .backend()
            .ops()
            .iter()
            .filter(|op| **op == Op::Attribute(Attribute::Bold, true))
            .count();
        assert_eq!(bold_on, 1);
    }

    #[test]
    fn test_color_slots_and_bold_bump() {
        let mut p = painter(Capabilities::ansi());
        // mIRC 05 is dark red: slot 1, bold lifts it to 9
        p.paint_line(0, "\x0305r\x02R", 20, true).unwrap();
        let b = p.backend();
        assert_eq!(b.cell(0, 0).unwrap().style.fg, Some(1));
        assert_eq!(b.cell(0, 1).unwrap().style.fg, Some(9));
    }

    #[test]
    fn test_missing_color_is_masked() {
        let mut p = painter(Capabilities::ansi() - Capabilities::COLOR);
        p.paint_line(0, "\x0304r", 20, true).unwrap();
        assert!(!p.backend().ops().iter().any(|op| matches!(op, Op::Color(..))));
    }

    #[test]
    fn test_clear_without_clear_eol_writes_spaces() {
        let mut p = painter(Capabilities::ansi() - Capabilities::CLEAR_EOL);
        p.paint_line(1, "xy", 6, true).unwrap();
        assert!(p.backend().ops().contains(&Op::Text("      ".to_string())));
        assert!(!p.backend().ops().contains(&Op::ClearEol));
        assert_eq!(p.backend().row_text(1), "xy");
    }

    #[test]
    fn test_nd_space_and_glyph() {
        let mut p = painter(Capabilities::ansi());
        p.paint_line(0, "a\x13\x12196b", 20, true).unwrap();
        assert_eq!(p.backend().row_text(0), "a ─b");
    }

    #[test]
    fn test_bells_only_when_live() {
        let mut p = painter(Capabilities::ansi());
        p.paint_line(0, "x\x07", 20, false).unwrap();
        assert_eq!(p.backend().bells(), 0);
        p.paint_line(0, "x\x07", 20, true).unwrap();
        assert_eq!(p.backend().bells(), 1);
    }

    #[test]
    fn test_scroll_fallbacks() {
        let mut p = painter(Capabilities::ansi());
        assert!(p.scroll(0, 2, 1).unwrap());
        assert!(p.backend().ops().iter().any(|op| matches!(op, Op::Scroll { .. })));

        let mut p = painter(Capabilities::ansi() - Capabilities::SCROLL_REGION);
        assert!(p.scroll(0, 2, 1).unwrap());
        assert!(p.backend().ops().contains(&Op::DeleteLines(1)));
        assert!(p.backend().ops().contains(&Op::InsertLines(1)));

        let mut p = painter(Capabilities::CLEAR_EOL);
        assert!(!p.scroll(0, 2, 1).unwrap());
    }

    #[test]
    fn test_insert_delete_scroll_keeps_rows_below() {
        let mut p = painter(Capabilities::ansi() - Capabilities::SCROLL_REGION);
        for (row, text) in ["a", "b", "c", "status"].iter().enumerate() {
            p.paint_line(row as u16, text, 20, false).unwrap();
        }
        p.scroll(0, 2, 1).unwrap();
        assert_eq!(p.backend().lines(), vec!["b", "c", "", "status"]);
    }

    #[test]
    fn test_truncates_at_width() {
        let mut p = painter(Capabilities::ansi());
        p.paint_line(0, "abcdefgh", 4, true).unwrap();
        assert_eq!(p.backend().row_text(0), "abcd");
    }

    #[test]
    fn test_status_row_is_reversed() {
        let mut p = painter(Capabilities::ansi());
        p.paint_status(3, "[1] main", 20).unwrap();
        let cell = p.backend().cell(3, 19).unwrap();
        assert!(cell.style.attrs.contains(AttrFlags::REVERSE));
        assert_eq!(p.backend().row_text(3), "[1] main");
    }
}
