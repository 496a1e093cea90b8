//! Terminal backend using crossterm
//!
//! Writes compositor output to a real terminal. Output is buffered and each
//! frame (everything between two flushes) is bracketed by a synchronized
//! update so partial repaints never show.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute, queue,
    style::{self, Color, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen, ScrollDown, ScrollUp,
    },
};
use tracing::{debug, info};

use super::backend::{Attribute, Backend, Capabilities};

const SYNC_BEGIN: &str = "\x1b[?2026h";
const SYNC_END: &str = "\x1b[?2026l";

/// Map a 16-color palette slot to a crossterm color
fn palette(slot: Option<u8>) -> Color {
    match slot {
        None => Color::Reset,
        Some(0) => Color::Black,
        Some(1) => Color::DarkRed,
        Some(2) => Color::DarkGreen,
        Some(3) => Color::DarkYellow,
        Some(4) => Color::DarkBlue,
        Some(5) => Color::DarkMagenta,
        Some(6) => Color::DarkCyan,
        Some(7) => Color::Grey,
        Some(8) => Color::DarkGrey,
        Some(9) => Color::Red,
        Some(10) => Color::Green,
        Some(11) => Color::Yellow,
        Some(12) => Color::Blue,
        Some(13) => Color::Magenta,
        Some(14) => Color::Cyan,
        Some(15) => Color::White,
        Some(n) => Color::AnsiValue(n),
    }
}

/// Crossterm-backed terminal
pub struct CrosstermBackend<W: Write> {
    out: W,
    caps: Capabilities,
    /// Whether raw mode and the alternate screen are active
    initialized: bool,
    /// A synchronized update is open
    in_frame: bool,
}

impl CrosstermBackend<io::BufWriter<io::Stdout>> {
    /// Buffered stdout with capabilities detected from the environment
    pub fn stdout() -> Self {
        let caps = Capabilities::detect(Capabilities::ansi());
        debug!(?caps, "terminal capabilities");
        Self::new(io::BufWriter::with_capacity(65536, io::stdout()), caps)
    }
}

impl<W: Write> CrosstermBackend<W> {
    pub fn new(out: W, caps: Capabilities) -> Self {
        Self {
            out,
            caps,
            initialized: false,
            in_frame: false,
        }
    }

    /// Switch the terminal into raw mode on the alternate screen
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.out,
            EnterAlternateScreen,
            DisableLineWrap,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        self.out.flush()?;
        self.initialized = true;
        info!("terminal initialized");
        Ok(())
    }

    /// Restore the terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        if self.in_frame {
            let _ = write!(self.out, "{}", SYNC_END);
            self.in_frame = false;
        }
        let _ = execute!(self.out, ResetColor, SetAttribute(style::Attribute::Reset));
        let _ = execute!(self.out, Show, EnableLineWrap, LeaveAlternateScreen);
        let _ = self.out.flush();

        terminal::disable_raw_mode()?;
        Ok(())
    }

    fn begin_frame(&mut self) -> io::Result<()> {
        if !self.in_frame {
            write!(self.out, "{}", SYNC_BEGIN)?;
            queue!(self.out, Hide)?;
            self.in_frame = true;
        }
        Ok(())
    }
}

impl<W: Write> Backend for CrosstermBackend<W> {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        terminal::size()
    }

    fn move_to(&mut self, row: u16, col: u16) -> io::Result<()> {
        self.begin_frame()?;
        queue!(self.out, MoveTo(col, row))
    }

    fn clear_to_eol(&mut self) -> io::Result<()> {
        self.begin_frame()?;
        write!(self.out, "\x1b[K")
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        self.begin_frame()?;
        queue!(self.out, Clear(ClearType::All))
    }

    fn scroll_region(&mut self, top: u16, bottom: u16, count: i16) -> io::Result<()> {
        self.begin_frame()?;
        write!(self.out, "\x1b[{};{}r", top + 1, bottom + 1)?;
        if count > 0 {
            queue!(self.out, ScrollUp(count as u16))?;
        } else if count < 0 {
            queue!(self.out, ScrollDown(count.unsigned_abs()))?;
        }
        write!(self.out, "\x1b[r")
    }

    fn insert_lines(&mut self, count: u16) -> io::Result<()> {
        self.begin_frame()?;
        write!(self.out, "\x1b[{}L", count)
    }

    fn delete_lines(&mut self, count: u16) -> io::Result<()> {
        self.begin_frame()?;
        write!(self.out, "\x1b[{}M", count)
    }

    fn set_attribute(&mut self, attr: Attribute, on: bool) -> io::Result<()> {
        let code = match (attr, on) {
            (Attribute::Bold, true) => style::Attribute::Bold,
            (Attribute::Bold, false) => style::Attribute::NormalIntensity,
            (Attribute::Underline, true) => style::Attribute::Underlined,
            (Attribute::Underline, false) => style::Attribute::NoUnderline,
            (Attribute::Blink, true) => style::Attribute::SlowBlink,
            (Attribute::Blink, false) => style::Attribute::NoBlink,
            (Attribute::Reverse, true) => style::Attribute::Reverse,
            (Attribute::Reverse, false) => style::Attribute::NoReverse,
            (Attribute::Italic, true) => style::Attribute::Italic,
            (Attribute::Italic, false) => style::Attribute::NoItalic,
            // DEC special graphics in G0
            (Attribute::AltCharset, true) => return write!(self.out, "\x1b(0"),
            (Attribute::AltCharset, false) => return write!(self.out, "\x1b(B"),
        };
        queue!(self.out, SetAttribute(code))
    }

    fn set_color(&mut self, fg: Option<u8>, bg: Option<u8>) -> io::Result<()> {
        queue!(
            self.out,
            SetForegroundColor(palette(fg)),
            SetBackgroundColor(palette(bg))
        )
    }

    fn write_text(&mut self, text: &str) -> io::Result<()> {
        self.begin_frame()?;
        self.out.write_all(text.as_bytes())
    }

    fn bell(&mut self) -> io::Result<()> {
        self.out.write_all(b"\x07")
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.in_frame {
            queue!(self.out, Show)?;
            write!(self.out, "{}", SYNC_END)?;
            self.in_frame = false;
        }
        self.out.flush()
    }
}

impl<W: Write> Drop for CrosstermBackend<W> {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> CrosstermBackend<Vec<u8>> {
        CrosstermBackend::new(Vec::new(), Capabilities::ansi())
    }

    fn output(backend: &CrosstermBackend<Vec<u8>>) -> String {
        String::from_utf8_lossy(&backend.out).into_owned()
    }

    #[test]
    fn test_frame_is_synchronized() {
        let mut b = backend();
        b.move_to(2, 4).unwrap();
        b.write_text("hi").unwrap();
        b.flush().unwrap();
        let out = output(&b);
        assert!(out.starts_with(SYNC_BEGIN));
        assert!(out.contains("\x1b[3;5H"));
        assert!(out.contains("hi"));
        assert!(out.ends_with(SYNC_END));
    }

    #[test]
    fn test_scroll_region_resets_margins() {
        let mut b = backend();
        b.scroll_region(0, 9, 1).unwrap();
        let out = output(&b);
        assert!(out.contains("\x1b[1;10r"));
        assert!(out.ends_with("\x1b[r"));
    }

    #[test]
    fn test_clear_to_eol() {
        let mut b = backend();
        b.clear_to_eol().unwrap();
        assert!(output(&b).ends_with("\x1b[K"));
    }

    #[test]
    fn test_palette() {
        assert_eq!(palette(None), Color::Reset);
        assert_eq!(palette(Some(1)), Color::DarkRed);
        assert_eq!(palette(Some(15)), Color::White);
    }
}
