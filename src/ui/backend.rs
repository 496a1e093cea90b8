//! Render backend interface
//!
//! The compositor never talks to a terminal directly. Everything goes through
//! a [`Backend`], which describes what it can do once, up front, through
//! [`Capabilities`]. Rows and columns are zero-based screen coordinates.

use std::env;
use std::io;

use bitflags::bitflags;

use crate::core::markers::AttrFlags;

bitflags! {
    /// Optional features a backend supports
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u16 {
        const COLOR = 0x0001;
        const BOLD = 0x0002;
        const UNDERLINE = 0x0004;
        const BLINK = 0x0008;
        const REVERSE = 0x0010;
        const ITALIC = 0x0020;
        const ALT_CHARSET = 0x0040;
        const SCROLL_REGION = 0x0080;
        const INSERT_DELETE_LINE = 0x0100;
        const CLEAR_EOL = 0x0200;
    }
}

impl Capabilities {
    const ATTRIBUTES: Self = Self::BOLD
        .union(Self::UNDERLINE)
        .union(Self::BLINK)
        .union(Self::REVERSE)
        .union(Self::ITALIC)
        .union(Self::ALT_CHARSET);

    /// Everything an ANSI terminal offers
    pub fn ansi() -> Self {
        Self::all()
    }

    /// Mask what the environment says the terminal cannot do
    pub fn detect(full: Self) -> Self {
        let term = env::var("TERM").unwrap_or_default();
        let no_color = env::var_os("NO_COLOR").is_some();
        Self::from_env(full, &term, no_color)
    }

    pub fn from_env(full: Self, term: &str, no_color: bool) -> Self {
        let mut caps = full;
        if term == "dumb" {
            caps.remove(Self::ATTRIBUTES | Self::COLOR | Self::SCROLL_REGION | Self::INSERT_DELETE_LINE);
        }
        if no_color {
            caps.remove(Self::COLOR);
        }
        caps
    }

    pub fn supports(self, attr: Attribute) -> bool {
        self.contains(attr.capability())
    }
}

/// Display attributes a backend can switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Bold,
    Underline,
    Blink,
    Reverse,
    Italic,
    AltCharset,
}

impl Attribute {
    pub const ALL: [Attribute; 6] = [
        Attribute::Bold,
        Attribute::Underline,
        Attribute::Blink,
        Attribute::Reverse,
        Attribute::Italic,
        Attribute::AltCharset,
    ];

    /// The marker-state flag this attribute renders
    pub fn flag(self) -> AttrFlags {
        match self {
            Attribute::Bold => AttrFlags::BOLD,
            Attribute::Underline => AttrFlags::UNDERLINE,
            Attribute::Blink => AttrFlags::BLINK,
            Attribute::Reverse => AttrFlags::REVERSE,
            Attribute::Italic => AttrFlags::ITALIC,
            Attribute::AltCharset => AttrFlags::ALT_CHARSET,
        }
    }

    pub fn capability(self) -> Capabilities {
        match self {
            Attribute::Bold => Capabilities::BOLD,
            Attribute::Underline => Capabilities::UNDERLINE,
            Attribute::Blink => Capabilities::BLINK,
            Attribute::Reverse => Capabilities::REVERSE,
            Attribute::Italic => Capabilities::ITALIC,
            Attribute::AltCharset => Capabilities::ALT_CHARSET,
        }
    }
}

/// A terminal-like output sink.
///
/// Colors are slots of the 16-color palette; `None` is the terminal default.
/// Scroll counts are positive to move content up.
pub trait Backend {
    fn capabilities(&self) -> Capabilities;

    /// (columns, rows)
    fn size(&self) -> io::Result<(u16, u16)>;

    fn move_to(&mut self, row: u16, col: u16) -> io::Result<()>;

    fn clear_to_eol(&mut self) -> io::Result<()>;

    fn clear_screen(&mut self) -> io::Result<()>;

    /// Scroll rows `top..=bottom` by `count`
    fn scroll_region(&mut self, top: u16, bottom: u16, count: i16) -> io::Result<()>;

    /// Insert blank lines at the cursor row, pushing lines below down
    fn insert_lines(&mut self, count: u16) -> io::Result<()>;

    /// Delete lines at the cursor row, pulling lines below up
    fn delete_lines(&mut self, count: u16) -> io::Result<()>;

    fn set_attribute(&mut self, attr: Attribute, on: bool) -> io::Result<()>;

    fn set_color(&mut self, fg: Option<u8>, bg: Option<u8>) -> io::Result<()>;

    fn write_text(&mut self, text: &str) -> io::Result<()>;

    fn bell(&mut self) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}
