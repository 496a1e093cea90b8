//! Control-code normalizer
//!
//! Turns raw output bytes into the marker alphabet defined in
//! [`super::markers`]. ANSI SGR sequences are translated, other escape
//! sequences are swallowed, and anything the terminal could misinterpret is
//! either dropped or made visible.
//!
//! The scan is a single pass over the byte slice; every byte is classified
//! first and then handled by the arm for its class. Escape sequences are read
//! by a small sub-machine that reports where parsing resumes, so a broken
//! sequence never desynchronizes the bytes that follow it.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::glyphs;
use super::markers::{self, AttrFlags, AttrState, ALL_OFF, COLOR, GLYPH, ND_SPACE, REV_TOG};

/// Longest run of non-destructive spaces a cursor-forward may produce
const MAX_FORWARD: u16 = 256;
/// Numeric parameters kept per CSI sequence
const MAX_PARAMS: usize = 16;

/// What to do with control bytes outside the marker alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnprintableMode {
    /// Reverse-video caret letter (`^A` shows as a highlighted `A`)
    #[default]
    Caret,
    Drop,
    /// Hand the byte to the terminal untouched
    Pass,
}

/// How device-graphics bytes are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GlyphMode {
    /// Substitute a plain ASCII look-alike
    #[default]
    Ascii,
    /// Keep the glyph code; the painter draws the real character
    Native,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub unprintable: UnprintableMode,
    pub glyphs: GlyphMode,
}

/// Byte classes of the scanner
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ByteClass {
    Printable,
    /// BEL, TAB, LF and ND_SPACE: meaningful to the layout engine
    Layout,
    /// CR: never reaches the output
    Suppressed,
    /// C0 controls and DEL without a meaning of their own
    Nonprintable,
    Escape,
    ColorIntroducer,
    Highlight,
    /// GLYPH marker, or a byte that is not valid UTF-8
    DeviceGlyph,
    /// Start of a multi-byte UTF-8 sequence
    Multibyte,
}

fn classify(byte: u8) -> ByteClass {
    match byte {
        0x1B => ByteClass::Escape,
        0x03 => ByteClass::ColorIntroducer,
        0x02 | 0x05 | 0x06 | 0x0F | 0x10 | 0x16 | 0x1F => ByteClass::Highlight,
        0x12 => ByteClass::DeviceGlyph,
        0x07 | 0x09 | 0x0A | 0x13 => ByteClass::Layout,
        0x0D => ByteClass::Suppressed,
        0x00..=0x1F | 0x7F => ByteClass::Nonprintable,
        0x20..=0x7E => ByteClass::Printable,
        0x80..=0xFF => ByteClass::Multibyte,
    }
}

/// Result of reading one escape sequence
#[derive(Debug, PartialEq)]
enum EscapeAction {
    Sgr(Vec<u16>),
    /// Cursor forward: becomes non-destructive spaces
    Forward(u16),
    Discard,
    /// Broken sequence: show a placeholder
    Malformed,
}

/// Normalizer for one logical line at a time
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    options: NormalizeOptions,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }

    /// Normalize one logical line of raw output
    pub fn normalize(&self, input: &[u8]) -> String {
        let mut scan = Scan {
            options: self.options,
            input,
            attrs: AttrState::default(),
            out: String::with_capacity(input.len() + 8),
        };
        scan.run();
        scan.out
    }
}

struct Scan<'a> {
    options: NormalizeOptions,
    input: &'a [u8],
    attrs: AttrState,
    out: String,
}

impl<'a> Scan<'a> {
    fn run(&mut self) {
        let input = self.input;
        let mut i = 0;
        while i < input.len() {
            let byte = input[i];
            i = match classify(byte) {
                ByteClass::Printable | ByteClass::Layout => {
                    self.out.push(byte as char);
                    i + 1
                }
                ByteClass::Suppressed => i + 1,
                ByteClass::Nonprintable => {
                    self.unprintable(byte as char);
                    i + 1
                }
                ByteClass::Highlight => {
                    let c = byte as char;
                    match markers::toggle_flag(c) {
                        Some(flag) => self.attrs.toggle(flag),
                        None => self.attrs.reset(),
                    }
                    self.out.push(c);
                    i + 1
                }
                ByteClass::ColorIntroducer => {
                    let (spec, used) = markers::parse_color(&input[i + 1..]);
                    self.attrs.apply_color(spec);
                    self.out.push(COLOR);
                    self.push_ascii(&input[i + 1..i + 1 + used]);
                    i + 1 + used
                }
                ByteClass::DeviceGlyph => match markers::glyph_code(&input[i + 1..]) {
                    Some(_) => {
                        self.out.push(GLYPH);
                        self.push_ascii(&input[i + 1..i + 4]);
                        i + 4
                    }
                    None => {
                        self.unprintable(byte as char);
                        i + 1
                    }
                },
                ByteClass::Escape => self.escape(i),
                ByteClass::Multibyte => self.multibyte(i),
            };
        }
    }

    fn push_ascii(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.out.push(b as char);
        }
    }

    fn placeholder(&mut self, c: char) {
        self.out.push(REV_TOG);
        self.out.push(c);
        self.out.push(REV_TOG);
    }

    fn unprintable(&mut self, c: char) {
        match self.options.unprintable {
            UnprintableMode::Caret => {
                let code = c as u32;
                let shown = if code == 0x7F {
                    '?'
                } else if code < 0x80 {
                    char::from(((code as u8) | 0x40) & 0x7F)
                } else {
                    char::from(((code as u8) | 0x60) & 0x7F)
                };
                self.placeholder(shown);
            }
            UnprintableMode::Drop => {}
            UnprintableMode::Pass => self.out.push(c),
        }
    }

    /// Decode a UTF-8 sequence at `i`; anything undecodable is a device glyph.
    fn multibyte(&mut self, i: usize) -> usize {
        match decode_utf8(self.input, i) {
            Some(('\u{9B}', len)) => self.csi(i + len),
            Some((c @ '\u{80}'..='\u{9F}', len)) => {
                self.unprintable(c);
                i + len
            }
            Some((c, len)) => {
                self.out.push(c);
                i + len
            }
            None => {
                self.device_glyph(self.input[i]);
                i + 1
            }
        }
    }

    fn device_glyph(&mut self, byte: u8) {
        match self.options.glyphs {
            GlyphMode::Ascii => self.out.push(glyphs::homoglyph(byte)),
            GlyphMode::Native => {
                self.out.push(GLYPH);
                self.out.push_str(&format!("{:03}", byte));
            }
        }
    }

    /// ESC at `i`; returns the index where scanning resumes
    fn escape(&mut self, i: usize) -> usize {
        let Some(&next) = self.input.get(i + 1) else {
            self.placeholder('[');
            return i + 1;
        };
        match next {
            b'[' => self.csi(i + 2),
            b']' | b'P' | b'_' | b'^' | b'X' => self.skip_string(i + 2),
            b'(' | b')' | b'*' | b'+' | b'#' | b'$' => (i + 3).min(self.input.len()),
            0x80..=0xFF => match decode_utf8(self.input, i + 1) {
                Some((_, len)) => i + 1 + len,
                None => i + 2,
            },
            _ => i + 2,
        }
    }

    /// Swallow an OSC/DCS-style string up to BEL or ST
    fn skip_string(&mut self, start: usize) -> usize {
        let mut j = start;
        while j < self.input.len() {
            match self.input[j] {
                0x07 => return j + 1,
                0x1B if self.input.get(j + 1) == Some(&b'\\') => return j + 2,
                // Any other escape ends the string and is read on its own
                0x1B => return j,
                _ => j += 1,
            }
        }
        j
    }

    /// CSI body starting at `start`
    fn csi(&mut self, start: usize) -> usize {
        let (action, resume) = read_csi(self.input, start);
        trace!(?action, "csi");
        match action {
            EscapeAction::Sgr(params) => self.sgr(&params),
            EscapeAction::Forward(n) => {
                for _ in 0..n {
                    self.out.push(ND_SPACE);
                }
            }
            EscapeAction::Discard => {}
            EscapeAction::Malformed => self.placeholder('['),
        }
        resume
    }

    /// Translate SGR parameters, emitting only what actually changed
    fn sgr(&mut self, params: &[u16]) {
        let before = self.attrs;
        let mut next = before;
        let params: &[u16] = if params.is_empty() { &[0] } else { params };
        let mut resets = false;

        let mut iter = params.iter().copied();
        while let Some(param) = iter.next() {
            match param {
                0 => {
                    next.reset();
                    resets = true;
                }
                1 => next.flags |= AttrFlags::BOLD,
                3 => next.flags |= AttrFlags::ITALIC,
                4 => next.flags |= AttrFlags::UNDERLINE,
                5 | 26 => next.flags |= AttrFlags::BLINK,
                6 | 25 => next.flags &= !AttrFlags::BLINK,
                7 => next.flags |= AttrFlags::REVERSE,
                21 | 22 => next.flags &= !AttrFlags::BOLD,
                23 => next.flags &= !AttrFlags::ITALIC,
                24 => next.flags &= !AttrFlags::UNDERLINE,
                27 => next.flags &= !AttrFlags::REVERSE,
                30..=37 => next.fg = Some(param as u8),
                38 => {
                    if let Some(base) = extended_color(&mut iter) {
                        next.fg = Some(side_code(base, 30));
                    }
                }
                39 => next.fg = None,
                40..=47 => next.bg = Some(param as u8),
                48 => {
                    if let Some(base) = extended_color(&mut iter) {
                        next.bg = Some(side_code(base, 40));
                    }
                }
                49 => next.bg = None,
                90..=97 => {
                    next.flags |= AttrFlags::BOLD;
                    next.fg = Some((param - 60) as u8);
                }
                100..=107 => {
                    next.flags |= AttrFlags::BLINK;
                    next.bg = Some((param - 60) as u8);
                }
                _ => {}
            }
        }

        self.emit_transition(before, next, resets);
        self.attrs = next;
    }

    /// Off parameters become their own toggles; only a reset emits ALL_OFF.
    fn emit_transition(&mut self, mut before: AttrState, next: AttrState, resets: bool) {
        if before == next {
            return;
        }
        if resets && !before.is_plain() {
            self.out.push(ALL_OFF);
            before = AttrState::default();
            if next.is_plain() {
                return;
            }
        }

        let changed = before.flags ^ next.flags;
        for flag in markers::TOGGLE_ORDER {
            if changed.contains(flag) {
                if let Some(c) = flag.marker() {
                    self.out.push(c);
                }
            }
        }

        let fg_changed = before.fg != next.fg;
        let bg_changed = before.bg != next.bg;
        if !fg_changed && !bg_changed {
            return;
        }
        let lost_side = (fg_changed && next.fg.is_none()) || (bg_changed && next.bg.is_none());
        if lost_side {
            markers::push_color(&mut self.out, None, None);
            if next.fg.is_some() || next.bg.is_some() {
                markers::push_color(&mut self.out, next.fg, next.bg);
            }
        } else {
            let fg = if fg_changed { next.fg } else { None };
            let bg = if bg_changed { next.bg } else { None };
            markers::push_color(&mut self.out, fg, bg);
        }
    }
}

/// Decode the UTF-8 character starting at `i`, with its byte length
fn decode_utf8(input: &[u8], i: usize) -> Option<(char, usize)> {
    let len = match *input.get(i)? {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return None,
    };
    let bytes = input.get(i..i + len)?;
    let c = std::str::from_utf8(bytes).ok()?.chars().next()?;
    Some((c, len))
}

/// A downgraded extended color: base 0-7 plus intensity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BaseColor {
    base: u8,
    bright: bool,
}

fn side_code(color: BaseColor, normal: u8) -> u8 {
    if color.bright {
        50 + color.base
    } else {
        normal + color.base
    }
}

/// Read `5;n` or `2;r;g;b` after SGR 38/48 and map it onto 16 colors
fn extended_color(iter: &mut impl Iterator<Item = u16>) -> Option<BaseColor> {
    match iter.next()? {
        5 => {
            let n = iter.next()?;
            Some(match n {
                0..=7 => BaseColor { base: n as u8, bright: false },
                8..=15 => BaseColor { base: (n - 8) as u8, bright: true },
                16..=231 => {
                    let x = n - 16;
                    let (r, g, b) = (x / 36, (x / 6) % 6, x % 6);
                    let base = u8::from(r >= 3) | u8::from(g >= 3) << 1 | u8::from(b >= 3) << 2;
                    BaseColor { base, bright: r.max(g).max(b) == 5 }
                }
                232..=255 => match n - 232 {
                    0..=5 => BaseColor { base: 0, bright: false },
                    6..=11 => BaseColor { base: 0, bright: true },
                    12..=17 => BaseColor { base: 7, bright: false },
                    _ => BaseColor { base: 7, bright: true },
                },
                _ => return None,
            })
        }
        2 => {
            let r = iter.next()?;
            let g = iter.next()?;
            let b = iter.next()?;
            let base = u8::from(r > 127) | u8::from(g > 127) << 1 | u8::from(b > 127) << 2;
            Some(BaseColor { base, bright: r.max(g).max(b) > 200 })
        }
        _ => None,
    }
}

/// Read a CSI body; returns the action and the index to resume at
fn read_csi(input: &[u8], start: usize) -> (EscapeAction, usize) {
    let mut params: Vec<u16> = Vec::new();
    let mut current: Option<u16> = None;
    let mut private = false;

    let mut j = start;
    loop {
        let Some(&byte) = input.get(j) else {
            return (EscapeAction::Malformed, j);
        };
        match byte {
            b'0'..=b'9' => {
                let digit = u16::from(byte - b'0');
                current = Some(current.unwrap_or(0).saturating_mul(10).saturating_add(digit));
            }
            b';' | b':' => {
                if params.len() < MAX_PARAMS {
                    params.push(current.take().unwrap_or(0));
                }
                current = None;
            }
            // Private markers and intermediates: recognized, never acted on
            0x3C..=0x3F | 0x20..=0x2F => private = true,
            0x40..=0x7E => {
                if let Some(value) = current {
                    if params.len() < MAX_PARAMS {
                        params.push(value);
                    }
                }
                let action = match byte {
                    _ if private => EscapeAction::Discard,
                    b'm' => EscapeAction::Sgr(params),
                    b'C' | b'a' => {
                        let n = params.first().copied().unwrap_or(1).clamp(1, MAX_FORWARD);
                        EscapeAction::Forward(n)
                    }
                    _ => EscapeAction::Discard,
                };
                return (action, j + 1);
            }
            // ESC restarts, any other byte is read again as ordinary input
            _ => return (EscapeAction::Malformed, j),
        }
        j += 1;
    }
}
