//! In-band marker alphabet
//!
//! Every stage between the normalizer and the painter speaks this alphabet.
//! Markers are single control bytes outside the printable range, so a
//! normalized line is always valid UTF-8 and can be stored in scrollback
//! byte-for-byte.
//!
//! ```text
//! 0x02 BOLD_TOG    0x03 COLOR fg[,bg] | -1    0x05 ALT_TOG
//! 0x06 BLINK_TOG   0x0F ALL_OFF               0x10 ITALIC_TOG
//! 0x12 GLYPH nnn   0x13 ND_SPACE              0x16 REV_TOG
//! 0x1F UND_TOG
//! ```

use bitflags::bitflags;

use super::glyphs;

pub const BOLD_TOG: char = '\x02';
pub const COLOR: char = '\x03';
pub const ALT_TOG: char = '\x05';
pub const BLINK_TOG: char = '\x06';
pub const ALL_OFF: char = '\x0f';
pub const ITALIC_TOG: char = '\x10';
pub const GLYPH: char = '\x12';
pub const ND_SPACE: char = '\x13';
pub const REV_TOG: char = '\x16';
pub const UND_TOG: char = '\x1f';

pub const BELL: char = '\x07';

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrFlags: u8 {
        const BOLD        = 0b0000_0001;
        const UNDERLINE   = 0b0000_0010;
        const BLINK       = 0b0000_0100;
        const REVERSE     = 0b0000_1000;
        const ITALIC      = 0b0001_0000;
        const ALT_CHARSET = 0b0010_0000;
    }
}

impl AttrFlags {
    /// Marker byte that toggles exactly this flag
    pub fn marker(self) -> Option<char> {
        match self {
            f if f == AttrFlags::BOLD => Some(BOLD_TOG),
            f if f == AttrFlags::UNDERLINE => Some(UND_TOG),
            f if f == AttrFlags::BLINK => Some(BLINK_TOG),
            f if f == AttrFlags::REVERSE => Some(REV_TOG),
            f if f == AttrFlags::ITALIC => Some(ITALIC_TOG),
            f if f == AttrFlags::ALT_CHARSET => Some(ALT_TOG),
            _ => None,
        }
    }
}

/// Emission order for toggles when a whole state is written out
pub const TOGGLE_ORDER: [AttrFlags; 6] = [
    AttrFlags::BOLD,
    AttrFlags::UNDERLINE,
    AttrFlags::BLINK,
    AttrFlags::REVERSE,
    AttrFlags::ITALIC,
    AttrFlags::ALT_CHARSET,
];

/// Flag toggled by a marker byte
pub fn toggle_flag(c: char) -> Option<AttrFlags> {
    match c {
        BOLD_TOG => Some(AttrFlags::BOLD),
        UND_TOG => Some(AttrFlags::UNDERLINE),
        BLINK_TOG => Some(AttrFlags::BLINK),
        REV_TOG => Some(AttrFlags::REVERSE),
        ITALIC_TOG => Some(AttrFlags::ITALIC),
        ALT_TOG => Some(AttrFlags::ALT_CHARSET),
        _ => None,
    }
}

/// What a COLOR marker does to one side (foreground or background)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorChange {
    Keep,
    Clear,
    Set(u8),
}

/// Parsed body of a COLOR marker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorSpec {
    pub fg: ColorChange,
    pub bg: ColorChange,
}

impl ColorSpec {
    pub const CLEAR: ColorSpec = ColorSpec {
        fg: ColorChange::Clear,
        bg: ColorChange::Clear,
    };
}

/// 99 means "terminal default" on either side
pub const DEFAULT_CODE: u8 = 99;

fn valid_fg(n: u8) -> bool {
    matches!(n, 0..=15 | 30..=37 | 50..=57 | DEFAULT_CODE)
}

fn valid_bg(n: u8) -> bool {
    matches!(n, 0..=15 | 40..=47 | 50..=57 | DEFAULT_CODE)
}

/// Read one or two digits; the second only when the pair is still valid.
fn read_number(body: &[u8], valid: fn(u8) -> bool) -> Option<(u8, usize)> {
    let first = match body.first() {
        Some(b) if b.is_ascii_digit() => b - b'0',
        _ => return None,
    };
    if let Some(b) = body.get(1) {
        if b.is_ascii_digit() {
            let pair = first * 10 + (b - b'0');
            if valid(pair) {
                return Some((pair, 2));
            }
        }
    }
    Some((first, 1))
}

fn change_for(n: u8) -> ColorChange {
    if n == DEFAULT_CODE {
        ColorChange::Clear
    } else {
        ColorChange::Set(n)
    }
}

/// Parse the bytes following a COLOR introducer.
///
/// Returns the parsed color and how many bytes of `body` belong to it.
pub fn parse_color(body: &[u8]) -> (ColorSpec, usize) {
    if body.starts_with(b"-1") {
        return (ColorSpec::CLEAR, 2);
    }

    let mut used = 0;
    let mut spec = ColorSpec {
        fg: ColorChange::Keep,
        bg: ColorChange::Keep,
    };

    if let Some((n, len)) = read_number(body, valid_fg) {
        spec.fg = change_for(n);
        used += len;
    }

    if body.get(used) == Some(&b',') {
        if let Some((n, len)) = read_number(&body[used + 1..], valid_bg) {
            spec.bg = change_for(n);
            used += 1 + len;
        }
    }

    if used == 0 {
        // A bare introducer resets both sides
        return (ColorSpec::CLEAR, 0);
    }
    (spec, used)
}

/// Append a COLOR marker; codes are always written with two digits.
pub fn push_color(out: &mut String, fg: Option<u8>, bg: Option<u8>) {
    match (fg, bg) {
        (None, None) => {
            out.push(COLOR);
            out.push_str("-1");
        }
        (Some(f), None) => {
            out.push(COLOR);
            out.push_str(&format!("{:02}", f));
        }
        (None, Some(b)) => {
            out.push(COLOR);
            out.push_str(&format!(",{:02}", b));
        }
        (Some(f), Some(b)) => {
            out.push(COLOR);
            out.push_str(&format!("{:02},{:02}", f, b));
        }
    }
}

/// Parse the three digits after a GLYPH marker
pub fn glyph_code(body: &[u8]) -> Option<u8> {
    if body.len() < 3 || !body[..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let n = body[..3]
        .iter()
        .fold(0u16, |acc, b| acc * 10 + u16::from(b - b'0'));
    if (128..=255).contains(&n) {
        Some(n as u8)
    } else {
        None
    }
}

/// Mapping from mIRC color numbers to the 8 base colors
const MIRC_BASE: [u8; 16] = [7, 0, 4, 2, 1, 1, 5, 3, 3, 2, 6, 6, 4, 5, 0, 7];
/// mIRC numbers that select the high-intensity half
const MIRC_BRIGHT: [bool; 16] = [
    true, false, false, false, true, false, false, false,
    true, true, false, true, true, true, true, false,
];

/// Base color (0-7) and intensity for a color code
pub fn code_base(code: u8) -> Option<(u8, bool)> {
    match code {
        0..=15 => Some((MIRC_BASE[code as usize], MIRC_BRIGHT[code as usize])),
        30..=37 => Some((code - 30, false)),
        40..=47 => Some((code - 40, false)),
        50..=57 => Some((code - 50, true)),
        _ => None,
    }
}

/// Attribute state carried across a normalized line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AttrState {
    pub flags: AttrFlags,
    pub fg: Option<u8>,
    pub bg: Option<u8>,
}

impl AttrState {
    pub fn reset(&mut self) {
        *self = AttrState::default();
    }

    pub fn is_plain(&self) -> bool {
        *self == AttrState::default()
    }

    pub fn toggle(&mut self, flag: AttrFlags) {
        self.flags.toggle(flag);
    }

    pub fn apply_color(&mut self, spec: ColorSpec) {
        match spec.fg {
            ColorChange::Keep => {}
            ColorChange::Clear => self.fg = None,
            ColorChange::Set(n) => self.fg = Some(n),
        }
        match spec.bg {
            ColorChange::Keep => {}
            ColorChange::Clear => self.bg = None,
            ColorChange::Set(n) => self.bg = Some(n),
        }
    }

    /// Apply one marker token, returning false if it is not an attribute marker
    pub fn apply(&mut self, token: &Token) -> bool {
        match *token {
            Token::Toggle(flag) => self.toggle(flag),
            Token::AllOff => self.reset(),
            Token::Color(spec) => self.apply_color(spec),
            _ => return false,
        }
        true
    }

    /// Markers that recreate this state starting from all-off
    pub fn push_markers(&self, out: &mut String) {
        for flag in TOGGLE_ORDER {
            if self.flags.contains(flag) {
                if let Some(c) = flag.marker() {
                    out.push(c);
                }
            }
        }
        if self.fg.is_some() || self.bg.is_some() {
            push_color(out, self.fg, self.bg);
        }
    }

    /// Display slot (0-15) for the foreground; bold selects the bright half
    pub fn fg_slot(&self) -> Option<u8> {
        let (base, bright) = code_base(self.fg?)?;
        let bump = bright || self.flags.contains(AttrFlags::BOLD);
        Some(if bump { base + 8 } else { base })
    }

    /// Display slot (0-15) for the background; blink selects the bright half
    pub fn bg_slot(&self) -> Option<u8> {
        let (base, bright) = code_base(self.bg?)?;
        let bump = bright || self.flags.contains(AttrFlags::BLINK);
        Some(if bump { base + 8 } else { base })
    }
}

/// One lexical item of a normalized line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    Char(char),
    Toggle(AttrFlags),
    AllOff,
    Color(ColorSpec),
    Glyph(u8),
    NdSpace,
    Bell,
    Tab,
    Newline,
    /// A control byte that is not part of the alphabet
    Control(char),
}

/// Iterator over the tokens of a normalized line, with their source text
#[derive(Clone)]
pub struct Tokens<'a> {
    text: &'a str,
    pos: usize,
}

pub fn tokens(text: &str) -> Tokens<'_> {
    Tokens { text, pos: 0 }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = (Token, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.text[self.pos..];
        let c = rest.chars().next()?;
        let bytes = rest.as_bytes();
        let mut len = c.len_utf8();

        let token = match c {
            COLOR => {
                let (spec, used) = parse_color(&bytes[1..]);
                len += used;
                Token::Color(spec)
            }
            GLYPH => match glyph_code(&bytes[1..]) {
                Some(code) => {
                    len += 3;
                    Token::Glyph(code)
                }
                None => Token::Control(c),
            },
            ALL_OFF => Token::AllOff,
            ND_SPACE => Token::NdSpace,
            BELL => Token::Bell,
            '\t' => Token::Tab,
            '\n' => Token::Newline,
            c => match toggle_flag(c) {
                Some(flag) => Token::Toggle(flag),
                None if c < ' ' || c == '\x7f' => Token::Control(c),
                None => Token::Char(c),
            },
        };

        let raw = &rest[..len];
        self.pos += len;
        Some((token, raw))
    }
}

/// Plain text of a normalized line, used for searching.
pub fn strip_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (token, _) in tokens(text) {
        match token {
            Token::Char(c) => out.push(c),
            Token::NdSpace | Token::Tab => out.push(' '),
            Token::Glyph(code) => out.push(glyphs::homoglyph(code)),
            Token::Newline => out.push('\n'),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color_forms() {
        assert_eq!(
            parse_color(b"31hi"),
            (ColorSpec { fg: ColorChange::Set(31), bg: ColorChange::Keep }, 2)
        );
        assert_eq!(
            parse_color(b",41x"),
            (ColorSpec { fg: ColorChange::Keep, bg: ColorChange::Set(41) }, 3)
        );
        assert_eq!(
            parse_color(b"4,12"),
            (ColorSpec { fg: ColorChange::Set(4), bg: ColorChange::Set(12) }, 4)
        );
        assert_eq!(parse_color(b"-1rest"), (ColorSpec::CLEAR, 2));
        assert_eq!(parse_color(b"hello"), (ColorSpec::CLEAR, 0));
    }

    #[test]
    fn test_parse_color_second_digit_only_when_valid() {
        // 42 is not a foreground code, so only the 4 is taken
        let (spec, used) = parse_color(b"42");
        assert_eq!(spec.fg, ColorChange::Set(4));
        assert_eq!(used, 1);

        // trailing comma without a digit stays in the text
        let (spec, used) = parse_color(b"3,x");
        assert_eq!(spec.fg, ColorChange::Set(3));
        assert_eq!(used, 1);
    }

    #[test]
    fn test_default_code_clears() {
        let (spec, _) = parse_color(b"99,99");
        assert_eq!(spec, ColorSpec::CLEAR);
    }

    #[test]
    fn test_push_color_two_digits() {
        let mut s = String::new();
        push_color(&mut s, Some(4), None);
        assert_eq!(s, "\x0304");
        s.clear();
        push_color(&mut s, None, Some(41));
        assert_eq!(s, "\x03,41");
        s.clear();
        push_color(&mut s, None, None);
        assert_eq!(s, "\x03-1");
    }

    #[test]
    fn test_bold_and_bright_share_a_slot() {
        let mut bold_red = AttrState::default();
        bold_red.toggle(AttrFlags::BOLD);
        bold_red.fg = Some(31);

        let bright_red = AttrState {
            fg: Some(51),
            ..AttrState::default()
        };

        assert_eq!(bold_red.fg_slot(), Some(9));
        assert_eq!(bright_red.fg_slot(), Some(9));
    }

    #[test]
    fn test_mirc_slots() {
        let state = |n| AttrState { fg: Some(n), ..AttrState::default() };
        // 4 is light red, 5 is maroon
        assert_eq!(state(4).fg_slot(), Some(9));
        assert_eq!(state(5).fg_slot(), Some(1));
        // 14 is dark grey, 15 light grey
        assert_eq!(state(14).fg_slot(), Some(8));
        assert_eq!(state(15).fg_slot(), Some(7));
    }

    #[test]
    fn test_push_markers_restores_state() {
        let mut state = AttrState::default();
        state.toggle(AttrFlags::UNDERLINE);
        state.toggle(AttrFlags::BOLD);
        state.fg = Some(32);

        let mut out = String::new();
        state.push_markers(&mut out);
        assert_eq!(out, "\x02\x1f\x0332");

        let mut replay = AttrState::default();
        for (token, _) in tokens(&out) {
            replay.apply(&token);
        }
        assert_eq!(replay, state);
    }

    #[test]
    fn test_tokens_and_raw_slices() {
        let line = "a\x0331,41b\x12196\x13";
        let items: Vec<_> = tokens(line).collect();
        assert_eq!(items[0], (Token::Char('a'), "a"));
        assert!(matches!(items[1].0, Token::Color(_)));
        assert_eq!(items[1].1, "\x0331,41");
        assert_eq!(items[2], (Token::Char('b'), "b"));
        assert_eq!(items[3], (Token::Glyph(196), "\x12196"));
        assert_eq!(items[4], (Token::NdSpace, "\x13"));
    }

    #[test]
    fn test_strip_markers() {
        let line = "\x02bold\x02 \x0304red\x03-1\x13x\x12196";
        assert_eq!(strip_markers(line), "bold red x-");
    }

    #[test]
    fn test_glyph_code_range() {
        assert_eq!(glyph_code(b"196"), Some(196));
        assert_eq!(glyph_code(b"065"), None);
        assert_eq!(glyph_code(b"19"), None);
    }
}
