//! Line layout engine
//!
//! Wraps one normalized logical line into physical lines no wider than the
//! window. Markers take no columns, ND_SPACE and glyphs take one, tabs expand
//! to the next multiple of eight.
//!
//! Each physical line after the first begins with the continuation prefix and
//! the markers needed to restore the attributes in effect at the break, so a
//! stored line can always be painted starting from an all-off state.

use unicode_width::UnicodeWidthChar;

use super::markers::{self, AttrState, Token, Tokens, REV_TOG};

const TAB_STOP: usize = 8;

/// Wrapping parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutOptions {
    /// Maximum columns per physical line
    pub width: usize,
    /// Truncate at the width instead of wrapping
    pub no_wrap: bool,
    /// Characters after (or, for spaces, at) which a line may break
    pub word_break: String,
    /// Text placed at the start of every continuation line
    pub continuation: String,
    /// Pad the continuation prefix to the first word's column
    pub indent: bool,
    pub max_bells: usize,
    pub max_tabs: usize,
    pub max_nd_spaces: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            width: 80,
            no_wrap: false,
            word_break: " \t".to_string(),
            continuation: String::new(),
            indent: false,
            max_bells: 5,
            max_tabs: 8,
            max_nd_spaces: 160,
        }
    }
}

impl LayoutOptions {
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    #[must_use]
    pub fn with_continuation(mut self, prefix: impl Into<String>) -> Self {
        self.continuation = prefix.into();
        self
    }

    #[must_use]
    pub fn with_indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    #[must_use]
    pub fn with_no_wrap(mut self, no_wrap: bool) -> Self {
        self.no_wrap = no_wrap;
        self
    }

    fn is_break_char(&self, c: char) -> bool {
        self.word_break.contains(c)
    }
}

/// Columns occupied by a normalized string
pub fn visible_width(text: &str) -> usize {
    markers::tokens(text)
        .map(|(token, _)| match token {
            Token::Char(c) => c.width().unwrap_or(0),
            Token::NdSpace | Token::Glyph(_) | Token::Tab => 1,
            _ => 0,
        })
        .sum()
}

/// Wrap a normalized logical line
pub fn wrap<'a>(line: &'a str, options: &'a LayoutOptions) -> PhysicalLines<'a> {
    PhysicalLines {
        options,
        tokens: markers::tokens(line),
        pending: None,
        replaying: false,
        buf: String::new(),
        col: 0,
        attrs: AttrState::default(),
        word_break: None,
        first_break: None,
        indent_col: 0,
        prefix: None,
        first_line: true,
        content: false,
        skip_spaces: false,
        truncating: false,
        bells: 0,
        tabs: 0,
        nd_spaces: 0,
        emitted: false,
        done: false,
    }
}

/// A recorded place where the current line may be split
#[derive(Clone, Copy, Debug)]
struct Break {
    /// Byte offset in the line buffer
    at: usize,
    /// Attributes in effect at that offset
    attrs: AttrState,
}

/// Lazy sequence of physical lines for one logical line
#[derive(Clone)]
pub struct PhysicalLines<'a> {
    options: &'a LayoutOptions,
    tokens: Tokens<'a>,
    /// Token that did not fit and starts the next line
    pending: Option<(Token, &'a str)>,
    replaying: bool,
    buf: String,
    col: usize,
    attrs: AttrState,
    word_break: Option<Break>,
    first_break: Option<usize>,
    indent_col: usize,
    prefix: Option<String>,
    first_line: bool,
    /// Something printable was placed on the current line
    content: bool,
    skip_spaces: bool,
    truncating: bool,
    bells: usize,
    tabs: usize,
    nd_spaces: usize,
    emitted: bool,
    done: bool,
}

impl<'a> Iterator for PhysicalLines<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        loop {
            let item = match self.pending.take() {
                Some(item) => {
                    self.replaying = true;
                    Some(item)
                }
                None => {
                    self.replaying = false;
                    self.tokens.next()
                }
            };

            let Some((token, raw)) = item else {
                self.done = true;
                if self.content || !self.emitted {
                    self.emitted = true;
                    return Some(std::mem::take(&mut self.buf));
                }
                return None;
            };

            if let Some(line) = self.feed(token, raw) {
                self.emitted = true;
                return Some(line);
            }
        }
    }
}

impl<'a> PhysicalLines<'a> {
    fn feed(&mut self, token: Token, raw: &'a str) -> Option<String> {
        match token {
            Token::Newline => {
                let line = std::mem::take(&mut self.buf);
                let attrs = self.attrs;
                self.truncating = false;
                self.start_line(attrs, "");
                Some(line)
            }
            Token::Toggle(_) | Token::AllOff | Token::Color(_) => {
                self.buf.push_str(raw);
                self.attrs.apply(&token);
                None
            }
            Token::Control(_) => {
                self.buf.push_str(raw);
                None
            }
            Token::Bell => {
                if !self.replaying {
                    self.bells += 1;
                }
                if self.bells > self.options.max_bells {
                    self.placeholder('G', token, raw)
                } else {
                    self.buf.push_str(raw);
                    None
                }
            }
            Token::NdSpace => {
                if !self.replaying {
                    self.nd_spaces += 1;
                }
                if self.nd_spaces > self.options.max_nd_spaces {
                    self.placeholder('S', token, raw)
                } else {
                    self.place(raw, 1, token, raw)
                }
            }
            Token::Tab => {
                if !self.replaying {
                    self.tabs += 1;
                }
                if self.tabs > self.options.max_tabs {
                    return self.placeholder('I', token, raw);
                }
                if self.skip_spaces && !self.content {
                    return None;
                }
                self.record_break();
                let stop = TAB_STOP - (self.col % TAB_STOP);
                let spaces = " ".repeat(stop);
                self.place(&spaces, stop, token, raw)
            }
            Token::Glyph(_) => self.place(raw, 1, token, raw),
            Token::Char(c) => {
                if c == ' ' && self.skip_spaces && !self.content {
                    return None;
                }
                let breaks = self.options.is_break_char(c);
                if breaks && c.is_whitespace() {
                    self.record_break();
                }
                let width = c.width().unwrap_or(0);
                let line = self.place(raw, width, token, raw);
                if line.is_none() && breaks && !c.is_whitespace() {
                    self.record_break();
                }
                line
            }
        }
    }

    fn placeholder(&mut self, letter: char, token: Token, raw: &'a str) -> Option<String> {
        let mut shown = String::with_capacity(3);
        shown.push(REV_TOG);
        shown.push(letter);
        shown.push(REV_TOG);
        self.place(&shown, 1, token, raw)
    }

    fn record_break(&mut self) {
        let at = self.buf.len();
        if self.first_line && self.first_break.is_none() {
            self.first_break = Some(at);
            self.indent_col = self.col;
        }
        self.word_break = Some(Break {
            at,
            attrs: self.attrs,
        });
    }

    /// Append `text` of `width` columns, breaking first if it does not fit
    fn place(&mut self, text: &str, width: usize, token: Token, raw: &'a str) -> Option<String> {
        if self.truncating {
            return None;
        }
        if self.col + width > self.options.width && self.content {
            if self.options.no_wrap {
                self.truncating = true;
                return None;
            }
            let line = self.break_line();
            self.pending = Some((token, raw));
            return Some(line);
        }
        self.buf.push_str(text);
        self.col += width;
        self.content = true;
        self.skip_spaces = false;
        None
    }

    fn prefix(&mut self) -> String {
        if let Some(prefix) = &self.prefix {
            return prefix.clone();
        }
        let mut prefix = self.options.continuation.clone();
        if self.options.indent {
            let third = self.options.width / 3;
            let indent = if self.indent_col == 0 || self.indent_col >= third {
                third
            } else {
                self.indent_col
            };
            let have = visible_width(&prefix);
            if have < indent {
                prefix.push_str(&" ".repeat(indent - have));
            }
        }
        self.prefix = Some(prefix.clone());
        prefix
    }

    /// Split the buffer and return the finished physical line
    fn break_line(&mut self) -> String {
        let prefix = self.prefix();
        let prefix_width = visible_width(&prefix);

        let chosen = self.word_break.filter(|b| {
            let indent_word = self.options.indent && self.first_line && self.first_break == Some(b.at);
            // A prefix at least as wide as the text before the break could
            // never make room on the next line: split right here instead.
            !indent_word && visible_width(&self.buf[..b.at]) > prefix_width
        });

        let (line, tail, carry, skip) = match chosen {
            Some(b) => {
                let tail = self.buf[b.at..].trim_start_matches(' ').to_string();
                self.buf.truncate(b.at);
                (std::mem::take(&mut self.buf), tail, b.attrs, true)
            }
            None => (std::mem::take(&mut self.buf), String::new(), self.attrs, false),
        };

        self.start_line(carry, &tail);
        self.skip_spaces = skip;
        line
    }

    /// Begin a continuation line holding `tail`
    fn start_line(&mut self, carry: AttrState, tail: &str) {
        let prefix = self.prefix();
        let mut buf = prefix;
        carry.push_markers(&mut buf);
        buf.push_str(tail);

        self.col = visible_width(&buf);
        self.content = visible_width(tail) > 0;
        self.buf = buf;
        self.word_break = None;
        self.first_line = false;
        self.skip_spaces = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lines(text: &str, opts: &LayoutOptions) -> Vec<String> {
        wrap(text, opts).collect()
    }

    #[test]
    fn test_word_wrap_basic() {
        let opts = LayoutOptions::default().with_width(9);
        assert_eq!(lines("AAAA BBBB CCCC", &opts), vec!["AAAA BBBB", "CCCC"]);
    }

    #[test]
    fn test_fits_on_one_line() {
        let opts = LayoutOptions::default().with_width(20);
        assert_eq!(lines("short line", &opts), vec!["short line"]);
    }

    #[test]
    fn test_empty_line() {
        let opts = LayoutOptions::default().with_width(10);
        assert_eq!(lines("", &opts), vec![""]);
    }

    #[test]
    fn test_hard_break_without_spaces() {
        let opts = LayoutOptions::default().with_width(4);
        assert_eq!(lines("abcdefghij", &opts), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_forced_newline() {
        let opts = LayoutOptions::default().with_width(20);
        assert_eq!(lines("one\ntwo", &opts), vec!["one", "two"]);
        assert_eq!(lines("one\n\ntwo", &opts), vec!["one", "", "two"]);
    }

    #[test]
    fn test_markers_take_no_columns() {
        let opts = LayoutOptions::default().with_width(5);
        assert_eq!(lines("\x02abcde\x02", &opts), vec!["\x02abcde\x02"]);
    }

    #[test]
    fn test_attributes_restored_on_continuation() {
        let opts = LayoutOptions::default().with_width(5);
        let out = lines("\x02\x0331aaa bbb", &opts);
        assert_eq!(out, vec!["\x02\x0331aaa", "\x02\x0331bbb"]);
    }

    #[test]
    fn test_continuation_prefix() {
        let opts = LayoutOptions::default().with_width(10).with_continuation("+ ");
        assert_eq!(
            lines("alpha beta gamma delta", &opts),
            vec!["alpha beta", "+ gamma", "+ delta"]
        );
    }

    #[test]
    fn test_prefix_wider_than_first_word_forces_hard_break() {
        // "ab" is no wider than the prefix, so carrying "cdefgh" forward
        // could never fit: break right at the edge instead
        let opts = LayoutOptions::default().with_width(6).with_continuation(">>>");
        assert_eq!(lines("ab cdefgh", &opts), vec!["ab cde", ">>>fgh"]);
    }

    #[test]
    fn test_auto_indent() {
        let opts = LayoutOptions::default().with_width(12).with_indent(true);
        // first word ends at column 3, less than a third of 12
        assert_eq!(
            lines("<n> hello there world", &opts),
            vec!["<n> hello", "   there", "   world"]
        );
    }

    #[test]
    fn test_auto_indent_never_breaks_at_indent_point() {
        // indent column 2 is under a third of 9, so the prefix is two spaces
        let opts = LayoutOptions::default().with_width(9).with_indent(true);
        assert_eq!(lines("ab cdefghijk", &opts), vec!["ab cdefgh", "  ijk"]);
    }

    #[test]
    fn test_tab_expansion() {
        let opts = LayoutOptions::default().with_width(20);
        assert_eq!(lines("ab\tc", &opts), vec!["ab      c"]);
    }

    #[test]
    fn test_tab_is_a_break() {
        let opts = LayoutOptions::default().with_width(10);
        assert_eq!(lines("abc\tdefgh", &opts), vec!["abc", "defgh"]);
    }

    #[test]
    fn test_nd_space_takes_a_column() {
        let opts = LayoutOptions::default().with_width(3);
        assert_eq!(lines("a\x13b\x13c", &opts), vec!["a\x13b", "\x13c"]);
    }

    #[test]
    fn test_bell_flood_placeholder() {
        let opts = LayoutOptions {
            max_bells: 2,
            ..LayoutOptions::default().with_width(20)
        };
        assert_eq!(lines("\x07\x07\x07x", &opts), vec!["\x07\x07\x16G\x16x"]);
    }

    #[test]
    fn test_tab_flood_placeholder() {
        let opts = LayoutOptions {
            max_tabs: 1,
            ..LayoutOptions::default().with_width(20)
        };
        assert_eq!(lines("a\tb\tc", &opts), vec!["a       b\x16I\x16c"]);
    }

    #[test]
    fn test_nd_space_flood_placeholder() {
        let opts = LayoutOptions {
            max_nd_spaces: 2,
            ..LayoutOptions::default().with_width(20)
        };
        assert_eq!(lines("\x13\x13x", &opts), vec!["\x13\x13x"]);
        assert_eq!(lines("\x13\x13\x13x", &opts), vec!["\x13\x13\x16S\x16x"]);
    }

    #[test]
    fn test_no_wrap_truncates() {
        let opts = LayoutOptions::default().with_width(5).with_no_wrap(true);
        assert_eq!(lines("abcdefgh\x02\nxy", &opts), vec!["abcde\x02", "\x02xy"]);
    }

    #[test]
    fn test_wide_chars() {
        let opts = LayoutOptions::default().with_width(4);
        assert_eq!(lines("日本語", &opts), vec!["日本", "語"]);
    }

    #[test]
    fn test_restartable() {
        let opts = LayoutOptions::default().with_width(9);
        let mut iter = wrap("AAAA BBBB CCCC", &opts);
        let copy = iter.clone();
        assert_eq!(iter.next().as_deref(), Some("AAAA BBBB"));
        assert_eq!(copy.collect::<Vec<_>>(), vec!["AAAA BBBB", "CCCC"]);
    }

    #[test]
    fn test_trailing_space_at_break_produces_no_extra_line() {
        let opts = LayoutOptions::default().with_width(9);
        assert_eq!(lines("AAAA BBBB ", &opts), vec!["AAAA BBBB"]);
    }

    proptest! {
        #[test]
        fn prop_round_trip(words in prop::collection::vec("[a-z]{1,8}", 1..30), width in 10usize..40) {
            let text = words.join(" ");
            let opts = LayoutOptions::default().with_width(width);
            let out = lines(&text, &opts);
            for line in &out {
                prop_assert!(visible_width(line) <= width);
            }
            prop_assert_eq!(out.join(" "), text);
        }

        #[test]
        fn prop_rewrapping_is_noop(words in prop::collection::vec("[a-z]{1,8}", 1..30), width in 10usize..40) {
            let text = words.join(" ");
            let opts = LayoutOptions::default().with_width(width).with_continuation("> ");
            for line in lines(&text, &opts) {
                prop_assert_eq!(lines(&line, &opts), vec![line.clone()]);
            }
        }
    }
}
