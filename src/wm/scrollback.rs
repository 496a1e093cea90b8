//! Scrollback and flow control for one window
//!
//! Physical lines live in a `VecDeque` arena addressed by [`LineId`]
//! handles. Handles are absolute sequence numbers: the oldest retained line
//! is `base`, the insertion point is `base + len`. Trimming pops from the
//! front and bumps `base`, so a handle to a trimmed line is detected as stale
//! instead of dangling.
//!
//! ```text
//!  base          view?     top          shown_end       tail
//!   |  retained   |  ...    | live view    | held (unseen) |
//!   +-------------+---------+--------------+---------------+
//! ```
//!
//! - `top..shown_end` is what the live view shows (at most `height` lines).
//! - Lines past `shown_end` were appended but not admitted (hold mode, or
//!   the user is scrolled back).
//! - While scrolled back, `view` is the top line actually drawn and
//!   `restore_point` remembers the live top to come back to.

use std::collections::VecDeque;
use std::time::SystemTime;

use regex::Regex;
use tracing::debug;

use crate::core::layout::{self, LayoutOptions};
use crate::core::markers::strip_markers;

/// Handle of a physical line
pub type LineId = u64;

/// One wrapped physical line of normalized text
#[derive(Debug, Clone)]
pub struct DisplayLine {
    pub text: String,
    /// Logical line this was wrapped from
    pub logical: u64,
    pub when: SystemTime,
}

/// A logical line kept for re-wrapping after a width change
#[derive(Debug, Clone)]
struct Source {
    id: u64,
    text: String,
    when: SystemTime,
    /// Physical lines the last layout produced
    wrapped: usize,
    /// Leading physical lines removed by trimming
    trimmed: usize,
    /// Trailing physical lines discarded by a flush
    flushed: usize,
}

impl Source {
    /// Which of `count` freshly wrapped lines correspond to what is still kept
    fn kept_range(&self, count: usize) -> std::ops::Range<usize> {
        if count == 0 || (self.trimmed == 0 && self.flushed == 0) {
            return 0..count;
        }
        let wrapped = self.wrapped.max(1);
        let kept_end = wrapped.saturating_sub(self.flushed);
        if kept_end <= self.trimmed {
            return count..count;
        }
        let start = ((self.trimmed * count + wrapped - 1) / wrapped).min(count - 1);
        let end = (kept_end * count / wrapped).clamp(start + 1, count);
        start..end
    }
}

/// Outcome of a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Moved,
    /// Nothing to move to: the caller should beep
    AtLimit,
}

/// Retention and pacing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowOptions {
    /// Maximum retained physical lines
    pub capacity: usize,
    /// Held-line count granularity for status refreshes
    pub hold_interval: usize,
    /// Percentage of a page released per unhold
    pub hold_slider: usize,
    /// Lines scrolled at once when output reaches the bottom
    pub scroll_lines: usize,
    /// Percentage of the height moved per page of navigation
    pub scroll_ratio: usize,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            capacity: 256,
            hold_interval: 10,
            hold_slider: 100,
            scroll_lines: 1,
            scroll_ratio: 50,
        }
    }
}

#[derive(Debug)]
pub struct Scrollback {
    lines: VecDeque<DisplayLine>,
    base: LineId,
    sources: VecDeque<Source>,
    next_logical: u64,
    height: usize,
    top: LineId,
    shown_end: LineId,
    view: Option<LineId>,
    restore_point: Option<LineId>,
    autohold: bool,
    hold_mode: bool,
    page_count: usize,
    lines_held: usize,
    redraw: bool,
    status_dirty: bool,
    options: FlowOptions,
}

impl Scrollback {
    pub fn new(height: usize, options: FlowOptions) -> Self {
        Self {
            lines: VecDeque::new(),
            base: 0,
            sources: VecDeque::new(),
            next_logical: 0,
            height,
            top: 0,
            shown_end: 0,
            view: None,
            restore_point: None,
            autohold: false,
            hold_mode: false,
            page_count: 0,
            lines_held: 0,
            redraw: true,
            status_dirty: true,
            options,
        }
    }

    pub fn options(&self) -> FlowOptions {
        self.options
    }

    /// Insertion point: the handle the next append will get
    pub fn tail(&self) -> LineId {
        self.base + self.lines.len() as u64
    }

    pub fn oldest(&self) -> LineId {
        self.base
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Top of the live view
    pub fn top(&self) -> LineId {
        self.top
    }

    /// Top of whatever view is drawn right now
    pub fn view_top(&self) -> LineId {
        self.view.unwrap_or(self.top)
    }

    pub fn restore_point(&self) -> Option<LineId> {
        self.restore_point
    }

    /// Row where the next admitted line goes, in `0..=height`
    pub fn cursor(&self) -> usize {
        (self.shown_end - self.top) as usize
    }

    pub fn hold_mode(&self) -> bool {
        self.hold_mode
    }

    pub fn autohold(&self) -> bool {
        self.autohold
    }

    pub fn lines_held(&self) -> usize {
        self.lines_held
    }

    /// Held count as the status bar shows it, rounded down to the interval
    pub fn held_indicator(&self) -> usize {
        let interval = self.options.hold_interval.max(1);
        (self.lines_held / interval) * interval
    }

    pub fn is_scrolled_back(&self) -> bool {
        self.restore_point.is_some()
    }

    /// Look up a line; `None` for trimmed or never-written handles
    pub fn line(&self, id: LineId) -> Option<&DisplayLine> {
        if id < self.base {
            return None;
        }
        self.lines.get((id - self.base) as usize)
    }

    /// Lines of the current view, top to bottom
    pub fn visible(&self) -> impl Iterator<Item = &DisplayLine> + '_ {
        let start = self.view_top();
        let end = (start + self.height as u64).min(self.shown_end).max(start);
        (start..end).filter_map(move |id| self.line(id))
    }

    /// The view changed shape or position since the last repaint
    pub fn redraw_pending(&self) -> bool {
        self.redraw
    }

    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    pub fn take_status_dirty(&mut self) -> bool {
        std::mem::take(&mut self.status_dirty)
    }

    pub fn mark_redraw(&mut self) {
        self.redraw = true;
    }

    /// Register a logical line before its physical lines are appended
    pub fn begin_logical(&mut self, normalized: &str) -> u64 {
        let id = self.next_logical;
        self.next_logical += 1;
        self.sources.push_back(Source {
            id,
            text: normalized.to_string(),
            when: SystemTime::now(),
            wrapped: 0,
            trimmed: 0,
            flushed: 0,
        });
        id
    }

    /// Link a physical line at the tail
    pub fn append(&mut self, text: String, logical: u64) -> LineId {
        let id = self.tail();
        if let Some(source) = self.sources.back_mut().filter(|s| s.id == logical) {
            source.wrapped += 1;
        }
        self.lines.push_back(DisplayLine {
            text,
            logical,
            when: SystemTime::now(),
        });
        id
    }

    /// Decide whether the newest appended line may be shown now.
    ///
    /// A suppressed line stays in the buffer and counts as held.
    pub fn admit(&mut self) -> bool {
        let page_full = self.hold_mode && self.page_count >= self.height;
        if self.restore_point.is_some() || page_full || self.lines_held > 0 {
            self.lines_held += 1;
            if self.lines_held % self.options.hold_interval.max(1) == 0 {
                self.status_dirty = true;
            }
            return false;
        }

        self.shown_end = self.tail();
        self.page_count += 1;
        self.scroll_to_cursor();
        true
    }

    /// Keep the live cursor inside the viewport
    fn scroll_to_cursor(&mut self) {
        if self.height == 0 {
            self.top = self.shown_end;
            return;
        }
        let step = self.options.scroll_lines.clamp(1, self.height) as u64;
        while self.shown_end - self.top > self.height as u64 {
            self.top += step;
        }
    }

    /// Put the live view back on the newest lines without stepping
    fn settle_top(&mut self) {
        let height = self.height as u64;
        if self.shown_end - self.top > height {
            self.top = self.shown_end - height;
        }
    }

    /// Show up to `n` held lines
    fn unhold_lines(&mut self, n: usize) -> usize {
        let n = n.min(self.lines_held);
        if n == 0 {
            return 0;
        }
        self.shown_end += n as u64;
        self.lines_held -= n;
        self.page_count = n;
        self.settle_top();
        self.redraw = true;
        self.status_dirty = true;
        n
    }

    pub fn set_hold_mode(&mut self, on: bool) {
        if self.hold_mode == on {
            return;
        }
        self.hold_mode = on;
        self.page_count = 0;
        if !on && !self.is_scrolled_back() {
            self.catch_up();
        }
        self.status_dirty = true;
        debug!(hold_mode = on, "hold mode changed");
    }

    /// The reader is done with the current page (hold mode only)
    pub fn release(&mut self) -> bool {
        if !self.hold_mode {
            return false;
        }
        self.page_count = 0;
        let slider = self.options.hold_slider.clamp(1, 100);
        let page = (slider * self.height / 100).max(1);
        self.unhold_lines(page) > 0
    }

    /// Show everything held and start a fresh page
    fn catch_up(&mut self) {
        let held = self.lines_held;
        self.unhold_lines(held);
        self.page_count = 0;
    }

    fn enter_scrollback(&mut self, target: LineId) -> Navigation {
        if self.restore_point.is_none() {
            self.restore_point = Some(self.top);
            self.autohold = true;
        }
        self.view = Some(target);
        self.redraw = true;
        self.status_dirty = true;
        Navigation::Moved
    }

    fn leave_scrollback(&mut self) {
        self.view = None;
        self.restore_point = None;
        self.autohold = false;
        self.catch_up();
        self.redraw = true;
        self.status_dirty = true;
    }

    /// Move the view toward older lines
    pub fn scroll_backward(&mut self, n: usize) -> Navigation {
        let current = self.view_top();
        if n == 0 || current <= self.base {
            return Navigation::AtLimit;
        }
        let target = current.saturating_sub(n as u64).max(self.base);
        self.enter_scrollback(target)
    }

    /// Move the view toward newer lines; in hold mode this reads on
    pub fn scroll_forward(&mut self, n: usize) -> Navigation {
        if n == 0 {
            return Navigation::AtLimit;
        }
        let Some(restore) = self.restore_point else {
            if self.hold_mode && self.unhold_lines(n) > 0 {
                return Navigation::Moved;
            }
            return Navigation::AtLimit;
        };
        let target = self.view_top() + n as u64;
        if target >= restore {
            self.leave_scrollback();
        } else {
            self.view = Some(target);
            self.redraw = true;
        }
        Navigation::Moved
    }

    fn page_lines(&self) -> usize {
        let ratio = self.options.scroll_ratio.clamp(1, 100);
        (self.height * ratio / 100).max(1)
    }

    pub fn page_backward(&mut self) -> Navigation {
        self.scroll_backward(self.page_lines())
    }

    pub fn page_forward(&mut self) -> Navigation {
        self.scroll_forward(self.page_lines())
    }

    pub fn scroll_start(&mut self) -> Navigation {
        self.scroll_backward(usize::MAX)
    }

    pub fn scroll_end(&mut self) -> Navigation {
        if self.restore_point.is_some() {
            self.leave_scrollback();
            return Navigation::Moved;
        }
        if self.hold_mode && self.lines_held > 0 {
            let held = self.lines_held;
            self.unhold_lines(held);
            return Navigation::Moved;
        }
        Navigation::AtLimit
    }

    fn matches(&self, id: LineId, pattern: &Regex) -> bool {
        self.line(id)
            .map(|line| pattern.is_match(&strip_markers(&line.text)))
            .unwrap_or(false)
    }

    /// Scroll back to the nearest older line matching `pattern`
    pub fn search_backward(&mut self, pattern: &Regex) -> Navigation {
        let mut id = self.view_top();
        while id > self.base {
            id -= 1;
            if self.matches(id, pattern) {
                return self.enter_scrollback(id);
            }
        }
        Navigation::AtLimit
    }

    /// Scroll forward to the nearest newer shown line matching `pattern`
    pub fn search_forward(&mut self, pattern: &Regex) -> Navigation {
        let Some(restore) = self.restore_point else {
            return Navigation::AtLimit;
        };
        let start = self.view_top() + 1;
        for id in start..self.shown_end {
            if self.matches(id, pattern) {
                if id >= restore {
                    self.leave_scrollback();
                } else {
                    self.view = Some(id);
                    self.redraw = true;
                }
                return Navigation::Moved;
            }
        }
        Navigation::AtLimit
    }

    /// Drop the oldest lines beyond capacity; returns how many went.
    ///
    /// Nothing is trimmed while output is being held, and nothing at or
    /// after the live top is ever removed.
    pub fn trim(&mut self) -> usize {
        if self.hold_mode || self.autohold {
            return 0;
        }
        let mut removed = 0;
        let mut newest_removed = None;
        while self.lines.len() > self.options.capacity && self.base < self.top {
            let Some(line) = self.lines.pop_front() else {
                break;
            };
            while self.sources.front().map_or(false, |s| s.id < line.logical) {
                self.sources.pop_front();
            }
            if let Some(source) = self.sources.front_mut().filter(|s| s.id == line.logical) {
                source.trimmed += 1;
            }
            newest_removed = Some(line.when);
            self.base += 1;
            removed += 1;
        }
        if removed > 0 {
            self.trim_sources();
            let age = newest_removed.and_then(|t| t.elapsed().ok()).map(|d| d.as_secs());
            debug!(removed, age_secs = ?age, "scrollback trimmed");
        }
        removed
    }

    fn trim_sources(&mut self) {
        let oldest_logical = match self.lines.front() {
            Some(line) => line.logical,
            None => self.next_logical,
        };
        while self.sources.front().map_or(false, |s| s.id < oldest_logical) {
            self.sources.pop_front();
        }
    }

    /// Change the viewport height.
    ///
    /// Growth reveals older lines above; shrinking uses blank rows first so
    /// the newest shown lines stay on screen.
    pub fn set_height(&mut self, height: usize) {
        let old = self.height;
        self.height = height;
        if height > old {
            let grow = (height - old) as u64;
            self.top = self.top.saturating_sub(grow).max(self.base);
        } else if height < old {
            self.settle_top();
        }
        self.redraw = true;
    }

    /// Blank the window; everything so far counts as seen
    pub fn clear(&mut self) {
        if self.is_scrolled_back() {
            self.view = None;
            self.restore_point = None;
            self.autohold = false;
        }
        self.shown_end = self.tail();
        self.lines_held = 0;
        self.page_count = 0;
        self.top = self.shown_end;
        self.redraw = true;
        self.status_dirty = true;
    }

    /// Bring back the last page of history after a clear
    pub fn unclear(&mut self) {
        self.top = self.shown_end.saturating_sub(self.height as u64).max(self.base);
        self.redraw = true;
    }

    /// Discard lines that were held and never seen
    pub fn flush_held(&mut self) -> usize {
        let flushed = self.lines_held;
        if flushed == 0 {
            return 0;
        }
        let keep = (self.shown_end - self.base) as usize;
        let last_logical = keep.checked_sub(1).and_then(|i| self.lines.get(i)).map(|l| l.logical);
        let cut_short = self
            .lines
            .range(keep..)
            .filter(|l| Some(l.logical) == last_logical)
            .count();
        self.lines.truncate(keep);
        self.lines_held = 0;
        self.sources
            .retain(|s| last_logical.map_or(false, |last| s.id <= last));
        if let Some(source) = self.sources.back_mut().filter(|s| Some(s.id) == last_logical) {
            source.flushed += cut_short;
        }
        self.status_dirty = true;
        flushed
    }

    /// Re-wrap every retained logical line with new layout options.
    ///
    /// Line handles are reissued; the live view is re-anchored at the newest
    /// admitted line and a scrollback view at the same logical line. Parts of
    /// a logical line that were trimmed or flushed stay gone.
    pub fn rewrap(&mut self, options: &LayoutOptions) {
        let view_logical = self.view.and_then(|id| self.line(id)).map(|l| l.logical);
        let admitted_logical = if self.shown_end > self.base {
            self.line(self.shown_end - 1).map(|l| l.logical)
        } else {
            None
        };

        let mut lines = VecDeque::new();
        for source in &mut self.sources {
            let wrapped: Vec<String> = layout::wrap(&source.text, options).collect();
            let kept = source.kept_range(wrapped.len());
            source.trimmed = kept.start;
            source.flushed = wrapped.len() - kept.end;
            source.wrapped = wrapped.len();
            for text in wrapped.into_iter().take(kept.end).skip(kept.start) {
                lines.push_back(DisplayLine {
                    text,
                    logical: source.id,
                    when: source.when,
                });
            }
        }
        self.lines = lines;

        let first_of = |lines: &VecDeque<DisplayLine>, logical: u64| {
            lines.iter().position(|l| l.logical == logical).map(|i| i as u64)
        };
        let after = |lines: &VecDeque<DisplayLine>, logical: u64| {
            lines.iter().position(|l| l.logical > logical).map_or(lines.len(), |i| i) as u64
        };

        let base = self.base;
        self.shown_end = base + admitted_logical.map_or(0, |l| after(&self.lines, l));
        self.lines_held = (self.tail() - self.shown_end) as usize;
        self.top = self.shown_end.saturating_sub(self.height as u64).max(base);

        if self.restore_point.is_some() {
            let view = view_logical
                .and_then(|l| first_of(&self.lines, l))
                .map_or(self.top, |i| base + i);
            self.view = Some(view.min(self.top));
            self.restore_point = Some(self.top);
        }
        self.redraw = true;
        self.trim();
        debug!(lines = self.lines.len(), width = options.width, "scrollback rewrapped");
    }

    /// Structural invariants; used by tests and debug builds
    pub fn check(&self) {
        debug_assert!(self.base <= self.top, "live top before oldest line");
        debug_assert!(self.top <= self.shown_end, "live top after shown end");
        debug_assert!(self.shown_end <= self.tail(), "shown end after tail");
        debug_assert!(self.cursor() <= self.height || self.height == 0);
        if let Some(view) = self.view {
            debug_assert!(view >= self.base && view <= self.tail());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn filled(height: usize, count: usize, options: FlowOptions) -> Scrollback {
        let mut sb = Scrollback::new(height, options);
        for i in 0..count {
            push(&mut sb, &format!("line {i}"));
        }
        sb
    }

    fn push(sb: &mut Scrollback, text: &str) -> bool {
        let logical = sb.begin_logical(text);
        sb.append(text.to_string(), logical);
        sb.admit()
    }

    fn shown(sb: &Scrollback) -> Vec<String> {
        sb.visible().map(|l| l.text.clone()).collect()
    }

    #[test]
    fn test_live_view_follows_tail() {
        let sb = filled(3, 5, FlowOptions::default());
        assert_eq!(sb.top(), 2);
        assert_eq!(sb.cursor(), 3);
        assert_eq!(shown(&sb), vec!["line 2", "line 3", "line 4"]);
        sb.check();
    }

    #[test]
    fn test_scroll_lines_step() {
        let options = FlowOptions {
            scroll_lines: 3,
            ..FlowOptions::default()
        };
        let sb = filled(5, 6, options);
        assert_eq!(sb.top(), 3);
        assert_eq!(sb.cursor(), 3);
    }

    #[test]
    fn test_hold_mode_suppresses_after_a_page() {
        let mut sb = Scrollback::new(5, FlowOptions::default());
        sb.set_hold_mode(true);
        for i in 0..5 {
            assert!(push(&mut sb, &format!("l{i}")));
        }
        assert!(!push(&mut sb, "l5"));
        assert_eq!(sb.lines_held(), 1);
        assert_eq!(sb.len(), 6);

        sb.set_hold_mode(false);
        assert_eq!(sb.lines_held(), 0);
        assert!(push(&mut sb, "l6"));
        assert_eq!(shown(&sb), vec!["l2", "l3", "l4", "l5", "l6"]);
    }

    #[test]
    fn test_suppression_is_sticky_until_released() {
        let mut sb = Scrollback::new(2, FlowOptions::default());
        sb.set_hold_mode(true);
        push(&mut sb, "a");
        push(&mut sb, "b");
        assert!(!push(&mut sb, "c"));
        assert!(!push(&mut sb, "d"));
        assert!(sb.release());
        assert_eq!(sb.lines_held(), 0);
        assert_eq!(shown(&sb), vec!["c", "d"]);
        // the released lines fill the new page
        assert!(!push(&mut sb, "e"));
    }

    #[test]
    fn test_status_refresh_every_interval() {
        let mut sb = Scrollback::new(1, FlowOptions::default());
        sb.set_hold_mode(true);
        push(&mut sb, "seen");
        sb.take_status_dirty();

        for i in 1..10 {
            push(&mut sb, &format!("held {i}"));
            assert!(!sb.take_status_dirty(), "refreshed after {i}");
        }
        push(&mut sb, "held 10");
        assert!(sb.take_status_dirty());
        assert_eq!(sb.held_indicator(), 10);
    }

    #[test]
    fn test_scroll_back_and_forward_restores() {
        let mut sb = filled(3, 10, FlowOptions::default());
        let original = sb.view_top();

        assert_eq!(sb.scroll_backward(3), Navigation::Moved);
        assert_eq!(sb.view_top(), original - 3);
        assert_eq!(sb.restore_point(), Some(original));
        assert!(sb.autohold());

        assert_eq!(sb.scroll_forward(3), Navigation::Moved);
        assert_eq!(sb.view_top(), original);
        assert_eq!(sb.restore_point(), None);
        assert!(!sb.autohold());
    }

    #[test]
    fn test_scrolled_back_output_is_held_then_shown() {
        let mut sb = filled(3, 6, FlowOptions::default());
        sb.scroll_backward(2);
        assert!(!push(&mut sb, "new"));
        assert_eq!(sb.lines_held(), 1);

        sb.scroll_end();
        assert_eq!(sb.lines_held(), 0);
        assert_eq!(shown(&sb), vec!["line 4", "line 5", "new"]);
    }

    #[test]
    fn test_navigation_limits() {
        let mut sb = filled(3, 3, FlowOptions::default());
        // everything already fits: nothing older to show
        assert_eq!(sb.scroll_backward(1), Navigation::AtLimit);
        assert_eq!(sb.scroll_forward(1), Navigation::AtLimit);
        assert_eq!(sb.scroll_end(), Navigation::AtLimit);

        let mut sb = filled(3, 8, FlowOptions::default());
        assert_eq!(sb.scroll_start(), Navigation::Moved);
        assert_eq!(sb.view_top(), 0);
        assert_eq!(sb.scroll_backward(1), Navigation::AtLimit);
    }

    #[test]
    fn test_page_uses_ratio() {
        let mut sb = filled(10, 40, FlowOptions::default());
        let top = sb.view_top();
        sb.page_backward();
        assert_eq!(sb.view_top(), top - 5);
    }

    #[test]
    fn test_search_backward_and_forward() {
        let mut sb = Scrollback::new(2, FlowOptions::default());
        for text in ["alpha", "\x02beta\x02", "gamma", "delta", "epsilon"] {
            push(&mut sb, text);
        }
        let re = Regex::new("^beta$").unwrap();
        assert_eq!(sb.search_backward(&re), Navigation::Moved);
        assert_eq!(sb.view_top(), 1);

        let missing = Regex::new("zeta").unwrap();
        assert_eq!(sb.search_backward(&missing), Navigation::AtLimit);
        assert_eq!(sb.view_top(), 1);

        let re = Regex::new("gamma").unwrap();
        assert_eq!(sb.search_forward(&re), Navigation::Moved);
        assert_eq!(sb.view_top(), 2);
        assert!(sb.is_scrolled_back());

        let re = Regex::new("epsilon").unwrap();
        assert_eq!(sb.search_forward(&re), Navigation::Moved);
        assert!(!sb.is_scrolled_back());
    }

    #[test]
    fn test_trim_respects_capacity_and_view() {
        let options = FlowOptions {
            capacity: 5,
            ..FlowOptions::default()
        };
        let mut sb = filled(3, 12, options);
        assert_eq!(sb.trim(), 7);
        assert_eq!(sb.len(), 5);
        assert_eq!(sb.oldest(), 7);
        assert!(sb.line(6).is_none());
        assert_eq!(sb.line(7).map(|l| l.text.as_str()), Some("line 7"));
        sb.check();
    }

    #[test]
    fn test_trim_never_removes_visible_lines() {
        let options = FlowOptions {
            capacity: 1,
            ..FlowOptions::default()
        };
        let mut sb = filled(4, 6, options);
        sb.trim();
        assert_eq!(sb.oldest(), sb.top());
        assert_eq!(shown(&sb).len(), 4);
    }

    #[test]
    fn test_no_trim_while_holding() {
        let options = FlowOptions {
            capacity: 2,
            ..FlowOptions::default()
        };
        let mut sb = filled(2, 6, options);
        sb.scroll_backward(1);
        assert_eq!(sb.trim(), 0);
        sb.scroll_end();
        sb.set_hold_mode(true);
        assert_eq!(sb.trim(), 0);
        sb.set_hold_mode(false);
        assert!(sb.trim() > 0);
    }

    #[test]
    fn test_resize_grow_reveals_history() {
        let mut sb = filled(3, 10, FlowOptions::default());
        sb.set_height(5);
        assert_eq!(sb.top(), 5);
        assert_eq!(shown(&sb).len(), 5);

        sb.set_height(2);
        assert_eq!(sb.top(), 8);
        assert_eq!(shown(&sb), vec!["line 8", "line 9"]);
    }

    #[test]
    fn test_shrink_uses_blank_rows_first() {
        let mut sb = filled(10, 3, FlowOptions::default());
        sb.set_height(4);
        assert_eq!(sb.top(), 0);
        assert_eq!(sb.cursor(), 3);
    }

    #[test]
    fn test_flush_held() {
        let mut sb = Scrollback::new(2, FlowOptions::default());
        sb.set_hold_mode(true);
        for text in ["a", "b", "c", "d"] {
            push(&mut sb, text);
        }
        assert_eq!(sb.flush_held(), 2);
        assert_eq!(sb.len(), 2);
        assert_eq!(sb.tail(), 2);
        // the shown page is still full
        assert!(!push(&mut sb, "e"));
    }

    #[test]
    fn test_clear_and_unclear() {
        let mut sb = filled(3, 5, FlowOptions::default());
        sb.clear();
        assert_eq!(shown(&sb).len(), 0);
        assert_eq!(sb.cursor(), 0);
        sb.unclear();
        assert_eq!(shown(&sb), vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_rewrap_narrower() {
        let mut sb = Scrollback::new(10, FlowOptions::default());
        let wide = LayoutOptions::default().with_width(20);
        for text in ["aaaa bbbb cccc", "dddd"] {
            let logical = sb.begin_logical(text);
            for line in layout::wrap(text, &wide) {
                sb.append(line, logical);
                sb.admit();
            }
        }
        assert_eq!(sb.len(), 2);

        sb.rewrap(&LayoutOptions::default().with_width(9));
        assert_eq!(shown(&sb), vec!["aaaa bbbb", "cccc", "dddd"]);
        assert_eq!(sb.lines_held(), 0);
        sb.check();
    }

    fn push_wrapped(sb: &mut Scrollback, text: &str, options: &LayoutOptions) {
        let logical = sb.begin_logical(text);
        for line in layout::wrap(text, options) {
            sb.append(line, logical);
            sb.admit();
        }
    }

    fn retained(sb: &Scrollback) -> Vec<String> {
        (sb.oldest()..sb.tail())
            .filter_map(|id| sb.line(id))
            .map(|l| l.text.clone())
            .collect()
    }

    #[test]
    fn test_flush_then_rewrap_keeps_flushed_lines_out() {
        let text = "aaa bbb ccc ddd";
        let mut sb = Scrollback::new(2, FlowOptions::default());
        sb.set_hold_mode(true);
        push_wrapped(&mut sb, text, &LayoutOptions::default().with_width(4));
        assert_eq!(sb.len(), 4);
        assert_eq!(sb.flush_held(), 2);

        let wide = LayoutOptions::default().with_width(8);
        sb.rewrap(&wide);
        let first: Vec<String> = layout::wrap(text, &wide).take(1).collect();
        assert_eq!(retained(&sb), first);
        assert!(retained(&sb).iter().all(|l| !l.contains("ccc") && !l.contains("ddd")));
        assert_eq!(sb.lines_held(), 0);
        sb.check();
    }

    #[test]
    fn test_trim_then_rewrap_respects_capacity() {
        let options = FlowOptions {
            capacity: 3,
            ..FlowOptions::default()
        };
        let mut sb = Scrollback::new(2, options);
        push_wrapped(&mut sb, "aa bb cc dd ee ff", &LayoutOptions::default().with_width(2));
        assert_eq!(sb.len(), 6);
        assert_eq!(sb.trim(), 3);

        sb.rewrap(&LayoutOptions::default().with_width(5));
        assert!(sb.len() <= 3);
        assert!(retained(&sb).iter().all(|l| !l.contains("aa") && !l.contains("bb")));
        assert!(retained(&sb).iter().any(|l| l.contains("ff")));
        sb.check();

        // narrowing multiplies lines; the excess is trimmed again
        let options = FlowOptions {
            capacity: 4,
            ..FlowOptions::default()
        };
        let mut sb = Scrollback::new(2, options);
        let wide = LayoutOptions::default().with_width(10);
        for n in 1..=4 {
            push_wrapped(&mut sb, &format!("x{n} y{n}"), &wide);
        }
        sb.rewrap(&LayoutOptions::default().with_width(2));
        assert_eq!(sb.len(), 4);
        assert_eq!(retained(&sb), vec!["x3", "y3", "x4", "y4"]);
        sb.check();
    }

    #[test]
    fn test_stale_handle() {
        let sb = filled(2, 2, FlowOptions::default());
        assert!(sb.line(2).is_none());
        assert!(sb.line(1).is_some());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push,
        Back(usize),
        Forward(usize),
        Hold(bool),
        Release,
        Trim,
        Height(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            4 => Just(Op::Push),
            1 => (1usize..6).prop_map(Op::Back),
            1 => (1usize..6).prop_map(Op::Forward),
            1 => any::<bool>().prop_map(Op::Hold),
            1 => Just(Op::Release),
            2 => Just(Op::Trim),
            1 => (0usize..8).prop_map(Op::Height),
        ]
    }

    proptest! {
        #[test]
        fn prop_trim_keeps_bounds_and_view(ops in prop::collection::vec(op(), 1..120)) {
            let options = FlowOptions { capacity: 6, ..FlowOptions::default() };
            let mut sb = Scrollback::new(3, options);
            for op in ops {
                match op {
                    Op::Push => { push(&mut sb, "x"); }
                    Op::Back(n) => { sb.scroll_backward(n); }
                    Op::Forward(n) => { sb.scroll_forward(n); }
                    Op::Hold(on) => sb.set_hold_mode(on),
                    Op::Release => { sb.release(); }
                    Op::Height(h) => sb.set_height(h),
                    Op::Trim => {
                        let holding = sb.hold_mode() || sb.autohold();
                        let top = sb.view_top();
                        let tail = sb.tail();
                        sb.trim();
                        if !holding {
                            prop_assert!(sb.len() <= 6 || sb.oldest() == sb.top());
                        }
                        for id in top..tail {
                            prop_assert!(sb.line(id).is_some());
                        }
                    }
                }
                sb.check();
                prop_assert!(sb.cursor() <= sb.height() || sb.height() == 0);
            }
        }
    }
}
