//! Compositor - routes output through windows tiled on screens
//!
//! The compositor is the single context object every display operation goes
//! through. It owns all screens and windows and the normalizer, and each
//! screen owns the one painter allowed to write to its terminal.
//!
//! Geometry changes always rebuild a screen's row list from scratch with the
//! helpers in [`super::geometry`] and then check that the rows add up.

use std::collections::HashMap;

use regex::Regex;
use tracing::{debug, error, info, warn};
use unicode_width::UnicodeWidthChar;

use crate::core::layout::LayoutOptions;
use crate::core::normalize::{NormalizeOptions, Normalizer};
use crate::error::{CompositorError, Result};
use crate::ui::{Backend, Capabilities, Painter};

use super::geometry::{self, Slot, STATUS_ROWS};
use super::screen::{ReflowReason, Screen, ScreenId};
use super::scrollback::{FlowOptions, Navigation, Scrollback};
use super::window::{LineEffect, Window, WindowId};

/// Smallest terminal a screen can lay out: one status row and the input row
const MIN_ROWS: usize = STATUS_ROWS + geometry::INPUT_ROWS;

/// How the delta of a resize is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
    /// Grow (positive) or shrink (negative) by the delta
    Relative,
    /// The delta is the new height
    Absolute,
}

#[derive(Debug, Clone)]
pub struct CompositorOptions {
    pub layout: LayoutOptions,
    pub flow: FlowOptions,
    pub normalize: NormalizeOptions,
    /// Split the tallest window even when the current one has room
    pub always_split_biggest: bool,
    /// Hold mode for newly opened windows
    pub hold_mode: bool,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            flow: FlowOptions::default(),
            normalize: NormalizeOptions::default(),
            always_split_biggest: true,
            hold_mode: false,
        }
    }
}

fn violation(message: String) -> ! {
    error!("{}", message);
    panic!("{}", message);
}

fn slots_for(windows: &HashMap<WindowId, Window>, order: &[WindowId]) -> Vec<Slot> {
    order
        .iter()
        .map(|id| match windows.get(id) {
            Some(w) => Slot {
                height: w.height,
                fixed: w.fixed,
            },
            None => violation(format!("screen lists unknown window {}", id)),
        })
        .collect()
}

/// Geometry sum and membership of one screen
fn check_screen<B: Backend>(windows: &HashMap<WindowId, Window>, screen: &Screen<B>) {
    if screen.windows.is_empty() {
        return;
    }
    for id in &screen.windows {
        match windows.get(id) {
            Some(w) if w.screen == Some(screen.id) => {}
            Some(w) => violation(format!(
                "window {} is listed on screen {} but claims {:?}",
                id, screen.id, w.screen
            )),
            None => violation(format!("screen {} lists unknown window {}", screen.id, id)),
        }
    }
    let used = geometry::rows_used(&slots_for(windows, &screen.windows));
    if used != screen.window_rows() {
        violation(format!(
            "screen {} windows use {} rows of {}",
            screen.id,
            used,
            screen.window_rows()
        ));
    }
}

/// Move and size every window of `screen` after its slot list
fn apply_slots<B: Backend>(
    windows: &mut HashMap<WindowId, Window>,
    screen: &mut Screen<B>,
    slots: &[Slot],
    reason: ReflowReason,
) {
    let tops = geometry::positions(slots);
    for ((id, slot), top) in screen.windows.iter().zip(slots).zip(tops) {
        if let Some(window) = windows.get_mut(id) {
            window.move_to(top);
            window.resize(slot.height);
        }
    }
    screen.layout_generation += 1;
    debug!(
        screen = screen.id,
        ?reason,
        generation = screen.layout_generation,
        windows = screen.windows.len(),
        "layout changed"
    );
    check_screen(windows, screen);
}

/// Paint the current view of a window and blank the rows below it
fn repaint_window<B: Backend>(painter: &mut Painter<B>, window: &Window, cols: u16) -> Result<()> {
    let top = window.top as u16;
    let height = window.height as u16;
    let mut row = 0u16;
    for line in window.scrollback.visible() {
        painter.paint_line(top + row, &line.text, cols, false)?;
        row += 1;
    }
    if row < height {
        painter.clear_rows(top + row, height - row, cols)?;
    }
    Ok(())
}

/// Tail of the input text that fits in `width` columns
fn input_tail(text: &str, width: usize) -> (&str, usize) {
    let mut used = 0;
    let mut start = text.len();
    for (i, c) in text.char_indices().rev() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        start = i;
    }
    (&text[start..], used)
}

fn refresh_screen<B: Backend>(screen: &mut Screen<B>, windows: &mut HashMap<WindowId, Window>) -> Result<()> {
    let cols = screen.cols as u16;
    if screen.take_clear() {
        screen.painter.clear_screen()?;
        for id in &screen.windows {
            if let Some(window) = windows.get_mut(id) {
                window.mark_redraw();
                window.mark_status();
            }
        }
    }

    for id in &screen.windows {
        let Some(window) = windows.get_mut(id) else {
            continue;
        };
        if window.take_redraw() {
            repaint_window(&mut screen.painter, window, cols)?;
        }
        if window.take_status_dirty() {
            let status = window.status_line(screen.current == Some(*id));
            screen.painter.paint_status(window.status_row() as u16, &status, cols)?;
        }
    }

    let input_row = screen.input_row() as u16;
    let (shown, width) = input_tail(screen.input(), screen.cols.saturating_sub(1));
    let shown = shown.to_string();
    if screen.take_input_dirty() {
        screen.painter.clear_rows(input_row, 1, cols)?;
        screen.painter.move_cursor(input_row, 0)?;
        screen.painter.write_plain(&shown)?;
    }
    screen.painter.move_cursor(input_row, width as u16)?;
    screen.painter.flush()?;
    Ok(())
}

pub struct Compositor<B: Backend> {
    screens: HashMap<ScreenId, Screen<B>>,
    /// Screen order (oldest first)
    screen_order: Vec<ScreenId>,
    current_screen: Option<ScreenId>,
    windows: HashMap<WindowId, Window>,
    /// Windows not on any screen, oldest first
    hidden: Vec<WindowId>,
    /// Saved windows for `pop_window`
    window_stack: Vec<WindowId>,
    next_window_id: WindowId,
    next_screen_id: ScreenId,
    normalizer: Normalizer,
    options: CompositorOptions,
}

impl<B: Backend> Compositor<B> {
    pub fn new(options: CompositorOptions) -> Self {
        Self {
            screens: HashMap::new(),
            screen_order: Vec::new(),
            current_screen: None,
            windows: HashMap::new(),
            hidden: Vec::new(),
            window_stack: Vec::new(),
            next_window_id: 1,
            next_screen_id: 1,
            normalizer: Normalizer::new(options.normalize),
            options,
        }
    }

    pub fn screen(&self, id: ScreenId) -> Option<&Screen<B>> {
        self.screens.get(&id)
    }

    pub fn screen_mut(&mut self, id: ScreenId) -> Option<&mut Screen<B>> {
        self.screens.get_mut(&id)
    }

    pub fn window(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(&id)
    }

    /// Windows of a screen, top to bottom
    pub fn windows_on(&self, screen: ScreenId) -> &[WindowId] {
        self.screens
            .get(&screen)
            .map(|s| s.windows.as_slice())
            .unwrap_or(&[])
    }

    pub fn hidden(&self) -> &[WindowId] {
        &self.hidden
    }

    /// Window receiving input on the current screen
    pub fn current_window(&self) -> Option<WindowId> {
        self.current_screen
            .and_then(|id| self.screens.get(&id))
            .and_then(|s| s.current)
    }

    fn get_window(&self, id: WindowId) -> Result<&Window> {
        self.windows.get(&id).ok_or(CompositorError::UnknownWindow(id))
    }

    fn get_window_mut(&mut self, id: WindowId) -> Result<&mut Window> {
        self.windows.get_mut(&id).ok_or(CompositorError::UnknownWindow(id))
    }

    /// Screen a visible window is on
    fn screen_of(&self, id: WindowId) -> Result<ScreenId> {
        let screen = self.get_window(id)?.screen.ok_or(CompositorError::NotOnScreen(id))?;
        match self.screens.get(&screen) {
            Some(s) if s.windows.contains(&id) => Ok(screen),
            _ => violation(format!("window {} claims screen {} which does not list it", id, screen)),
        }
    }

    /// Take over a terminal; its size is queried once here
    pub fn add_screen(&mut self, backend: B) -> Result<ScreenId> {
        let (cols, rows) = backend.size()?;
        let (cols, rows) = (cols as usize, rows as usize);
        if rows < MIN_ROWS {
            return Err(CompositorError::ScreenTooSmall {
                rows,
                needed: MIN_ROWS,
            });
        }
        let caps = backend.capabilities();
        if !caps.intersects(Capabilities::SCROLL_REGION | Capabilities::INSERT_DELETE_LINE) {
            warn!("terminal cannot scroll a region, windows will repaint instead");
        }
        if !caps.contains(Capabilities::COLOR) {
            warn!("terminal has no color, color markers are ignored");
        }

        let id = self.next_screen_id;
        self.next_screen_id += 1;
        self.screens.insert(id, Screen::new(id, Painter::new(backend), cols, rows));
        self.screen_order.push(id);
        self.current_screen.get_or_insert(id);
        info!(screen = id, rows, cols, ?caps, "screen added");
        Ok(id)
    }

    /// Give a terminal back; its windows become hidden
    pub fn retire_screen(&mut self, id: ScreenId) -> Result<B> {
        let screen = self.screens.remove(&id).ok_or(CompositorError::UnknownScreen(id))?;
        self.screen_order.retain(|&s| s != id);
        if self.current_screen == Some(id) {
            self.current_screen = self.screen_order.first().copied();
        }
        for window_id in &screen.windows {
            if let Some(window) = self.windows.get_mut(window_id) {
                window.screen = None;
                self.hidden.push(*window_id);
            }
        }
        info!(screen = id, hidden = screen.windows.len(), "screen retired");
        Ok(screen.painter.into_backend())
    }

    /// Open a new window on `screen` and make it current
    pub fn open(&mut self, screen: ScreenId) -> Result<WindowId> {
        let cols = self
            .screens
            .get(&screen)
            .map(|s| s.cols)
            .ok_or(CompositorError::UnknownScreen(screen))?;
        let id = self.next_window_id;
        let mut window = Window::new(id, cols, self.options.layout.clone(), self.options.flow);
        window.scrollback.set_hold_mode(self.options.hold_mode);
        self.windows.insert(id, window);

        if let Err(e) = self.place(id, screen, ReflowReason::Open) {
            self.windows.remove(&id);
            warn!(screen, "cannot open window: {}", e);
            return Err(e);
        }
        self.next_window_id += 1;
        self.current_screen = Some(screen);
        info!(window = id, screen, "window opened");
        Ok(id)
    }

    /// Put an off-screen window onto `screen`, splitting a window for it
    fn place(&mut self, id: WindowId, screen_id: ScreenId, reason: ReflowReason) -> Result<()> {
        let screen = self
            .screens
            .get_mut(&screen_id)
            .ok_or(CompositorError::UnknownScreen(screen_id))?;
        let mut slots = slots_for(&self.windows, &screen.windows);
        let index = if slots.is_empty() {
            slots.push(Slot::new(screen.window_rows().saturating_sub(STATUS_ROWS)));
            0
        } else {
            let current = screen.current.and_then(|c| screen.position_of(c));
            let target = geometry::split_target(&slots, current, self.options.always_split_biggest)?;
            geometry::split(&mut slots, target)?
        };

        if let Some(previous) = screen.current.and_then(|c| self.windows.get_mut(&c)) {
            previous.mark_status();
        }
        let window = self.windows.get_mut(&id).ok_or(CompositorError::UnknownWindow(id))?;
        window.screen = Some(screen_id);
        window.set_columns(screen.cols);
        window.mark_redraw();
        window.mark_status();

        screen.windows.insert(index, id);
        screen.current = Some(id);
        apply_slots(&mut self.windows, screen, &slots, reason);
        Ok(())
    }

    /// Take a window off its screen and give its rows to the others
    fn detach(&mut self, id: WindowId, reason: ReflowReason) -> Result<()> {
        let screen_id = self.screen_of(id)?;
        let screen = self
            .screens
            .get_mut(&screen_id)
            .ok_or(CompositorError::UnknownScreen(screen_id))?;
        if screen.windows.len() == 1 {
            return Err(CompositorError::LastWindow(id));
        }
        let Some(index) = screen.position_of(id) else {
            violation(format!("window {} missing from screen {}", id, screen_id));
        };
        screen.windows.remove(index);
        if screen.current == Some(id) {
            let next = screen.windows[index.min(screen.windows.len() - 1)];
            screen.current = Some(next);
            if let Some(window) = self.windows.get_mut(&next) {
                window.mark_status();
            }
        }
        if let Some(window) = self.windows.get_mut(&id) {
            window.screen = None;
        }

        let mut slots = slots_for(&self.windows, &screen.windows);
        geometry::distribute(&mut slots, screen.window_rows());
        apply_slots(&mut self.windows, screen, &slots, reason);
        Ok(())
    }

    /// Close a window; the last window of a screen cannot be closed
    pub fn close(&mut self, id: WindowId) -> Result<()> {
        if self.get_window(id)?.screen.is_some() {
            self.detach(id, ReflowReason::Close)?;
        }
        self.windows.remove(&id);
        self.hidden.retain(|&w| w != id);
        self.window_stack.retain(|&w| w != id);
        info!(window = id, "window closed");
        Ok(())
    }

    /// Move a window off screen, keeping its scrollback
    pub fn hide(&mut self, id: WindowId) -> Result<()> {
        self.detach(id, ReflowReason::Hide)?;
        self.hidden.push(id);
        info!(window = id, "window hidden");
        Ok(())
    }

    /// Bring a hidden window back onto `screen`
    pub fn show(&mut self, id: WindowId, screen: ScreenId) -> Result<()> {
        if self.get_window(id)?.screen.is_some() {
            return Err(CompositorError::AlreadyVisible(id));
        }
        self.place(id, screen, ReflowReason::Show)?;
        self.hidden.retain(|&w| w != id);
        self.current_screen = Some(screen);
        info!(window = id, screen, "window shown");
        Ok(())
    }

    pub fn set_current(&mut self, id: WindowId) -> Result<()> {
        let screen_id = self.screen_of(id)?;
        let Some(screen) = self.screens.get_mut(&screen_id) else {
            return Err(CompositorError::UnknownScreen(screen_id));
        };
        if let Some(previous) = screen.current.replace(id) {
            if let Some(window) = self.windows.get_mut(&previous) {
                window.mark_status();
            }
        }
        if let Some(window) = self.windows.get_mut(&id) {
            window.mark_status();
        }
        self.current_screen = Some(screen_id);
        Ok(())
    }

    fn cycle(&mut self, forward: bool) -> Result<Option<WindowId>> {
        let Some(current) = self.current_window() else {
            return Ok(None);
        };
        let screen_id = self.screen_of(current)?;
        let order = self.windows_on(screen_id);
        let Some(pos) = order.iter().position(|&w| w == current) else {
            return Ok(None);
        };
        let next = if forward {
            order[(pos + 1) % order.len()]
        } else {
            order[(pos + order.len() - 1) % order.len()]
        };
        self.set_current(next)?;
        Ok(Some(next))
    }

    /// Make the window below the current one current (wrapping)
    pub fn next_window(&mut self) -> Result<Option<WindowId>> {
        self.cycle(true)
    }

    pub fn prev_window(&mut self) -> Result<Option<WindowId>> {
        self.cycle(false)
    }

    /// Remember the current window
    pub fn push_window(&mut self) {
        if let Some(id) = self.current_window() {
            self.window_stack.push(id);
        }
    }

    /// Return to the most recently pushed window still alive.
    ///
    /// A hidden window is shown on the current screen first.
    pub fn pop_window(&mut self) -> Result<Option<WindowId>> {
        while let Some(id) = self.window_stack.pop() {
            let Some(window) = self.windows.get(&id) else {
                continue;
            };
            if window.screen.is_none() {
                let screen = self.current_screen.ok_or(CompositorError::NotOnScreen(id))?;
                self.show(id, screen)?;
            }
            self.set_current(id)?;
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Grow or shrink a window, taking the rows from its next neighbor
    pub fn resize_window(&mut self, id: WindowId, delta: isize, mode: ResizeMode) -> Result<()> {
        let screen_id = self.screen_of(id)?;
        let window = self.get_window(id)?;
        if window.fixed {
            return Err(CompositorError::FixedSize(id));
        }
        let delta = match mode {
            ResizeMode::Relative => delta,
            ResizeMode::Absolute => delta - window.height as isize,
        };
        if delta == 0 {
            return Ok(());
        }

        let screen = self
            .screens
            .get_mut(&screen_id)
            .ok_or(CompositorError::UnknownScreen(screen_id))?;
        let index = screen
            .position_of(id)
            .ok_or(CompositorError::NotOnScreen(id))?;
        let mut slots = slots_for(&self.windows, &screen.windows);
        if let Err(e) = geometry::resize(&mut slots, index, delta) {
            warn!(window = id, delta, "resize refused");
            return Err(e);
        }
        apply_slots(&mut self.windows, screen, &slots, ReflowReason::Resize);
        Ok(())
    }

    /// Give every resizeable window on a screen the same height
    pub fn rebalance(&mut self, screen_id: ScreenId) -> Result<()> {
        let screen = self
            .screens
            .get_mut(&screen_id)
            .ok_or(CompositorError::UnknownScreen(screen_id))?;
        let mut slots = slots_for(&self.windows, &screen.windows);
        if !geometry::rebalance(&mut slots) {
            return Err(CompositorError::AllFixed(screen_id));
        }
        apply_slots(&mut self.windows, screen, &slots, ReflowReason::Rebalance);
        Ok(())
    }

    /// Fit a screen's windows to a new terminal size.
    ///
    /// Windows at the bottom (never the current one) are hidden while the
    /// rows cannot hold every status row.
    pub fn reflow(&mut self, screen_id: ScreenId, rows: usize, cols: usize) -> Result<()> {
        if rows < MIN_ROWS {
            warn!(screen = screen_id, rows, "terminal too small to lay out");
            return Err(CompositorError::ScreenTooSmall {
                rows,
                needed: MIN_ROWS,
            });
        }
        let screen = self
            .screens
            .get_mut(&screen_id)
            .ok_or(CompositorError::UnknownScreen(screen_id))?;
        screen.rows = rows;
        screen.cols = cols;
        screen.request_clear();
        if screen.windows.is_empty() {
            return Ok(());
        }

        let available = screen.window_rows();
        let mut slots = slots_for(&self.windows, &screen.windows);
        while geometry::required_rows(&slots) > available && screen.windows.len() > 1 {
            let Some(index) = (0..screen.windows.len())
                .rev()
                .find(|&i| Some(screen.windows[i]) != screen.current)
            else {
                break;
            };
            let id = screen.windows.remove(index);
            slots.remove(index);
            if let Some(window) = self.windows.get_mut(&id) {
                window.screen = None;
            }
            self.hidden.push(id);
            info!(window = id, screen = screen_id, "window hidden, screen too small");
        }

        geometry::distribute(&mut slots, available);
        for id in &screen.windows {
            if let Some(window) = self.windows.get_mut(id) {
                window.set_columns(cols);
            }
        }
        apply_slots(&mut self.windows, screen, &slots, ReflowReason::TerminalResized);
        Ok(())
    }

    /// Pin a window's height so rebalance and reflow leave it alone
    pub fn set_fixed(&mut self, id: WindowId, fixed: bool) -> Result<()> {
        let window = self.get_window_mut(id)?;
        window.fixed = fixed;
        window.mark_status();
        Ok(())
    }

    pub fn set_name(&mut self, id: WindowId, name: Option<String>) -> Result<()> {
        let window = self.get_window_mut(id)?;
        window.name = name;
        window.mark_status();
        Ok(())
    }

    pub fn set_hold_mode(&mut self, id: WindowId, on: bool) -> Result<()> {
        let window = self.get_window_mut(id)?;
        window.scrollback.set_hold_mode(on);
        window.mark_status();
        info!(window = id, hold_mode = on, "hold mode set");
        Ok(())
    }

    /// The reader has seen the page; show the next held lines
    pub fn release(&mut self, id: WindowId) -> Result<bool> {
        Ok(self.get_window_mut(id)?.scrollback.release())
    }

    /// Run a scrollback move; ring the bell when there is nowhere to go
    fn navigate(
        &mut self,
        id: WindowId,
        action: impl FnOnce(&mut Scrollback) -> Navigation,
    ) -> Result<Navigation> {
        let window = self.windows.get_mut(&id).ok_or(CompositorError::UnknownWindow(id))?;
        let outcome = action(&mut window.scrollback);
        window.mark_status();
        if outcome == Navigation::AtLimit {
            debug!(window = id, "nothing to scroll to");
            if let Some(screen) = window.screen.and_then(|s| self.screens.get_mut(&s)) {
                screen.painter.bell()?;
                screen.painter.flush()?;
            }
        }
        Ok(outcome)
    }

    pub fn scroll_back(&mut self, id: WindowId, lines: usize) -> Result<Navigation> {
        self.navigate(id, |sb| sb.scroll_backward(lines))
    }

    pub fn scroll_forward(&mut self, id: WindowId, lines: usize) -> Result<Navigation> {
        self.navigate(id, |sb| sb.scroll_forward(lines))
    }

    pub fn page_back(&mut self, id: WindowId) -> Result<Navigation> {
        self.navigate(id, Scrollback::page_backward)
    }

    pub fn page_forward(&mut self, id: WindowId) -> Result<Navigation> {
        self.navigate(id, Scrollback::page_forward)
    }

    pub fn scroll_start(&mut self, id: WindowId) -> Result<Navigation> {
        self.navigate(id, Scrollback::scroll_start)
    }

    pub fn scroll_end(&mut self, id: WindowId) -> Result<Navigation> {
        self.navigate(id, Scrollback::scroll_end)
    }

    /// Scroll back to the nearest older line matching `pattern`
    pub fn search_back(&mut self, id: WindowId, pattern: &str) -> Result<Navigation> {
        let regex = Regex::new(pattern)?;
        self.navigate(id, |sb| sb.search_backward(&regex))
    }

    pub fn search_forward(&mut self, id: WindowId, pattern: &str) -> Result<Navigation> {
        let regex = Regex::new(pattern)?;
        self.navigate(id, |sb| sb.search_forward(&regex))
    }

    pub fn clear(&mut self, id: WindowId) -> Result<()> {
        self.get_window_mut(id)?.scrollback.clear();
        Ok(())
    }

    pub fn unclear(&mut self, id: WindowId) -> Result<()> {
        self.get_window_mut(id)?.scrollback.unclear();
        Ok(())
    }

    /// Throw away held output the reader never saw
    pub fn flush_held(&mut self, id: WindowId) -> Result<usize> {
        let flushed = self.get_window_mut(id)?.scrollback.flush_held();
        if flushed > 0 {
            info!(window = id, flushed, "held lines discarded");
        }
        Ok(flushed)
    }

    /// Text of the input row on the current screen
    pub fn set_input(&mut self, text: &str) {
        if let Some(screen) = self.current_screen.and_then(|id| self.screens.get_mut(&id)) {
            screen.set_input(text);
        }
    }

    /// Display one logical line of raw output in a window.
    ///
    /// Admitted lines are written straight away unless the window is waiting
    /// for a full repaint anyway.
    pub fn add_to_window(&mut self, id: WindowId, bytes: &[u8]) -> Result<()> {
        let normalized = self.normalizer.normalize(bytes);
        let window = self.windows.get_mut(&id).ok_or(CompositorError::UnknownWindow(id))?;
        let effects = window.add_line(&normalized);
        let held = effects
            .iter()
            .filter(|(_, effect)| *effect == LineEffect::Held)
            .count();
        debug!(window = id, lines = effects.len(), held, "output added");

        let Some(screen_id) = window.screen else {
            window.scrollback.trim();
            return Ok(());
        };
        let Some(screen) = self.screens.get_mut(&screen_id) else {
            violation(format!("window {} claims missing screen {}", id, screen_id));
        };
        let cols = screen.cols as u16;

        if !window.needs_redraw() && window.height > 0 {
            let top = window.top as u16;
            let bottom = top + window.height as u16 - 1;
            for (line_id, effect) in effects {
                let LineEffect::Shown { row, scrolled } = effect else {
                    continue;
                };
                if scrolled > 0 && !screen.painter.scroll(top, bottom, scrolled as u16)? {
                    window.mark_redraw();
                    break;
                }
                if let Some(line) = window.scrollback.line(line_id) {
                    screen.painter.paint_line(top + row as u16, &line.text, cols, true)?;
                }
            }
        }
        if !window.needs_redraw() && window.take_status_dirty() {
            let status = window.status_line(screen.current == Some(id));
            screen.painter.paint_status(window.status_row() as u16, &status, cols)?;
        }

        window.scrollback.trim();
        screen.painter.flush()?;
        Ok(())
    }

    /// Ask for a full repaint of one window at the next update
    pub fn repaint(&mut self, id: WindowId) -> Result<()> {
        let window = self.get_window_mut(id)?;
        window.mark_redraw();
        window.mark_status();
        Ok(())
    }

    /// Bring every screen up to date and end the frame
    pub fn update(&mut self) -> Result<()> {
        for id in &self.screen_order {
            if let Some(screen) = self.screens.get_mut(id) {
                refresh_screen(screen, &mut self.windows)?;
            }
        }
        Ok(())
    }

    /// Check every screen's geometry; panics on a violation
    pub fn check(&self) {
        for screen in self.screens.values() {
            check_screen(&self.windows, screen);
        }
        for id in &self.hidden {
            if self.windows.get(id).map_or(false, |w| w.screen.is_some()) {
                violation(format!("hidden window {} claims a screen", id));
            }
        }
    }
}
