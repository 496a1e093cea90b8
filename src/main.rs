//! termcomp - a display compositor for interactive terminal clients
//!
//! termcomp takes output lines carrying in-band formatting (ANSI SGR, mIRC
//! colors, bare control bytes) and shows them in windows stacked on a
//! terminal, each with its own scrollback and optional hold mode.
//!
//! # Features
//!
//! - **Windows**: Split, close, hide, resize and rebalance
//! - **Scrollback**: Page through history, search with a regex
//! - **Hold Mode**: Output waits until the reader asks for the next page
//! - **Resize-safe**: Lines are re-wrapped when the terminal changes width
//!
//! # Quick Start
//!
//! ```text
//! termcomp               # Interactive mode
//! termcomp --demo        # Render a scripted session and print it
//! termcomp log.txt       # Show the lines of a file, then go interactive
//! ```
//!
//! # Keybindings
//!
//! | Key | Action |
//! |-----|--------|
//! | Enter | Send the input line, release held output |
//! | Ctrl+N / Ctrl+W | Open / close a window |
//! | Ctrl+O / Ctrl+P | Next / previous window |
//! | Ctrl+E / Ctrl+U | Hide the current window / show the last hidden one |
//! | Ctrl+Y / Ctrl+A | Remember the current window / go back to it |
//! | Ctrl+X | Toggle fixed size |
//! | F5 | Redraw the current window |
//! | Ctrl+G / Ctrl+F | Grow / shrink the current window |
//! | Ctrl+B | Rebalance windows |
//! | PgUp / PgDn | Page through scrollback |
//! | Up / Down | Scroll one line |
//! | Ctrl+S | Toggle hold mode |
//! | Ctrl+D | Discard held output |
//! | Ctrl+L / Ctrl+K | Clear the window / bring its last page back |
//! | Ctrl+R / Ctrl+T | Search back / forward for the input text |
//! | Esc / Ctrl+Q | Quit |

mod config;
mod core;
mod error;
mod ui;
mod wm;

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::Config;
use crate::error::CompositorError;
use crate::ui::{Backend, CrosstermBackend, MemoryBackend, QueuedBackend};
use crate::wm::{Compositor, CompositorOptions, ResizeMode, ScreenId};

/// Command line options
#[derive(Debug, Default)]
struct Args {
    demo: bool,
    hold: bool,
    queued: bool,
    config: Option<PathBuf>,
    file: Option<PathBuf>,
}

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("termcomp {}", VERSION);
}

fn print_help() {
    eprintln!("termcomp {} - A display compositor for terminal clients", VERSION);
    eprintln!();
    eprintln!("Usage: termcomp [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --demo                Render a scripted session and print the screen");
    eprintln!("  --hold                Start windows in hold mode");
    eprintln!("  --queued              Write to the terminal from a separate thread");
    eprintln!("  -c, --config <PATH>   Use a specific config file");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("FILE is shown line by line in the first window.");
    eprintln!();
    eprintln!("Keybindings:");
    eprintln!("  Enter                 Send the input line, release held output");
    eprintln!("  Ctrl+N                Open a window");
    eprintln!("  Ctrl+W                Close the current window");
    eprintln!("  Ctrl+O / Ctrl+P       Next / previous window");
    eprintln!("  Ctrl+E / Ctrl+U       Hide the window / show the last hidden one");
    eprintln!("  Ctrl+Y / Ctrl+A       Remember the window / go back to it");
    eprintln!("  Ctrl+X                Toggle fixed size");
    eprintln!("  F5                    Redraw the current window");
    eprintln!("  Ctrl+G / Ctrl+F       Grow / shrink the current window");
    eprintln!("  Ctrl+B                Rebalance windows");
    eprintln!("  PgUp / PgDn           Page through scrollback");
    eprintln!("  Ctrl+Home / Ctrl+End  Oldest line / back to live output");
    eprintln!("  Ctrl+S                Toggle hold mode");
    eprintln!("  Up / Down             Scroll one line");
    eprintln!("  Ctrl+D                Discard held output");
    eprintln!("  Ctrl+L / Ctrl+K       Clear the window / bring its last page back");
    eprintln!("  Ctrl+R / Ctrl+T       Search back / forward for the input text");
    eprintln!("  Esc / Ctrl+Q          Quit");
    eprintln!();
    eprintln!("Configuration: ~/.termcomp/config.toml");
    eprintln!("Log file:      ~/.termcomp/termcomp.log (filter with TERMCOMP_LOG)");
}

fn parse_args() -> Result<Args, String> {
    let args: Vec<String> = env::args().collect();
    let mut parsed = Args::default();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "--demo" => {
                parsed.demo = true;
            }
            "--hold" => {
                parsed.hold = true;
            }
            "--queued" => {
                parsed.queued = true;
            }
            "-c" | "--config" => {
                i += 1;
                if i >= args.len() {
                    return Err("Missing config path".to_string());
                }
                parsed.config = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
            arg => {
                if parsed.file.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                parsed.file = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }

    Ok(parsed)
}

/// Log to `~/.termcomp/termcomp.log`; the terminal belongs to the windows
fn init_logging(level: &str) {
    let log_path = config::data_dir()
        .map(|dir| dir.join("termcomp.log"))
        .unwrap_or_else(|| PathBuf::from("termcomp.log"));

    // Create log directory if needed
    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("TERMCOMP_LOG").unwrap_or_else(|_| EnvFilter::new(level));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

fn main() -> anyhow::Result<()> {
    let args = match parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Use --help for usage information");
            std::process::exit(1);
        }
    };

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    init_logging(&config.log.level);
    info!("termcomp {} starting", VERSION);

    let mut options = config.compositor_options();
    if args.hold {
        options.hold_mode = true;
    }

    let mut lines: Vec<Vec<u8>> = match &args.file {
        Some(path) => fs::read(path)?
            .split(|&b| b == b'\n')
            .map(|line| line.to_vec())
            .collect(),
        None => Vec::new(),
    };
    if lines.last().map_or(false, |l| l.is_empty()) {
        lines.pop();
    }

    if args.demo {
        return run_demo(options, &lines);
    }

    let mut backend = CrosstermBackend::stdout();
    backend.init()?;
    let mut backend = if args.queued {
        run_terminal(options, QueuedBackend::new(backend), &lines)?.into_inner()?
    } else {
        run_terminal(options, backend, &lines)?
    };
    backend.cleanup()?;
    Ok(())
}

/// Interactive session on the real terminal
/// Run interactively until the user quits; returns the backend for cleanup
fn run_terminal<B: Backend>(options: CompositorOptions, backend: B, lines: &[Vec<u8>]) -> anyhow::Result<B> {
    let mut compositor = Compositor::new(options);
    let screen = compositor.add_screen(backend)?;
    let window = compositor.open(screen)?;
    compositor.set_name(window, Some("main".to_string()))?;
    for line in lines {
        compositor.add_to_window(window, line)?;
    }
    compositor.update()?;

    run_main_loop(&mut compositor, screen)?;

    info!("termcomp exiting");
    Ok(compositor.retire_screen(screen)?)
}

enum Flow {
    Continue,
    Quit,
}

fn run_main_loop<B: Backend>(compositor: &mut Compositor<B>, screen: ScreenId) -> anyhow::Result<()> {
    let poll_timeout = Duration::from_millis(50);
    let mut input = String::new();

    loop {
        if !event::poll(poll_timeout)? {
            continue;
        }
        match event::read()? {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if let Flow::Quit = handle_key(compositor, screen, &mut input, key)? {
                    break;
                }
            }
            Event::Resize(cols, rows) => {
                let result = compositor.reflow(screen, rows as usize, cols as usize);
                report(compositor, result)?;
            }
            _ => {}
        }
        compositor.set_input(&input);
        compositor.update()?;
    }
    Ok(())
}

/// Show a refused operation in the current window; backend failures end the session
fn report<B: Backend>(compositor: &mut Compositor<B>, result: error::Result<()>) -> anyhow::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e @ (CompositorError::Io(_) | CompositorError::BackendClosed)) => Err(e.into()),
        Err(e) => {
            warn!("{}", e);
            if let Some(window) = compositor.current_window() {
                compositor.add_to_window(window, format!("*** {}", e).as_bytes())?;
            }
            Ok(())
        }
    }
}

fn handle_key<B: Backend>(
    compositor: &mut Compositor<B>,
    screen: ScreenId,
    input: &mut String,
    key: KeyEvent,
) -> anyhow::Result<Flow> {
    let Some(window) = compositor.current_window() else {
        return Ok(Flow::Quit);
    };
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    let result = match key.code {
        KeyCode::Esc => return Ok(Flow::Quit),
        KeyCode::Char('q') if ctrl => return Ok(Flow::Quit),
        KeyCode::Char('n') if ctrl => compositor.open(screen).map(|_| ()),
        KeyCode::Char('w') if ctrl => compositor.close(window),
        KeyCode::Char('o') if ctrl => compositor.next_window().map(|_| ()),
        KeyCode::Char('p') if ctrl => compositor.prev_window().map(|_| ()),
        KeyCode::Char('e') if ctrl => compositor.hide(window),
        KeyCode::Char('u') if ctrl => match compositor.hidden().last().copied() {
            Some(hidden) => compositor.show(hidden, screen),
            None => Ok(()),
        },
        KeyCode::Char('y') if ctrl => {
            compositor.push_window();
            Ok(())
        }
        KeyCode::Char('a') if ctrl => compositor.pop_window().map(|_| ()),
        KeyCode::Char('x') if ctrl => {
            let fixed = compositor.window(window).map_or(false, |w| w.fixed);
            compositor.set_fixed(window, !fixed)
        }
        KeyCode::Char('g') if ctrl => compositor.resize_window(window, 1, ResizeMode::Relative),
        KeyCode::Char('f') if ctrl => compositor.resize_window(window, -1, ResizeMode::Relative),
        KeyCode::Char('b') if ctrl => compositor.rebalance(screen),
        KeyCode::Char('s') if ctrl => {
            let on = compositor
                .window(window)
                .map_or(false, |w| w.scrollback.hold_mode());
            compositor.set_hold_mode(window, !on)
        }
        KeyCode::Char('r') if ctrl => {
            let pattern = std::mem::take(input);
            compositor.search_back(window, &pattern).map(|_| ())
        }
        KeyCode::Char('t') if ctrl => {
            let pattern = std::mem::take(input);
            compositor.search_forward(window, &pattern).map(|_| ())
        }
        KeyCode::Char('d') if ctrl => compositor.flush_held(window).map(|_| ()),
        KeyCode::Char('l') if ctrl => compositor.clear(window),
        KeyCode::Char('k') if ctrl => compositor.unclear(window),
        KeyCode::F(5) => compositor.repaint(window),
        KeyCode::Up => compositor.scroll_back(window, 1).map(|_| ()),
        KeyCode::Down => compositor.scroll_forward(window, 1).map(|_| ()),
        KeyCode::Home if ctrl => compositor.scroll_start(window).map(|_| ()),
        KeyCode::End if ctrl => compositor.scroll_end(window).map(|_| ()),
        KeyCode::PageUp => compositor.page_back(window).map(|_| ()),
        KeyCode::PageDown => compositor.page_forward(window).map(|_| ()),
        KeyCode::Enter => {
            let line = std::mem::take(input);
            let sent = if line.is_empty() {
                Ok(())
            } else {
                compositor.add_to_window(window, line.as_bytes())
            };
            sent.and_then(|()| compositor.release(window).map(|_| ()))
        }
        KeyCode::Backspace => {
            input.pop();
            Ok(())
        }
        KeyCode::Char(c) if !ctrl => {
            input.push(c);
            Ok(())
        }
        _ => Ok(()),
    };
    report(compositor, result)?;
    Ok(Flow::Continue)
}

/// Scripted session rendered into memory
fn run_demo(options: CompositorOptions, lines: &[Vec<u8>]) -> anyhow::Result<()> {
    println!("=== termcomp Demo Mode ===\n");

    let mut compositor = Compositor::new(options);
    let screen = compositor.add_screen(MemoryBackend::new(60, 20))?;
    let main = compositor.open(screen)?;
    compositor.set_name(main, Some("main".to_string()))?;

    let script: &[&[u8]] = &[
        b"\x1b[32mWelcome to termcomp!\x1b[0m",
        b"This is \x1b[1mbold\x1b[0m and \x1b[4munderlined\x1b[0m text.",
        b"Colors: \x1b[31mRed\x1b[0m \x1b[32mGreen\x1b[0m \x0312mIRC blue\x03",
        b"A long line wraps at word boundaries when it reaches the right edge of the window.",
        b"Tabs\tline\tup and a bell rings\x07 once.",
        b"Broken escape \x1b[12",
    ];
    for line in script.iter().copied().chain(lines.iter().map(Vec::as_slice)) {
        compositor.add_to_window(main, line)?;
    }

    let status = compositor.open(screen)?;
    compositor.set_name(status, Some("held".to_string()))?;
    compositor.resize_window(status, 3, ResizeMode::Absolute)?;
    compositor.set_hold_mode(status, true)?;
    for n in 1..=6 {
        compositor.add_to_window(status, format!("held output {}", n).as_bytes())?;
    }

    compositor.set_input("/msg demo hello");
    compositor.update()?;
    if let Some(s) = compositor.screen(screen) {
        println!("{}", s.painter.backend().render());
    }

    // The terminal shrinks: windows are reflowed and lines re-wrapped
    if let Some(s) = compositor.screen_mut(screen) {
        s.painter.backend_mut().resize(44, 14);
    }
    compositor.reflow(screen, 14, 44)?;
    compositor.update()?;
    compositor.check();

    println!("\n=== After resizing to 44x14 ===\n");
    let backend = compositor.retire_screen(screen)?;
    println!("{}", backend.render());
    let (row, col) = backend.cursor();
    println!(
        "{} backend calls, {} flushes, {} bells, cursor at row {} col {}",
        backend.ops().len(),
        backend.flushes(),
        backend.bells(),
        row,
        col
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn press<B: Backend>(c: &mut Compositor<B>, screen: ScreenId, input: &mut String, key: KeyEvent) -> Flow {
        handle_key(c, screen, input, key).unwrap()
    }

    #[test]
    fn test_hide_and_show_keys() {
        let mut c = Compositor::new(CompositorOptions::default());
        let screen = c.add_screen(MemoryBackend::new(40, 24)).unwrap();
        c.open(screen).unwrap();
        let mut input = String::new();

        press(&mut c, screen, &mut input, ctrl('n'));
        assert_eq!(c.windows_on(screen).len(), 2);
        press(&mut c, screen, &mut input, ctrl('e'));
        assert_eq!(c.windows_on(screen).len(), 1);
        assert_eq!(c.hidden().len(), 1);

        press(&mut c, screen, &mut input, ctrl('u'));
        assert_eq!(c.windows_on(screen).len(), 2);
        assert!(c.hidden().is_empty());
        // nothing left to show
        assert!(matches!(press(&mut c, screen, &mut input, ctrl('u')), Flow::Continue));
        c.check();
    }

    #[test]
    fn test_fixed_toggle_key() {
        let mut c = Compositor::new(CompositorOptions::default());
        let screen = c.add_screen(MemoryBackend::new(40, 24)).unwrap();
        let w = c.open(screen).unwrap();
        let mut input = String::new();

        press(&mut c, screen, &mut input, ctrl('x'));
        assert!(c.window(w).unwrap().fixed);
        press(&mut c, screen, &mut input, ctrl('x'));
        assert!(!c.window(w).unwrap().fixed);
    }

    #[test]
    fn test_refused_operation_is_reported_in_window() {
        let mut c = Compositor::new(CompositorOptions::default());
        let screen = c.add_screen(MemoryBackend::new(80, 24)).unwrap();
        let w = c.open(screen).unwrap();
        let mut input = String::new();

        // closing the only window is refused, not fatal
        assert!(matches!(press(&mut c, screen, &mut input, ctrl('w')), Flow::Continue));
        let sb = &c.window(w).unwrap().scrollback;
        let last = sb.line(sb.tail() - 1).unwrap();
        assert!(last.text.starts_with("*** "));
    }

    #[test]
    fn test_typing_and_quit() {
        let mut c = Compositor::new(CompositorOptions::default());
        let screen = c.add_screen(MemoryBackend::new(40, 24)).unwrap();
        let w = c.open(screen).unwrap();
        let mut input = String::new();

        for ch in "hi".chars() {
            press(&mut c, screen, &mut input, KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE));
        }
        assert_eq!(input, "hi");
        press(&mut c, screen, &mut input, KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
        assert!(input.is_empty());
        let sb = &c.window(w).unwrap().scrollback;
        assert_eq!(sb.line(sb.tail() - 1).unwrap().text, "hi");

        assert!(matches!(press(&mut c, screen, &mut input, ctrl('q')), Flow::Quit));
    }
}
