//! Window management - windows tiled on screens.
//!
//! This module provides everything between normalized text and the painter:
//!
//! - **compositor**: Top-level `Compositor` context owning screens and windows
//! - **screen**: One physical terminal and the windows stacked on it
//! - **window**: A viewport with its own scrollback
//! - **scrollback**: Bounded line history and hold-mode flow control
//! - **geometry**: Row arithmetic for splitting, resizing and reflowing
//!
//! # Module Hierarchy
//!
//! ```text
//! wm/
//! ├── mod.rs        - Module exports
//! ├── compositor.rs - Compositor (top-level coordinator)
//! ├── screen.rs     - Screen (container for windows)
//! ├── window.rs     - Window (viewport + scrollback)
//! ├── scrollback.rs - Scrollback (line arena + flow control)
//! └── geometry.rs   - Slot arithmetic
//! ```

pub mod compositor;
pub mod geometry;
pub mod screen;
pub mod scrollback;
pub mod window;

pub use compositor::{Compositor, CompositorOptions, ResizeMode};
pub use screen::ScreenId;
pub use scrollback::FlowOptions;
pub use window::WindowId;
