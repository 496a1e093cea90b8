//! Terminal output.
//!
//! This module provides the render side of the compositor:
//!
//! - **backend**: The `Backend` trait and capability flags
//! - **painter**: Turns stored lines into backend calls (the only writer)
//! - **renderer**: Crossterm backend for a real terminal
//! - **memory**: In-memory grid backend for demos and tests
//! - **queued**: Backend wrapper that writes on a dedicated thread
//!
//! # Backends
//!
//! - **Interactive mode**: `CrosstermBackend`, optionally behind `QueuedBackend`
//! - **Demo mode**: `MemoryBackend`, printed once the script has run

pub mod backend;
pub mod memory;
pub mod painter;
pub mod queued;
pub mod renderer;

pub use backend::{Backend, Capabilities};
pub use memory::MemoryBackend;
pub use painter::Painter;
pub use queued::QueuedBackend;
pub use renderer::CrosstermBackend;
