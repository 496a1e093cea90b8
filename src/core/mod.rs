//! Text pipeline components.
//!
//! This module contains the stages output passes through before it reaches
//! a window:
//!
//! - **markers**: The in-band marker alphabet and its tokenizer
//! - **glyphs**: Device-graphics codes and their look-alikes
//! - **normalize**: Raw bytes (ANSI, mIRC colors, controls) to markers
//! - **layout**: Word wrapping of normalized lines
//!
//! # Architecture
//!
//! ```text
//! raw bytes
//! └── Normalizer (marker alphabet)
//!     └── layout::wrap (physical lines)
//!         └── Scrollback (per window)
//! ```

pub mod glyphs;
pub mod layout;
pub mod markers;
pub mod normalize;
