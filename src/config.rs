//! Configuration loading for termcomp.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.termcomp/config.toml`
//! - Conversion into the options the compositor runs with
//!
//! # Configuration File
//!
//! Every section and every key is optional:
//!
//! ```toml
//! [layout]
//! wrap = true            # false truncates long lines instead
//! word_break = " \t"
//! continuation = "+ "
//! indent = false
//!
//! [scrollback]
//! capacity = 256
//! hold_mode = false
//! scroll_ratio = 50      # percent of the window moved per page
//!
//! [normalize]
//! unprintable = "caret"  # caret, drop or pass
//! glyphs = "ascii"       # ascii or native
//!
//! [screen]
//! always_split_biggest = true
//!
//! [log]
//! level = "info"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::layout::LayoutOptions;
use crate::core::normalize::{GlyphMode, NormalizeOptions, UnprintableMode};
use crate::wm::{CompositorOptions, FlowOptions};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub layout: LayoutConfig,
    pub scrollback: ScrollbackConfig,
    pub normalize: NormalizeConfig,
    pub screen: ScreenConfig,
    pub log: LogConfig,
}

/// Wrapping settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub wrap: bool,
    pub word_break: String,
    pub continuation: String,
    pub indent: bool,
    pub max_bells: usize,
    pub max_tabs: usize,
    pub max_nd_spaces: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        let layout = LayoutOptions::default();
        Self {
            wrap: !layout.no_wrap,
            word_break: layout.word_break,
            continuation: layout.continuation,
            indent: layout.indent,
            max_bells: layout.max_bells,
            max_tabs: layout.max_tabs,
            max_nd_spaces: layout.max_nd_spaces,
        }
    }
}

/// Scrollback and hold settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollbackConfig {
    pub capacity: usize,
    pub hold_mode: bool,
    pub hold_interval: usize,
    pub hold_slider: usize,
    pub scroll_lines: usize,
    pub scroll_ratio: usize,
}

impl Default for ScrollbackConfig {
    fn default() -> Self {
        let flow = FlowOptions::default();
        Self {
            capacity: flow.capacity,
            hold_mode: false,
            hold_interval: flow.hold_interval,
            hold_slider: flow.hold_slider,
            scroll_lines: flow.scroll_lines,
            scroll_ratio: flow.scroll_ratio,
        }
    }
}

/// Control-code handling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub unprintable: UnprintableMode,
    pub glyphs: GlyphMode,
}

/// Window placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub always_split_biggest: bool,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            always_split_biggest: true,
        }
    }
}

/// Log file settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `TERMCOMP_LOG` is not set
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `~/.termcomp/config.toml`, falling back to
    /// defaults when it is missing or broken
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Get config file path
    pub fn config_path() -> Option<PathBuf> {
        data_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            word_break: self.layout.word_break.clone(),
            max_bells: self.layout.max_bells,
            max_tabs: self.layout.max_tabs,
            max_nd_spaces: self.layout.max_nd_spaces,
            ..LayoutOptions::default()
        }
        .with_no_wrap(!self.layout.wrap)
        .with_continuation(self.layout.continuation.clone())
        .with_indent(self.layout.indent)
    }

    pub fn flow_options(&self) -> FlowOptions {
        FlowOptions {
            capacity: self.scrollback.capacity,
            hold_interval: self.scrollback.hold_interval,
            hold_slider: self.scrollback.hold_slider,
            scroll_lines: self.scrollback.scroll_lines,
            scroll_ratio: self.scrollback.scroll_ratio,
        }
    }

    pub fn compositor_options(&self) -> CompositorOptions {
        CompositorOptions {
            layout: self.layout_options(),
            flow: self.flow_options(),
            normalize: NormalizeOptions {
                unprintable: self.normalize.unprintable,
                glyphs: self.normalize.glyphs,
            },
            always_split_biggest: self.screen.always_split_biggest,
            hold_mode: self.scrollback.hold_mode,
        }
    }
}

/// `~/.termcomp`, where the config and log live
pub fn data_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".termcomp"))
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
