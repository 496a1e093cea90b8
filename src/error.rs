//! Error types for compositor operations

use std::io;
use thiserror::Error;

use crate::wm::{ScreenId, WindowId};

#[derive(Error, Debug)]
pub enum CompositorError {
    #[error("Unknown window: {0}")]
    UnknownWindow(WindowId),

    #[error("Unknown screen: {0}")]
    UnknownScreen(ScreenId),

    #[error("No window has room to split")]
    NoEligibleWindow,

    #[error("Not enough room to resize by {0} rows")]
    ResizeRefused(isize),

    #[error("Window {0} has a fixed size")]
    FixedSize(WindowId),

    #[error("Window {0} is the only window on its screen")]
    LastWindow(WindowId),

    #[error("All windows on screen {0} have a fixed size")]
    AllFixed(ScreenId),

    #[error("Screen needs at least {needed} rows, got {rows}")]
    ScreenTooSmall { rows: usize, needed: usize },

    #[error("Window {0} is not on a screen")]
    NotOnScreen(WindowId),

    #[error("Window {0} is already visible")]
    AlreadyVisible(WindowId),

    #[error("Backend I/O failed: {0}")]
    Io(#[source] io::Error),

    #[error("Invalid search pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Backend writer thread has stopped")]
    BackendClosed,
}

impl From<io::Error> for CompositorError {
    fn from(err: io::Error) -> Self {
        // a queued writer that went away reports a broken pipe
        if err.kind() == io::ErrorKind::BrokenPipe {
            CompositorError::BackendClosed
        } else {
            CompositorError::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, CompositorError>;
