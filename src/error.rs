//! Error taxonomy shared by the tree model, the transfer engine and the sync driver

use std::fmt;

use thiserror::Error;

pub type Result<T, E = SnapbackError> = std::result::Result<T, E>;

/// Which external command a [`SnapbackError::ProcessFailure`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    List,
    Create,
    Send,
    Receive,
    SizeProbe,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Create => write!(f, "create"),
            Self::Send => write!(f, "send"),
            Self::Receive => write!(f, "receive"),
            Self::SizeProbe => write!(f, "size probe"),
        }
    }
}

#[derive(Error, Debug)]
pub enum SnapbackError {
    /// Path resolution miss. `within` is empty when searched at the forest root.
    #[error("unable to find {segment}{}", within_suffix(.within))]
    NotFound { segment: String, within: String },

    #[error("malformed input `{input}`: {reason}")]
    MalformedInput { input: String, reason: String },

    #[error("unable to create {path}: {cause}")]
    CreationFailed {
        path: String,
        #[source]
        cause: Box<SnapbackError>,
    },

    #[error("{from} and {to} don't have a common snapshot")]
    DivergedHistory { from: String, to: String },

    #[error("{side} `{command}` failed with {cause}: {stderr}")]
    ProcessFailure {
        side: Side,
        command: String,
        cause: String,
        stderr: String,
    },

    #[error("unable to measure size of {snapshot}: {reason}")]
    SizeProbeFailed { snapshot: String, reason: String },

    #[error("invalid settings in {path}: {reason}")]
    Config { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn within_suffix(within: &str) -> String {
    if within.is_empty() {
        String::new()
    } else {
        format!(" in {within}")
    }
}

impl SnapbackError {
    pub(crate) fn malformed(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// The side of a failed external command, if this is a process failure.
    pub fn side(&self) -> Option<Side> {
        match self {
            Self::ProcessFailure { side, .. } => Some(*side),
            _ => None,
        }
    }
}
