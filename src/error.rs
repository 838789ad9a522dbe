use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Failures that callers of the library branch on.
///
/// Missing KPI anchors in solver output are not represented here: an
/// absent anchor simply leaves its key out of the extracted record.
#[derive(Debug, Error)]
pub enum SweepError {
    /// A raw instance file does not have the expected token shape.
    #[error("malformed instance {path:?}: {reason}")]
    MalformedInstance {
        /// File that failed to parse
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// The scalar parameter line to patch is absent from a converted file.
    #[error("parameter `{name}` not found in {path:?}")]
    ParameterNotFound {
        /// Converted instance file
        path: PathBuf,
        /// Parameter name that was searched for
        name: String,
    },

    /// The solver executable could not be started at all.
    #[error("failed to launch solver `{program}`: {source}")]
    SolverLaunch {
        /// Program that was spawned
        program: String,
        /// Underlying io error
        source: std::io::Error,
    },

    /// The solver ran but exited with a non-zero status.
    #[error("solver exited with {status}: {stderr}")]
    SolverExit {
        /// Exit status of the child
        status: ExitStatus,
        /// Tail of the captured standard error
        stderr: String,
    },

    /// The solver did not terminate within the configured timeout and was
    /// killed.
    #[error("solver timed out after {0:?}")]
    SolverTimeout(Duration),

    /// A model file name has no dialect mapping.
    #[error("no KPI dialect configured for model `{0}`")]
    UnknownModelDialect(String),

    /// A result table could not be opened or appended to.
    #[error("cannot persist results to {path:?}: {reason}")]
    Persistence {
        /// Result table file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// The sweep was cancelled between two iterations.
    #[error("sweep cancelled")]
    Cancelled,

    /// Any other io error, tagged with the file it concerns.
    #[error("io error on {path:?}: {source}")]
    Io {
        /// File or directory being accessed
        path: PathBuf,
        /// Underlying io error
        source: std::io::Error,
    },
}

impl SweepError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SweepError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        SweepError::MalformedInstance {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(
        path: impl Into<PathBuf>,
        reason: impl ToString,
    ) -> Self {
        SweepError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this failure must stop the whole sweep instead of only the
    /// current run.
    pub fn aborts_sweep(&self) -> bool {
        matches!(
            self,
            SweepError::SolverLaunch { .. }
                | SweepError::Persistence { .. }
                | SweepError::Cancelled
        )
    }
}
