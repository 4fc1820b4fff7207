//! Shutdown aggregate error.

use std::fmt;

use thiserror::Error;

use crate::container::Site;
use crate::lifecycle::ContextError;
use crate::provider::BoxError;

/// What went wrong with a single closer.
#[derive(Debug, Error)]
pub enum CloseFailure {
    /// The closer reported an error.
    #[error("{0}")]
    Failed(BoxError),

    /// The closer did not report before the shutdown context was done.
    /// It keeps running in the background; its late result is discarded.
    #[error("{0}")]
    Interrupted(ContextError),

    /// The closer panicked.
    #[error("closer panicked: {0}")]
    Panicked(String),
}

/// A closer failure tagged with the place the closer was registered.
#[derive(Debug, Error)]
#[error("{site}: {failure}")]
pub struct CloserFailure {
    pub site: Site,
    pub failure: CloseFailure,
}

impl CloserFailure {
    /// Whether the closer was still running when shutdown stopped waiting.
    pub fn is_timeout(&self) -> bool {
        matches!(self.failure, CloseFailure::Interrupted(_))
    }
}

/// Every closer that failed during one shutdown, in completion order.
#[derive(Debug)]
pub struct ShutdownError {
    pub failures: Vec<CloserFailure>,
}

impl ShutdownError {
    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} closer(s) failed:", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "\n  {}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for ShutdownError {}
