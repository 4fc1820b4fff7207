//! Registered health checks and closers.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::health::HealthError;
use crate::provider::BoxError;

/// Source location a hook was registered from, used to attribute failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site(&'static Location<'static>);

impl Site {
    #[track_caller]
    pub fn caller() -> Self {
        Self(Location::caller())
    }

    pub fn file(&self) -> &'static str {
        self.0.file()
    }

    pub fn line(&self) -> u32 {
        self.0.line()
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.0.file(), self.0.line())
    }
}

pub(crate) type CheckFn = Arc<dyn Fn() -> BoxFuture<'static, Option<HealthError>> + Send + Sync>;

pub(crate) type CloseFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

pub(crate) struct Hook<F> {
    pub site: Site,
    pub run: F,
}
