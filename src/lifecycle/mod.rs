//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Health scheduler:
//!     Shutdown (per scheduler) → Context::listening_to → per-scan with_timeout
//!
//! Container close:
//!     caller Context (deadline) → each closer raced against Context::done
//!     → failures folded into ShutdownError
//! ```
//!
//! # Design Decisions
//! - Cancellation stops waiting, it never aborts the task being waited on
//! - Deadlines only tighten when a child context is derived
//! - A triggered Shutdown stays triggered

pub mod context;
pub mod error;
pub mod shutdown;

pub use context::{Context, ContextError};
pub use error::{CloseFailure, CloserFailure, ShutdownError};
pub use shutdown::Shutdown;
