//! Tracing and panic reporting (shared setup).
//!
//! These are the only process-wide hooks in the workspace; everything else is
//! passed explicitly from the composition root.

pub mod panic;
pub mod subscriber;

pub use panic::{install_panic_hook, panic_message};
pub use subscriber::{LogFormat, LogHandle, LogSettings, ObservabilityError, init};
