//! Logging infrastructure for rowstore.
//!
//! rowstore uses `tracing` for structured logging. All events use target
//! "rowstore" and include an `event` field for filtering.
//!
//! ## Library Integration
//!
//! rowstore never initializes a global subscriber. Applications configure
//! tracing via `tracing_subscriber` or similar.
//!
//! ## Conventions
//!
//! - `event`: snake_case event name (required)
//! - `component`: subsystem (`"engine"`, `"store"`, `"cursor"`, `"interaction"`)
//! - Use `%` for Display, `?` for Debug formatting
//! - Never log row contents; counts and identifiers only

/// Target for all rowstore log events.
pub(crate) const ROWSTORE_TARGET: &str = "rowstore";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "engine",
///     event = "connected",
///     path = %path.display(),
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::ROWSTORE_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::ROWSTORE_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::ROWSTORE_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_warn;
