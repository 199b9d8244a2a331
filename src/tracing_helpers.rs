//! Feature-gated logging macros.
//!
//! With the `tracing` feature enabled these forward to the corresponding
//! [`tracing`] macros; without it they expand to nothing, so hot paths carry
//! zero logging cost in default builds.

/// Trace-level event, compiled out unless the `tracing` feature is on.
macro_rules! trace_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::trace!($($arg)*);
    }};
}

/// Debug-level event, compiled out unless the `tracing` feature is on.
macro_rules! debug_log {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::debug!($($arg)*);
    }};
}

pub(crate) use debug_log;
pub(crate) use trace_log;
