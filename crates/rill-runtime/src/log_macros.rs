/// Domain-aware logging macros.
///
/// Each macro injects a `domain` field automatically so callers never need
/// to remember the string literal. Domains in use: `sys` (lifecycle),
/// `pipe` (engine task / hot path), `sink` (result delivery), `conf`
/// (configuration and source loading).
///
/// # Usage
///
/// ```ignore
/// rl_info!(sys, plans = 2, "engine bootstrap complete");
/// rl_warn!(sink, error = %e, "sink delivery failed");
/// ```

// ---------------------------------------------------------------------------
// Core macro — dispatches to the matching tracing level macro.
// ---------------------------------------------------------------------------

/// Internal helper. Do not call directly; use `rl_error!` … `rl_trace!`.
#[doc(hidden)]
macro_rules! rl_log {
    ($level:ident, $domain:ident, $($field:tt)*) => {
        tracing::$level!(domain = stringify!($domain), $($field)*)
    };
}

// ---------------------------------------------------------------------------
// Public per-level macros
// ---------------------------------------------------------------------------

/// Log at ERROR level with an automatic `domain` field.
#[allow(unused_macros)]
macro_rules! rl_error {
    ($domain:ident, $($rest:tt)*) => {
        rl_log!(error, $domain, $($rest)*)
    };
}

/// Log at WARN level with an automatic `domain` field.
macro_rules! rl_warn {
    ($domain:ident, $($rest:tt)*) => {
        rl_log!(warn, $domain, $($rest)*)
    };
}

/// Log at INFO level with an automatic `domain` field.
macro_rules! rl_info {
    ($domain:ident, $($rest:tt)*) => {
        rl_log!(info, $domain, $($rest)*)
    };
}

/// Log at DEBUG level with an automatic `domain` field.
macro_rules! rl_debug {
    ($domain:ident, $($rest:tt)*) => {
        rl_log!(debug, $domain, $($rest)*)
    };
}
