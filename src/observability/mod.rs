//! Observability
//!
//! Library code never configures the global logger. Components that log in
//! hot fuzzing paths carry their own verbosity and filter through [`gated!`]
//! before handing records to the `log` facade.

/// Log through the `log` facade only if `$level` passes `$verbosity`.
///
/// ```
/// use log::{Level, LevelFilter};
/// rustbox_fuzz::gated!(LevelFilter::Error, Level::Warn, "dropped: {}", 1);
/// ```
#[macro_export]
macro_rules! gated {
    ($verbosity:expr, $level:expr, $($arg:tt)+) => {{
        let level: ::log::Level = $level;
        if level <= $verbosity {
            ::log::log!(level, $($arg)+);
        }
    }};
}
