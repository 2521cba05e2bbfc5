//! `sink_*` macros: format a line and hand it to any
//! [`LogSink`](crate::log::log_sink::LogSink) tagged with the caller's module.
//!
//! Each level is compiled in only when its cargo feature is on (`log-trace`
//! enables everything down to `log-error`). A compiled-out level expands to
//! `()`, so the pacer tick and the ICE callback pay nothing for it.

use crate::log::log_level::LogLevel;

/// Whether `level` survives the cargo log features of this build.
#[must_use]
pub const fn compiled_in(level: LogLevel) -> bool {
    match level {
        LogLevel::Trace => cfg!(feature = "log-trace"),
        LogLevel::Debug => cfg!(feature = "log-debug"),
        LogLevel::Info => cfg!(feature = "log-info"),
        LogLevel::Warn => cfg!(feature = "log-warn"),
        LogLevel::Error => cfg!(feature = "log-error"),
    }
}

#[macro_export]
macro_rules! sink_log {
    ($sink:expr, $lvl:expr, $($arg:tt)*) => {{
        let line = format!($($arg)*);
        $sink.log($lvl, &line, module_path!());
    }};
}

#[cfg(feature = "log-trace")]
#[macro_export]
macro_rules! sink_trace {
    ($sink:expr, $($arg:tt)*) => {
        $crate::sink_log!($sink, $crate::log::log_level::LogLevel::Trace, $($arg)*)
    };
}
#[cfg(not(feature = "log-trace"))]
#[macro_export]
macro_rules! sink_trace {
    ($($arg:tt)*) => {
        ()
    };
}

#[cfg(feature = "log-debug")]
#[macro_export]
macro_rules! sink_debug {
    ($sink:expr, $($arg:tt)*) => {
        $crate::sink_log!($sink, $crate::log::log_level::LogLevel::Debug, $($arg)*)
    };
}
#[cfg(not(feature = "log-debug"))]
#[macro_export]
macro_rules! sink_debug {
    ($($arg:tt)*) => {
        ()
    };
}

#[cfg(feature = "log-info")]
#[macro_export]
macro_rules! sink_info {
    ($sink:expr, $($arg:tt)*) => {
        $crate::sink_log!($sink, $crate::log::log_level::LogLevel::Info, $($arg)*)
    };
}
#[cfg(not(feature = "log-info"))]
#[macro_export]
macro_rules! sink_info {
    ($($arg:tt)*) => {
        ()
    };
}

#[cfg(feature = "log-warn")]
#[macro_export]
macro_rules! sink_warn {
    ($sink:expr, $($arg:tt)*) => {
        $crate::sink_log!($sink, $crate::log::log_level::LogLevel::Warn, $($arg)*)
    };
}
#[cfg(not(feature = "log-warn"))]
#[macro_export]
macro_rules! sink_warn {
    ($($arg:tt)*) => {
        ()
    };
}

#[cfg(feature = "log-error")]
#[macro_export]
macro_rules! sink_error {
    ($sink:expr, $($arg:tt)*) => {
        $crate::sink_log!($sink, $crate::log::log_level::LogLevel::Error, $($arg)*)
    };
}
#[cfg(not(feature = "log-error"))]
#[macro_export]
macro_rules! sink_error {
    ($($arg:tt)*) => {
        ()
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::{MemoryLogSink, log_sink::LogSink};

    #[test]
    fn enabled_levels_reach_the_sink() {
        let sink = MemoryLogSink::new();
        crate::sink_warn!(sink, "late packet seq={}", 7);
        crate::sink_error!(sink, "negotiation failed");
        let expected = usize::from(compiled_in(LogLevel::Warn)) + usize::from(compiled_in(LogLevel::Error));
        assert_eq!(sink.lines().len(), expected);
        if compiled_in(LogLevel::Warn) {
            assert_eq!(sink.count(LogLevel::Warn, "seq=7"), 1);
        }
    }
}
