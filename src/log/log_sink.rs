use crate::log::log_level::LogLevel;

/// Destination for log lines. Implementations must never block the caller:
/// the transport logs from the ICE callback thread and the pacer tick.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, msg: &str, target: &'static str);
}

/// Discards everything. Used by tests and by callers that opt out of logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    #[inline]
    fn log(&self, _: LogLevel, _: &str, _: &'static str) {}
}
