use std::thread;

use crate::log::log_level::LogLevel;

/// One queued line. The producing thread's name is captured at the call
/// site since the transport spreads work over named threads (`pacer-*`,
/// `rtcp-timer-*`, `ice-loopback-*`).
#[derive(Debug, Clone)]
pub struct LogMsg {
    pub level: LogLevel,
    pub ts_ms: u128,
    pub thread: Option<String>,
    pub target: &'static str,
    pub text: String,
}

impl LogMsg {
    pub fn now(level: LogLevel, text: impl Into<String>, target: &'static str, ts_ms: u128) -> Self {
        Self {
            level,
            ts_ms,
            thread: thread::current().name().map(str::to_owned),
            target,
            text: text.into(),
        }
    }

    /// `[LEVEL] ts_ms thread target | text`
    pub fn format_line(&self) -> String {
        format!(
            "[{}] {} {} {} | {}",
            self.level,
            self.ts_ms,
            self.thread.as_deref().unwrap_or("-"),
            self.target,
            self.text
        )
    }
}
