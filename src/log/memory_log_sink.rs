use std::sync::Mutex;

use crate::log::{log_level::LogLevel, log_sink::LogSink};

/// Keeps every line in memory. Meant for tests that assert on emitted warnings.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured lines.
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Number of captured lines at `level` whose text contains `needle`.
    pub fn count(&self, level: LogLevel, needle: &str) -> usize {
        self.lines()
            .iter()
            .filter(|(l, text)| *l == level && text.contains(needle))
            .count()
    }
}

impl LogSink for MemoryLogSink {
    fn log(&self, level: LogLevel, msg: &str, _target: &'static str) {
        if let Ok(mut g) = self.lines.lock() {
            g.push((level, msg.to_owned()));
        }
    }
}
