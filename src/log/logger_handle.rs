use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
        mpsc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use crate::log::{log_level::LogLevel, log_msg::LogMsg, log_sink::LogSink};

/// Cloneable producer side of the [`Logger`](crate::log::logger::Logger) queue.
///
/// Lines below `min_level` are filtered before formatting reaches the queue;
/// lines that find the queue full are counted in `dropped`.
#[derive(Clone)]
pub struct LoggerHandle {
    pub(super) tx: mpsc::SyncSender<LogMsg>,
    pub(super) min_level: LogLevel,
    pub(super) dropped: Arc<AtomicU64>,
}

impl LogSink for LoggerHandle {
    #[inline]
    fn log(&self, level: LogLevel, msg: &str, target: &'static str) {
        let _ = self.try_log(level, msg, target);
    }
}

impl LoggerHandle {
    /// Enqueues a line without blocking. Returns false if it was filtered
    /// or lost.
    pub fn try_log<S: Into<String>>(&self, level: LogLevel, text: S, target: &'static str) -> bool {
        if level < self.min_level {
            return false;
        }
        let ts_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        match self.tx.try_send(LogMsg::now(level, text, target, ts_ms)) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Lines lost to a full queue or a stopped worker so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::{sync::mpsc::sync_channel, thread};

    fn handle(cap: usize, min_level: LogLevel) -> (LoggerHandle, mpsc::Receiver<LogMsg>) {
        let (tx, rx) = sync_channel(cap);
        let h = LoggerHandle {
            tx,
            min_level,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (h, rx)
    }

    #[test]
    fn line_carries_level_target_and_thread() {
        let (h, rx) = handle(4, LogLevel::Trace);
        thread::Builder::new()
            .name("pacer-video".into())
            .spawn(move || assert!(h.try_log(LogLevel::Warn, "queue full", "deskrtc::channel")))
            .unwrap()
            .join()
            .unwrap();

        let msg = rx.recv().unwrap();
        assert_eq!(msg.thread.as_deref(), Some("pacer-video"));
        assert!(msg.ts_ms > 0);
        assert!(msg.format_line().starts_with("[WARN] "));
        assert!(msg.format_line().ends_with("pacer-video deskrtc::channel | queue full"));
    }

    #[test]
    fn below_min_level_is_filtered_without_counting_a_drop() {
        let (h, rx) = handle(4, LogLevel::Info);
        assert!(!h.try_log(LogLevel::Debug, "per-packet detail", "t"));
        assert!(rx.try_recv().is_err());
        assert_eq!(h.dropped(), 0);
    }

    #[test]
    fn full_or_closed_queue_counts_drops() {
        let (h, rx) = handle(1, LogLevel::Trace);
        assert!(h.try_log(LogLevel::Info, "first", "t"));
        assert!(!h.try_log(LogLevel::Info, "second", "t"));
        drop(rx);
        let clone = h.clone();
        assert!(!clone.try_log(LogLevel::Error, "after stop", "t"));
        assert_eq!(h.dropped(), 2);
    }
}
