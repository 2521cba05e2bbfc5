//! Periodic RTCP scheduling for one receive channel.
//!
//! The timer thread sleeps on a condition variable for at most the wake-up
//! interval, then decides which reports are due. [`RtcpTimer::signal`]
//! wakes it early (used for NACKs).

use std::{
    io,
    sync::{Arc, Condvar, Mutex},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{log::log_sink::LogSink, sink_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcpTimerConfig {
    pub wake_interval: Duration,
    pub feedback_interval: Duration,
    pub report_interval: Duration,
}

impl Default for RtcpTimerConfig {
    fn default() -> Self {
        Self {
            wake_interval: Duration::from_millis(200),
            feedback_interval: Duration::from_millis(100),
            report_interval: Duration::from_millis(1000),
        }
    }
}

/// What a wake-up should send.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtcpDue {
    pub feedback: bool,
    pub report: bool,
    /// Woken by [`RtcpTimer::signal`].
    pub early: bool,
}

#[derive(Debug, Default)]
struct Flags {
    early: bool,
    stop: bool,
}

#[derive(Debug, Default)]
struct Wakeup {
    flags: Mutex<Flags>,
    cv: Condvar,
}

pub struct RtcpTimer {
    wakeup: Arc<Wakeup>,
    handle: Option<JoinHandle<()>>,
    logger: Arc<dyn LogSink>,
}

impl RtcpTimer {
    pub fn start<F>(
        name: String,
        config: RtcpTimerConfig,
        mut on_due: F,
        logger: Arc<dyn LogSink>,
    ) -> io::Result<Self>
    where
        F: FnMut(RtcpDue) + Send + 'static,
    {
        let wakeup = Arc::new(Wakeup::default());
        let handle = {
            let wakeup = wakeup.clone();
            thread::Builder::new().name(name).spawn(move || {
                let start = Instant::now();
                let mut next_feedback = start + config.feedback_interval;
                let mut next_report = start + config.report_interval;
                loop {
                    let now = Instant::now();
                    let until_due = next_feedback.min(next_report).saturating_duration_since(now);
                    let timeout = config.wake_interval.min(until_due);

                    let early = {
                        let Ok(guard) = wakeup.flags.lock() else { break };
                        let Ok((mut guard, _)) = wakeup
                            .cv
                            .wait_timeout_while(guard, timeout, |f| !f.early && !f.stop)
                        else {
                            break;
                        };
                        if guard.stop {
                            break;
                        }
                        std::mem::take(&mut guard.early)
                    };

                    let now = Instant::now();
                    let mut due = RtcpDue {
                        early,
                        ..RtcpDue::default()
                    };
                    if now >= next_feedback {
                        due.feedback = true;
                        next_feedback = now + config.feedback_interval;
                    }
                    if now >= next_report {
                        due.report = true;
                        next_report = now + config.report_interval;
                    }
                    if due != RtcpDue::default() {
                        on_due(due);
                    }
                }
            })?
        };
        Ok(Self {
            wakeup,
            handle: Some(handle),
            logger,
        })
    }

    /// Wakes the timer now.
    pub fn signal(&self) {
        self.signaller().signal();
    }

    /// A cloneable handle that can only signal.
    pub fn signaller(&self) -> RtcpSignaller {
        RtcpSignaller {
            wakeup: self.wakeup.clone(),
        }
    }

    pub fn stop(&mut self) {
        if let Ok(mut f) = self.wakeup.flags.lock() {
            f.stop = true;
        }
        self.wakeup.cv.notify_all();
        if let Some(h) = self.handle.take()
            && h.join().is_err()
        {
            sink_warn!(self.logger, "[RTCP] timer thread panicked");
        }
    }
}

impl Drop for RtcpTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Clone)]
pub struct RtcpSignaller {
    wakeup: Arc<Wakeup>,
}

impl RtcpSignaller {
    pub fn signal(&self) {
        if let Ok(mut f) = self.wakeup.flags.lock() {
            f.early = true;
        }
        self.wakeup.cv.notify_one();
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::log::NoopLogSink;
    use std::sync::mpsc;

    #[test]
    fn periodic_and_early_wakeups() {
        let (tx, rx) = mpsc::channel();
        let cfg = RtcpTimerConfig {
            wake_interval: Duration::from_secs(10),
            feedback_interval: Duration::from_millis(30),
            report_interval: Duration::from_secs(60),
        };
        let mut t = RtcpTimer::start(
            "rtcp-test".into(),
            cfg,
            move |due| {
                let _ = tx.send(due);
            },
            Arc::new(NoopLogSink),
        )
        .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(first.feedback);
        assert!(!first.report);

        t.signal();
        let early = rx
            .iter()
            .take(20)
            .find(|d| d.early)
            .unwrap();
        assert!(!early.report);

        let start = Instant::now();
        t.stop();
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
