use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use super::{
    channel_stats::{ChannelStats, StatsSnapshot},
    media_kind::MediaKind,
};
use crate::{log::log_sink::LogSink, sink_debug, sink_warn};

pub const STATS_INTERVAL: Duration = Duration::from_millis(1000);
const POLL: Duration = Duration::from_millis(50);

/// Samples every registered channel's counters on a fixed interval and
/// hands the snapshots to `publish`.
pub struct StatsWorker {
    logger: Arc<dyn LogSink>,
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StatsWorker {
    pub fn start<F>(
        channels: Vec<(MediaKind, Arc<ChannelStats>)>,
        interval: Duration,
        publish: F,
        logger: Arc<dyn LogSink>,
    ) -> io::Result<Self>
    where
        F: Fn(Vec<StatsSnapshot>) + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop_flag = stop_flag.clone();
            let logger = logger.clone();
            thread::Builder::new().name("stats".into()).spawn(move || {
                let mut last = Instant::now();
                while !stop_flag.load(Ordering::SeqCst) {
                    thread::sleep(POLL.min(interval));
                    let elapsed = last.elapsed();
                    if elapsed < interval {
                        continue;
                    }
                    last = Instant::now();
                    let secs = elapsed.as_secs_f64();
                    let snapshots: Vec<StatsSnapshot> = channels
                        .iter()
                        .map(|(media, stats)| stats.sample(*media, secs))
                        .collect();
                    sink_debug!(logger, "[Stats] sampled {} channels", snapshots.len());
                    publish(snapshots);
                }
            })?
        };
        Ok(Self {
            logger,
            stop_flag,
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take()
            && h.join().is_err()
        {
            sink_warn!(self.logger, "[Stats] worker panicked");
        }
    }
}

impl Drop for StatsWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
