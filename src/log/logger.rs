use crate::{
    config::Config,
    log::{log_level::LogLevel, log_msg::LogMsg, logger_handle::LoggerHandle},
};

use std::{
    fs::{self, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
        mpsc,
    },
    thread,
    time::{SystemTime, UNIX_EPOCH},
};

/// Flush every 100 lines while debugging so a crash keeps the tail of the log.
#[cfg(feature = "log-debug")]
const FLUSH_BATCH_SIZE: u32 = 100;

#[cfg(not(feature = "log-debug"))]
const FLUSH_BATCH_SIZE: u32 = 1_000;

const DEFAULT_CAPACITY: usize = 4_096;

/// Bounded, non-blocking logger writing to a per-process file.
///
/// Producers (pacer, receive workers, the ICE engine thread) enqueue through a
/// [`LoggerHandle`]; a dedicated `logger-worker` thread owns the file. When the
/// queue is full the line is dropped instead of stalling the producer.
pub struct Logger {
    handle: LoggerHandle,
    _thread: Option<thread::JoinHandle<()>>,
    file_path: PathBuf,
}

impl Logger {
    /// Starts the logger using the `[Logging]` section (`log_path`,
    /// `log_filename`, `queue_capacity`, `level`). Without a configured path
    /// the file goes to `logs/` next to the executable.
    ///
    /// `level` only raises the floor set by the cargo log features.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let app_name = config.get_non_empty("Logging", "log_filename");
        let cap = config
            .get("Logging", "queue_capacity")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_CAPACITY);
        let min_level = config
            .get_non_empty("Logging", "level")
            .and_then(|v| v.parse::<LogLevel>().ok())
            .unwrap_or(LogLevel::Trace);

        let dir = match config.get_non_empty("Logging", "log_path") {
            Some(dir_str) => expand_path(dir_str),
            None => exe_dir_fallback_cwd().join("logs"),
        };
        Self::start_in_dir(dir, app_name, cap).with_min_level(min_level)
    }

    /// Starts the logger in `dir`, creating it if needed.
    ///
    /// The file is named `<app>-<YYYYMMDD_HHMMSS>-pid<pid>.log`.
    pub fn start_in_dir<D: AsRef<Path>>(dir: D, app_name: Option<&str>, cap: usize) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let _ = fs::create_dir_all(&dir);

        let ts = timestamp_for_filename();
        let pid = std::process::id();
        let fname = match app_name {
            Some(name) => format!("{name}-{ts}-pid{pid}.log"),
            None => format!("deskrtc-{ts}-pid{pid}.log"),
        };
        let file_path = dir.join(fname);

        let (tx, rx) = mpsc::sync_channel::<LogMsg>(cap.max(1));
        let worker_path = file_path.clone();
        let dropped = Arc::new(AtomicU64::new(0));
        let worker_dropped = dropped.clone();

        let _thread = thread::Builder::new()
            .name("logger-worker".into())
            .spawn(move || {
                // Target file -> temp file -> sink. Never panic.
                let writer: Box<dyn Write + Send> = if let Ok(f) = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&worker_path)
                {
                    Box::new(f)
                } else {
                    let fallback = std::env::temp_dir().join("deskrtc-fallback.log");
                    match OpenOptions::new().create(true).append(true).open(&fallback) {
                        Ok(f) => Box::new(f),
                        Err(_) => Box::new(io::sink()),
                    }
                };
                let mut out = BufWriter::new(writer);
                let mut lines_written: u32 = 0;

                while let Ok(m) = rx.recv() {
                    let _ = writeln!(&mut out, "{}", m.format_line());
                    lines_written = lines_written.wrapping_add(1);
                    if lines_written % FLUSH_BATCH_SIZE == 0 || m.level == LogLevel::Error {
                        let _ = out.flush();
                    }
                }
                let lost = worker_dropped.load(Ordering::Relaxed);
                if lost > 0 {
                    let _ = writeln!(&mut out, "[WARN] logger dropped {lost} lines on a full queue");
                }
                let _ = out.flush();
            })
            .ok();

        Self {
            handle: LoggerHandle {
                tx,
                min_level: LogLevel::Trace,
                dropped,
            },
            _thread,
            file_path,
        }
    }

    #[must_use]
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.handle.min_level = level;
        self
    }

    /// Enqueues a line without blocking; a full queue drops it.
    pub fn try_log<S: Into<String>>(&self, level: LogLevel, text: S, target: &'static str) -> bool {
        self.handle.try_log(level, text, target)
    }

    /// Cloneable sink for other threads.
    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }
}

fn exe_dir_fallback_cwd() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// `YYYYMMDD_HHMMSS` in UTC, or `unix_<secs>` if the civil conversion fails.
fn timestamp_for_filename() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    match unix_to_utc(secs) {
        Some((year, mon, day, hour, min, sec)) => {
            format!("{year:04}{mon:02}{day:02}_{hour:02}{min:02}{sec:02}")
        }
        None => format!("unix_{secs}"),
    }
}

/// Days-from-civil inverse (Howard Hinnant's algorithm).
#[allow(clippy::many_single_char_names)]
fn unix_to_utc(mut s: u64) -> Option<(i32, u32, u32, u32, u32, u32)> {
    let sec = (s % 60) as u32;
    s /= 60;
    let min = (s % 60) as u32;
    s /= 60;
    let hour = (s % 24) as u32;
    s /= 24;

    let z: i128 = i128::from(s) + 719_468;
    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = mp + if mp < 10 { 3 } else { -9 };

    let year = i32::try_from(y + i128::from(m <= 2)).ok()?;
    let mon = u32::try_from(m).ok()?;
    let day = u32::try_from(d).ok()?;
    Some((year, mon, day, hour, min, sec))
}

fn expand_path(path_str: &str) -> PathBuf {
    if let Some(rest) = path_str.strip_prefix('~') {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()
            .map(PathBuf::from);
        if let Some(mut home_path) = home {
            if rest.is_empty() {
                return home_path;
            }
            if let Some(tail) = rest.strip_prefix('/').or_else(|| rest.strip_prefix('\\')) {
                home_path.push(tail);
                return home_path;
            }
        }
    }
    PathBuf::from(path_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_converts_to_1970() {
        assert_eq!(unix_to_utc(0), Some((1970, 1, 1, 0, 0, 0)));
    }

    #[test]
    fn known_timestamp_converts() {
        // 2025-11-02 02:30:45 UTC
        assert_eq!(unix_to_utc(1_762_050_645), Some((2025, 11, 2, 2, 30, 45)));
    }

    #[test]
    fn worker_writes_formatted_lines_to_the_file() {
        let dir = std::env::temp_dir().join(format!("deskrtc-log-test-{}", std::process::id()));
        let logger = Logger::start_in_dir(&dir, Some("unit"), 16).with_min_level(LogLevel::Info);
        let path = logger.file_path().to_path_buf();
        assert!(logger.try_log(LogLevel::Error, "negotiation failed", "deskrtc::session"));
        assert!(!logger.try_log(LogLevel::Debug, "filtered", "deskrtc::session"));
        drop(logger);

        // The worker exits once every handle is gone; poll for the flush.
        let mut text = String::new();
        for _ in 0..100 {
            text = fs::read_to_string(&path).unwrap_or_default();
            if !text.is_empty() {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(text.contains("[ERROR]"));
        assert!(text.contains("deskrtc::session | negotiation failed"));
        assert!(!text.contains("filtered"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn plain_paths_are_untouched() {
        assert_eq!(expand_path("/var/log/x"), PathBuf::from("/var/log/x"));
    }
}
