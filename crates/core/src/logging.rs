//! Leveled, category-based logging for the CPU cores.
//!
//! - **LogConfig**: process-wide configuration held in atomics
//! - **LogLevel**: Off < Error < Warn < Info < Debug < Trace
//! - **LogCategory**: CPU execution, memory, interrupts, tracing
//! - **log()**: lazily formatted output, rate limited per category, written to
//!   stderr or handed to a background file writer
//! - **Logger**: key/value logging seam handed to components that only need
//!   diagnostics (memory reports out-of-bounds accesses through it)
//!
//! ```rust
//! use retro_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Cpu, LogLevel::Debug, || {
//!     format!("INT 21h at CS:IP={:04X}:{:04X}", 0x1000, 0x0104)
//! });
//! ```

use std::collections::VecDeque;
use std::fmt::{self, Display, Write as _};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }

    /// Upper-case tag used as the message prefix
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Off => "OFF",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

/// Log category for the different core components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Instruction fetch, decode and execution
    Cpu,
    /// Memory accesses (out-of-bounds reads and writes)
    Memory,
    /// Interrupt requests and dispatch
    Interrupts,
    /// Per-instruction tracing
    Trace,
}

impl LogCategory {
    const COUNT: usize = 4;

    const ALL: [LogCategory; Self::COUNT] = [
        LogCategory::Cpu,
        LogCategory::Memory,
        LogCategory::Interrupts,
        LogCategory::Trace,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::Cpu => 0,
            LogCategory::Memory => 1,
            LogCategory::Interrupts => 2,
            LogCategory::Trace => 3,
        }
    }
}

/// Per-category sliding window limiter (one second window)
struct RateLimiter {
    max_per_second: AtomicUsize,
    window: Duration,
    state: Mutex<[WindowState; LogCategory::COUNT]>,
}

#[derive(Default)]
struct WindowState {
    stamps: VecDeque<Instant>,
    dropped: usize,
    last_report: Option<Instant>,
}

impl RateLimiter {
    fn new(max_per_second: usize) -> Self {
        Self {
            max_per_second: AtomicUsize::new(max_per_second),
            window: Duration::from_secs(1),
            state: Mutex::new(Default::default()),
        }
    }

    /// Returns (allowed, dropped) where dropped is Some(n) when a drop summary is due
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let max = self.max_per_second.load(Ordering::Relaxed);
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let slot = &mut state[category.index()];

        while let Some(&front) = slot.stamps.front() {
            if now.duration_since(front) > self.window {
                slot.stamps.pop_front();
            } else {
                break;
            }
        }

        if slot.stamps.len() < max {
            slot.stamps.push_back(now);
            if slot.dropped > 0 {
                let dropped = std::mem::take(&mut slot.dropped);
                slot.last_report = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        slot.dropped += 1;
        let report_due = slot
            .last_report
            .map_or(true, |last| now.duration_since(last) >= self.window);
        if report_due {
            slot.last_report = Some(now);
            (false, Some(std::mem::take(&mut slot.dropped)))
        } else {
            (false, None)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    category_levels: [AtomicU8; LogCategory::COUNT],
    file_sender: Mutex<Option<Sender<String>>>,
    file_enabled: AtomicBool,
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// All logging off, 60 messages per second per category
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            category_levels: Default::default(),
            file_sender: Mutex::new(None),
            file_enabled: AtomicBool::new(false),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    /// Set log level for a specific category (Off falls back to the global level)
    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.category_levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.category_levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category level other than Off takes precedence over the global level
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        match self.get_level(category) {
            LogLevel::Off => level <= self.get_global_level(),
            category_level => level <= category_level,
        }
    }

    /// Reset all levels to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .max_per_second
            .store(max_logs_per_second, Ordering::Relaxed);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.max_per_second.load(Ordering::Relaxed)
    }

    /// Route output to a file written by a background thread.
    ///
    /// Replaces any previous log file; the old writer thread exits once its
    /// sender is dropped.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                    let _ = file.flush();
                }
            })?;

        if let Ok(mut slot) = self.file_sender.lock() {
            *slot = Some(sender);
        }
        self.file_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Stop writing to the log file and go back to stderr
    pub fn clear_log_file(&self) {
        if let Ok(mut slot) = self.file_sender.lock() {
            *slot = None;
        }
        self.file_enabled.store(false, Ordering::Relaxed);
    }

    fn write_message(&self, message: String) {
        if self.file_enabled.load(Ordering::Relaxed) {
            if let Ok(slot) = self.file_sender.lock() {
                if let Some(sender) = slot.as_ref() {
                    if let Err(failed) = sender.send(message) {
                        eprintln!("{}", failed.0);
                    }
                    return;
                }
            }
        }
        eprintln!("{}", message);
    }
}

/// Log a lazily formatted message for `category` at `level`.
///
/// The closure only runs when the level is enabled and the category is under
/// its rate limit. Dropped messages are summarized at most once per second.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (allowed, dropped) = config.rate_limiter.should_allow(category);
    if let Some(count) = dropped.filter(|&count| count > 0) {
        config.write_message(format!(
            "[{:?}] WARN rate limit exceeded, {} message(s) dropped in the last second",
            category, count
        ));
    }
    if allowed {
        config.write_message(format!("[{:?}] {} {}", category, level.tag(), message_fn()));
    }
}

/// A structured logger accepting leveled messages with key/value fields.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str, fields: &[(&str, &dyn Display)]);
}

/// Forwards key/value messages into [`log`] under a fixed category.
#[derive(Debug, Clone, Copy)]
pub struct GlobalLogger {
    category: LogCategory,
}

impl GlobalLogger {
    pub fn new(category: LogCategory) -> Self {
        Self { category }
    }
}

impl Logger for GlobalLogger {
    fn log(&self, level: LogLevel, message: &str, fields: &[(&str, &dyn Display)]) {
        log(self.category, level, || format_fields(message, fields));
    }
}

/// `message key=value key=value`
pub fn format_fields(message: &str, fields: &[(&str, &dyn Display)]) -> String {
    let mut out = String::from(message);
    for (key, value) in fields {
        let _ = write!(out, " {}={}", key, value);
    }
    out
}

/// Hex formatting helper for key/value fields
pub struct Hex<T>(pub T);

impl<T: fmt::UpperHex> Display for Hex<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#X}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("OFF"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("err"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("Warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("debug"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("TRACE"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("verbose"), None);
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Off < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::Cpu, LogLevel::Debug);

        assert!(config.should_log(LogCategory::Cpu, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Cpu, LogLevel::Trace));
        assert!(config.should_log(LogCategory::Memory, LogLevel::Error));
        assert!(!config.should_log(LogCategory::Memory, LogLevel::Warn));
    }

    #[test]
    fn test_off_messages_never_logged() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        assert!(!config.should_log(LogCategory::Cpu, LogLevel::Off));
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        config.set_level(LogCategory::Interrupts, LogLevel::Info);

        config.reset();

        assert_eq!(config.get_global_level(), LogLevel::Off);
        assert_eq!(config.get_level(LogCategory::Interrupts), LogLevel::Off);
    }

    #[test]
    fn test_rate_limiter_per_category() {
        let limiter = RateLimiter::new(5);
        for _ in 0..5 {
            assert!(limiter.should_allow(LogCategory::Memory).0);
        }
        assert!(!limiter.should_allow(LogCategory::Memory).0);
        assert!(limiter.should_allow(LogCategory::Cpu).0);
    }

    #[test]
    fn test_rate_limiter_reports_drops_after_window() {
        let limiter = RateLimiter::new(2);
        limiter.should_allow(LogCategory::Cpu);
        limiter.should_allow(LogCategory::Cpu);
        // First drop reports immediately, the rest accumulate
        assert_eq!(limiter.should_allow(LogCategory::Cpu), (false, Some(1)));
        for _ in 0..3 {
            assert_eq!(limiter.should_allow(LogCategory::Cpu), (false, None));
        }

        std::thread::sleep(Duration::from_millis(1100));

        assert_eq!(limiter.should_allow(LogCategory::Cpu), (true, Some(3)));
    }

    #[test]
    fn test_rate_limit_setting() {
        let config = LogConfig::new();
        assert_eq!(config.get_rate_limit(), 60);
        config.set_rate_limit(1000);
        assert_eq!(config.get_rate_limit(), 1000);
    }

    #[test]
    fn test_log_file_receives_messages() {
        let path = std::env::temp_dir().join(format!("retro_core_log_{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let config = LogConfig::new();
        config.set_log_file(path.clone()).unwrap();
        config.write_message("[Trace] TRACE 1000:0100 nop ".to_string());
        config.clear_log_file();

        let mut contents = String::new();
        for _ in 0..50 {
            contents = std::fs::read_to_string(&path).unwrap_or_default();
            if contents.ends_with('\n') {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        let _ = std::fs::remove_file(&path);
        assert_eq!(contents, "[Trace] TRACE 1000:0100 nop \n");
    }

    #[test]
    fn test_format_fields() {
        let fields: [(&str, &dyn Display); 2] = [("address", &Hex(0x12345u32)), ("size", &65536)];
        assert_eq!(
            format_fields("read out of bounds", &fields),
            "read out of bounds address=0x12345 size=65536"
        );
    }
}
