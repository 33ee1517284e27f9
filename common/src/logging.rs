// Deferred-format logger
//
// Logging must never stall the ingress or matcher threads, so entries are
// handed to a background writer over an SPSC queue and formatted there.
// Static messages are the fast path; if the queue is full the entry is
// dropped rather than blocking.

use crate::spsc::SpscQueue;
use crate::time::{now_nanos, Nanos};

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug = 0,
    Info = 1,
    Warn = 2,
    Error = 3,
}

impl LogLevel {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Message payloads; formatting is deferred to the writer thread so the
/// hot path stays allocation-free for the common static cases.
pub enum LogMessage {
    Static(&'static str),
    StaticWithU64(&'static str, u64),
    Formatted(String),
}

impl LogMessage {
    fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            LogMessage::Static(s) => write!(writer, "{}", s),
            LogMessage::StaticWithU64(s, v) => write!(writer, "{}: {}", s, v),
            LogMessage::Formatted(s) => write!(writer, "{}", s),
        }
    }
}

struct LogEntry {
    timestamp: Nanos,
    level: LogLevel,
    message: LogMessage,
}

struct LoggerShared {
    queue: SpscQueue<LogEntry, 4096>,
    running: AtomicBool,
    flush_requested: AtomicBool,
    flush_complete: AtomicBool,
}

/// Low-latency logger that offloads formatting and I/O to a background
/// thread. Entries are dropped when the queue is full.
pub struct Logger {
    shared: Arc<LoggerShared>,
    writer_thread: Option<JoinHandle<()>>,
    min_level: LogLevel,
}

impl Logger {
    pub fn new() -> Self {
        Self::with_level(LogLevel::Info)
    }

    pub fn with_level(min_level: LogLevel) -> Self {
        let shared = Arc::new(LoggerShared {
            queue: SpscQueue::new(),
            running: AtomicBool::new(true),
            flush_requested: AtomicBool::new(false),
            flush_complete: AtomicBool::new(false),
        });

        let shared_clone = Arc::clone(&shared);
        let writer_thread = thread::spawn(move || {
            Self::writer_loop(shared_clone);
        });

        Self {
            shared,
            writer_thread: Some(writer_thread),
            min_level,
        }
    }

    fn writer_loop(shared: Arc<LoggerShared>) {
        let mut idle_count = 0u32;

        while shared.running.load(Ordering::Relaxed) {
            let mut processed = 0;

            // Take the stderr lock only while there is work; holding it
            // across idle periods would starve other writers in-process.
            if !shared.queue.is_empty() || shared.flush_requested.load(Ordering::Acquire) {
                let mut stderr = std::io::stderr().lock();

                while let Some(entry) = shared.queue.pop() {
                    Self::write_entry(&mut stderr, &entry);
                    processed += 1;
                }

                if shared.flush_requested.load(Ordering::Acquire) {
                    let _ = stderr.flush();
                    shared.flush_complete.store(true, Ordering::Release);
                }
            }

            if processed > 0 {
                idle_count = 0;
            } else {
                idle_count = idle_count.saturating_add(1);

                // Progressive backoff: spin, then yield, then sleep
                if idle_count < 100 {
                    std::hint::spin_loop();
                } else if idle_count < 1100 {
                    thread::yield_now();
                } else {
                    thread::sleep(std::time::Duration::from_micros(100));
                }
            }
        }

        // Drain remaining entries before exiting
        let mut stderr = std::io::stderr().lock();
        while let Some(entry) = shared.queue.pop() {
            Self::write_entry(&mut stderr, &entry);
        }
        let _ = stderr.flush();
    }

    fn write_entry<W: Write>(writer: &mut W, entry: &LogEntry) {
        let _ = write!(
            writer,
            "[{:016}] {:5} ",
            entry.timestamp.as_u64(),
            entry.level.as_str()
        );
        let _ = entry.message.write_to(writer);
        let _ = writeln!(writer);
    }

    /// Log a static message. Fastest path: no allocation, no formatting.
    #[inline]
    pub fn log(&self, level: LogLevel, msg: &'static str) {
        if level < self.min_level {
            return;
        }
        let _ = self.shared.queue.push(LogEntry {
            timestamp: now_nanos(),
            level,
            message: LogMessage::Static(msg),
        });
    }

    /// Log a static message with a u64 value; formatting is deferred.
    #[inline]
    pub fn log_with_u64(&self, level: LogLevel, msg: &'static str, value: u64) {
        if level < self.min_level {
            return;
        }
        let _ = self.shared.queue.push(LogEntry {
            timestamp: now_nanos(),
            level,
            message: LogMessage::StaticWithU64(msg, value),
        });
    }

    /// Log a pre-formatted message. Allocates; keep off the hot path.
    #[inline]
    pub fn log_formatted(&self, level: LogLevel, msg: String) {
        if level < self.min_level {
            return;
        }
        let _ = self.shared.queue.push(LogEntry {
            timestamp: now_nanos(),
            level,
            message: LogMessage::Formatted(msg),
        });
    }

    /// Block until all queued entries have been written.
    pub fn flush(&self) {
        self.shared.flush_complete.store(false, Ordering::Release);
        self.shared.flush_requested.store(true, Ordering::Release);

        while !self.shared.flush_complete.load(Ordering::Acquire) {
            if self.shared.queue.is_empty() {
                std::hint::spin_loop();
            } else {
                thread::yield_now();
            }
        }

        self.shared.flush_requested.store(false, Ordering::Release);
    }

    #[inline]
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    #[inline]
    pub fn level(&self) -> LogLevel {
        self.min_level
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.writer_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $msg:literal) => {
        $logger.log($crate::logging::LogLevel::Info, $msg)
    };
    ($logger:expr, $msg:literal, $val:expr) => {
        $logger.log_with_u64($crate::logging::LogLevel::Info, $msg, $val)
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $msg:literal) => {
        $logger.log($crate::logging::LogLevel::Warn, $msg)
    };
    ($logger:expr, $msg:literal, $val:expr) => {
        $logger.log_with_u64($crate::logging::LogLevel::Warn, $msg, $val)
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $msg:literal) => {
        $logger.log($crate::logging::LogLevel::Error, $msg)
    };
    ($logger:expr, $msg:literal, $val:expr) => {
        $logger.log_with_u64($crate::logging::LogLevel::Error, $msg, $val)
    };
}
