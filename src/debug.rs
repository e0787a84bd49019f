//! Log output via stdio.
//!
//! A `log` backend that formats records into fixed-size lines and queues
//! them without blocking. Queued lines are written out through the stdio
//! registry by [`DebugLog::flush_to`], from the application's main loop.
//!
//! Logging never writes to USB directly, so a log call made while the CDC
//! adapter holds its guard cannot re-enter it.

use core::cell::RefCell;
use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::{Deque, String};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::config::debug::{LOG_QUEUE_DEPTH, MAX_LOG_MSG_LEN};
use crate::stdio::Stdio;

/// One formatted log line
pub type LogLine = String<MAX_LOG_MSG_LEN>;

/// Queueing `log` backend.
///
/// When the queue is full the oldest line is dropped so the most recent
/// output survives.
pub struct DebugLog<M: RawMutex, const Q: usize = LOG_QUEUE_DEPTH> {
    level: LevelFilter,
    lines: Mutex<M, RefCell<Deque<LogLine, Q>>>,
}

impl<M: RawMutex, const Q: usize> DebugLog<M, Q> {
    pub const fn new(level: LevelFilter) -> Self {
        Self {
            level,
            lines: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Queue a line. Returns false if an older line had to be dropped.
    pub fn push_line(&self, line: LogLine) -> bool {
        self.lines.lock(|cell| {
            let mut lines = cell.borrow_mut();
            let mut kept_all = true;
            if lines.is_full() {
                lines.pop_front();
                kept_all = false;
            }
            let _ = lines.push_back(line);
            kept_all
        })
    }

    /// Take the oldest queued line
    pub fn take_line(&self) -> Option<LogLine> {
        self.lines.lock(|cell| cell.borrow_mut().pop_front())
    }

    pub fn pending(&self) -> usize {
        self.lines.lock(|cell| cell.borrow().len())
    }

    /// Write every queued line to stdio. Returns the number of lines written.
    pub fn flush_to<const N: usize>(&self, stdio: &mut Stdio<'_, N>) -> usize {
        let mut written = 0;
        while let Some(line) = self.take_line() {
            stdio.put_str(&line);
            stdio.put_str("\n");
            written += 1;
        }
        written
    }
}

impl<M: RawMutex + Send + Sync + 'static, const Q: usize> DebugLog<M, Q> {
    /// Install as the global logger
    pub fn install(&'static self) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(self.level);
        Ok(())
    }
}

impl<M: RawMutex + Send + Sync, const Q: usize> Log for DebugLog<M, Q> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Overlong messages are truncated
        let mut line = LogLine::new();
        let _ = write!(line, "[{}] {}: {}", record.level(), record.target(), record.args());
        self.push_line(line);
    }

    fn flush(&self) {}
}
