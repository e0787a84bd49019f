//! Stdio driver trait
//!
//! A driver is one backend of the process-wide stdio layer: a UART, a
//! semihosting channel, or a USB CDC port.

use crate::defer::Callback;

/// Errors reported by stdio input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioError {
    /// Nothing to read right now
    NoData,
    /// No data arrived before the deadline
    Timeout,
}

/// Character I/O backend registered with [`Stdio`](super::Stdio)
pub trait StdioDriver {
    /// Emit bytes. Never blocks indefinitely; output may be dropped.
    fn out_chars(&self, buf: &[u8]);

    /// Read up to `buf.len()` bytes.
    ///
    /// Returns the number of bytes read, or `StdioError::NoData` when none
    /// are available. `buf` is untouched when no data is returned.
    fn in_chars(&self, buf: &mut [u8]) -> Result<usize, StdioError>;

    /// Install or clear the "input available" notification.
    ///
    /// Returns false if the driver has no notification support.
    fn set_chars_available_callback(&self, _callback: Option<Callback>) -> bool {
        false
    }

    /// Whether `\n` should become `\r\n` on output by default
    fn crlf_enabled(&self) -> bool {
        crate::config::stdio_usb::DEFAULT_CRLF
    }
}
