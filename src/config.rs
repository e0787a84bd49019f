//! Configuration constants for USB CDC stdio

/// USB stdio timing and behaviour defaults
pub mod stdio_usb {
    /// Maximum time a write waits for the host to free TX space
    pub const STDOUT_TIMEOUT_US: u64 = 500_000;

    /// Bounded wait when acquiring the interface guard
    pub const DEADLOCK_TIMEOUT_MS: u32 = 1_000;

    /// Connect wait during init.
    /// 0 = don't wait, negative = wait forever, positive = wait at most this long
    pub const CONNECT_WAIT_TIMEOUT_MS: i32 = 0;

    /// Settle delay after the host opens the port, before init returns
    pub const POST_CONNECT_WAIT_DELAY_MS: u32 = 50;

    /// Poll interval of the connect wait
    pub const CONNECT_POLL_INTERVAL_MS: u32 = 10;

    /// Translate `\n` to `\r\n` on output by default
    pub const DEFAULT_CRLF: bool = true;
}

/// Stdio registry limits
pub mod stdio {
    /// Number of drivers the registry can hold
    pub const MAX_DRIVERS: usize = 4;
}

/// Deferred callback queue
pub mod defer {
    pub const QUEUE_DEPTH: usize = 8;
}

/// Log sink
pub mod debug {
    /// Maximum length of a single formatted log line
    pub const MAX_LOG_MSG_LEN: usize = 128;

    /// Lines held until the next flush
    pub const LOG_QUEUE_DEPTH: usize = 8;
}

/// How long init waits for the host to open the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectWait {
    /// Return straight away
    NoWait,
    /// Wait up to this many milliseconds
    Bounded(u32),
    /// Wait until the host connects
    Forever,
}

impl ConnectWait {
    /// Interpret a millisecond setting: 0 = no wait, negative = forever.
    pub const fn from_ms(ms: i32) -> Self {
        if ms == 0 {
            ConnectWait::NoWait
        } else if ms < 0 {
            ConnectWait::Forever
        } else {
            ConnectWait::Bounded(ms as u32)
        }
    }
}

/// Runtime configuration for [`CdcStdio`](crate::usb::CdcStdio)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdioUsbConfig {
    /// Drain timeout of the write path in microseconds
    pub stdout_timeout_us: u64,
    /// Guard acquisition timeout in milliseconds
    pub deadlock_timeout_ms: u32,
    /// Connect wait performed by init
    pub connect_wait: ConnectWait,
    /// Delay after connect before init returns, 0 to skip
    pub post_connect_wait_delay_ms: u32,
    /// Default CRLF translation for this driver
    pub crlf: bool,
}

impl Default for StdioUsbConfig {
    fn default() -> Self {
        Self {
            stdout_timeout_us: stdio_usb::STDOUT_TIMEOUT_US,
            deadlock_timeout_ms: stdio_usb::DEADLOCK_TIMEOUT_MS,
            connect_wait: ConnectWait::from_ms(stdio_usb::CONNECT_WAIT_TIMEOUT_MS),
            post_connect_wait_delay_ms: stdio_usb::POST_CONNECT_WAIT_DELAY_MS,
            crlf: stdio_usb::DEFAULT_CRLF,
        }
    }
}
