//! Stdio over a USB CDC-ACM interface.
//!
//! Routes stdout to the host while a terminal has the port open and pulls
//! stdin from the CDC receive buffer. Output written while no host is
//! connected is dropped rather than stalling the program.
//!
//! The adapter drives the device stack's service step itself from inside
//! reads and writes, since it may be called from a context where the
//! stack's background processing would not otherwise run. A single guard
//! serialises those nested service calls across the read and write paths.

#[cfg(feature = "chars-available-callback")]
use core::cell::Cell;

#[cfg(feature = "chars-available-callback")]
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embedded_hal::delay::DelayNs;

use crate::config::stdio_usb::CONNECT_POLL_INTERVAL_MS;
use crate::config::{ConnectWait, StdioUsbConfig};
#[cfg(feature = "chars-available-callback")]
use crate::defer::Callback;
use crate::stdio::{RegistryError, Stdio, StdioDriver, StdioError};
use crate::time::{deadline_after_ms, Monotonic};
use crate::usb::traits::CdcStack;

/// Errors from bringing up USB stdio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// The device stack must be initialised before stdio is attached
    StackNotInitialised,
    /// The stdio registry could not take another driver
    Registry(RegistryError),
}

impl From<RegistryError> for InitError {
    fn from(e: RegistryError) -> Self {
        InitError::Registry(e)
    }
}

/// State owned by whoever holds the guard
struct WriteState {
    /// Last time the TX buffer accepted data, 0 while disconnected
    last_avail_us: u64,
}

/// USB CDC stdio driver.
///
/// One instance per CDC interface. Construct it once the device stack is
/// initialised, then [`init`](Self::init) it to register with a [`Stdio`]
/// registry.
pub struct CdcStdio<'a, M: RawMutex, S: CdcStack, C: Monotonic> {
    stack: &'a S,
    clock: &'a C,
    config: StdioUsbConfig,
    state: Mutex<M, WriteState>,
    #[cfg(feature = "chars-available-callback")]
    chars_available: BlockingMutex<M, Cell<Option<Callback>>>,
}

impl<'a, M: RawMutex, S: CdcStack, C: Monotonic> CdcStdio<'a, M, S, C> {
    /// Create the adapter.
    ///
    /// Fails if the device stack has not been initialised yet.
    pub fn new(stack: &'a S, clock: &'a C, config: StdioUsbConfig) -> Result<Self, InitError> {
        if !stack.inited() {
            log::error!("usb stdio: device stack not initialised");
            return Err(InitError::StackNotInitialised);
        }

        Ok(Self {
            stack,
            clock,
            config,
            state: Mutex::new(WriteState { last_avail_us: 0 }),
            #[cfg(feature = "chars-available-callback")]
            chars_available: BlockingMutex::new(Cell::new(None)),
        })
    }

    /// Configuration this adapter was built with
    pub fn config(&self) -> &StdioUsbConfig {
        &self.config
    }

    /// Whether a host has the port open
    pub fn connected(&self) -> bool {
        self.stack.connected()
    }

    /// Register as a stdio driver and optionally wait for a host.
    ///
    /// Calling this again on the same instance re-runs the connect wait but
    /// does not register a second time.
    pub fn init<const N: usize, D: DelayNs>(
        &'a self,
        stdio: &mut Stdio<'a, N>,
        delay: &mut D,
    ) -> Result<(), InitError>
    where
        M: 'a,
        S: 'a,
        C: 'a,
    {
        if !self.stack.inited() {
            log::error!("usb stdio: device stack not initialised");
            return Err(InitError::StackNotInitialised);
        }

        stdio.set_driver_enabled(self, true)?;
        log::info!("usb stdio: driver enabled (crlf={})", self.config.crlf);

        match self.config.connect_wait {
            ConnectWait::NoWait => {}
            wait => {
                if self.wait_for_connection(wait, delay) {
                    log::info!("usb stdio: host connected");
                } else {
                    log::debug!("usb stdio: no host after connect wait");
                }
            }
        }

        Ok(())
    }

    /// Poll every 10ms until the host connects or the wait runs out.
    fn wait_for_connection<D: DelayNs>(&self, wait: ConnectWait, delay: &mut D) -> bool {
        let deadline = match wait {
            ConnectWait::NoWait => return self.stack.connected(),
            ConnectWait::Bounded(ms) => deadline_after_ms(self.clock, ms),
            ConnectWait::Forever => u64::MAX,
        };

        loop {
            if self.stack.connected() {
                if self.config.post_connect_wait_delay_ms != 0 {
                    delay.delay_ms(self.config.post_connect_wait_delay_ms);
                }
                return true;
            }
            delay.delay_ms(CONNECT_POLL_INTERVAL_MS);
            if self.clock.now_us() >= deadline {
                return false;
            }
        }
    }

    /// Take the guard, giving up after the deadlock timeout.
    fn lock(&self) -> Option<MutexGuard<'_, M, WriteState>> {
        let deadline = deadline_after_ms(self.clock, self.config.deadlock_timeout_ms);
        loop {
            if let Ok(guard) = self.state.try_lock() {
                return Some(guard);
            }
            if self.clock.now_us() >= deadline {
                return None;
            }
            core::hint::spin_loop();
        }
    }

    /// Send `buf` to the host. Returns how many bytes the stack accepted.
    ///
    /// Returns 0 without writing if the guard can't be taken or no host is
    /// connected. If the host stops reading, gives up once the TX buffer has
    /// stayed full for the drain timeout and returns the count sent so far.
    pub fn write(&self, buf: &[u8]) -> usize {
        let Some(mut state) = self.lock() else {
            return 0;
        };

        let mut sent = 0;
        if self.stack.connected() {
            while sent < buf.len() {
                let n = core::cmp::min(buf.len() - sent, self.stack.write_available());
                let written = if n > 0 {
                    self.stack.write(&buf[sent..sent + n])
                } else {
                    0
                };

                self.stack.task();
                self.stack.write_flush();

                if written > 0 {
                    sent += written;
                    state.last_avail_us = self.clock.now_us();
                } else if !self.stack.connected()
                    || (self.stack.write_available() == 0
                        && self.clock.now_us()
                            > state
                                .last_avail_us
                                .saturating_add(self.config.stdout_timeout_us))
                {
                    break;
                }
            }
        } else {
            state.last_avail_us = 0;
        }

        sent
    }

    /// Read received bytes into `buf`.
    ///
    /// Returns `StdioError::NoData` when nothing is available, no host is
    /// connected, or the guard is contended. `buf` is only written when
    /// bytes are returned.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, StdioError> {
        // Unlocked check: at worst stale while a service step is running,
        // which only costs a NoData now or a retry on the next poll.
        if !self.data_ready() {
            return Err(StdioError::NoData);
        }

        let Some(_guard) = self.lock() else {
            return Err(StdioError::NoData);
        };

        if self.data_ready() {
            match self.stack.read(buf) {
                0 => Err(StdioError::NoData),
                count => Ok(count),
            }
        } else {
            // Holding the guard, so servicing here can't race our own writes
            self.stack.task();
            Err(StdioError::NoData)
        }
    }

    fn data_ready(&self) -> bool {
        self.stack.connected() && self.stack.available() > 0
    }

    /// Install or clear the input-available notification.
    #[cfg(feature = "chars-available-callback")]
    pub fn set_chars_available_callback(&self, callback: Option<Callback>) {
        self.chars_available.lock(|slot| slot.set(callback));
    }

    /// Receive hook for the device stack.
    ///
    /// Call from the stack's CDC receive callback. Never runs the
    /// application's callback directly; it is deferred to the stack's
    /// service loop.
    #[cfg(feature = "chars-available-callback")]
    pub fn notify_rx(&self) {
        if let Some(callback) = self.chars_available.lock(|slot| slot.get()) {
            if self.stack.defer(callback).is_err() {
                log::warn!("usb stdio: defer queue full, rx notification dropped");
            }
        }
    }
}

impl<M: RawMutex, S: CdcStack, C: Monotonic> StdioDriver for CdcStdio<'_, M, S, C> {
    fn out_chars(&self, buf: &[u8]) {
        self.write(buf);
    }

    fn in_chars(&self, buf: &mut [u8]) -> Result<usize, StdioError> {
        self.read(buf)
    }

    #[cfg(feature = "chars-available-callback")]
    fn set_chars_available_callback(&self, callback: Option<Callback>) -> bool {
        CdcStdio::set_chars_available_callback(self, callback);
        true
    }

    fn crlf_enabled(&self) -> bool {
        self.config.crlf
    }
}
