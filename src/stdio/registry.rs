//! Stdio driver registry
//!
//! Fans output out to every enabled driver and takes input from the first
//! driver that has some. Optional per-driver `\n` -> `\r\n` translation is
//! applied on output.

use core::fmt;
use heapless::Vec;

use crate::config::stdio::MAX_DRIVERS;
use crate::defer::Callback;
use crate::stdio::traits::{StdioDriver, StdioError};
use crate::time::Monotonic;

/// Errors from driver registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// Every driver slot is taken
    Full,
}

const CRLF: &[u8] = b"\r\n";

struct DriverEntry<'a> {
    driver: &'a dyn StdioDriver,
    crlf: bool,
    last_ended_with_cr: bool,
}

fn same_driver(a: &dyn StdioDriver, b: &dyn StdioDriver) -> bool {
    core::ptr::addr_eq(a, b)
}

/// Process-wide stdio layer.
///
/// Usually lives in a `static` behind a blocking mutex; all methods take
/// `&mut self`.
pub struct Stdio<'a, const N: usize = MAX_DRIVERS> {
    drivers: Vec<DriverEntry<'a>, N>,
    filter: Option<&'a dyn StdioDriver>,
}

impl<'a, const N: usize> Stdio<'a, N> {
    pub const fn new() -> Self {
        Self {
            drivers: Vec::new(),
            filter: None,
        }
    }

    /// Enable or disable a driver.
    ///
    /// Enabling a driver that is already enabled changes nothing.
    pub fn set_driver_enabled(
        &mut self,
        driver: &'a dyn StdioDriver,
        enabled: bool,
    ) -> Result<(), RegistryError> {
        let position = self
            .drivers
            .iter()
            .position(|entry| same_driver(entry.driver, driver));

        match (position, enabled) {
            (Some(_), true) | (None, false) => Ok(()),
            (Some(index), false) => {
                self.drivers.remove(index);
                if self.filter.is_some_and(|f| same_driver(f, driver)) {
                    self.filter = None;
                }
                Ok(())
            }
            (None, true) => {
                let entry = DriverEntry {
                    driver,
                    crlf: driver.crlf_enabled(),
                    last_ended_with_cr: false,
                };
                self.drivers.push(entry).map_err(|_| {
                    log::warn!("stdio: no free driver slot");
                    RegistryError::Full
                })
            }
        }
    }

    pub fn is_driver_enabled(&self, driver: &dyn StdioDriver) -> bool {
        self.drivers.iter().any(|entry| same_driver(entry.driver, driver))
    }

    /// Restrict all I/O to one driver, or lift the restriction with `None`.
    pub fn filter_driver(&mut self, driver: Option<&'a dyn StdioDriver>) {
        self.filter = driver;
    }

    /// Turn CRLF translation on or off for an enabled driver
    pub fn set_translate_crlf(&mut self, driver: &dyn StdioDriver, enabled: bool) {
        if let Some(entry) = self
            .drivers
            .iter_mut()
            .find(|entry| same_driver(entry.driver, driver))
        {
            entry.crlf = enabled;
        }
    }

    fn is_active(filter: Option<&dyn StdioDriver>, entry: &DriverEntry<'_>) -> bool {
        match filter {
            Some(f) => same_driver(f, entry.driver),
            None => true,
        }
    }

    /// Write bytes to every active driver
    pub fn put_chars(&mut self, data: &[u8]) {
        let filter = self.filter;
        for entry in self.drivers.iter_mut() {
            if Self::is_active(filter, entry) {
                out_chars_crlf(entry, data);
            }
        }
    }

    pub fn put_str(&mut self, s: &str) {
        self.put_chars(s.as_bytes());
    }

    /// Read from the first active driver that has data
    pub fn get_chars(&mut self, buf: &mut [u8]) -> Result<usize, StdioError> {
        let filter = self.filter;
        for entry in self.drivers.iter() {
            if !Self::is_active(filter, entry) {
                continue;
            }
            match entry.driver.in_chars(buf) {
                Ok(count) if count > 0 => return Ok(count),
                _ => {}
            }
        }
        Err(StdioError::NoData)
    }

    /// Poll for a single byte until `timeout_us` has passed
    pub fn getchar_timeout_us<C: Monotonic>(
        &mut self,
        timeout_us: u64,
        clock: &C,
    ) -> Result<u8, StdioError> {
        let deadline = clock.now_us().saturating_add(timeout_us);
        let mut byte = [0u8; 1];
        loop {
            if self.get_chars(&mut byte).is_ok() {
                return Ok(byte[0]);
            }
            if clock.now_us() >= deadline {
                return Err(StdioError::Timeout);
            }
        }
    }

    /// Hand the callback to every active driver that supports it.
    ///
    /// Returns true if at least one driver accepted it.
    pub fn set_chars_available_callback(&mut self, callback: Option<Callback>) -> bool {
        let filter = self.filter;
        let mut accepted = false;
        for entry in self.drivers.iter() {
            if Self::is_active(filter, entry) {
                accepted |= entry.driver.set_chars_available_callback(callback);
            }
        }
        accepted
    }
}

impl<const N: usize> Default for Stdio<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> fmt::Write for Stdio<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put_str(s);
        Ok(())
    }
}

/// Emit `data`, turning a bare `\n` into `\r\n`.
///
/// A `\n` directly after `\r` is left alone, including across calls.
fn out_chars_crlf(entry: &mut DriverEntry<'_>, data: &[u8]) {
    if !entry.crlf {
        entry.driver.out_chars(data);
        return;
    }

    let mut chunk_start = 0;
    for (i, &byte) in data.iter().enumerate() {
        let prev_was_cr = if i > 0 {
            data[i - 1] == b'\r'
        } else {
            entry.last_ended_with_cr
        };
        if byte == b'\n' && !prev_was_cr {
            if i > chunk_start {
                entry.driver.out_chars(&data[chunk_start..i]);
            }
            entry.driver.out_chars(CRLF);
            chunk_start = i + 1;
        }
    }
    if chunk_start < data.len() {
        entry.driver.out_chars(&data[chunk_start..]);
    }
    if let Some(&last) = data.last() {
        entry.last_ended_with_cr = last == b'\r';
    }
}
