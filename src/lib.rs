//! Stdio over USB CDC-ACM for devices that already run a USB device stack.
//!
//! [`usb::CdcStdio`] registers with a [`stdio::Stdio`] registry and moves
//! stdout/stdin through the CDC interface of a stack implementing
//! [`usb::CdcStack`]. Enumeration, descriptors and the CDC class itself stay
//! with the device stack.
//!
//! ```ignore
//! let usb = CdcStdio::<CriticalSectionRawMutex, _, _>::new(&STACK, &CLOCK, StdioUsbConfig::default())?;
//! usb.init(&mut stdio, &mut delay)?;
//! writeln!(stdio, "hello")?;
//! ```

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod debug;
pub mod defer;
pub mod stdio;
pub mod time;
pub mod usb;

pub use config::{ConnectWait, StdioUsbConfig};
pub use defer::{Callback, DeferQueue};
pub use stdio::{Stdio, StdioDriver, StdioError};
pub use usb::{CdcStack, CdcStdio, InitError};
