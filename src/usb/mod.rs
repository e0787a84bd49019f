//! USB CDC-ACM stdio.
//!
//! Bridges the stdio registry to the CDC interface of an external USB
//! device stack.

pub mod cdc_stdio;
pub mod traits;

pub use cdc_stdio::{CdcStdio, InitError};
pub use traits::CdcStack;
