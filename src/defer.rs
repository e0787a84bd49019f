//! Deferred callback execution
//!
//! A device stack signals received data from a restricted context (often
//! an interrupt handler). Application callbacks must not run there, so the
//! signalling side only enqueues work and the stack's cooperative service
//! step drains the queue later.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::{Channel, TrySendError};

use crate::config::defer::QUEUE_DEPTH;

/// Function plus opaque context, invoked as `func(context)`.
#[derive(Debug, Clone, Copy)]
pub struct Callback {
    func: fn(usize),
    context: usize,
}

impl Callback {
    pub const fn new(func: fn(usize), context: usize) -> Self {
        Self { func, context }
    }

    pub fn context(&self) -> usize {
        self.context
    }

    /// Run the callback in the current context.
    pub fn invoke(self) {
        (self.func)(self.context)
    }
}

/// Bounded FIFO of callbacks waiting to run outside the signalling context.
pub struct DeferQueue<M: RawMutex, const N: usize = QUEUE_DEPTH> {
    pending: Channel<M, Callback, N>,
}

impl<M: RawMutex, const N: usize> DeferQueue<M, N> {
    pub const fn new() -> Self {
        Self {
            pending: Channel::new(),
        }
    }

    /// Queue a callback. It is never invoked from here.
    ///
    /// Hands the callback back if the queue is full.
    pub fn defer(&self, callback: Callback) -> Result<(), Callback> {
        self.pending.try_send(callback).map_err(|TrySendError::Full(cb)| cb)
    }

    /// Run every queued callback in FIFO order. Returns how many ran.
    ///
    /// Callbacks queued while draining run in the same pass.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.pending.try_receive() {
            callback.invoke();
            ran += 1;
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<M: RawMutex, const N: usize> Default for DeferQueue<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
