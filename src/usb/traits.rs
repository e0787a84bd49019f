//! USB device stack trait for abstraction and testability
//!
//! This trait defines the slice of a USB device stack's CDC API that the
//! stdio adapter needs, allowing a real stack binding to be swapped with a
//! mock for testing.
//!
//! All methods take `&self`. A device stack is a process-wide singleton
//! with its own internal state, and the adapter reads connection state
//! without holding its guard.

use crate::defer::Callback;

/// CDC interface of an external USB device stack
pub trait CdcStack {
    /// Whether the device stack has been initialised
    fn inited(&self) -> bool;

    /// Whether a host has the port open (DTR asserted)
    fn connected(&self) -> bool;

    /// Bytes waiting in the receive buffer
    fn available(&self) -> usize;

    /// Copy received bytes into `buf`, returning how many were copied
    fn read(&self, buf: &mut [u8]) -> usize;

    /// Free space in the transmit buffer
    fn write_available(&self) -> usize;

    /// Queue bytes for transmission, returning how many were accepted
    fn write(&self, data: &[u8]) -> usize;

    /// Start transmitting queued bytes, returning how many were scheduled
    fn write_flush(&self) -> usize;

    /// Run one step of the stack's cooperative service loop
    fn task(&self);

    /// Schedule `callback` to run later from the service loop.
    ///
    /// Must never invoke the callback synchronously. Hands it back if the
    /// stack cannot queue it.
    fn defer(&self, callback: Callback) -> Result<(), Callback>;
}

#[cfg(test)]
pub mod mock {
    //! Mock CDC device stack for testing

    use super::*;
    use crate::defer::DeferQueue;
    use core::cell::{Cell, RefCell};
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use heapless::{Deque, Vec};

    /// Capacity of the mock's receive queue and peer log
    pub const MOCK_BUF_SIZE: usize = 1024;

    /// Mock device stack with a scripted host on the other end.
    ///
    /// Written bytes land in a bounded TX FIFO. A flush marks them ready and
    /// each `task()` moves flushed bytes to the host, unless the host has
    /// stopped reading.
    pub struct MockCdcStack {
        inited: Cell<bool>,
        connected: Cell<bool>,
        /// Polls of `connected()` left before the host connects
        connect_after_polls: Cell<Option<usize>>,
        /// Polls of `connected()` left before the host disconnects
        disconnect_after_polls: Cell<Option<usize>>,
        /// Service steps left before the host disconnects
        disconnect_after_tasks: Cell<Option<usize>>,
        /// Whether the host drains the TX FIFO
        host_reading: Cell<bool>,
        tx_capacity: Cell<usize>,
        tx_fifo: RefCell<Deque<u8, MOCK_BUF_SIZE>>,
        tx_flushed: Cell<usize>,
        /// Bytes the host has received
        host_rx: RefCell<Vec<u8, MOCK_BUF_SIZE>>,
        rx_fifo: RefCell<Deque<u8, MOCK_BUF_SIZE>>,
        task_calls: Cell<usize>,
        deferred: DeferQueue<NoopRawMutex, 4>,
    }

    impl MockCdcStack {
        /// Create an initialised, disconnected stack with a 64 byte TX FIFO
        pub fn new() -> Self {
            Self {
                inited: Cell::new(true),
                connected: Cell::new(false),
                connect_after_polls: Cell::new(None),
                disconnect_after_polls: Cell::new(None),
                disconnect_after_tasks: Cell::new(None),
                host_reading: Cell::new(true),
                tx_capacity: Cell::new(64),
                tx_fifo: RefCell::new(Deque::new()),
                tx_flushed: Cell::new(0),
                host_rx: RefCell::new(Vec::new()),
                rx_fifo: RefCell::new(Deque::new()),
                task_calls: Cell::new(0),
                deferred: DeferQueue::new(),
            }
        }

        pub fn set_inited(&self, inited: bool) {
            self.inited.set(inited);
        }

        pub fn set_connected(&self, connected: bool) {
            self.connected.set(connected);
        }

        /// Connect once `connected()` has been polled `polls` more times
        pub fn connect_after_polls(&self, polls: usize) {
            self.connect_after_polls.set(Some(polls));
        }

        /// Disconnect once `connected()` has been polled `polls` more times
        pub fn disconnect_after_polls(&self, polls: usize) {
            self.disconnect_after_polls.set(Some(polls));
        }

        /// Disconnect once `task()` has run `tasks` more times
        pub fn disconnect_after_tasks(&self, tasks: usize) {
            self.disconnect_after_tasks.set(Some(tasks));
        }

        /// Whether the host keeps draining transmitted data
        pub fn set_host_reading(&self, reading: bool) {
            self.host_reading.set(reading);
        }

        pub fn set_tx_capacity(&self, capacity: usize) {
            self.tx_capacity.set(capacity.min(MOCK_BUF_SIZE));
        }

        /// Bytes the host sent to the device
        pub fn queue_rx_data(&self, data: &[u8]) {
            let mut rx = self.rx_fifo.borrow_mut();
            for &byte in data {
                let _ = rx.push_back(byte);
            }
        }

        /// Everything the host has received so far
        pub fn host_received(&self) -> Vec<u8, MOCK_BUF_SIZE> {
            self.host_rx.borrow().clone()
        }

        /// Bytes stuck in the TX FIFO
        pub fn tx_pending(&self) -> usize {
            self.tx_fifo.borrow().len()
        }

        pub fn task_calls(&self) -> usize {
            self.task_calls.get()
        }

        pub fn deferred_pending(&self) -> usize {
            self.deferred.len()
        }
    }

    impl Default for MockCdcStack {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CdcStack for MockCdcStack {
        fn inited(&self) -> bool {
            self.inited.get()
        }

        fn connected(&self) -> bool {
            if let Some(polls) = self.connect_after_polls.get() {
                if polls == 0 {
                    self.connected.set(true);
                    self.connect_after_polls.set(None);
                } else {
                    self.connect_after_polls.set(Some(polls - 1));
                }
            }
            if let Some(polls) = self.disconnect_after_polls.get() {
                if polls == 0 {
                    self.connected.set(false);
                    self.disconnect_after_polls.set(None);
                } else {
                    self.disconnect_after_polls.set(Some(polls - 1));
                }
            }
            self.connected.get()
        }

        fn available(&self) -> usize {
            self.rx_fifo.borrow().len()
        }

        fn read(&self, buf: &mut [u8]) -> usize {
            let mut rx = self.rx_fifo.borrow_mut();
            let mut count = 0;
            for slot in buf.iter_mut() {
                match rx.pop_front() {
                    Some(byte) => {
                        *slot = byte;
                        count += 1;
                    }
                    None => break,
                }
            }
            count
        }

        fn write_available(&self) -> usize {
            self.tx_capacity
                .get()
                .saturating_sub(self.tx_fifo.borrow().len())
        }

        fn write(&self, data: &[u8]) -> usize {
            let count = core::cmp::min(data.len(), self.write_available());
            let mut tx = self.tx_fifo.borrow_mut();
            for &byte in &data[..count] {
                let _ = tx.push_back(byte);
            }
            count
        }

        fn write_flush(&self) -> usize {
            let queued = self.tx_fifo.borrow().len();
            let scheduled = queued - self.tx_flushed.get();
            self.tx_flushed.set(queued);
            scheduled
        }

        fn task(&self) {
            self.task_calls.set(self.task_calls.get() + 1);

            if let Some(tasks) = self.disconnect_after_tasks.get() {
                if tasks <= 1 {
                    self.connected.set(false);
                    self.disconnect_after_tasks.set(None);
                } else {
                    self.disconnect_after_tasks.set(Some(tasks - 1));
                }
            }

            if self.host_reading.get() && self.connected.get() {
                let mut tx = self.tx_fifo.borrow_mut();
                let mut host = self.host_rx.borrow_mut();
                for _ in 0..self.tx_flushed.get() {
                    if let Some(byte) = tx.pop_front() {
                        let _ = host.push(byte);
                    }
                }
                self.tx_flushed.set(0);
            }

            self.deferred.run_pending();
        }

        fn defer(&self, callback: Callback) -> Result<(), Callback> {
            self.deferred.defer(callback)
        }
    }
}
