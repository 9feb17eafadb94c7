//! Static home for a driver shared with its interrupt handler.

use super::{NativePins, Pin, RowScanner};
use core::cell::RefCell;
use critical_section::Mutex;

/// Something that advances a row scan from a timer interrupt.
pub trait RowScan {
    fn handle_row(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);
}

impl<N, P, const A: usize> RowScan for RowScanner<N, P, A>
where
    N: NativePins,
    P: Pin,
{
    fn handle_row(&mut self) {
        RowScanner::handle_row(self);
    }

    fn pause(&mut self) {
        RowScanner::pause(self);
    }

    fn resume(&mut self) {
        RowScanner::resume(self);
    }
}

/// Starting and stopping the scan timer from the main context.
pub trait ScanControl {
    fn pause(&self);

    fn resume(&self);
}

/// A slot for a row scanner in a `static`, reachable from both the main context and an interrupt.
///
/// Every access runs inside a critical section, so the row-scan interrupt never observes a
/// half-updated scanner. Drawing does not go through the slot at all.
pub struct MatrixSlot<T> {
    inner: Mutex<RefCell<Option<T>>>,
}

impl<T> MatrixSlot<T> {
    pub const fn new() -> Self {
        MatrixSlot {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Puts `value` in the slot, returning what was there before.
    pub fn install(&self, value: T) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(value))
    }

    pub fn take(&self) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    /// Runs `f` on the installed value. `None` if the slot is empty.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }
}

impl<T> Default for MatrixSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RowScan> MatrixSlot<T> {
    /// Body of the timer interrupt handler. Does nothing while the slot is empty.
    pub fn on_interrupt(&self) {
        self.with(|scan| scan.handle_row());
    }
}

impl<T: RowScan> ScanControl for MatrixSlot<T> {
    fn pause(&self) {
        self.with(|scan| scan.pause());
    }

    fn resume(&self) {
        self.with(|scan| scan.resume());
    }
}
