//! Conversion-complete signalling between the DRDY interrupt and the
//! acquisition flow.

use core::convert::Infallible;
use core::sync::atomic::{AtomicBool, Ordering};

/// A single-slot latch fed by the DRDY edge interrupt.
///
/// The interrupt handler is the only writer ([`signal`](DataReady::signal))
/// and the driver is the only consumer. Consuming the event resets the
/// latch, so a second wait blocks until the device completes another
/// conversion.
///
/// # Examples
///
/// ```
/// use ads1256::DataReady;
///
/// static DATA_READY: DataReady = DataReady::new();
///
/// // From the DRDY edge interrupt handler:
/// DATA_READY.signal();
///
/// // From the acquisition flow:
/// DATA_READY.wait();
/// ```
#[derive(Debug)]
pub struct DataReady {
    ready: AtomicBool,
}

impl DataReady {
    /// Creates a latch with no conversion pending.
    pub const fn new() -> Self {
        DataReady {
            ready: AtomicBool::new(false),
        }
    }

    /// Records that the device finished a conversion.
    ///
    /// Call this from the falling-edge interrupt on the DRDY line. Safe to
    /// call concurrently with [`poll`](DataReady::poll) and
    /// [`wait`](DataReady::wait).
    pub fn signal(&self) {
        self.ready.store(true, Ordering::Release);
    }

    /// Consumes the pending conversion-complete event.
    ///
    /// Returns [`nb::Error::WouldBlock`] until [`signal`](DataReady::signal)
    /// is called. Check and reset are a single atomic swap, so an edge
    /// arriving between the two cannot be lost.
    pub fn poll(&self) -> nb::Result<(), Infallible> {
        if self.ready.swap(false, Ordering::Acquire) {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    }

    /// Spins until the device signals, then consumes the event.
    ///
    /// Blocks forever if the DRDY interrupt never fires.
    pub fn wait(&self) {
        while self.poll().is_err() {
            core::hint::spin_loop();
        }
    }
}

impl Default for DataReady {
    fn default() -> Self {
        DataReady::new()
    }
}

#[cfg(test)]
mod tests {
    use super::DataReady;

    #[test]
    fn one_signal_satisfies_exactly_one_consumer() {
        let drdy = DataReady::new();
        assert_eq!(drdy.poll(), Err(nb::Error::WouldBlock));

        drdy.signal();
        assert_eq!(drdy.poll(), Ok(()));
        assert_eq!(drdy.poll(), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn wait_consumes_the_event() {
        let drdy = DataReady::new();
        drdy.signal();
        drdy.wait();
        assert_eq!(drdy.poll(), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn wait_observes_a_signal_from_another_thread() {
        let drdy = DataReady::new();

        std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(std::time::Duration::from_millis(5));
                drdy.signal();
            });

            drdy.wait();
        });

        assert_eq!(drdy.poll(), Err(nb::Error::WouldBlock));
    }
}
