//! Microsecond-resolution time source backing [`esb::Timer`], driven by one of the chip's general
//! purpose `TIMER` peripherals running free in 32-bit timer mode at a 1 MHz base frequency — the
//! same frequency the ACK-wait timeout and retransmit delay are specified in.

use crate::pac::TIMER0;
use esb::time::{Instant, Timer};

/// Wraps a `TIMER` peripheral, configured to run freely and never stop, so [`EsbTimer::now`] can
/// be called at any time without disturbing anything else using the timer.
pub struct EsbTimer {
    timer: TIMER0,
}

impl EsbTimer {
    /// Configures `timer` for 1 MHz, 32-bit free-running operation and starts it.
    pub fn new(timer: TIMER0) -> Self {
        timer.mode.write(|w| w.mode().timer());
        timer.bitmode.write(|w| w.bitmode()._32bit());
        // base 16 MHz / 2^4 = 1 MHz
        unsafe {
            timer.prescaler.write(|w| w.prescaler().bits(4));
        }
        timer.tasks_clear.write(|w| unsafe { w.bits(1) });
        timer.tasks_start.write(|w| unsafe { w.bits(1) });

        EsbTimer { timer }
    }
}

impl Timer for EsbTimer {
    fn now(&self) -> Instant {
        // CAPTURE into an otherwise-unused compare channel to latch a consistent COUNTER value,
        // then read it back.
        self.timer.tasks_capture[3].write(|w| unsafe { w.bits(1) });
        Instant::from_raw_micros(self.timer.cc[3].read().bits())
    }
}
