//! Timer based tasklets for main loop scheduling
//!
//! Deadline based on the shared timer counter, so any number of tasklets
//! can run off the one hardware timer and `reset()` is cheap enough to call
//! on every input event.
//!
//! Example - non blocking periodic task:
//! ```no_run
//! let mut heartbeat = Tasklet::new(500, &device.timer);
//!
//! loop {
//!   if heartbeat.is_ready() {
//!     led.toggle().unwrap();
//!   }
//! }
//! ```

use rp2040_hal::fugit::MicrosDurationU64;
use rp2040_hal::timer::Timer;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Tasklet
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Non blocking periodic task for in-loop usage
pub struct Tasklet {
  timer:    Timer,
  interval: MicrosDurationU64,
  deadline: u64,
}

impl Tasklet {
  #[inline]
  pub fn new(interval_ms: u32, timer: &Timer) -> Self {
    let interval = MicrosDurationU64::millis(interval_ms as u64);

    Tasklet {
      timer:    *timer,
      interval,
      deadline: timer.get_counter().ticks() + interval.ticks(),
    }
  }

  /// Polls the task. Returns `true` once per elapsed interval.
  #[inline]
  pub fn is_ready(&mut self) -> bool {
    let now = self.timer.get_counter().ticks();

    if now < self.deadline {
      return false;
    }

    self.deadline = now + self.interval.ticks();
    true
  }

  /// Pushes the next deadline a full interval away from now.
  #[inline]
  pub fn reset(&mut self) {
    self.deadline = self.timer.get_counter().ticks() + self.interval.ticks();
  }
}
