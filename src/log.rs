//! Basic leveled logging over the USB serial diagnostics
//! Logging lands in the serial terminal only while a connection is open.
//! Build with the "defmt" feature to route logging through RTT instead.
//!
//! Example:
//! ```rust
//! LOG.set(LogLevel::Debug);
//! info!("entering low power");
//! ```

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Globals
// ————————————————————————————————————————————————————————————————————————————————————————————————

pub static LOG: Log = Log { level: AtomicU8::new(3) }; // Defaults to Info

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                              Log
// ————————————————————————————————————————————————————————————————————————————————————————————————

pub struct Log {
  level: AtomicU8,
}

impl Log {
  pub fn get(&self) -> LogLevel {
    self.level.load(Ordering::Relaxed).into()
  }

  pub fn set(&self, level: LogLevel) {
    self.level.store(level as u8, Ordering::Relaxed);
  }

  /// Level check used by the log macros.
  pub fn enabled(&self, level: u8) -> bool {
    self.level.load(Ordering::Relaxed) >= level
  }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[repr(u8)]
pub enum LogLevel {
  Off,   // 0
  Error, // 1
  Warn,  // 2
  Info,  // 3
  Debug, // 4
  Trace, // 5
}

impl From<u8> for LogLevel {
  fn from(level: u8) -> Self {
    match level {
      0 => LogLevel::Off,
      1 => LogLevel::Error,
      2 => LogLevel::Warn,
      3 => LogLevel::Info,
      4 => LogLevel::Debug,
      _ => LogLevel::Trace,
    }
  }
}

impl fmt::Display for LogLevel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", match self {
      LogLevel::Off => "[OFF]",
      LogLevel::Error => "[ERROR]",
      LogLevel::Warn => "[WARN ]",
      LogLevel::Info => "[INFO ]",
      LogLevel::Debug => "[DEBUG]",
      LogLevel::Trace => "[TRACE]",
    })
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Macros
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Prints one tagged diagnostic line when the level is enabled.
/// Prefer the level macros below.
#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! log_line {
    ($level:expr, $tag:literal, $($arg:tt)*) => {
      if $crate::log::LOG.enabled($level) {
        $crate::print!(concat!($tag, " "));
        $crate::println!($($arg)*);
      }
    };
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => { $crate::log_line!(1, "[ERROR]", $($arg)*) };
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => { $crate::log_line!(2, "[WARN ]", $($arg)*) };
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => { $crate::log_line!(3, "[INFO ]", $($arg)*) };
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => { $crate::log_line!(4, "[DEBUG]", $($arg)*) };
}

#[cfg(not(feature = "defmt"))]
#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => { $crate::log_line!(5, "[TRACE]", $($arg)*) };
}

// The serial print macros are firmware only; off target they fall through
// to std so host test output stays readable.
#[cfg(not(target_arch = "arm"))]
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => { ::std::print!($($arg)*) };
}

#[cfg(not(target_arch = "arm"))]
#[macro_export]
macro_rules! println {
    () => { ::std::println!() };
    ($($arg:tt)*) => { ::std::println!($($arg)*) };
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Tests
// ————————————————————————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn levels_round_trip_through_u8() {
    let levels = [
      LogLevel::Off,
      LogLevel::Error,
      LogLevel::Warn,
      LogLevel::Info,
      LogLevel::Debug,
      LogLevel::Trace,
    ];

    for level in levels {
      assert_eq!(LogLevel::from(level as u8), level);
    }
  }

  #[test]
  fn enabled_respects_the_threshold() {
    let log = Log { level: AtomicU8::new(LogLevel::Warn as u8) };

    assert!(log.enabled(1));
    assert!(log.enabled(2));
    assert!(!log.enabled(3));
  }
}
