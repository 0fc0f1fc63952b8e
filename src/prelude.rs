//! Prelude

#![allow(unused_imports)]

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Prelude
// ————————————————————————————————————————————————————————————————————————————————————————————————

pub use core::sync::atomic::Ordering;

pub use crate::log::{LOG, LogLevel};
pub use crate::power::{
  Approval, Event, Phase, PowerManager, ReadinessGate, Request, ShutdownCoordinator,
};

#[cfg(target_arch = "arm")]
pub use crate::buttons::Buttons;
#[cfg(target_arch = "arm")]
pub use crate::device::{Device, TimerExt};
#[cfg(target_arch = "arm")]
pub use crate::serial_io::SERIAL;
#[cfg(target_arch = "arm")]
pub use crate::tasklet::Tasklet;

#[cfg(target_arch = "arm")]
pub use embedded_hal::digital::{InputPin, OutputPin, StatefulOutputPin};
#[cfg(target_arch = "arm")]
pub use heapless::{String, Vec};

// —————————————————————————————————————————————————————————————————————————————————————————————————
//                                               Log
// —————————————————————————————————————————————————————————————————————————————————————————————————

pub use crate::{print, println};

// Logging
#[cfg(feature = "defmt")]
pub use defmt::{debug, error, info, trace, warn};

#[cfg(not(feature = "defmt"))]
pub use crate::{debug, error, info, trace, warn};
