//! Power state coordination core
//!
//! Platform independent: the gate, the coordinator and the manager touch
//! nothing but their own flags and the collaborator traits below, so this
//! whole module builds and tests on the host.
//!
//! Single execution context is a hard precondition. Input events and
//! shutdown approval polls must never run concurrently: `toggle()` and the
//! poll's read-then-latch sequence have to be atomic with respect to each
//! other, or a wake up is missed. On this firmware everything runs on the
//! main loop; an adapter that dispatches from more than one thread must
//! wrap both components in a single mutual exclusion boundary.

pub mod coordinator;
pub mod error;
pub mod gate;
pub mod manager;

pub use coordinator::ShutdownCoordinator;
pub use error::{Error, Result};
pub use gate::ReadinessGate;
pub use manager::PowerManager;

use core::fmt;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Globals
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Button that toggles the readiness to power down.
pub const BTN_ID_READY: u8 = 0;

/// Button that puts the application into low power mode.
pub const BTN_ID_SLEEP: u8 = 1;

/// Button that wakes the application back up.
pub const BTN_ID_WAKEUP: u8 = 1;

/// Button that resets the application.
pub const BTN_ID_RESET: u8 = 2;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Types
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Semantic input events delivered by the button layer.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
  /// Toggle the application's readiness to power down.
  ToggleReady,
  /// From now on, stay in low power across wake cycles.
  HoldInLowPower,
  /// Enter low power now.
  EnterLowPower,
  /// Full device reset.
  Reset,
}

/// One stage of the platform's power down protocol.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
  /// Power down with no wake source, stay down across wake cycles.
  Standby,
  /// Power down with the wake input armed.
  Wakeup,
  /// Full reset.
  Reset,
  /// Firmware update entry. Not available on this deployment.
  FirmwareUpdate,
}

/// Transition requests issued to the power manager.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
  /// Enter low power, resume normal operation on wake.
  EnterLowPower,
  /// Enter low power and re-enter it on every wake.
  HoldInLowPower,
  /// Full reset.
  Reset,
  /// Resume a shutdown attempt that was denied earlier.
  Continue,
}

/// Outcome of a shutdown approval poll.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Approval {
  Allow,
  Deny,
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Traits
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Wake capable input control, provided by the board layer.
pub trait InputControl {
  /// Take every button out of the input path ahead of a power down.
  fn disable_inputs(&mut self) -> Result<()>;

  /// Arm one button as a low power wake source.
  fn enable_wake_input(&mut self, id: u8) -> Result<()>;

  /// Arm the auxiliary wake source. Boards without one report
  /// [`Error::NoWakeSource`].
  fn arm_aux_wake_source(&mut self) -> Result<()>;
}

/// Background timer control.
pub trait TimerControl {
  /// Stop every periodic timer. Timers cannot run once the platform loses
  /// power context.
  fn stop_all(&mut self) -> Result<()>;
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                         Trait Impls
// ————————————————————————————————————————————————————————————————————————————————————————————————

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", match self {
      Phase::Standby => "standby",
      Phase::Wakeup => "wakeup",
      Phase::Reset => "reset",
      Phase::FirmwareUpdate => "firmware update",
    })
  }
}

impl fmt::Display for Request {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", match self {
      Request::EnterLowPower => "enter low power",
      Request::HoldInLowPower => "hold in low power",
      Request::Reset => "reset",
      Request::Continue => "continue",
    })
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                         Test Support
// ————————————————————————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
pub(crate) mod testing {
  use super::*;

  /// One recorded collaborator call, in arrival order.
  #[derive(Clone, Copy, Eq, PartialEq, Debug)]
  pub enum Call {
    DisableInputs,
    EnableWakeInput(u8),
    ArmAuxWake,
    StopAll,
  }

  /// Board stand-in for the collaborator services. Records every call and
  /// reports no auxiliary wake source, like the real board.
  #[derive(Default)]
  pub struct MockIo {
    pub calls: Vec<Call>,
    pub aux_wake_available: bool,
    pub fail_disable: bool,
    pub fail_stop_all: bool,
  }

  impl MockIo {
    pub fn new() -> Self {
      Self::default()
    }
  }

  impl InputControl for MockIo {
    fn disable_inputs(&mut self) -> Result<()> {
      self.calls.push(Call::DisableInputs);
      if self.fail_disable {
        return Err(Error::Input);
      }
      Ok(())
    }

    fn enable_wake_input(&mut self, id: u8) -> Result<()> {
      self.calls.push(Call::EnableWakeInput(id));
      Ok(())
    }

    fn arm_aux_wake_source(&mut self) -> Result<()> {
      self.calls.push(Call::ArmAuxWake);
      if self.aux_wake_available {
        Ok(())
      }
      else {
        Err(Error::NoWakeSource)
      }
    }
  }

  impl TimerControl for MockIo {
    fn stop_all(&mut self) -> Result<()> {
      self.calls.push(Call::StopAll);
      if self.fail_stop_all {
        return Err(Error::Timer);
      }
      Ok(())
    }
  }
}
