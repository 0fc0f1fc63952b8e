//! Platform power manager service

use crate::prelude::*;

use super::coordinator::ShutdownCoordinator;
use super::error::Result;
use super::gate::ReadinessGate;
use super::{Approval, InputControl, Phase, Request, TimerControl};

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                         Power Manager
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Drives the shutdown protocol: maps transition requests onto phases, runs
/// the approval poll and keeps a denied attempt pending for a `Continue`.
pub struct PowerManager {
  pending: Option<Phase>,
}

impl PowerManager {
  pub const fn new() -> Self {
    Self { pending: None }
  }

  /// Phase of the attempt currently held back by a denial, if any.
  pub fn pending(&self) -> Option<Phase> {
    self.pending
  }

  /// Begin, or resume, a shutdown attempt.
  ///
  /// Returns the phase the caller must now execute, or `None` when the
  /// attempt was denied (it stays pending) or there was nothing to resume.
  /// Once a phase comes back the transition is irrevocable as far as the
  /// coordinator is concerned.
  pub fn shutdown<S>(
    &mut self,
    request: Request,
    coordinator: &mut ShutdownCoordinator,
    gate: &ReadinessGate,
    services: &mut S,
  ) -> Result<Option<Phase>>
  where
    S: InputControl + TimerControl,
  {
    let phase = match request {
      Request::EnterLowPower => Phase::Wakeup,
      Request::HoldInLowPower => Phase::Standby,
      Request::Reset => Phase::Reset,
      Request::Continue => match self.pending {
        Some(pending) => pending,
        None => return Ok(None),
      },
    };

    info!("shutdown: {} -> {} phase", request, phase);

    match coordinator.approve_shutdown(phase, gate, services)? {
      Approval::Deny => {
        self.pending = Some(phase);
        Ok(None)
      }
      Approval::Allow => {
        self.pending = None;
        Ok(Some(phase))
      }
    }
  }

  /// Idle entry point for the main loop. Sleeps until the next interrupt.
  #[cfg(target_arch = "arm")]
  pub fn run(&self) {
    cortex_m::asm::wfi();
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Tests
// ————————————————————————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
  use super::*;
  use crate::power::testing::{Call, MockIo};
  use crate::power::{BTN_ID_WAKEUP, Error, Event};

  fn ready_gate() -> ReadinessGate {
    let mut gate = ReadinessGate::new();
    gate.toggle();
    gate
  }

  #[test]
  fn requests_map_onto_their_phases() {
    let cases = [
      (Request::EnterLowPower, Phase::Wakeup),
      (Request::HoldInLowPower, Phase::Standby),
      (Request::Reset, Phase::Reset),
    ];

    for (request, phase) in cases {
      let mut manager = PowerManager::new();
      let mut coordinator = ShutdownCoordinator::new();
      let gate = ready_gate();
      let mut io = MockIo::new();

      let executed = manager.shutdown(request, &mut coordinator, &gate, &mut io).unwrap();

      assert_eq!(executed, Some(phase));
      assert_eq!(manager.pending(), None);
    }
  }

  #[test]
  fn denied_attempt_stays_pending_until_continue() {
    let mut manager = PowerManager::new();
    let mut coordinator = ShutdownCoordinator::new();
    let mut gate = ReadinessGate::new();
    let mut io = MockIo::new();

    let executed = manager
      .shutdown(Request::EnterLowPower, &mut coordinator, &gate, &mut io)
      .unwrap();

    assert_eq!(executed, None);
    assert_eq!(manager.pending(), Some(Phase::Wakeup));
    assert!(io.calls.is_empty());

    gate.toggle();

    let executed = manager
      .shutdown(Request::Continue, &mut coordinator, &gate, &mut io)
      .unwrap();

    assert_eq!(executed, Some(Phase::Wakeup));
    assert_eq!(manager.pending(), None);
    assert_eq!(io.calls, vec![
      Call::DisableInputs,
      Call::EnableWakeInput(BTN_ID_WAKEUP),
      Call::ArmAuxWake,
      Call::StopAll,
    ]);
  }

  #[test]
  fn continue_with_nothing_pending_is_a_no_op() {
    let mut manager = PowerManager::new();
    let mut coordinator = ShutdownCoordinator::new();
    let gate = ready_gate();
    let mut io = MockIo::new();

    let executed = manager.shutdown(Request::Continue, &mut coordinator, &gate, &mut io).unwrap();

    assert_eq!(executed, None);
    assert!(io.calls.is_empty());
    assert!(!coordinator.sequence_started());
  }

  #[test]
  fn approval_faults_surface_and_leave_nothing_pending() {
    let mut manager = PowerManager::new();
    let mut coordinator = ShutdownCoordinator::new();
    let gate = ready_gate();
    let mut io = MockIo::new();
    io.fail_stop_all = true;

    let error = manager
      .shutdown(Request::Reset, &mut coordinator, &gate, &mut io)
      .unwrap_err();

    assert_eq!(error, Error::Timer);
    assert_eq!(manager.pending(), None);
  }

  /// The demo gesture end to end: an unready device holds a low power
  /// request, the readiness toggle resumes it.
  #[test]
  fn held_shutdown_resumes_through_the_toggle_event() {
    let mut manager = PowerManager::new();
    let mut coordinator = ShutdownCoordinator::new();
    let mut gate = ReadinessGate::new();
    let mut io = MockIo::new();

    let executed = manager
      .shutdown(Request::EnterLowPower, &mut coordinator, &gate, &mut io)
      .unwrap();
    assert_eq!(executed, None);

    let request = coordinator.handle_event(Event::ToggleReady, &mut gate).unwrap();
    assert_eq!(request, Request::Continue);

    let executed = manager.shutdown(request, &mut coordinator, &gate, &mut io).unwrap();
    assert_eq!(executed, Some(Phase::Wakeup));
  }
}
