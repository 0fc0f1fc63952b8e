//! Shutdown coordination state machine

use crate::prelude::*;

use super::error::{Error, Result};
use super::gate::ReadinessGate;
use super::{Approval, BTN_ID_WAKEUP, Event, InputControl, Phase, Request, TimerControl};

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                     Shutdown Coordinator
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Gates low power entry behind application readiness and carries the
/// stay-in-low-power preference across wake cycles.
///
/// `sequence_started` models a latched shutdown attempt: set when an
/// approval poll is denied, cleared only by a full power cycle, never by
/// application logic.
pub struct ShutdownCoordinator {
  stay_in_lowpower: bool,
  sequence_started: bool,
}

impl ShutdownCoordinator {
  pub const fn new() -> Self {
    Self {
      stay_in_lowpower: false,
      sequence_started: false,
    }
  }

  /// True once a denied shutdown attempt is waiting on readiness.
  pub fn sequence_started(&self) -> bool {
    self.sequence_started
  }

  // ——————————————————————————————————————————————————————————————————————————————————————————————
  //                                          Dispatch
  // ——————————————————————————————————————————————————————————————————————————————————————————————

  /// Dispatch one semantic input event.
  ///
  /// Returns the transition request the event calls for, if any. The caller
  /// must issue it within the same event handling step: a toggle that lands
  /// on ready while a shutdown attempt is latched resumes that attempt
  /// right here, not on some later tick.
  pub fn handle_event(&mut self, event: Event, gate: &mut ReadinessGate) -> Option<Request> {
    match event {
      Event::ToggleReady => {
        let ready = gate.toggle();

        if ready {
          info!("READY for shutdown");
        }
        else {
          info!("NOT READY for shutdown");
        }

        if self.sequence_started && ready {
          info!("resuming held shutdown");
          return Some(Request::Continue);
        }
        None
      }

      Event::HoldInLowPower => {
        self.stay_in_lowpower = true;
        info!("staying in low power across wake cycles");
        None
      }

      Event::EnterLowPower => {
        if self.stay_in_lowpower {
          Some(Request::HoldInLowPower)
        }
        else {
          Some(Request::EnterLowPower)
        }
      }

      Event::Reset => Some(Request::Reset),
    }
  }

  // ——————————————————————————————————————————————————————————————————————————————————————————————
  //                                          Approval
  // ——————————————————————————————————————————————————————————————————————————————————————————————

  /// Shutdown approval poll, invoked by the power manager for each phase of
  /// a power down attempt.
  ///
  /// A denial performs no phase side effects at all. A denied attempt that
  /// is resumed later replays its phase side effects, and each of them is
  /// idempotent, so the replay is safe. On every allow the background
  /// timers are stopped, unconditionally and last.
  pub fn approve_shutdown<S>(
    &mut self,
    phase: Phase,
    gate: &ReadinessGate,
    services: &mut S,
  ) -> Result<Approval>
  where
    S: InputControl + TimerControl,
  {
    // No fallback exists for this phase, whatever the readiness says.
    if phase == Phase::FirmwareUpdate {
      return Err(Error::Unsupported(phase));
    }

    if !gate.is_ready() {
      self.sequence_started = true;
      info!("not ready, {} held until readiness", phase);
      return Ok(Approval::Deny);
    }

    match phase {
      Phase::Standby => {
        services.disable_inputs()?;
      }

      Phase::Wakeup => {
        services.disable_inputs()?;
        arm_optional(services.enable_wake_input(BTN_ID_WAKEUP))?;
        arm_optional(services.arm_aux_wake_source())?;
      }

      Phase::Reset => {
        info!("reset approved");
      }

      Phase::FirmwareUpdate => unreachable!("rejected above"),
    }

    services.stop_all()?;

    Ok(Approval::Allow)
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                        Helper Functions
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// A missing wake source is not a fault, the power down proceeds without
/// it. Genuine faults still propagate.
fn arm_optional(armed: Result<()>) -> Result<()> {
  match armed {
    Err(Error::NoWakeSource) => Ok(()),
    other => other,
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Tests
// ————————————————————————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
  use super::*;
  use crate::power::testing::{Call, MockIo};

  fn ready_gate() -> ReadinessGate {
    let mut gate = ReadinessGate::new();
    gate.toggle();
    gate
  }

  // ——————————————————————————————————————— Approval ———————————————————————————————————————————

  #[test]
  fn deny_when_not_ready_latches_and_skips_side_effects() {
    let mut coordinator = ShutdownCoordinator::new();
    let gate = ReadinessGate::new();
    let mut io = MockIo::new();

    let approval = coordinator.approve_shutdown(Phase::Standby, &gate, &mut io).unwrap();

    assert_eq!(approval, Approval::Deny);
    assert!(coordinator.sequence_started());
    assert!(io.calls.is_empty());
  }

  #[test]
  fn standby_disables_inputs_then_stops_timers_last() {
    let mut coordinator = ShutdownCoordinator::new();
    let gate = ready_gate();
    let mut io = MockIo::new();

    let approval = coordinator.approve_shutdown(Phase::Standby, &gate, &mut io).unwrap();

    assert_eq!(approval, Approval::Allow);
    assert_eq!(io.calls, vec![Call::DisableInputs, Call::StopAll]);
  }

  #[test]
  fn wakeup_arms_the_wake_button_and_shrugs_off_the_missing_aux_source() {
    let mut coordinator = ShutdownCoordinator::new();
    let gate = ready_gate();
    let mut io = MockIo::new();

    let approval = coordinator.approve_shutdown(Phase::Wakeup, &gate, &mut io).unwrap();

    assert_eq!(approval, Approval::Allow);
    assert_eq!(io.calls, vec![
      Call::DisableInputs,
      Call::EnableWakeInput(BTN_ID_WAKEUP),
      Call::ArmAuxWake,
      Call::StopAll,
    ]);
  }

  #[test]
  fn reset_phase_only_stops_timers() {
    let mut coordinator = ShutdownCoordinator::new();
    let gate = ready_gate();
    let mut io = MockIo::new();

    let approval = coordinator.approve_shutdown(Phase::Reset, &gate, &mut io).unwrap();

    assert_eq!(approval, Approval::Allow);
    assert_eq!(io.calls, vec![Call::StopAll]);
  }

  #[test]
  fn firmware_update_is_fatal_whatever_the_readiness() {
    for ready in [false, true] {
      let mut coordinator = ShutdownCoordinator::new();
      let mut gate = ReadinessGate::new();
      let mut io = MockIo::new();

      if ready {
        gate.toggle();
      }

      let error = coordinator.approve_shutdown(Phase::FirmwareUpdate, &gate, &mut io).unwrap_err();

      assert_eq!(error, Error::Unsupported(Phase::FirmwareUpdate));
      assert!(io.calls.is_empty());
      // Distinct from a denial: the attempt is dead, nothing is latched.
      assert!(!coordinator.sequence_started());
    }
  }

  #[test]
  fn denied_attempt_replays_side_effects_once_resumed() {
    let mut coordinator = ShutdownCoordinator::new();
    let mut gate = ReadinessGate::new();
    let mut io = MockIo::new();

    let denied = coordinator.approve_shutdown(Phase::Wakeup, &gate, &mut io).unwrap();
    assert_eq!(denied, Approval::Deny);
    assert!(io.calls.is_empty());

    gate.toggle();

    let resumed = coordinator.approve_shutdown(Phase::Wakeup, &gate, &mut io).unwrap();
    assert_eq!(resumed, Approval::Allow);
    assert_eq!(io.calls, vec![
      Call::DisableInputs,
      Call::EnableWakeInput(BTN_ID_WAKEUP),
      Call::ArmAuxWake,
      Call::StopAll,
    ]);
  }

  #[test]
  fn collaborator_faults_propagate_unchanged() {
    let mut coordinator = ShutdownCoordinator::new();
    let gate = ready_gate();

    let mut io = MockIo::new();
    io.fail_stop_all = true;
    let error = coordinator.approve_shutdown(Phase::Reset, &gate, &mut io).unwrap_err();
    assert_eq!(error, Error::Timer);

    let mut io = MockIo::new();
    io.fail_disable = true;
    let error = coordinator.approve_shutdown(Phase::Standby, &gate, &mut io).unwrap_err();
    assert_eq!(error, Error::Input);
  }

  // ——————————————————————————————————————— Dispatch ———————————————————————————————————————————

  #[test]
  fn toggle_without_latch_requests_nothing() {
    let mut coordinator = ShutdownCoordinator::new();
    let mut gate = ReadinessGate::new();

    assert_eq!(coordinator.handle_event(Event::ToggleReady, &mut gate), None);
    assert!(gate.is_ready());
    assert_eq!(coordinator.handle_event(Event::ToggleReady, &mut gate), None);
    assert!(!gate.is_ready());
  }

  #[test]
  fn toggle_to_ready_resumes_a_latched_shutdown_exactly_once() {
    let mut coordinator = ShutdownCoordinator::new();
    let mut gate = ReadinessGate::new();
    let mut io = MockIo::new();

    coordinator.approve_shutdown(Phase::Wakeup, &gate, &mut io).unwrap();
    assert!(coordinator.sequence_started());

    let request = coordinator.handle_event(Event::ToggleReady, &mut gate);
    assert_eq!(request, Some(Request::Continue));

    // The latch persists until a power cycle: toggling away and back
    // resumes again, but a toggle to not-ready never does.
    assert_eq!(coordinator.handle_event(Event::ToggleReady, &mut gate), None);
    assert_eq!(
      coordinator.handle_event(Event::ToggleReady, &mut gate),
      Some(Request::Continue)
    );
  }

  #[test]
  fn enter_low_power_follows_the_stay_preference() {
    let mut coordinator = ShutdownCoordinator::new();
    let mut gate = ReadinessGate::new();

    assert_eq!(
      coordinator.handle_event(Event::EnterLowPower, &mut gate),
      Some(Request::EnterLowPower)
    );

    assert_eq!(coordinator.handle_event(Event::HoldInLowPower, &mut gate), None);

    assert_eq!(
      coordinator.handle_event(Event::EnterLowPower, &mut gate),
      Some(Request::HoldInLowPower)
    );
  }

  #[test]
  fn reset_event_requests_a_reset() {
    let mut coordinator = ShutdownCoordinator::new();
    let mut gate = ReadinessGate::new();

    assert_eq!(
      coordinator.handle_event(Event::Reset, &mut gate),
      Some(Request::Reset)
    );
  }
}
