//! Main power management program loop

use crate::buttons::Buttons;
use crate::device::{Device, TimerExt, device_enter_dormant, device_reset};
use crate::power::{Error, Phase, PowerManager, ReadinessGate, Request, ShutdownCoordinator};
use crate::prelude::*;
use crate::tasklet::Tasklet;

use rp2040_hal::timer::Timer;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Globals
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Idle window before the loop requests low power on its own.
/// Any button event feeds the window.
const STANDBY_TIMEOUT_ENABLED: bool = true;
const STANDBY_TIMEOUT_MS: u32 = 30_000;

const HEARTBEAT_MS: u32 = 500;

/// Drain window for the last diagnostic lines before the power state changes.
const FLUSH_DELAY_MS: u32 = 100;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                        Program Struct
// ————————————————————————————————————————————————————————————————————————————————————————————————

pub struct Program {
  gate:        ReadinessGate,
  coordinator: ShutdownCoordinator,
  manager:     PowerManager,
  buttons:     Buttons,
  standby:     Tasklet,
  heartbeat:   Tasklet,
  cycles:      u8,
}

impl Program {
  // ——————————————————————————————————————————— New ——————————————————————————————————————————————

  pub fn new(timer: &Timer) -> Self {
    Self {
      gate:        ReadinessGate::new(),
      coordinator: ShutdownCoordinator::new(),
      manager:     PowerManager::new(),
      buttons:     Buttons::new(timer),
      standby:     Tasklet::new(STANDBY_TIMEOUT_MS, timer),
      heartbeat:   Tasklet::new(HEARTBEAT_MS, timer),
      cycles:      0,
    }
  }

  // ——————————————————————————————————————————————————————————————————————————————————————————————
  //                                             Init
  // ——————————————————————————————————————————————————————————————————————————————————————————————

  pub fn init(&mut self, device: &mut Device) {
    // Wait for a serial connection so the banner lands on the host
    // terminal, capped so untethered boots still come up
    while !SERIAL.is_connected() && device.timer.get_counter().ticks() < 2_000_000 {
      SERIAL.poll_usb();
    }

    println!();
    println!("======    Power Management    ======");
    println!("boot at {}", device.timer.print_time());

    #[cfg(all(feature = "panic-persist", not(feature = "panic-probe")))]
    if let Some(msg) = panic_persist::get_panic_message_utf8() {
      println!("last panic: {}", msg);
    }

    println!("BTN 0 - toggle shutdown readiness");
    println!("BTN 1 - hold: stay in low power | release: enter low power");
    println!("BTN 2 - reset");
    println!();

    device.outputs.led.set_high().unwrap();
  }

  // ——————————————————————————————————————————————————————————————————————————————————————————————
  //                                             Run
  // ——————————————————————————————————————————————————————————————————————————————————————————————

  pub fn run(&mut self, device: &mut Device) -> ! {
    loop {
      // ————————————————————————————————————— Input Events ———————————————————————————————————————

      let events = self.buttons.poll(&mut device.inputs);

      for &event in events.iter() {
        if STANDBY_TIMEOUT_ENABLED {
          // Any button push pushes the standby timeout out again
          self.standby.reset();
          debug!("standby timeout fed");
        }

        if let Some(request) = self.coordinator.handle_event(event, &mut self.gate) {
          self.issue(request, device);
        }
      }

      // ———————————————————————————————————— Standby Timeout ——————————————————————————————————————

      if STANDBY_TIMEOUT_ENABLED && self.standby.is_ready() {
        info!("standby timeout, requesting low power");
        self.issue(Request::EnterLowPower, device);
      }

      if self.heartbeat.is_ready() {
        device.outputs.led.toggle().unwrap();
      }

      // ——————————————————————————————————————— Idle ——————————————————————————————————————————————

      self.cycles = self.cycles.wrapping_add(1);
      trace!("pwr mgmt cycle {}", self.cycles);

      self.manager.run(); // Sleeps until the next interrupt
    }
  }

  // ——————————————————————————————————————————————————————————————————————————————————————————————
  //                                            Issue
  // ——————————————————————————————————————————————————————————————————————————————————————————————

  /// Issue one transition request and execute the approved phase, if any.
  fn issue(&mut self, request: Request, device: &mut Device) {
    let approved = self.manager.shutdown(request, &mut self.coordinator, &self.gate, device);

    match approved {
      Ok(None) => {} // denied and held, or nothing to resume
      Ok(Some(phase)) => power_down(phase, device),
      Err(e) => fault(e, device),
    }
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                          Free Functions
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Execute an approved power down phase. Does not return.
fn power_down(phase: Phase, device: &mut Device) -> ! {
  info!("executing {} phase", phase);
  device.timer.delay_ms(FLUSH_DELAY_MS);

  match phase {
    // No wake source is armed: stay down, and should a spurious wake slip
    // through, go right back down
    Phase::Standby => loop {
      device_enter_dormant();
    },

    // The wake input is armed. Resume normal operation through a clean
    // reset, the clock tree is stale after dormancy
    Phase::Wakeup => {
      device_enter_dormant();
      device_reset();
    }

    Phase::Reset => device_reset(),

    // Never approved, the poll rejects it as unsupported
    Phase::FirmwareUpdate => fault(Error::Unsupported(phase), device),
  }
}

/// Top level fault policy: non recoverable errors log and reset.
fn fault(error: Error, device: &mut Device) -> ! {
  error!("fatal: {}", error);
  device.timer.delay_ms(FLUSH_DELAY_MS);
  device_reset();
}
