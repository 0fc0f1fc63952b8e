//! Button input layer
//!
//! Maps the three board buttons onto the semantic power events through a
//! push/release/long-push action table. Buttons are sampled on a fixed
//! interval; the interval doubles as the debounce window.

use crate::device::Inputs;
use crate::power::{BTN_ID_READY, BTN_ID_RESET, BTN_ID_SLEEP, Event};
use crate::prelude::*;
use crate::tasklet::Tasklet;

use rp2040_hal::timer::Timer;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Globals
// ————————————————————————————————————————————————————————————————————————————————————————————————

const NUM_BUTTONS: usize = 3;
const SAMPLE_INTERVAL_MS: u32 = 20;

/// Hold time that turns a push into a long push.
const LONG_PUSH_US: u64 = 1_000_000;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Actions
// ————————————————————————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Action {
  Push,
  Release,
  LongPush,
}

impl core::fmt::Display for Action {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    write!(f, "{}", match self {
      Action::Push => "push",
      Action::Release => "release",
      Action::LongPush => "long push",
    })
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                         Buttons Struct
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Tracks press state per button and turns level changes into actions.
pub struct Buttons {
  sample:         Tasklet,
  timer:          Timer,
  pressed_since:  [Option<u64>; NUM_BUTTONS],
  long_push_sent: [bool; NUM_BUTTONS],
}

impl Buttons {
  pub fn new(timer: &Timer) -> Self {
    Self {
      sample:         Tasklet::new(SAMPLE_INTERVAL_MS, timer),
      timer:          *timer,
      pressed_since:  [None; NUM_BUTTONS],
      long_push_sent: [false; NUM_BUTTONS],
    }
  }

  /// Sample the buttons and collect the semantic events they produce.
  ///
  /// A release always fires, long push or not: hold-then-release on the
  /// sleep button yields stay-in-low-power followed by enter-low-power.
  pub fn poll(&mut self, inputs: &mut Inputs) -> Vec<Event, 4> {
    let mut events = Vec::new();

    if !self.sample.is_ready() {
      return events;
    }

    let now = self.timer.get_counter().ticks();

    for id in 0..NUM_BUTTONS as u8 {
      let slot = id as usize;
      let pressed = is_pressed(inputs, id);

      match (self.pressed_since[slot], pressed) {
        (None, true) => {
          self.pressed_since[slot] = Some(now);
          self.long_push_sent[slot] = false;
          push_event(&mut events, id, Action::Push);
        }

        (Some(since), true) => {
          if !self.long_push_sent[slot] && now - since >= LONG_PUSH_US {
            self.long_push_sent[slot] = true;
            push_event(&mut events, id, Action::LongPush);
          }
        }

        (Some(since), false) => {
          self.pressed_since[slot] = None;

          // Crossed the threshold between two samples
          if !self.long_push_sent[slot] && now - since >= LONG_PUSH_US {
            push_event(&mut events, id, Action::LongPush);
          }

          push_event(&mut events, id, Action::Release);
        }

        (None, false) => {}
      }
    }

    events
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                        Helper Functions
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Pull up wiring, a pressed button pulls the pin low.
fn is_pressed(inputs: &mut Inputs, id: u8) -> bool {
  let pin = match id {
    BTN_ID_READY => &mut inputs.btn_ready,
    BTN_ID_SLEEP => &mut inputs.btn_sleep,
    _ => &mut inputs.btn_reset,
  };

  pin.is_low().unwrap_or(false)
}

fn push_event(events: &mut Vec<Event, 4>, id: u8, action: Action) {
  trace!("button {} {}", id, action);

  if let Some(event) = map_action(id, action) {
    let _ = events.push(event);
  }
}

/// Button action table:
/// BTN 0 release -> toggle readiness, BTN 1 long push -> stay in low power,
/// BTN 1 release -> enter low power, BTN 2 release -> reset.
fn map_action(id: u8, action: Action) -> Option<Event> {
  match (id, action) {
    (BTN_ID_READY, Action::Release) => Some(Event::ToggleReady),
    (BTN_ID_SLEEP, Action::LongPush) => Some(Event::HoldInLowPower),
    (BTN_ID_SLEEP, Action::Release) => Some(Event::EnterLowPower),
    (BTN_ID_RESET, Action::Release) => Some(Event::Reset),
    _ => None,
  }
}
