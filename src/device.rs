//! Hardware Device Configuration
// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                           Device
// ————————————————————————————————————————————————————————————————————————————————————————————————

use core::cell::RefCell;
use core::fmt::Write;

use crate::power::{self, BTN_ID_WAKEUP, Error, InputControl, TimerControl};
use crate::serial_io;
use crate::serial_io::SERIAL;

use rp2040_hal as hal;
//
use hal::clocks;
use hal::fugit::{Duration, ExtU32, MicrosDurationU32};
use hal::gpio;
use hal::gpio::Interrupt::LevelLow;
use hal::pac;
use hal::timer::{Alarm, Alarm0, Timer};
use hal::{sio, usb, watchdog};

use cortex_m::prelude::*;
use critical_section::{Mutex, with as free};
use heapless::String;
use usb_device::class_prelude::*;
use usb_device::prelude::*;
use usbd_serial::SerialPort;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                           Globals
// ————————————————————————————————————————————————————————————————————————————————————————————————

static ALARM_0: Mutex<RefCell<Option<Alarm0>>> = Mutex::new(RefCell::new(None));

/// Background tick driving USB housekeeping, and the wake cadence of the
/// idle loop.
const INTERRUPT_0_US: MicrosDurationU32 = MicrosDurationU32::from_ticks(10_000); // 10ms - 100hz

const XOSC_CRYSTAL_FREQ: u32 = 12_000_000; // 12Mhz

// "coma", the XOSC DORMANT entry value.
const XOSC_DORMANT_MAGIC: u32 = 0x636f_6d61;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                        Pin Assignment
// ————————————————————————————————————————————————————————————————————————————————————————————————
//
// RPi Pico - https://pico.pinout.xyz
//
// GPIO 16 - readiness button (BTN 0)
// GPIO 17 - sleep button (BTN 1), doubles as the dormant wake input
// GPIO 18 - reset button (BTN 2)
// GPIO 25 - internal - LED

// Inputs
pub type InputType = gpio::Pin<gpio::DynPinId, gpio::FunctionSio<gpio::SioInput>, gpio::PullUp>;

pub struct Inputs {
  pub btn_ready: InputType, // gpio 16
  pub btn_sleep: InputType, // gpio 17
  pub btn_reset: InputType, // gpio 18
}

// Outputs
pub type OutputType = gpio::Pin<gpio::DynPinId, gpio::FunctionSio<gpio::SioOutput>, gpio::PullDown>;

pub struct Outputs {
  pub led: OutputType, // internal 25
}

// ———————————————————————————————————————————————————————————————————————————————————————————————
//                                         Device Struct
// ———————————————————————————————————————————————————————————————————————————————————————————————

pub struct Device {
  pub timer:    Timer,
  pub watchdog: watchdog::Watchdog,
  pub inputs:   Inputs,
  pub outputs:  Outputs,
}

impl Device {
  // ——————————————————————————————————————————— New ——————————————————————————————————————————————

  pub fn new() -> Self {
    //
    // ———————————————————————————————————— Hal Boilerplate ———————————————————————————————————————

    let mut pac = pac::Peripherals::take().unwrap();
    let mut watchdog = watchdog::Watchdog::new(pac.WATCHDOG);
    let sio = sio::Sio::new(pac.SIO);
    let pac_pins = gpio::Pins::new(pac.IO_BANK0, pac.PADS_BANK0, sio.gpio_bank0, &mut pac.RESETS);

    // ————————————————————————————————————————— Clocks ———————————————————————————————————————————

    let sys_clocks = clocks::init_clocks_and_plls(
      XOSC_CRYSTAL_FREQ,
      pac.XOSC,
      pac.CLOCKS,
      pac.PLL_SYS,
      pac.PLL_USB,
      &mut pac.RESETS,
      &mut watchdog,
    )
    .ok()
    .unwrap();

    // ————————————————————————————————————————— Timer ————————————————————————————————————————————

    let mut timer = Timer::new(pac.TIMER, &mut pac.RESETS, &sys_clocks);

    // ———————————————————————————————————————— USB Bus ———————————————————————————————————————————

    // usb bus used to create serial and usb_device then into >> serialio
    let usb_bus = UsbBusAllocator::new(usb::UsbBus::new(
      pac.USBCTRL_REGS,
      pac.USBCTRL_DPRAM,
      sys_clocks.usb_clock,
      true,
      &mut pac.RESETS,
    ));

    // quick persistent singleton creation
    let usb_bus_ref = cortex_m::singleton!(: UsbBusAllocator<usb::UsbBus> = usb_bus).unwrap();

    // ————————————————————————————————————— Serial Device ————————————————————————————————————————

    let serial = SerialPort::new(usb_bus_ref); // Needs to be set before usb_dev

    // ——————————————————————————————————————— Usb Device —————————————————————————————————————————

    let usb_dev = UsbDeviceBuilder::new(usb_bus_ref, UsbVidPid(0x16c0, 0x27dd))
      .strings(&[StringDescriptors::default()
        .manufacturer("pico_demos")
        .product("pico_power_mgmt")
        .serial_number("DEV")])
      .unwrap()
      .device_class(usbd_serial::USB_CLASS_CDC)
      .build();

    // ————————————————————————————————————— SERIAL Handle ————————————————————————————————————————

    // Init SERIAL global
    serial_io::init(serial, usb_dev);

    // Priming USB connection
    SERIAL.poll_usb();

    // ————————————————————————————————————————— Interrupts ———————————————————————————————————————

    let mut alarm0 = timer.alarm_0().unwrap();
    alarm0.schedule(INTERRUPT_0_US).unwrap();
    alarm0.enable_interrupt();

    free(|cs| {
      ALARM_0.borrow(cs).borrow_mut().replace(alarm0);
    });

    // Enable Interrupt
    unsafe {
      pac::NVIC::unmask(pac::Interrupt::TIMER_IRQ_0);
    }

    // —————————————————————————————————————————— Pins ————————————————————————————————————————————

    // Inputs
    let btn_ready: InputType = pac_pins.gpio16.into_pull_up_input().into_dyn_pin();
    let btn_sleep: InputType = pac_pins.gpio17.into_pull_up_input().into_dyn_pin();
    let btn_reset: InputType = pac_pins.gpio18.into_pull_up_input().into_dyn_pin();

    let inputs = Inputs {
      btn_ready,
      btn_sleep,
      btn_reset,
    };

    // Outputs
    let led: OutputType = pac_pins.gpio25.into_push_pull_output().into_dyn_pin();

    let outputs = Outputs { led };

    // —————————————————————————————————————— Construct ———————————————————————————————————————————

    Self {
      timer,
      watchdog,
      inputs,
      outputs,
    }
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Traits
// ————————————————————————————————————————————————————————————————————————————————————————————————

// ——————————————————————————————————— Collaborator Services ——————————————————————————————————————

impl InputControl for Device {
  /// Take every button out of the wake path ahead of a power down.
  /// Idempotent, a resumed shutdown attempt replays it.
  fn disable_inputs(&mut self) -> power::Result<()> {
    for pin in [
      &mut self.inputs.btn_ready,
      &mut self.inputs.btn_sleep,
      &mut self.inputs.btn_reset,
    ] {
      pin.set_dormant_wake_enabled(LevelLow, false);
    }

    Ok(())
  }

  fn enable_wake_input(&mut self, id: u8) -> power::Result<()> {
    if id != BTN_ID_WAKEUP {
      return Err(Error::NoWakeSource);
    }

    self.inputs.btn_sleep.set_dormant_wake_enabled(LevelLow, true);
    Ok(())
  }

  /// No NFC class wake source on this board.
  fn arm_aux_wake_source(&mut self) -> power::Result<()> {
    Err(Error::NoWakeSource)
  }
}

impl TimerControl for Device {
  fn stop_all(&mut self) -> power::Result<()> {
    free(|cs| {
      if let Some(alarm) = ALARM_0.borrow(cs).borrow_mut().as_mut() {
        alarm.disable_interrupt();
        alarm.clear_interrupt();
      }
    });

    Ok(())
  }
}

// ————————————————————————————————————————— Timer Ext ————————————————————————————————————————————

pub trait TimerExt {
  fn now(&self) -> Duration<u64, 1, 1_000_000>;
  fn print_time(&self) -> String<16>;
  fn delay_ms(&self, millis: u32);
}

impl TimerExt for Timer {
  fn now(&self) -> Duration<u64, 1, 1_000_000> {
    self.get_counter().duration_since_epoch()
  }

  fn print_time(&self) -> String<16> {
    let total_micros = self.now().to_micros();

    // Calculate components
    let total_millis = total_micros / 1_000;
    let total_seconds = total_millis / 1_000;
    let min = total_seconds / 60;
    let sec = total_seconds % 60;
    let mil = total_millis % 1_000;

    // Use heapless::String for formatting
    let mut time: String<16> = String::new();
    write!(&mut time, "{min}:{sec:02}.{mil:03}").expect("print time fmt");
    time
  }

  /// Count Down Delay ms - Precise and async-friendly
  fn delay_ms(&self, millis: u32) {
    let mut count_down = self.count_down();
    count_down.start(millis.millis());
    let _ = nb::block!(count_down.wait());
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                          Free Functions
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Reset device
pub fn device_reset() -> ! {
  cortex_m::peripheral::SCB::sys_reset();
}

/// Put the chip into DORMANT until an armed wake input fires.
///
/// Clock init consumed the XOSC token, so the stopover runs on the raw
/// register block. The clock tree is stale after a wake; callers resume
/// normal operation through a full reset.
pub fn device_enter_dormant() {
  let clocks = unsafe { &*pac::CLOCKS::ptr() };
  let xosc = unsafe { &*pac::XOSC::ptr() };

  // Run the cores straight off the crystal, the PLLs stop with it anyway
  clocks.clk_ref_ctrl().modify(|_, w| w.src().xosc_clksrc());
  clocks.clk_sys_ctrl().modify(|_, w| w.src().clk_ref());

  // Execution halts on this write and continues after a dormant wake event
  xosc.dormant().write(|w| unsafe { w.bits(XOSC_DORMANT_MAGIC) });
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                           Interrupts
// ————————————————————————————————————————————————————————————————————————————————————————————————

// Interrupt 0 - USB housekeeping
#[pac::interrupt]
fn TIMER_IRQ_0() {
  SERIAL.poll_usb();

  // Reset interrupt timer safely
  free(|cs| {
    if let Some(alarm) = ALARM_0.borrow(cs).borrow_mut().as_mut() {
      alarm.clear_interrupt();
      alarm.schedule(INTERRUPT_0_US).unwrap();
    };
  })
}
