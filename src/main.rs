// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                  RP Pico Power Management
// ————————————————————————————————————————————————————————————————————————————————————————————————

#![cfg_attr(target_arch = "arm", no_std)]
#![cfg_attr(target_arch = "arm", no_main)]

mod log;
mod power;
mod prelude;

#[cfg(target_arch = "arm")]
mod buttons;
#[cfg(target_arch = "arm")]
mod device;
#[cfg(target_arch = "arm")]
mod program;
#[cfg(target_arch = "arm")]
mod serial_io;
#[cfg(target_arch = "arm")]
mod tasklet;

#[cfg(target_arch = "arm")]
use device::Device;
#[cfg(target_arch = "arm")]
use program::Program;

#[cfg(all(target_arch = "arm", feature = "panic-persist", not(feature = "panic-probe")))]
use panic_persist as _;

#[cfg(all(target_arch = "arm", feature = "panic-probe"))]
use panic_probe as _;

#[cfg(all(target_arch = "arm", feature = "defmt"))]
use defmt_rtt as _;

/// Second stage bootloader
#[cfg(target_arch = "arm")]
#[unsafe(link_section = ".boot2")]
#[used]
pub static BOOT2: [u8; 256] = rp2040_boot2::BOOT_LOADER_W25Q080;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                              Main
// ————————————————————————————————————————————————————————————————————————————————————————————————

#[cfg(target_arch = "arm")]
#[rp2040_hal::entry]
fn main() -> ! {
  let mut device = Device::new();
  let mut program = Program::new(&device.timer);

  program.init(&mut device);
  program.run(&mut device)
}

// Host stub. The coordinator core in `power` builds and tests off-target.
#[cfg(not(target_arch = "arm"))]
fn main() {}
