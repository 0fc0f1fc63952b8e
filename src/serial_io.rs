//! USB serial diagnostic sink
//! Owns the serial interface and the usb device. Diagnostics only go out,
//! nothing is read back.
// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                           Serial IO
// ————————————————————————————————————————————————————————————————————————————————————————————————

use core::cell::RefCell;
use core::fmt;
use core::fmt::Write;

use critical_section::{Mutex, with as free};
use rp2040_hal::usb::UsbBus;
use usb_device::UsbError;
use usb_device::device::UsbDevice;
use usbd_serial::SerialPort;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                            Globals
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Spin cycles between write retries while the host drains its buffer.
const WRITE_BACKOFF_CYCLES: u32 = 800;

pub static SERIAL: SerialHandle = SerialHandle;
pub static SERIAL_CELL: Mutex<RefCell<Option<Serialio>>> = Mutex::new(RefCell::new(None));

pub type SerialDev = SerialPort<'static, UsbBus>;
pub type UsbDev = UsbDevice<'static, UsbBus>;
pub type Result<T> = core::result::Result<T, UsbError>;

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                              Init
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Initialise the SERIAL global object once
pub fn init(serial: SerialDev, usb_dev: UsbDev) {
  free(|cs| {
    let mut cell = SERIAL_CELL.borrow_ref_mut(cs);

    if cell.is_some() {
      panic!("SERIAL already initialized");
    }

    cell.replace(Serialio::new(serial, usb_dev));
  });
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                      SerialHandle Struct
// ————————————————————————————————————————————————————————————————————————————————————————————————

/// Serial Handle for the GLOBAL SERIAL object
pub struct SerialHandle;

impl SerialHandle {
  /// Executes a closure with a mutable reference to the serial peripheral.
  pub fn with<F, R>(&self, f: F) -> R
  where F: FnOnce(&mut Serialio) -> R {
    free(|cs| {
      if let Some(cell) = SERIAL_CELL.borrow_ref_mut(cs).as_mut() {
        f(cell)
      } else {
        panic!("SERIAL not initialized");
      }
    })
  }

  /// Polls the USB device and returns true if data was exchanged.
  pub fn poll_usb(&self) -> bool {
    self.with(|cell| cell.poll_usb())
  }

  /// Get serial monitor connection flag
  pub fn is_connected(&self) -> bool {
    self.with(|cell| cell.serial.dtr())
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                         Serialio Struct
// ————————————————————————————————————————————————————————————————————————————————————————————————

pub struct Serialio {
  pub serial:  SerialDev,
  pub usb_dev: UsbDev,
}

impl Serialio {
  fn new(serial: SerialDev, usb_dev: UsbDev) -> Self {
    Self { serial, usb_dev }
  }

  // ——————————————————————————————————————————————————————————————————————————————————————————————
  //                                           Methods
  // ——————————————————————————————————————————————————————————————————————————————————————————————

  /// Polls the usb device for rx tx data, and returns true if some data was exchanged
  /// Must poll the usb every 10ms to be compliant
  fn poll_usb(&mut self) -> bool {
    self.usb_dev.poll(&mut [&mut self.serial])
  }

  /// Writes an entire slice of data, blocking until it is all sent.
  /// Exits early when no serial connection is open, diagnostics are
  /// fire-and-forget.
  fn write(&mut self, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
      match self.serial.write(data) {
        Ok(written) => {
          data = &data[written..];
        }
        Err(UsbError::WouldBlock) => {
          // Nobody is listening, drop the rest
          if !self.serial.dtr() {
            return Err(UsbError::WouldBlock);
          }
          // The serial buffer is full, keep polling while the host drains it
          cortex_m::asm::delay(WRITE_BACKOFF_CYCLES);
        }
        Err(e) => {
          return Err(e);
        }
      }

      // We must poll the USB device to push the serial data out
      self.usb_dev.poll(&mut [&mut self.serial]);
    }

    Ok(())
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Traits
// ————————————————————————————————————————————————————————————————————————————————————————————————

// ——————————————————————————————————————————— Write ——————————————————————————————————————————————

impl Write for Serialio {
  fn write_str(&mut self, s: &str) -> fmt::Result {
    self.write(s.as_bytes()).map_err(|_| fmt::Error)?;
    Ok(())
  }

  fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
    core::fmt::write(self, args)?;
    Ok(())
  }
}

// ————————————————————————————————————————————————————————————————————————————————————————————————
//                                             Macros
// ————————————————————————————————————————————————————————————————————————————————————————————————

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        ::critical_section::with(|cs| {
            if let Some(s) = $crate::serial_io::SERIAL_CELL.borrow_ref_mut(cs).as_mut() {
                let _ = ::core::fmt::Write::write_fmt(s, format_args!($($arg)*));
            }
        })
    }
}

#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\r\n")
    };
    ($($arg:tt)*) => {
        ::critical_section::with(|cs| {
            if let Some(s) = $crate::serial_io::SERIAL_CELL.borrow_ref_mut(cs).as_mut() {
                let _ = ::core::fmt::Write::write_fmt(s, format_args!($($arg)*));
                let _ = ::core::fmt::Write::write_str(s, "\r\n");
            }
        })
    };
}
