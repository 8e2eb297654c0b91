//! Implementations for different pin-level JTAG adapters live here.  Adapters should implement
//! the `PinDriver` trait, which exposes the four primitive pin operations the player needs plus
//! a blocking delay.
use thiserror::Error;

pub mod gpio;
#[cfg(feature = "std")]
pub mod ft232r;
#[cfg(test)]
pub(crate) mod fake;

/// The JTAG lines driven by the host.  TDO is an input and is only ever read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    Tms,
    Tdi,
    Tck,
}

/// Failure reported by a pin driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("GPIO pin error: {0}")]
    Pin(embedded_hal::digital::ErrorKind),
    #[cfg(feature = "std")]
    #[error("FTDI error")]
    Ftdi(#[from] libftd2xx::FtStatus),
    #[cfg(feature = "std")]
    #[error("unknown cable {0:?}")]
    UnknownCable(std::string::String),
    #[error("short transfer: expected {expected} bytes, got {actual}")]
    ShortTransfer { expected: usize, actual: usize },
}

pub trait PinDriver {
    /// Drive `signal` to `level`.  Setting TCK directly is allowed but the player only ever
    /// clocks through `pulse_clock`.
    fn set_line(&mut self, signal: Signal, level: bool) -> Result<(), DriverError>;
    /// Drive TCK high then low, honouring the adapter's minimum pulse width.  TCK is low on
    /// return.
    fn pulse_clock(&mut self) -> Result<(), DriverError>;
    /// Sample the TDO line.
    fn read_tdo(&mut self) -> Result<bool, DriverError>;
    /// Block for at least `micros` microseconds.
    fn wait_us(&mut self, micros: u32) -> Result<(), DriverError>;
}

impl<T: PinDriver + ?Sized> PinDriver for &mut T {
    fn set_line(&mut self, signal: Signal, level: bool) -> Result<(), DriverError> {
        (**self).set_line(signal, level)
    }

    fn pulse_clock(&mut self) -> Result<(), DriverError> {
        (**self).pulse_clock()
    }

    fn read_tdo(&mut self) -> Result<bool, DriverError> {
        (**self).read_tdo()
    }

    fn wait_us(&mut self, micros: u32) -> Result<(), DriverError> {
        (**self).wait_us(micros)
    }
}

#[cfg(feature = "std")]
impl<T: PinDriver + ?Sized> PinDriver for std::boxed::Box<T> {
    fn set_line(&mut self, signal: Signal, level: bool) -> Result<(), DriverError> {
        (**self).set_line(signal, level)
    }

    fn pulse_clock(&mut self) -> Result<(), DriverError> {
        (**self).pulse_clock()
    }

    fn read_tdo(&mut self) -> Result<bool, DriverError> {
        (**self).read_tdo()
    }

    fn wait_us(&mut self, micros: u32) -> Result<(), DriverError> {
        (**self).wait_us(micros)
    }
}

/// Open a host-attached cable by name.  `baud` sets the bit-bang rate of adapters that have
/// one.
#[cfg(feature = "std")]
pub fn new_from_string(name: &str, baud: u32) -> Result<std::boxed::Box<dyn PinDriver>, DriverError> {
    let cable: std::boxed::Box<dyn PinDriver> = match name {
        "ft232r" => std::boxed::Box::new(ft232r::Ft232r::new("FT232R USB UART", baud, ft232r::PinMap::default())?),
        "easyflash3" => std::boxed::Box::new(ft232r::Ft232r::easyflash3(baud)?),
        _ => return Err(DriverError::UnknownCable(name.into())),
    };
    Ok(cable)
}
