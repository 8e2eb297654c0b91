//! Implement the `PinDriver` trait for FTDI FT232R adapters in synchronous bit-bang mode
use std::thread;
use std::time::Duration;
use std::vec;
use std::vec::Vec;

use libftd2xx::{BitMode, Ftdi, FtdiCommon};
use log::debug;

use crate::cable::{DriverError, PinDriver, Signal};

/// Which data bus bit each JTAG line is wired to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PinMap {
    pub tck: u8,
    pub tdi: u8,
    pub tdo: u8,
    pub tms: u8,
}

impl Default for PinMap {
    /// The common FT232R "bit-bang JTAG" wiring: TXD=TCK, RXD=TDI, RTS=TDO, CTS=TMS.
    fn default() -> Self {
        PinMap { tck: 0, tdi: 1, tdo: 2, tms: 3 }
    }
}

pub struct Ft232r {
    ft: Ftdi,
    pins: PinMap,
    /// Current level of every output bit
    out: u8,
}

impl Ft232r {
    /// The EasyFlash 3 cartridge's on-board CPLD programmer.
    pub fn easyflash3(baud: u32) -> Result<Self, DriverError> {
        libftd2xx::set_vid_pid(0x0403, 0x8738)?;
        Ft232r::new("EasyFlash 3", baud, PinMap { tck: 2, tdi: 0, tdo: 3, tms: 1 })
    }

    /// Create a new Ft232r.  `description` is the value passed to `Ftdi::with_description` to
    /// select which hardware to use.  `baud` sets the bit-bang rate, one TCK edge per sample.
    pub fn new(description: &str, baud: u32, pins: PinMap) -> Result<Self, DriverError> {
        let mut ft = Ftdi::with_description(description)?;
        ft.set_baud_rate(baud)?;
        let outputs = 1 << pins.tck | 1 << pins.tdi | 1 << pins.tms;
        ft.set_bit_mode(outputs, BitMode::SyncBitbang)?;
        ft.purge_all()?;
        debug!("opened {} in sync bit-bang mode at {} baud", description, baud);

        Ok(Self {
            ft,
            pins,
            out: 0,
        })
    }

    /// Write `samples` to the bus.  In synchronous mode every written byte produces one byte of
    /// pin samples, taken just before the byte is applied.
    fn transfer(&mut self, samples: &[u8]) -> Result<Vec<u8>, DriverError> {
        let written = self.ft.write(samples)?;
        if written != samples.len() {
            return Err(DriverError::ShortTransfer { expected: samples.len(), actual: written });
        }
        let mut recv = vec![0; samples.len()];
        let actual = self.ft.read(&mut recv)?;
        if actual != recv.len() {
            return Err(DriverError::ShortTransfer { expected: recv.len(), actual });
        }
        Ok(recv)
    }

    fn bit(&self, signal: Signal) -> u8 {
        match signal {
            Signal::Tms => self.pins.tms,
            Signal::Tdi => self.pins.tdi,
            Signal::Tck => self.pins.tck,
        }
    }
}

impl PinDriver for Ft232r {
    fn set_line(&mut self, signal: Signal, level: bool) -> Result<(), DriverError> {
        let mask = 1 << self.bit(signal);
        if level {
            self.out |= mask;
        } else {
            self.out &= !mask;
        }
        self.transfer(&[self.out])?;
        Ok(())
    }

    fn pulse_clock(&mut self) -> Result<(), DriverError> {
        let clk = 1 << self.pins.tck;
        self.out &= !clk;
        self.transfer(&[self.out | clk, self.out])?;
        Ok(())
    }

    fn read_tdo(&mut self) -> Result<bool, DriverError> {
        let recv = self.transfer(&[self.out])?;
        Ok(recv[0] & (1 << self.pins.tdo) != 0)
    }

    fn wait_us(&mut self, micros: u32) -> Result<(), DriverError> {
        thread::sleep(Duration::from_micros(micros as u64));
        Ok(())
    }
}
