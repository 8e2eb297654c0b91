//! Bit-banged JTAG over four `embedded-hal` pins.
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};

use crate::cable::{DriverError, PinDriver, Signal};

fn pin_error<E: embedded_hal::digital::Error>(e: E) -> DriverError {
    DriverError::Pin(e.kind())
}

pub struct Gpio<Clk, Tdi, Tdo, Tms, Delay> where Clk: OutputPin, Tdi: OutputPin, Tdo: InputPin, Tms: OutputPin, Delay: DelayNs {
    half_period: u32,
    delay: Delay,
    clock: Clk,
    tdi: Tdi,
    tdo: Tdo,
    tms: Tms
}

impl<Clk, Tdi, Tdo, Tms, Delay> Gpio<Clk, Tdi, Tdo, Tms, Delay> where Clk: OutputPin, Tdi: OutputPin, Tdo: InputPin, Tms: OutputPin, Delay: DelayNs {
    /// Wrap the four JTAG pins.  `freq_khz` is the TCK rate; each half period is held with
    /// `delay`.  TCK is driven low so the first pulse starts from a known level.
    pub fn new(freq_khz: u32, mut clock: Clk, tdi: Tdi, tdo: Tdo, tms: Tms, delay: Delay) -> Result<Self, DriverError> {
        let period_ns = 1_000_000 / freq_khz.max(1);
        let half_period = period_ns / 2;
        clock.set_low().map_err(pin_error)?;
        Ok(Gpio { half_period, clock, tdi, tdo, tms, delay })
    }

    /// Give the pins back.
    pub fn release(self) -> (Clk, Tdi, Tdo, Tms, Delay) {
        (self.clock, self.tdi, self.tdo, self.tms, self.delay)
    }
}

impl<Clk, Tdi, Tdo, Tms, Delay> PinDriver for Gpio<Clk, Tdi, Tdo, Tms, Delay> where Clk: OutputPin, Tdi: OutputPin, Tdo: InputPin, Tms: OutputPin, Delay: DelayNs {
    fn set_line(&mut self, signal: Signal, level: bool) -> Result<(), DriverError> {
        let state = PinState::from(level);
        match signal {
            Signal::Tms => self.tms.set_state(state).map_err(pin_error),
            Signal::Tdi => self.tdi.set_state(state).map_err(pin_error),
            Signal::Tck => self.clock.set_state(state).map_err(pin_error),
        }
    }

    fn pulse_clock(&mut self) -> Result<(), DriverError> {
        // clock starts low
        self.clock.set_high().map_err(pin_error)?;
        self.delay.delay_ns(self.half_period);

        // Finish the clock period
        self.clock.set_low().map_err(pin_error)?;
        self.delay.delay_ns(self.half_period);
        Ok(())
    }

    fn read_tdo(&mut self) -> Result<bool, DriverError> {
        self.tdo.is_high().map_err(pin_error)
    }

    fn wait_us(&mut self, micros: u32) -> Result<(), DriverError> {
        self.delay.delay_us(micros);
        Ok(())
    }
}
