//! Recording pin driver used by the unit tests.
use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::cable::{DriverError, PinDriver, Signal};
use crate::statemachine::TapState;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    Set(Signal, bool),
    Clock { tms: bool, tdi: bool },
    Read(bool),
    Wait(u32),
}

/// Where TDO values come from.
pub enum Tdo {
    /// TDI delayed by a shift register of the given length.
    Loopback(usize),
    /// Replay these bits, then read low.
    Script(VecDeque<bool>),
}

pub struct FakeDriver {
    pub events: Vec<Event>,
    pub elapsed_us: u64,
    /// TAP state as seen by the target, advanced on every clock.
    pub tap: TapState,
    tms: bool,
    tdi: bool,
    tdo: Tdo,
    chain: VecDeque<bool>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::with_tdo(Tdo::Script(VecDeque::new()))
    }

    pub fn loopback(len: usize) -> Self {
        Self::with_tdo(Tdo::Loopback(len))
    }

    fn with_tdo(tdo: Tdo) -> Self {
        Self {
            events: Vec::new(),
            elapsed_us: 0,
            tap: TapState::Reset,
            tms: false,
            tdi: false,
            tdo,
            chain: VecDeque::new(),
        }
    }

    /// Queue `bits` bits of `data`, least significant bit of the first byte first.
    pub fn script(&mut self, data: &[u8], bits: usize) {
        if let Tdo::Script(ref mut q) = self.tdo {
            for i in 0..bits {
                q.push_back((data[i / 8] >> (i % 8)) & 1 == 1);
            }
        }
    }

    /// The (tms, tdi) level at every clock pulse so far.
    pub fn clocks(&self) -> Vec<(bool, bool)> {
        self.events.iter().filter_map(|e| match e {
            Event::Clock { tms, tdi } => Some((*tms, *tdi)),
            _ => None,
        }).collect()
    }

    pub fn tms_sequence(&self) -> Vec<bool> {
        self.clocks().into_iter().map(|(tms, _)| tms).collect()
    }

    pub fn waits(&self) -> Vec<u32> {
        self.events.iter().filter_map(|e| match e {
            Event::Wait(us) => Some(*us),
            _ => None,
        }).collect()
    }

    pub fn reads(&self) -> usize {
        self.events.iter().filter(|e| matches!(e, Event::Read(_))).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl PinDriver for FakeDriver {
    fn set_line(&mut self, signal: Signal, level: bool) -> Result<(), DriverError> {
        match signal {
            Signal::Tms => self.tms = level,
            Signal::Tdi => self.tdi = level,
            Signal::Tck => {}
        }
        self.events.push(Event::Set(signal, level));
        Ok(())
    }

    fn pulse_clock(&mut self) -> Result<(), DriverError> {
        self.events.push(Event::Clock { tms: self.tms, tdi: self.tdi });
        self.tap = self.tap.next(self.tms);
        if let Tdo::Loopback(len) = self.tdo {
            self.chain.push_back(self.tdi);
            if self.chain.len() > len {
                self.chain.pop_front();
            }
        }
        Ok(())
    }

    fn read_tdo(&mut self) -> Result<bool, DriverError> {
        let bit = match self.tdo {
            Tdo::Loopback(len) => self.chain.len() == len && self.chain.front().copied().unwrap_or(false),
            Tdo::Script(ref mut q) => q.pop_front().unwrap_or(false),
        };
        self.events.push(Event::Read(bit));
        Ok(bit)
    }

    fn wait_us(&mut self, micros: u32) -> Result<(), DriverError> {
        self.elapsed_us += micros as u64;
        self.events.push(Event::Wait(micros));
        Ok(())
    }
}
