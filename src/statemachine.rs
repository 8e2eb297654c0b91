//! This keeps track of the state of the JTAG TAP controller and allows setting the state to any
//! desired state.  `JtagSM` will get to that state by the most efficient path, based on the
//! current state.  It also owns the bit-serial shift engine, since the last bit of a shift can
//! move the TAP out of Shift-DR / Shift-IR.
use core::convert::TryFrom;

use log::trace;

use crate::cable::{DriverError, PinDriver, Signal};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    Data,
    Instruction
}

impl Register {
    /// The shift state for this register.
    pub fn shift_state(self) -> TapState {
        match self {
            Register::Data => TapState::ShiftDR,
            Register::Instruction => TapState::ShiftIR,
        }
    }
}

/// IEEE 1149.1 TAP states.  The discriminants are the state ids used by XSTATE.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TapState {
    Reset = 0,
    Idle = 1,
    SelectDR = 2,
    CaptureDR = 3,
    ShiftDR = 4,
    Exit1DR = 5,
    PauseDR = 6,
    Exit2DR = 7,
    UpdateDR = 8,
    SelectIR = 9,
    CaptureIR = 10,
    ShiftIR = 11,
    Exit1IR = 12,
    PauseIR = 13,
    Exit2IR = 14,
    UpdateIR = 15,
}

use TapState::*;

/// Next state for each state, indexed by `[state][tms]`.
const TRANSITIONS: [[TapState; 2]; 16] = [
    /* Reset     */ [Idle,      Reset],
    /* Idle      */ [Idle,      SelectDR],
    /* SelectDR  */ [CaptureDR, SelectIR],
    /* CaptureDR */ [ShiftDR,   Exit1DR],
    /* ShiftDR   */ [ShiftDR,   Exit1DR],
    /* Exit1DR   */ [PauseDR,   UpdateDR],
    /* PauseDR   */ [PauseDR,   Exit2DR],
    /* Exit2DR   */ [ShiftDR,   UpdateDR],
    /* UpdateDR  */ [Idle,      SelectDR],
    /* SelectIR  */ [CaptureIR, Reset],
    /* CaptureIR */ [ShiftIR,   Exit1IR],
    /* ShiftIR   */ [ShiftIR,   Exit1IR],
    /* Exit1IR   */ [PauseIR,   UpdateIR],
    /* PauseIR   */ [PauseIR,   Exit2IR],
    /* Exit2IR   */ [ShiftIR,   UpdateIR],
    /* UpdateIR  */ [Idle,      SelectDR],
];

/// TMS value for the first step of the shortest path, indexed by `[current][target]`.
/// Columns follow the `TapState` order.  Reset is never walked to through this table.
const NAVIGATION: [[u8; 16]; 16] = [
    //              Rs Id SD CD SD E1 PD E2 UD SI CI SI E1 PI E2 UI
    /* Reset     */ [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    /* Idle      */ [1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    /* SelectDR  */ [1, 1, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1],
    /* CaptureDR */ [1, 1, 1, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    /* ShiftDR   */ [1, 1, 1, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    /* Exit1DR   */ [1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1],
    /* PauseDR   */ [1, 1, 1, 1, 1, 1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1],
    /* Exit2DR   */ [1, 1, 1, 1, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1],
    /* UpdateDR  */ [1, 0, 1, 1, 1, 1, 1, 1, 0, 1, 1, 1, 1, 1, 1, 1],
    /* SelectIR  */ [1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0],
    /* CaptureIR */ [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 1, 1, 1, 1],
    /* ShiftIR   */ [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 1, 1, 1, 1],
    /* Exit1IR   */ [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 1],
    /* PauseIR   */ [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 1, 1],
    /* Exit2IR   */ [1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 1],
    /* UpdateIR  */ [1, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 0],
];

impl TapState {
    pub const ALL: [TapState; 16] = [
        Reset, Idle,
        SelectDR, CaptureDR, ShiftDR, Exit1DR, PauseDR, Exit2DR, UpdateDR,
        SelectIR, CaptureIR, ShiftIR, Exit1IR, PauseIR, Exit2IR, UpdateIR,
    ];

    /// The state reached after one TCK edge with TMS at `tms`.
    pub fn next(self, tms: bool) -> TapState {
        TRANSITIONS[self as usize][tms as usize]
    }

    /// The TMS value that moves one step closer to `target`.
    pub fn toward(self, target: TapState) -> bool {
        NAVIGATION[self as usize][target as usize] != 0
    }
}

impl TryFrom<u8> for TapState {
    type Error = u8;

    fn try_from(id: u8) -> Result<Self, u8> {
        TapState::ALL.get(id as usize).copied().ok_or(id)
    }
}

pub struct JtagSM<T> {
    pub cable: T,
    state: TapState,
}

impl<T, U> JtagSM<T>
    where T: core::ops::DerefMut<Target=U>,
          U: PinDriver + ?Sized
{
    /// Create a JTAG state machine using an existing `PinDriver`.  No pins are touched, so the
    /// tracked state only matches the hardware after `mode_reset`.
    pub fn new(cable: T) -> Self {
        Self {
            cable,
            state: TapState::Reset,
        }
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    /// Drive TMS, pulse TCK once and follow the TAP to its next state
    pub fn step(&mut self, tms: bool) -> Result<(), DriverError> {
        self.cable.set_line(Signal::Tms, tms)?;
        self.cable.pulse_clock()?;
        self.state = self.state.next(tms);
        Ok(())
    }

    /// Reset the TAP by driving TMS high for 5 clocks
    pub fn mode_reset(&mut self) -> Result<(), DriverError> {
        for _ in 0..5 {
            self.step(true)?;
        }
        Ok(())
    }

    /// Use TMS to get into `target` by the most efficient path.  Test-Logic-Reset is always
    /// reached with five TMS=1 clocks, whatever the current state.
    pub fn goto_state(&mut self, target: TapState) -> Result<(), DriverError> {
        trace!("TAP {:?} -> {:?}", self.state, target);
        if target == TapState::Reset {
            return self.mode_reset();
        }

        let mut steps = 0;
        while self.state != target {
            assert!(steps < TapState::ALL.len(),
                    "no TAP path from {:?} to {:?}", self.state, target);
            let tms = self.state.toward(target);
            self.step(tms)?;
            steps += 1;
        }
        Ok(())
    }

    /// Shift `bits` bits of `tdi` out, least significant bit of the first byte first.  If
    /// `tdo` is given, the bit on TDO is captured before each new TDI bit is driven; captured
    /// bits past `bits` in the last byte are zero.  With `exit_after`, TMS goes high for the
    /// last bit so that the TAP leaves the shift state on the final clock.
    ///
    /// Panics if `bits` does not fit in `tdi` or `tdo`.
    pub fn shift(&mut self, tdi: &[u8], mut tdo: Option<&mut [u8]>, bits: usize, exit_after: bool)
        -> Result<(), DriverError>
    {
        assert!(bits <= tdi.len() * 8, "shift of {} bits overruns {} byte TDI buffer", bits, tdi.len());
        if let Some(ref tdo) = tdo {
            assert!(bits <= tdo.len() * 8, "shift of {} bits overruns {} byte TDO buffer", bits, tdo.len());
        }
        if bits == 0 {
            return Ok(());
        }

        let bytes = bits.div_ceil(8);
        for (i, byte) in tdi[..bytes].iter().enumerate() {
            let mut out = *byte;
            let mut captured = 0;
            let count = (bits - i * 8).min(8);
            for b in 0..count {
                if exit_after && i * 8 + b + 1 == bits {
                    // last bit: leave Shift-xR on this clock
                    self.cable.set_line(Signal::Tms, true)?;
                }
                if tdo.is_some() {
                    captured |= (self.cable.read_tdo()? as u8) << b;
                }
                self.cable.set_line(Signal::Tdi, out & 1 == 1)?;
                out >>= 1;
                self.cable.pulse_clock()?;
            }
            if let Some(tdo) = tdo.as_deref_mut() {
                tdo[i] = captured;
            }
        }

        if exit_after {
            self.state = self.state.next(true);
        }
        Ok(())
    }
}
