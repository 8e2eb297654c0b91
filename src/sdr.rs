//! Data register scans with optional TDO verification.
use alloc::vec;
use alloc::vec::Vec;

use log::warn;

use crate::cable::{DriverError, PinDriver};
use crate::statemachine::{JtagSM, Register, TapState};
use crate::xsvf::{bytes, Segment};

/// How a data register scan is framed and whether its TDO is checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SdrFlags {
    /// Walk to Shift-DR before shifting.
    pub begin: bool,
    /// Leave Shift-DR on the last bit and finish in Run-Test/Idle.
    pub end: bool,
    /// Compare captured TDO with the expected value under the TDO mask.
    pub check: bool,
}

impl SdrFlags {
    /// A complete, checked scan: XSDR and XSDRTDO.
    pub const FULL_CHECK: SdrFlags = SdrFlags { begin: true, end: true, check: true };

    pub fn segment(segment: Segment, check: bool) -> Self {
        SdrFlags {
            begin: segment == Segment::Begin,
            end: segment == Segment::End,
            check,
        }
    }
}

/// Session registers set by XSDRSIZE, XREPEAT and XRUNTEST.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    /// Data register scan length in bits.
    pub sdr_size: u32,
    /// Number of retries allowed after a TDO mismatch.
    pub repeat: u8,
    /// Microseconds to wait after each scan.
    pub run_test: u32,
}

/// Fixed size scan buffers.  Only the first `⌈sdr_size / 8⌉` bytes are meaningful.
pub struct ScanBuffers {
    pub address_mask: Vec<u8>,
    pub data_mask: Vec<u8>,
    pub tdi: Vec<u8>,
    pub tdo_expected: Vec<u8>,
    pub tdo_mask: Vec<u8>,
    actual: Vec<u8>,
}

impl ScanBuffers {
    /// Zeroed buffers big enough for `max_bits` bit scans.
    pub fn new(max_bits: usize) -> Self {
        let len = max_bits.div_ceil(8);
        Self {
            address_mask: vec![0; len],
            data_mask: vec![0; len],
            tdi: vec![0; len],
            tdo_expected: vec![0; len],
            tdo_mask: vec![0; len],
            actual: vec![0; len],
        }
    }

    /// Copy an operand into the start of `buf`.
    pub fn load(buf: &mut [u8], data: &[u8]) {
        buf[..data.len()].copy_from_slice(data);
    }

    /// TDO captured by the last scan.
    pub fn actual(&self) -> &[u8] {
        &self.actual
    }

    fn matches(&self, bits: u32) -> bool {
        let n = bytes(bits);
        self.actual[..n].iter()
            .zip(&self.tdo_expected[..n])
            .zip(&self.tdo_mask[..n])
            .all(|((actual, expected), mask)| actual & mask == expected & mask)
    }
}

/// Outcome of `run_sdr`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verify {
    /// TDO matched, or was not checked.  `retries` counts the mismatches before the match.
    Passed { retries: u32 },
    /// TDO never matched in `attempts` scans.
    Failed { attempts: u32 },
}

/// Shift `regs.sdr_size` bits of `bufs.tdi` through the data register.
///
/// With `check`, a mismatch is retried up to `regs.repeat` times.  Each retry goes through
/// Pause-DR and Exit2-DR, back to Run-Test/Idle for `run_test` microseconds, and into Shift-DR
/// again.  `run_test` is always waited once more at the end.
pub fn run_sdr<T, U>(sm: &mut JtagSM<T>, bufs: &mut ScanBuffers, regs: &Registers, flags: SdrFlags)
    -> Result<Verify, DriverError>
    where T: core::ops::DerefMut<Target=U>,
          U: PinDriver + ?Sized
{
    let bits = regs.sdr_size as usize;
    let mut failures = 0;

    if flags.begin {
        sm.goto_state(Register::Data.shift_state())?;
    }

    loop {
        sm.shift(&bufs.tdi, Some(&mut bufs.actual[..]), bits, flags.end)?;

        if !flags.check || bufs.matches(regs.sdr_size) {
            break;
        }

        failures += 1;
        if failures > regs.repeat as u32 {
            return Ok(Verify::Failed { attempts: failures });
        }
        warn!("TDO mismatch, retry {} of {}", failures, regs.repeat);

        // Exit1-DR -> Pause-DR -> Exit2-DR -> Shift-DR -> Exit1-DR
        for tms in [false, true, false, true] {
            sm.step(tms)?;
        }
        sm.goto_state(TapState::Idle)?;
        sm.cable.wait_us(regs.run_test)?;
        sm.goto_state(TapState::ShiftDR)?;
    }

    if flags.end {
        sm.goto_state(TapState::Idle)?;
    }
    sm.cable.wait_us(regs.run_test)?;
    Ok(Verify::Passed { retries: failures })
}
