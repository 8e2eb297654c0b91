//! Plays an XSVF image against a single TAP.
//!
//! Each call to `Player::play` builds a fresh `Session`: TAP state, scan buffers and session
//! registers never carry over from one image to the next.
use core::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace};

use crate::cable::PinDriver;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::progress::{Deciles, Progress, Tick};
use crate::sdr::{run_sdr, Registers, ScanBuffers, SdrFlags, Verify};
use crate::statemachine::{JtagSM, Register, TapState};
use crate::xsvf::{Decoder, Instruction};

/// Summary of a playback that reached XCOMPLETE.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Completed {
    /// Instructions executed, XCOMPLETE included.
    pub instructions: usize,
    /// Scans clocked through the TAP.
    pub scans: usize,
    /// TDO mismatches that were recovered by retrying.
    pub retries: u32,
}

/// State of one playback.
pub struct Session<'d, P: PinDriver + ?Sized> {
    sm: JtagSM<&'d mut P>,
    regs: Registers,
    bufs: ScanBuffers,
    stats: Completed,
}

impl<'d, P: PinDriver + ?Sized> Session<'d, P> {
    /// Start a session with cleared registers and buffers.  `run` clocks the TAP into
    /// Test-Logic-Reset before the first instruction.
    pub fn new(driver: &'d mut P, config: &Config) -> Self {
        Self {
            sm: JtagSM::new(driver),
            regs: Registers::default(),
            bufs: ScanBuffers::new(config.max_scan_bits),
            stats: Completed::default(),
        }
    }

    pub fn state(&self) -> TapState {
        self.sm.state()
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn buffers(&self) -> &ScanBuffers {
        &self.bufs
    }

    fn sdr(&mut self, offset: usize, flags: SdrFlags) -> Result<()> {
        match run_sdr(&mut self.sm, &mut self.bufs, &self.regs, flags)? {
            Verify::Passed { retries } => {
                self.stats.retries += retries;
                Ok(())
            }
            Verify::Failed { attempts } => Err(Error::VerifyFailed { offset, attempts }),
        }
    }

    /// Execute one decoded instruction.  Returns true on XCOMPLETE.
    pub fn execute(&mut self, offset: usize, insn: Instruction) -> Result<bool> {
        self.stats.instructions += 1;
        if insn.is_scan() {
            self.stats.scans += 1;
        }

        match insn {
            Instruction::Complete => return Ok(true),
            Instruction::TdoMask(mask) => ScanBuffers::load(&mut self.bufs.tdo_mask, mask),
            Instruction::Sir { bits, tdi } => {
                self.sm.goto_state(Register::Instruction.shift_state())?;
                self.sm.shift(tdi, None, bits as usize, true)?;
                self.sm.goto_state(TapState::Idle)?;
            }
            Instruction::Sdr(tdi) => {
                ScanBuffers::load(&mut self.bufs.tdi, tdi);
                self.sdr(offset, SdrFlags::FULL_CHECK)?;
            }
            Instruction::RunTest(micros) => {
                debug!("run test {}us", micros);
                self.regs.run_test = micros;
            }
            Instruction::Repeat(repeat) => {
                debug!("repeat {}", repeat);
                self.regs.repeat = repeat;
            }
            Instruction::SdrSize(bits) => {
                debug!("sdr size {} bits", bits);
                self.regs.sdr_size = bits;
            }
            Instruction::SdrTdo { tdi, expected } => {
                ScanBuffers::load(&mut self.bufs.tdi, tdi);
                ScanBuffers::load(&mut self.bufs.tdo_expected, expected);
                self.sdr(offset, SdrFlags::FULL_CHECK)?;
            }
            Instruction::SetSdrMasks { address, data } => {
                ScanBuffers::load(&mut self.bufs.address_mask, address);
                ScanBuffers::load(&mut self.bufs.data_mask, data);
            }
            Instruction::SdrSegment { segment, tdi } => {
                ScanBuffers::load(&mut self.bufs.tdi, tdi);
                self.sdr(offset, SdrFlags::segment(segment, false))?;
            }
            Instruction::SdrTdoSegment { segment, tdi, expected } => {
                ScanBuffers::load(&mut self.bufs.tdi, tdi);
                ScanBuffers::load(&mut self.bufs.tdo_expected, expected);
                self.sdr(offset, SdrFlags::segment(segment, true))?;
            }
            Instruction::State(state) => self.sm.goto_state(state)?,
        }
        Ok(false)
    }

    /// Decode and execute `xsvf` until XCOMPLETE or the first error.  `abort` is checked before
    /// every instruction.
    pub fn run<G: Progress + ?Sized>(&mut self, xsvf: &[u8], progress: &mut G, abort: &AtomicBool, config: &Config)
        -> Result<Completed>
    {
        let mut decoder = Decoder::new(xsvf).with_capacity(config.max_scan_bits);
        let mut deciles = Deciles::new(xsvf.len());

        // the previous playback may have stopped anywhere
        self.sm.mode_reset()?;

        loop {
            if abort.load(Ordering::Relaxed) {
                let offset = decoder.position();
                debug!("aborted at offset {}", offset);
                if config.abort_to_idle {
                    self.sm.goto_state(TapState::Idle)?;
                }
                return Err(Error::Aborted { offset });
            }

            let (offset, insn) = decoder.decode_next()?;
            trace!("{:6}: {}", offset, insn);
            if self.execute(offset, insn)? {
                return Ok(self.stats);
            }
            if insn.is_scan() {
                deciles.update(decoder.position(), progress);
            }
        }
    }
}

/// Owns a pin driver and plays XSVF images through it.  A `Player` plays one image at a time;
/// `play` borrows it mutably for the whole playback.
pub struct Player<P> {
    driver: P,
    config: Config,
}

impl<P: PinDriver> Player<P> {
    pub fn new(driver: P) -> Self {
        Self::with_config(driver, Config::default())
    }

    pub fn with_config(driver: P, config: Config) -> Self {
        Self { driver, config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn driver(&mut self) -> &mut P {
        &mut self.driver
    }

    pub fn into_driver(self) -> P {
        self.driver
    }

    /// Play `xsvf` to completion.  `progress` gets decile ticks after scans, then `Done` or
    /// `Fail`.
    pub fn play<G: Progress + ?Sized>(&mut self, xsvf: &[u8], progress: &mut G) -> Result<Completed> {
        self.play_with_abort(xsvf, progress, &AtomicBool::new(false))
    }

    /// Like `play`, but stops before the next instruction once `abort` is set.
    pub fn play_with_abort<G: Progress + ?Sized>(&mut self, xsvf: &[u8], progress: &mut G, abort: &AtomicBool)
        -> Result<Completed>
    {
        debug!("playing {} byte XSVF image", xsvf.len());
        let mut session = Session::new(&mut self.driver, &self.config);
        let result = session.run(xsvf, progress, abort, &self.config);
        match &result {
            Ok(done) => {
                debug!("XSVF complete: {:?}", done);
                progress.tick(Tick::Done);
            }
            Err(e) => {
                debug!("XSVF failed: {}", e);
                progress.tick(Tick::Fail);
            }
        }
        result
    }
}
