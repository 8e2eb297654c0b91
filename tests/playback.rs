use std::sync::atomic::{AtomicBool, Ordering};

use xsvf_player::cable::{DriverError, PinDriver, Signal};
use xsvf_player::progress::Tick;
use xsvf_player::statemachine::TapState;
use xsvf_player::{Config, Error, Player};

/// A TAP with one data register that keeps what was last shifted into it.
struct SimTarget {
    state: TapState,
    tms: bool,
    tdi: bool,
    dr: Vec<bool>,
    stored: Vec<bool>,
    ir: Vec<bool>,
    /// Captures that return all zeros before `stored` shows up, like a busy flash cell.
    busy_captures: usize,
    clocks: usize,
    waited_us: u64,
}

impl SimTarget {
    fn new(dr_len: usize) -> Self {
        Self {
            state: TapState::Reset,
            tms: false,
            tdi: false,
            dr: vec![false; dr_len],
            stored: vec![false; dr_len],
            ir: vec![false; 8],
            busy_captures: 0,
            clocks: 0,
            waited_us: 0,
        }
    }

    fn stored_bytes(&self) -> Vec<u8> {
        self.stored.chunks(8)
            .map(|bits| bits.iter().enumerate().fold(0, |b, (i, &bit)| b | (bit as u8) << i))
            .collect()
    }

    fn ir_value(&self) -> u8 {
        self.ir.iter().enumerate().fold(0, |b, (i, &bit)| b | (bit as u8) << i)
    }
}

impl PinDriver for SimTarget {
    fn set_line(&mut self, signal: Signal, level: bool) -> Result<(), DriverError> {
        match signal {
            Signal::Tms => self.tms = level,
            Signal::Tdi => self.tdi = level,
            Signal::Tck => {}
        }
        Ok(())
    }

    fn pulse_clock(&mut self) -> Result<(), DriverError> {
        self.clocks += 1;
        match self.state {
            TapState::CaptureDR => {
                if self.busy_captures > 0 {
                    self.busy_captures -= 1;
                    self.dr.iter_mut().for_each(|b| *b = false);
                } else {
                    self.dr = self.stored.clone();
                }
            }
            TapState::ShiftDR => {
                self.dr.remove(0);
                self.dr.push(self.tdi);
            }
            TapState::UpdateDR => self.stored = self.dr.clone(),
            TapState::CaptureIR => {
                self.ir.iter_mut().for_each(|b| *b = false);
                self.ir[0] = true;
            }
            TapState::ShiftIR => {
                self.ir.remove(0);
                self.ir.push(self.tdi);
            }
            _ => {}
        }
        self.state = self.state.next(self.tms);
        Ok(())
    }

    fn read_tdo(&mut self) -> Result<bool, DriverError> {
        Ok(match self.state {
            TapState::ShiftDR => self.dr[0],
            TapState::ShiftIR => self.ir[0],
            _ => false,
        })
    }

    fn wait_us(&mut self, micros: u32) -> Result<(), DriverError> {
        self.waited_us += micros as u64;
        Ok(())
    }
}

fn play(target: SimTarget, image: &[u8]) -> (xsvf_player::Result<xsvf_player::Completed>, Vec<Tick>, SimTarget) {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut ticks = Vec::new();
    let mut player = Player::new(target);
    let result = player.play(image, &mut |t: Tick| ticks.push(t));
    (result, ticks, player.into_driver())
}

#[test]
fn write_only_scan_completes() {
    let image = [0x08, 0, 0, 0, 8, 0x07, 0, 0x03, 0xff, 0x00];
    let (result, ticks, target) = play(SimTarget::new(8), &image);
    let done = result.unwrap();
    assert_eq!(done.scans, 1);
    assert_eq!(target.stored_bytes(), [0xff]);
    assert_eq!(target.state, TapState::Idle);
    assert_eq!(ticks.last(), Some(&Tick::Done));
}

#[test]
fn written_register_reads_back() {
    let image = [
        0x08, 0, 0, 0, 16,
        0x03, 0x34, 0x12,
        0x01, 0xff, 0xff,
        0x04, 0, 0, 0, 50,
        0x09, 0x00, 0x00, 0x34, 0x12,
        0x00,
    ];
    let (result, _, target) = play(SimTarget::new(16), &image);
    let done = result.unwrap();
    assert_eq!(done.retries, 0);
    assert_eq!(target.stored_bytes(), [0x00, 0x00]);
    // one settle after the XSDRTDO
    assert_eq!(target.waited_us, 50);
}

#[test]
fn busy_target_is_retried() {
    let image = [
        0x08, 0, 0, 0, 8,
        0x03, 0xff,
        0x07, 2,
        0x04, 0, 0, 0x03, 0xe8,
        0x01, 0xff,
        0x09, 0xff, 0xff,
        0x00,
    ];
    let mut target = SimTarget::new(8);
    // the XSDR capture and the first two XSDRTDO captures read as zero.  Each retry passes
    // through Update-DR with one extra bit shifted in, so all-ones TDI keeps the register intact.
    target.busy_captures = 3;
    let (result, ticks, target) = play(target, &image);
    assert_eq!(result.unwrap().retries, 2);
    assert_eq!(target.waited_us, 3 * 1000);
    assert_eq!(ticks.last(), Some(&Tick::Done));
}

#[test]
fn busy_target_exhausts_retries() {
    let image = [
        0x08, 0, 0, 0, 8,
        0x03, 0xa5,
        0x07, 1,
        0x01, 0xff,
        0x09, 0xa5, 0xa5,
        0x00,
    ];
    let mut target = SimTarget::new(8);
    target.busy_captures = 10;
    let (result, ticks, _) = play(target, &image);
    match result {
        Err(Error::VerifyFailed { offset, attempts }) => {
            assert_eq!(offset, 11);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(ticks.last(), Some(&Tick::Fail));
}

#[test]
fn segmented_scan_fills_a_long_register() {
    let image = [
        0x08, 0, 0, 0, 8,
        0x0c, 0x11,
        0x0d, 0x22,
        0x0e, 0x33,
        0x08, 0, 0, 0, 24,
        0x01, 0xff, 0xff, 0xff,
        0x09, 0x11, 0x22, 0x33, 0x11, 0x22, 0x33,
        0x00,
    ];
    let (result, _, target) = play(SimTarget::new(24), &image);
    result.unwrap();
    assert_eq!(target.stored_bytes(), [0x11, 0x22, 0x33]);
}

#[test]
fn xsir_loads_the_instruction_register() {
    let image = [0x12, 0x00, 0x02, 8, 0xe9, 0x00];
    let (result, _, target) = play(SimTarget::new(8), &image);
    result.unwrap();
    assert_eq!(target.ir_value(), 0xe9);
    assert_eq!(target.state, TapState::Idle);
}

#[test]
fn unassigned_opcode_is_malformed() {
    let image = [0x08, 0, 0, 0, 8, 0x13, 0x00];
    let (result, ticks, _) = play(SimTarget::new(8), &image);
    let err = result.unwrap_err();
    assert!(err.is_malformed());
    assert!(matches!(err, Error::UnknownOpcode { opcode: 0x13, offset: 5 }));
    assert_eq!(ticks, [Tick::Fail]);
}

#[test]
fn xsdrinc_is_rejected_before_any_scan() {
    let image = [0x0b, 0x00, 0x00, 0x00];
    let (result, _, target) = play(SimTarget::new(8), &image);
    assert!(matches!(result, Err(Error::Unsupported { opcode: 0x0b, offset: 0 })));
    // the session reset and nothing else
    assert_eq!(target.clocks, 5);
    assert_eq!(target.state, TapState::Reset);
}

#[test]
fn truncated_image_is_malformed() {
    let image = [0x08, 0, 0, 0, 16, 0x03, 0xff];
    let (result, _, _) = play(SimTarget::new(16), &image);
    assert!(matches!(result, Err(Error::Truncated { offset: 5, .. })));
}

#[test]
fn abort_from_the_progress_callback() {
    let mut image: Vec<u8> = vec![0x08, 0, 0, 0, 8];
    for i in 0..40 {
        image.extend([0x03, i]);
    }
    image.push(0x00);

    let abort = AtomicBool::new(false);
    let mut ticks = Vec::new();
    let mut player = Player::new(SimTarget::new(8));
    let result = player.play_with_abort(&image, &mut |t: Tick| {
        if t == Tick::Decile(3) {
            abort.store(true, Ordering::Relaxed);
        }
        ticks.push(t);
    }, &abort);

    assert!(matches!(result, Err(Error::Aborted { .. })));
    assert_eq!(ticks, [Tick::Decile(1), Tick::Decile(2), Tick::Decile(3), Tick::Fail]);
    assert_eq!(player.driver().state, TapState::Idle);
}

#[test]
fn a_failed_play_does_not_poison_the_next() {
    let mut player = Player::with_config(SimTarget::new(8), Config::default().max_scan_bits(64));
    let bad = [0x08, 0, 0, 0, 8, 0x01, 0xff, 0x09, 0x00, 0x5a, 0x00];
    assert!(player.play(&bad, &mut |_: Tick| {}).is_err());

    assert_eq!(player.driver().state, TapState::Exit1DR);

    // no XSTATE reset in the image: the player has to bring the TAP back itself
    let good = [0x02, 8, 0xe9, 0x08, 0, 0, 0, 8, 0x03, 0x77, 0x00];
    let done = player.play(&good, &mut |_: Tick| {}).unwrap();
    assert_eq!(done.instructions, 4);
    let target = player.driver();
    assert_eq!(target.ir_value(), 0xe9);
    assert_eq!(target.stored_bytes(), [0x77]);
    assert_eq!(target.state, TapState::Idle);
}

#[test]
fn an_aborted_play_does_not_poison_the_next() {
    let mut player = Player::new(SimTarget::new(8));
    let first = [0x08, 0, 0, 0, 8, 0x03, 0x0f, 0x00];
    let result = player.play_with_abort(&first, &mut |_: Tick| {}, &AtomicBool::new(true));
    assert!(matches!(result, Err(Error::Aborted { offset: 0 })));
    // leave the physical TAP parked in Pause-IR behind the player's back
    for tms in [true, true, false, true, false] {
        player.driver().set_line(Signal::Tms, tms).unwrap();
        player.driver().pulse_clock().unwrap();
    }
    assert_eq!(player.driver().state, TapState::PauseIR);

    let done = player.play(&[0x02, 8, 0x3c, 0x00], &mut |_: Tick| {}).unwrap();
    assert_eq!(done.instructions, 2);
    let target = player.driver();
    assert_eq!(target.ir_value(), 0x3c);
    assert_eq!(target.state, TapState::Idle);
}
