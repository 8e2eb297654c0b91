//! Progress notifications for whoever is relaying the playback to an operator.

/// One progress notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// `n` tenths of the image have been played, 1 to 9.
    Decile(u8),
    /// XCOMPLETE reached.
    Done,
    /// Playback stopped with an error.
    Fail,
}

impl Tick {
    /// Single byte encoding used on the host link: the decile itself, `F` when finished and
    /// `X` on failure.
    pub fn as_byte(self) -> u8 {
        match self {
            Tick::Decile(n) => n,
            Tick::Done => b'F',
            Tick::Fail => b'X',
        }
    }
}

/// Receives progress ticks.  Implementations must not block for long; the player calls this
/// between instructions while the TAP is waiting.
pub trait Progress {
    fn tick(&mut self, tick: Tick);
}

impl<F: FnMut(Tick)> Progress for F {
    fn tick(&mut self, tick: Tick) {
        self(tick)
    }
}

/// Tracks which decile boundaries of an image have been passed.
#[derive(Debug)]
pub struct Deciles {
    chunk: usize,
    next: u8,
}

impl Deciles {
    /// Deciles of an image `len` bytes long.  Images shorter than ten bytes get no decile ticks.
    pub fn new(len: usize) -> Self {
        Self { chunk: len / 10, next: 1 }
    }

    /// Report every boundary `pos` has moved past since the last call, each exactly once.
    pub fn update<P: Progress + ?Sized>(&mut self, pos: usize, progress: &mut P) {
        if self.chunk == 0 {
            return;
        }
        while self.next <= 9 && pos > self.chunk * self.next as usize {
            progress.tick(Tick::Decile(self.next));
            self.next += 1;
        }
    }
}
