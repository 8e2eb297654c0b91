/// 32 byte scan buffers, enough for most CPLD data registers.
pub const DEFAULT_MAX_SCAN_BITS: usize = 0x20 * 8;

/// Playback settings.  Adapter settings such as the TCK rate belong to the `PinDriver`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Longest XSDRSIZE / XSIR length accepted, in bits.  Sizes the scan buffers.
    pub max_scan_bits: usize,
    /// Walk the TAP back to Run-Test/Idle when a playback is aborted.
    pub abort_to_idle: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_scan_bits: DEFAULT_MAX_SCAN_BITS,
            abort_to_idle: true,
        }
    }
}

impl Config {
    pub fn max_scan_bits(mut self, bits: usize) -> Self {
        self.max_scan_bits = bits;
        self
    }

    pub fn abort_to_idle(mut self, enable: bool) -> Self {
        self.abort_to_idle = enable;
        self
    }
}
