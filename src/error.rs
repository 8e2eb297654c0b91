use thiserror::Error;

use crate::cable::DriverError;

/// Why a playback stopped without reaching XCOMPLETE.
///
/// Offsets are byte positions in the XSVF image of the opcode that failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
    #[error("unsupported instruction 0x{opcode:02x} at offset {offset}")]
    Unsupported { opcode: u8, offset: usize },
    #[error("instruction at offset {offset} needs {needed} bytes, only {available} left")]
    Truncated { offset: usize, needed: usize, available: usize },
    #[error("scan of {bits} bits at offset {offset} exceeds the {capacity} bit buffers")]
    ScanTooLong { bits: u32, capacity: usize, offset: usize },
    #[error("invalid TAP state id {id} at offset {offset}")]
    InvalidState { id: u8, offset: usize },
    #[error("TDO mismatch at offset {offset} after {attempts} attempts")]
    VerifyFailed { offset: usize, attempts: u32 },
    #[error("playback aborted before offset {offset}")]
    Aborted { offset: usize },
    #[error("pin driver failed")]
    Driver(#[from] DriverError),
}

impl Error {
    /// True for errors caused by the contents of the XSVF image itself, as opposed to the
    /// target or the adapter.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Error::UnknownOpcode { .. } | Error::Truncated { .. }
                     | Error::ScanTooLong { .. } | Error::InvalidState { .. })
    }
}

pub type Result<T> = core::result::Result<T, Error>;
