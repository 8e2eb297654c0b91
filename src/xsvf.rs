//! The XSVF instruction set and a decoder for it.
//!
//! An XSVF image is a sequence of one-byte opcodes, each followed by its operands.  Scan
//! operands are `⌈sdr_size / 8⌉` bytes long, where `sdr_size` is whatever the last XSDRSIZE
//! set, so the decoder has to track XSDRSIZE as it goes.  Multi-byte integers are big-endian;
//! scan data is stored least significant byte first, and bit 0 of the first byte is shifted
//! first.
use core::convert::TryFrom;
use core::fmt;

use crate::error::{Error, Result};
use crate::statemachine::TapState;

/// Number of bytes needed to hold `bits` bits.
pub fn bytes(bits: u32) -> usize {
    (bits as usize).div_ceil(8)
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    XCOMPLETE = 0x00,
    XTDOMASK = 0x01,
    XSIR = 0x02,
    XSDR = 0x03,
    XRUNTEST = 0x04,
    XREPEAT = 0x07,
    XSDRSIZE = 0x08,
    XSDRTDO = 0x09,
    XSETSDRMASKS = 0x0a,
    XSDRINC = 0x0b,
    XSDRB = 0x0c,
    XSDRC = 0x0d,
    XSDRE = 0x0e,
    XSDRTDOB = 0x0f,
    XSDRTDOC = 0x10,
    XSDRTDOE = 0x11,
    XSTATE = 0x12,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(op: u8) -> core::result::Result<Self, u8> {
        use Opcode::*;
        Ok(match op {
            0x00 => XCOMPLETE,
            0x01 => XTDOMASK,
            0x02 => XSIR,
            0x03 => XSDR,
            0x04 => XRUNTEST,
            0x07 => XREPEAT,
            0x08 => XSDRSIZE,
            0x09 => XSDRTDO,
            0x0a => XSETSDRMASKS,
            0x0b => XSDRINC,
            0x0c => XSDRB,
            0x0d => XSDRC,
            0x0e => XSDRE,
            0x0f => XSDRTDOB,
            0x10 => XSDRTDOC,
            0x11 => XSDRTDOE,
            0x12 => XSTATE,
            _ => return Err(op),
        })
    }
}

/// Which part of a split data register scan an XSDRB/C/E style instruction is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Go to Shift-DR first, stay there afterwards.
    Begin,
    /// Already in Shift-DR, stay there.
    Continue,
    /// Already in Shift-DR, finish in Run-Test/Idle.
    End,
}

/// One decoded instruction.  Operand slices borrow from the XSVF image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction<'a> {
    Complete,
    TdoMask(&'a [u8]),
    Sir { bits: u8, tdi: &'a [u8] },
    Sdr(&'a [u8]),
    RunTest(u32),
    Repeat(u8),
    SdrSize(u32),
    SdrTdo { tdi: &'a [u8], expected: &'a [u8] },
    SetSdrMasks { address: &'a [u8], data: &'a [u8] },
    SdrSegment { segment: Segment, tdi: &'a [u8] },
    SdrTdoSegment { segment: Segment, tdi: &'a [u8], expected: &'a [u8] },
    State(TapState),
}

impl Instruction<'_> {
    pub fn opcode(&self) -> Opcode {
        use Opcode::*;
        match self {
            Instruction::Complete => XCOMPLETE,
            Instruction::TdoMask(_) => XTDOMASK,
            Instruction::Sir { .. } => XSIR,
            Instruction::Sdr(_) => XSDR,
            Instruction::RunTest(_) => XRUNTEST,
            Instruction::Repeat(_) => XREPEAT,
            Instruction::SdrSize(_) => XSDRSIZE,
            Instruction::SdrTdo { .. } => XSDRTDO,
            Instruction::SetSdrMasks { .. } => XSETSDRMASKS,
            Instruction::SdrSegment { segment: Segment::Begin, .. } => XSDRB,
            Instruction::SdrSegment { segment: Segment::Continue, .. } => XSDRC,
            Instruction::SdrSegment { segment: Segment::End, .. } => XSDRE,
            Instruction::SdrTdoSegment { segment: Segment::Begin, .. } => XSDRTDOB,
            Instruction::SdrTdoSegment { segment: Segment::Continue, .. } => XSDRTDOC,
            Instruction::SdrTdoSegment { segment: Segment::End, .. } => XSDRTDOE,
            Instruction::State(_) => XSTATE,
        }
    }

    /// True for instructions that clock a scan through the TAP.
    pub fn is_scan(&self) -> bool {
        matches!(self, Instruction::Sir { .. } | Instruction::Sdr(_) | Instruction::SdrTdo { .. }
                     | Instruction::SdrSegment { .. } | Instruction::SdrTdoSegment { .. })
    }
}

/// Scan data in image order.
struct Hex<'a>(&'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Display for Instruction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.opcode())?;
        match self {
            Instruction::Complete => Ok(()),
            Instruction::TdoMask(mask) => write!(f, " mask={}", Hex(mask)),
            Instruction::Sir { bits, tdi } => write!(f, " {} tdi={}", bits, Hex(tdi)),
            Instruction::Sdr(tdi) | Instruction::SdrSegment { tdi, .. } => write!(f, " tdi={}", Hex(tdi)),
            Instruction::RunTest(us) => write!(f, " {}us", us),
            Instruction::Repeat(n) => write!(f, " {}", n),
            Instruction::SdrSize(bits) => write!(f, " {}", bits),
            Instruction::SdrTdo { tdi, expected } | Instruction::SdrTdoSegment { tdi, expected, .. } =>
                write!(f, " tdi={} tdo={}", Hex(tdi), Hex(expected)),
            Instruction::SetSdrMasks { address, data } =>
                write!(f, " addr={} data={}", Hex(address), Hex(data)),
            Instruction::State(state) => write!(f, " {:?}", state),
        }
    }
}

/// Bounds-checked reader over one instruction's operands.
struct Operands<'a> {
    data: &'a [u8],
    offset: usize,
    pos: usize,
}

impl<'a> Operands<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.data.len() - self.pos;
        if n > available {
            return Err(Error::Truncated { offset: self.offset, needed: n, available });
        }
        let out = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn long(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Decodes an XSVF image one instruction at a time.
///
/// The cursor only moves past an instruction once all of its operands have been read, so
/// after an error `position()` is the offset of the offending opcode.  Iteration stops after
/// XCOMPLETE or the first error.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    sdr_size: u32,
    capacity: Option<usize>,
    done: bool,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, sdr_size: 0, capacity: None, done: false }
    }

    /// Reject XSDRSIZE lengths above `bits`.  XSIR is shifted straight from its operand and
    /// is not limited.
    pub fn with_capacity(mut self, bits: usize) -> Self {
        self.capacity = Some(bits);
        self
    }

    /// Offset of the next opcode.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Scan length in bits from the last XSDRSIZE.
    pub fn sdr_size(&self) -> u32 {
        self.sdr_size
    }

    fn check_capacity(&self, bits: u32, offset: usize) -> Result<()> {
        match self.capacity {
            Some(capacity) if bits as usize > capacity =>
                Err(Error::ScanTooLong { bits, capacity, offset }),
            _ => Ok(()),
        }
    }

    /// Decode the instruction at the cursor and return it with its offset.
    pub fn decode_next(&mut self) -> Result<(usize, Instruction<'a>)> {
        let offset = self.pos;
        let mut ops = Operands { data: self.data, offset, pos: offset };
        let op = ops.byte()?;
        let opcode = Opcode::try_from(op).map_err(|opcode| Error::UnknownOpcode { opcode, offset })?;
        let len = bytes(self.sdr_size);

        let insn = match opcode {
            Opcode::XCOMPLETE => Instruction::Complete,
            Opcode::XTDOMASK => Instruction::TdoMask(ops.take(len)?),
            Opcode::XSIR => {
                let bits = ops.byte()?;
                Instruction::Sir { bits, tdi: ops.take(bytes(bits as u32))? }
            }
            Opcode::XSDR => Instruction::Sdr(ops.take(len)?),
            Opcode::XRUNTEST => Instruction::RunTest(ops.long()?),
            Opcode::XREPEAT => Instruction::Repeat(ops.byte()?),
            Opcode::XSDRSIZE => {
                let bits = ops.long()?;
                self.check_capacity(bits, offset)?;
                Instruction::SdrSize(bits)
            }
            Opcode::XSDRTDO => Instruction::SdrTdo { tdi: ops.take(len)?, expected: ops.take(len)? },
            Opcode::XSETSDRMASKS => Instruction::SetSdrMasks { address: ops.take(len)?, data: ops.take(len)? },
            Opcode::XSDRINC => return Err(Error::Unsupported { opcode: op, offset }),
            Opcode::XSDRB | Opcode::XSDRC | Opcode::XSDRE => {
                let segment = match opcode {
                    Opcode::XSDRB => Segment::Begin,
                    Opcode::XSDRC => Segment::Continue,
                    _ => Segment::End,
                };
                Instruction::SdrSegment { segment, tdi: ops.take(len)? }
            }
            Opcode::XSDRTDOB | Opcode::XSDRTDOC | Opcode::XSDRTDOE => {
                let segment = match opcode {
                    Opcode::XSDRTDOB => Segment::Begin,
                    Opcode::XSDRTDOC => Segment::Continue,
                    _ => Segment::End,
                };
                Instruction::SdrTdoSegment { segment, tdi: ops.take(len)?, expected: ops.take(len)? }
            }
            Opcode::XSTATE => {
                let id = ops.byte()?;
                let state = TapState::try_from(id).map_err(|id| Error::InvalidState { id, offset })?;
                Instruction::State(state)
            }
        };

        if let Instruction::SdrSize(bits) = insn {
            self.sdr_size = bits;
        }
        self.pos = ops.pos;
        Ok((offset, insn))
    }
}

impl<'a> Iterator for Decoder<'a> {
    type Item = Result<(usize, Instruction<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.decode_next();
        self.done = match &item {
            Ok((_, Instruction::Complete)) | Err(_) => true,
            Ok(_) => false,
        };
        Some(item)
    }
}
