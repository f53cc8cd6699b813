//! Architecture descriptors and per-architecture relocation decoding.
//!
//! Each supported architecture gets its own submodule holding the relocation
//! type constants, a name table for error reporting, and the decode table
//! that tags a raw relocation entry with a concrete [`RelocKind`].

pub mod aarch64;
pub mod mips64;
pub mod x86_64;

use crate::relocation::{RelocKind, TruncateCheck};
use elf::abi::{EM_AARCH64, EM_MIPS, EM_X86_64};

/// Machine tag of a loaded object, selecting the decode table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Machine {
    X86_64,
    Aarch64,
    Mips64,
}

impl Machine {
    /// Maps an ELF header `e_machine` value to a supported machine.
    pub fn from_e_machine(e_machine: u16) -> Option<Self> {
        match e_machine {
            EM_X86_64 => Some(Machine::X86_64),
            EM_AARCH64 => Some(Machine::Aarch64),
            EM_MIPS => Some(Machine::Mips64),
            _ => None,
        }
    }

    /// Tags a raw relocation type code with its behavior variant and, for
    /// fixed 32-bit destination fields, the truncation checks to attach.
    pub(crate) fn decode(self, r_type: u32) -> Option<(RelocKind, Option<TruncateCheck>)> {
        match self {
            Machine::X86_64 => x86_64::decode(r_type),
            Machine::Aarch64 => aarch64::decode(r_type),
            Machine::Mips64 => mips64::decode(r_type),
        }
    }

    /// Map a relocation type value to a human readable name.
    pub(crate) fn rel_type_to_str(self, r_type: u32) -> &'static str {
        match self {
            Machine::X86_64 => x86_64::rel_type_to_str(r_type),
            Machine::Aarch64 => aarch64::rel_type_to_str(r_type),
            Machine::Mips64 => mips64::rel_type_to_str(r_type),
        }
    }
}

/// Byte order of an object's image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Architecture descriptor consumed by the relocation engine.
///
/// `tp_offset` is the constant distance between the thread pointer and the
/// start of the static TLS area, used by the thread-pointer-offset TLS model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Arch {
    pub machine: Machine,
    /// Address word width in bits.
    pub bits: u32,
    pub endian: Endian,
    pub tp_offset: u64,
}

impl Arch {
    pub const X86_64: Arch = Arch {
        machine: Machine::X86_64,
        bits: 64,
        endian: Endian::Little,
        tp_offset: x86_64::TP_OFFSET,
    };

    pub const AARCH64: Arch = Arch {
        machine: Machine::Aarch64,
        bits: 64,
        endian: Endian::Little,
        tp_offset: aarch64::TP_OFFSET,
    };

    pub const MIPS64: Arch = Arch {
        machine: Machine::Mips64,
        bits: 64,
        endian: Endian::Big,
        tp_offset: mips64::TP_OFFSET,
    };

    /// Native word size in bytes.
    #[inline]
    pub fn word_size(&self) -> usize {
        self.bits as usize / 8
    }
}
