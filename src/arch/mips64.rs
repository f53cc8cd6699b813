//! MIPS64 relocation decoding.
//!
//! MIPS carries its own static rebasing scheme: local GOT-style entries are
//! shifted by the difference between the actual mapped base and the base
//! address the binary declares (`DT_MIPS_BASE_ADDRESS`), while global entries
//! behave like ordinary absolute relocations.

use crate::relocation::{RelocKind, TruncateCheck};
use elf::abi::EM_MIPS;

/// The ELF machine type for MIPS architecture.
pub const EM_ARCH: u16 = EM_MIPS;

/// Distance between the thread pointer and the static TLS area (MIPS ABI).
pub const TP_OFFSET: u64 = 0x7000;

// The `elf` crate's abi tables do not export MIPS relocation types.
pub const R_MIPS_NONE: u32 = 0;
pub const R_MIPS_32: u32 = 2;
pub const R_MIPS_REL32: u32 = 3;
pub const R_MIPS_64: u32 = 18;
pub const R_MIPS_TLS_DTPMOD64: u32 = 38;
pub const R_MIPS_TLS_DTPREL64: u32 = 41;
pub const R_MIPS_TLS_TPREL64: u32 = 48;
pub const R_MIPS_GLOB_DAT: u32 = 51;
pub const R_MIPS_COPY: u32 = 126;
pub const R_MIPS_JUMP_SLOT: u32 = 127;

/// Map MIPS relocation type value to human readable name.
pub(crate) fn rel_type_to_str(r_type: u32) -> &'static str {
    match r_type {
        R_MIPS_NONE => "R_MIPS_NONE",
        R_MIPS_32 => "R_MIPS_32",
        R_MIPS_REL32 => "R_MIPS_REL32",
        R_MIPS_64 => "R_MIPS_64",
        R_MIPS_TLS_DTPMOD64 => "R_MIPS_TLS_DTPMOD64",
        R_MIPS_TLS_DTPREL64 => "R_MIPS_TLS_DTPREL64",
        R_MIPS_TLS_TPREL64 => "R_MIPS_TLS_TPREL64",
        R_MIPS_GLOB_DAT => "R_MIPS_GLOB_DAT",
        R_MIPS_COPY => "R_MIPS_COPY",
        R_MIPS_JUMP_SLOT => "R_MIPS_JUMP_SLOT",
        _ => "UNKNOWN",
    }
}

/// MIPS64 decode table: relocation type code to behavior variant.
pub(crate) fn decode(r_type: u32) -> Option<(RelocKind, Option<TruncateCheck>)> {
    Some(match r_type {
        R_MIPS_64 => (RelocKind::AbsoluteAddend, None),
        R_MIPS_32 => (RelocKind::AbsoluteAddend, Some(TruncateCheck::SIGN_EXTEND)),
        R_MIPS_REL32 => (RelocKind::MipsLocal, None),
        R_MIPS_GLOB_DAT => (RelocKind::MipsGlobal, None),
        R_MIPS_JUMP_SLOT => (RelocKind::JumpSlot, None),
        R_MIPS_COPY => (RelocKind::Copy, None),
        R_MIPS_TLS_DTPMOD64 => (RelocKind::TlsModId, None),
        R_MIPS_TLS_DTPREL64 => (RelocKind::TlsDoffset, None),
        R_MIPS_TLS_TPREL64 => (RelocKind::TlsOffset, None),
        _ => return None,
    })
}
