//! x86-64 relocation decoding.

use crate::relocation::{RelocKind, TruncateCheck};
use elf::abi::*;

/// The ELF machine type for x86-64 architecture.
pub const EM_ARCH: u16 = EM_X86_64;

/// Distance between the thread pointer and the static TLS area.
/// For x86-64 the thread pointer addresses the TCB directly.
pub const TP_OFFSET: u64 = 0;

/// Map x86-64 relocation type value to human readable name.
pub(crate) fn rel_type_to_str(r_type: u32) -> &'static str {
    match r_type {
        R_X86_64_NONE => "R_X86_64_NONE",
        R_X86_64_64 => "R_X86_64_64",
        R_X86_64_PC32 => "R_X86_64_PC32",
        R_X86_64_GOT32 => "R_X86_64_GOT32",
        R_X86_64_PLT32 => "R_X86_64_PLT32",
        R_X86_64_COPY => "R_X86_64_COPY",
        R_X86_64_GLOB_DAT => "R_X86_64_GLOB_DAT",
        R_X86_64_JUMP_SLOT => "R_X86_64_JUMP_SLOT",
        R_X86_64_RELATIVE => "R_X86_64_RELATIVE",
        R_X86_64_GOTPCREL => "R_X86_64_GOTPCREL",
        R_X86_64_32 => "R_X86_64_32",
        R_X86_64_32S => "R_X86_64_32S",
        R_X86_64_DTPMOD64 => "R_X86_64_DTPMOD64",
        R_X86_64_DTPOFF64 => "R_X86_64_DTPOFF64",
        R_X86_64_TPOFF64 => "R_X86_64_TPOFF64",
        R_X86_64_IRELATIVE => "R_X86_64_IRELATIVE",
        _ => "UNKNOWN",
    }
}

/// x86-64 decode table: relocation type code to behavior variant.
///
/// The 32-bit destination fields (`PC32`, `32`, `32S`) attach the truncation
/// capability with the check matching their extension semantics.
pub(crate) fn decode(r_type: u32) -> Option<(RelocKind, Option<TruncateCheck>)> {
    Some(match r_type {
        R_X86_64_64 => (RelocKind::AbsoluteAddend, None),
        R_X86_64_PC32 => (RelocKind::PcRelativeAddend, Some(TruncateCheck::SIGN_EXTEND)),
        R_X86_64_32 => (RelocKind::AbsoluteAddend, Some(TruncateCheck::ZERO_EXTEND)),
        R_X86_64_32S => (RelocKind::AbsoluteAddend, Some(TruncateCheck::SIGN_EXTEND)),
        R_X86_64_COPY => (RelocKind::Copy, None),
        R_X86_64_GLOB_DAT | R_X86_64_JUMP_SLOT => (RelocKind::JumpSlot, None),
        R_X86_64_RELATIVE => (RelocKind::Relative, None),
        R_X86_64_IRELATIVE => (RelocKind::IRelative, None),
        R_X86_64_DTPMOD64 => (RelocKind::TlsModId, None),
        R_X86_64_DTPOFF64 => (RelocKind::TlsDoffset, None),
        R_X86_64_TPOFF64 => (RelocKind::TlsOffset, None),
        _ => return None,
    })
}
