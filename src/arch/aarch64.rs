//! AArch64 relocation decoding.

use crate::relocation::{RelocKind, TruncateCheck};
use elf::abi::*;

/// The ELF machine type for AArch64 architecture.
pub const EM_ARCH: u16 = EM_AARCH64;

/// Distance between the thread pointer and the static TLS area.
/// On AArch64 the thread pointer addresses the 16-byte TCB preceding it.
pub const TP_OFFSET: u64 = 16;

// Not exported by the `elf` crate's abi tables.
pub const R_AARCH64_NONE: u32 = 0;
pub const R_AARCH64_PREL32: u32 = 261;

/// Map AArch64 relocation type value to human readable name.
pub(crate) fn rel_type_to_str(r_type: u32) -> &'static str {
    match r_type {
        R_AARCH64_NONE => "R_AARCH64_NONE",
        R_AARCH64_ABS64 => "R_AARCH64_ABS64",
        R_AARCH64_PREL32 => "R_AARCH64_PREL32",
        R_AARCH64_COPY => "R_AARCH64_COPY",
        R_AARCH64_GLOB_DAT => "R_AARCH64_GLOB_DAT",
        R_AARCH64_JUMP_SLOT => "R_AARCH64_JUMP_SLOT",
        R_AARCH64_RELATIVE => "R_AARCH64_RELATIVE",
        R_AARCH64_TLS_DTPMOD => "R_AARCH64_TLS_DTPMOD",
        R_AARCH64_TLS_DTPREL => "R_AARCH64_TLS_DTPREL",
        R_AARCH64_TLS_TPREL => "R_AARCH64_TLS_TPREL",
        R_AARCH64_IRELATIVE => "R_AARCH64_IRELATIVE",
        _ => "UNKNOWN",
    }
}

/// AArch64 decode table: relocation type code to behavior variant.
pub(crate) fn decode(r_type: u32) -> Option<(RelocKind, Option<TruncateCheck>)> {
    Some(match r_type {
        R_AARCH64_ABS64 => (RelocKind::AbsoluteAddend, None),
        R_AARCH64_PREL32 => (RelocKind::PcRelativeAddend, Some(TruncateCheck::SIGN_EXTEND)),
        R_AARCH64_COPY => (RelocKind::Copy, None),
        R_AARCH64_GLOB_DAT | R_AARCH64_JUMP_SLOT => (RelocKind::JumpSlot, None),
        R_AARCH64_RELATIVE => (RelocKind::Relative, None),
        R_AARCH64_IRELATIVE => (RelocKind::IRelative, None),
        R_AARCH64_TLS_DTPMOD => (RelocKind::TlsModId, None),
        R_AARCH64_TLS_DTPREL => (RelocKind::TlsDoffset, None),
        R_AARCH64_TLS_TPREL => (RelocKind::TlsOffset, None),
        _ => return None,
    })
}
