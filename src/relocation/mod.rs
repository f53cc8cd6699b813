//! Relocation records and the two-phase resolve/apply engine.
//!
//! The surrounding loader builds one [`RelocRecord`] per raw relocation table
//! entry, tagged with a concrete [`RelocKind`] by architecture and type code.
//! Processing is strictly two-phase across the entire set of loaded objects:
//! first every record resolves its defining symbol against the ordered
//! candidate list, then every record applies its write. A fatal error during
//! apply aborts the load; writes already performed stand, matching the
//! all-or-nothing failure behavior of a real dynamic linker.

use crate::{
    Result,
    error::{invalid_binary_error, operation_error},
    object::{LoadScope, ObjectId},
    symbol::{SymbolId, SymbolType},
};
use alloc::format;
use bitflags::bitflags;
use core::ops::{Add, Sub};

bitflags! {
    /// Validation modes for a truncating 32-bit write.
    ///
    /// The two checks are independent: `ZERO_EXTEND` requires all bits above
    /// bit 31 to be clear, `SIGN_EXTEND` requires them to equal the
    /// sign-extension of bit 31.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct TruncateCheck: u8 {
        const ZERO_EXTEND = 1 << 0;
        const SIGN_EXTEND = 1 << 1;
    }
}

/// A computed relocation value with wrapping address arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(transparent)]
pub(crate) struct RelocValue(pub u64);

impl RelocValue {
    #[inline]
    pub const fn new(val: u64) -> Self {
        Self(val)
    }
}

impl Add<u64> for RelocValue {
    type Output = Self;

    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        RelocValue(self.0.wrapping_add(rhs))
    }
}

impl Add<i64> for RelocValue {
    type Output = Self;

    #[inline]
    fn add(self, rhs: i64) -> Self::Output {
        RelocValue(self.0.wrapping_add_signed(rhs))
    }
}

impl Sub<u64> for RelocValue {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: u64) -> Self::Output {
        RelocValue(self.0.wrapping_sub(rhs))
    }
}

/// How a variant finds its defining symbol.
#[derive(Clone, Copy, PartialEq, Eq)]
enum LookupRule {
    /// Ordered scan over the candidate list.
    Ordered,
    /// Ordered scan with the record's own object excluded: a copy
    /// relocation's definition must come from a different object than the
    /// one requesting the copy.
    ExcludeOwner,
    /// No cross-object lookup; the value is computable from the owning
    /// object alone.
    Skip,
}

/// The closed set of ABI-specific relocation behaviors.
///
/// Each variant specifies either a value rule consumed by the generic
/// compute-then-pack apply path, or a custom apply procedure (TLS, indirect
/// function, copy, static rebasing).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelocKind {
    /// TLS offset within the defining module's TLS block (`DTPOFF`).
    TlsDoffset,
    /// TLS offset relative to the thread pointer (`TPOFF`); requires the
    /// definer to participate in the static TLS model.
    TlsOffset,
    /// TLS module id of the defining object (`DTPMOD`).
    TlsModId,
    /// Deferred indirect-function resolution (`IRELATIVE`).
    IRelative,
    /// resolved + addend.
    AbsoluteAddend,
    /// resolved + addend - site.
    PcRelativeAddend,
    /// resolved, plus the addend only under the explicit-addend encoding.
    JumpSlot,
    /// resolved if a definer was found, else mapped base + addend.
    Relative,
    /// resolved.
    Absolute,
    /// Byte-range copy from the definer's storage.
    Copy,
    /// MIPS bookkeeping alias of [`RelocKind::Absolute`].
    MipsGlobal,
    /// MIPS static rebasing: shift the stored word by the mapped-base delta.
    /// Not idempotent; must execute exactly once per record.
    MipsLocal,
}

impl RelocKind {
    /// Whether an absent defining symbol is legal at apply time.
    pub fn auto_handle_absent(self) -> bool {
        matches!(
            self,
            RelocKind::TlsDoffset
                | RelocKind::TlsOffset
                | RelocKind::TlsModId
                | RelocKind::IRelative
                | RelocKind::Relative
                | RelocKind::MipsLocal
        )
    }

    fn lookup_rule(self) -> LookupRule {
        match self {
            RelocKind::TlsDoffset | RelocKind::MipsLocal => LookupRule::Skip,
            RelocKind::Copy => LookupRule::ExcludeOwner,
            _ => LookupRule::Ordered,
        }
    }

    fn has_value_rule(self) -> bool {
        matches!(
            self,
            RelocKind::TlsDoffset
                | RelocKind::AbsoluteAddend
                | RelocKind::PcRelativeAddend
                | RelocKind::JumpSlot
                | RelocKind::Relative
                | RelocKind::Absolute
                | RelocKind::MipsGlobal
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            RelocKind::TlsDoffset => "tls-doffset",
            RelocKind::TlsOffset => "tls-offset",
            RelocKind::TlsModId => "tls-modid",
            RelocKind::IRelative => "irelative",
            RelocKind::AbsoluteAddend => "absolute+addend",
            RelocKind::PcRelativeAddend => "pc-relative",
            RelocKind::JumpSlot => "jumpslot",
            RelocKind::Relative => "relative",
            RelocKind::Absolute => "absolute",
            RelocKind::Copy => "copy",
            RelocKind::MipsGlobal => "mips-global",
            RelocKind::MipsLocal => "mips-local",
        }
    }
}

/// One raw relocation table entry, as supplied by the container parser.
/// The symbol index has already been mapped to a [`SymbolId`] by the
/// symbol-table collaborator.
pub struct RawReloc {
    pub r_type: u32,
    /// Target offset within the owner's image.
    pub offset: u64,
    pub symbol: Option<SymbolId>,
    pub addend: i64,
    /// Explicit-addend (RELA) encoding; the implicit (REL) encoding assumes
    /// the addend is embedded in the pre-existing memory contents.
    pub is_rela: bool,
}

/// One relocation site, owned by exactly one loaded object.
///
/// Records pass through [`resolve`](RelocRecord::resolve) then
/// [`apply`](RelocRecord::apply) exactly once each and are then discarded;
/// their only durable effect is the bytes they write and, for
/// indirect-function variants, the entries appended to the owner's pending
/// list.
pub struct RelocRecord {
    owner: ObjectId,
    kind: RelocKind,
    truncate: Option<TruncateCheck>,
    offset: u64,
    addend: i64,
    is_rela: bool,
    symbol: Option<SymbolId>,
    resolved_by: Option<SymbolId>,
    resolved: bool,
}

impl RelocRecord {
    pub fn new(owner: ObjectId, kind: RelocKind, offset: u64, addend: i64) -> Self {
        Self {
            owner,
            kind,
            truncate: None,
            offset,
            addend,
            is_rela: true,
            symbol: None,
            resolved_by: None,
            resolved: false,
        }
    }

    /// Builds a record from a raw table entry, tagging it with the concrete
    /// variant for the owner's architecture. Unknown type codes are
    /// [`Error::InvalidBinary`](crate::Error::InvalidBinary).
    pub fn from_raw(scope: &LoadScope, owner: ObjectId, raw: &RawReloc) -> Result<Self> {
        let machine = scope.object(owner).arch().machine;
        let (kind, truncate) = machine.decode(raw.r_type).ok_or_else(|| {
            invalid_binary_error(format!(
                "file: {}, unsupported relocation type: {} ({})",
                scope.object(owner).name(),
                machine.rel_type_to_str(raw.r_type),
                raw.r_type
            ))
        })?;
        Ok(Self {
            owner,
            kind,
            truncate,
            offset: raw.offset,
            addend: raw.addend,
            is_rela: raw.is_rela,
            symbol: raw.symbol,
            resolved_by: None,
            resolved: false,
        })
    }

    pub fn with_symbol(mut self, symbol: SymbolId) -> Self {
        self.symbol = Some(symbol);
        self
    }

    pub fn with_explicit_addend(mut self, is_rela: bool) -> Self {
        self.is_rela = is_rela;
        self
    }

    pub fn with_truncate(mut self, check: TruncateCheck) -> Self {
        self.truncate = Some(check);
        self
    }

    #[inline]
    pub fn kind(&self) -> RelocKind {
        self.kind
    }

    #[inline]
    pub fn owner(&self) -> ObjectId {
        self.owner
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// The symbol that satisfied this record, populated by
    /// [`resolve`](RelocRecord::resolve). Absent is legal for
    /// auto-handle-absent variants.
    #[inline]
    pub fn resolved_by(&self) -> Option<SymbolId> {
        self.resolved_by
    }

    /// Finds the defining symbol among the ordered candidate objects.
    ///
    /// Absence of a match is allowed and leaves `resolved_by` unset; the
    /// apply step decides per variant whether that is legal.
    pub fn resolve(&mut self, scope: &LoadScope, solist: &[ObjectId]) {
        debug_assert!(!self.resolved, "record resolved twice");
        self.resolved_by = match self.kind.lookup_rule() {
            LookupRule::Skip => None,
            LookupRule::Ordered => self.lookup(scope, solist.iter().copied()),
            LookupRule::ExcludeOwner => {
                self.lookup(scope, solist.iter().copied().filter(|&id| id != self.owner))
            }
        };
        if let Some(def) = self.resolved_by {
            log::trace!(
                "binding file [{}] to [{}]: symbol [{}]",
                scope.object(self.owner).name(),
                scope.object(scope.symbol(def).owner()).name(),
                scope.symbol(def).name()
            );
        }
        self.resolved = true;
    }

    fn lookup(
        &self,
        scope: &LoadScope,
        candidates: impl IntoIterator<Item = ObjectId>,
    ) -> Option<SymbolId> {
        let requested = self.symbol?;
        let name = scope.symbol(requested).name();
        if name.is_empty() {
            return None;
        }
        scope.lookup(name, candidates)
    }

    /// Performs the write or queues deferred work.
    ///
    /// Must run after [`resolve`](RelocRecord::resolve), once per record, and
    /// only after the loader has assigned TLS block offsets and module ids
    /// for every object.
    pub fn apply(&self, scope: &mut LoadScope) -> Result<()> {
        debug_assert!(self.resolved, "record applied before resolution");
        if !self.kind.auto_handle_absent() && self.resolved_by.is_none() {
            return Err(self.error(scope, "unresolved symbol"));
        }
        if self.kind.has_value_rule() {
            let value = self.value(scope);
            return self.write_value(scope, value);
        }
        match self.kind {
            RelocKind::TlsOffset => self.apply_tls_offset(scope),
            RelocKind::TlsModId => self.apply_tls_mod_id(scope),
            RelocKind::IRelative => self.apply_irelative(scope),
            RelocKind::Copy => self.apply_copy(scope),
            RelocKind::MipsLocal => self.apply_mips_local(scope),
            _ => unreachable!("value-rule variant reached custom apply"),
        }
    }

    /// The generic value rule of the variant; only meaningful for variants
    /// where `has_value_rule` holds.
    fn value(&self, scope: &LoadScope) -> u64 {
        match self.kind {
            // A + symbol's address relative to its module's TLS block
            RelocKind::TlsDoffset => (RelocValue::new(self.requested_rel_addr(scope)) + self.addend).0,
            // S + A
            RelocKind::AbsoluteAddend => (self.resolved_addr(scope) + self.addend).0,
            // S + A - P
            RelocKind::PcRelativeAddend => {
                (self.resolved_addr(scope) + self.addend - self.site_addr(scope)).0
            }
            // S, plus A only under the explicit-addend encoding
            RelocKind::JumpSlot => {
                let val = self.resolved_addr(scope);
                if self.is_rela { (val + self.addend).0 } else { val.0 }
            }
            // S if a definer was found, else B + A
            RelocKind::Relative => match self.resolved_by {
                Some(def) => scope.rebased_addr(def),
                None => {
                    (RelocValue::new(scope.object(self.owner).mapped_base()) + self.addend).0
                }
            },
            // S
            RelocKind::Absolute | RelocKind::MipsGlobal => self.resolved_addr(scope).0,
            _ => unreachable!("custom-apply variant has no value rule"),
        }
    }

    /// Final mapped address of the defining symbol.
    fn resolved_addr(&self, scope: &LoadScope) -> RelocValue {
        let def = self
            .resolved_by
            .expect("unresolved record reached value computation");
        RelocValue::new(scope.rebased_addr(def))
    }

    /// Final mapped address of the relocation's own target location.
    fn site_addr(&self, scope: &LoadScope) -> u64 {
        scope
            .object(self.owner)
            .mapped_base()
            .wrapping_add(self.offset)
    }

    /// Relative address of the requested symbol, or zero when the record
    /// carries none (TLS records addressing the owning module).
    fn requested_rel_addr(&self, scope: &LoadScope) -> u64 {
        self.symbol
            .map(|sym| scope.symbol(sym).relative_addr())
            .unwrap_or(0)
    }

    /// Generic apply path: write the computed value as a native word, or
    /// through the truncation capability when one is attached.
    fn write_value(&self, scope: &mut LoadScope, value: u64) -> Result<()> {
        if let Some(check) = self.truncate {
            return self.write_truncated(scope, value, check);
        }
        let size = scope.object(self.owner).arch().word_size();
        scope
            .object_mut(self.owner)
            .memory_mut()
            .pack_word(self.offset, value, size, false)
    }

    /// Truncating write for relocations covering a fixed 32-bit field on a
    /// wider architecture: reduce modulo the native range, validate the
    /// configured extension checks, then write exactly 4 bytes unsigned.
    fn write_truncated(&self, scope: &mut LoadScope, value: u64, check: TruncateCheck) -> Result<()> {
        let bits = scope.object(self.owner).arch().bits;
        assert!(bits >= 32, "32-bit truncation on a narrower architecture");
        let val = if bits >= 64 {
            value
        } else {
            value & ((1u64 << bits) - 1)
        };
        let high = val >> 32;
        if check.contains(TruncateCheck::ZERO_EXTEND) && high != 0 {
            return Err(self.truncation_error(scope));
        }
        if check.contains(TruncateCheck::SIGN_EXTEND) {
            let expected = if (val >> 31) & 1 == 1 {
                (1u64 << (bits - 32)) - 1
            } else {
                0
            };
            if high != expected {
                return Err(self.truncation_error(scope));
            }
        }
        scope
            .object_mut(self.owner)
            .memory_mut()
            .pack_word(self.offset, val & 0xffff_ffff, 4, false)
    }

    /// Static TLS model: the definer's block offset plus the in-block
    /// address, rebased against the architecture's thread-pointer offset.
    fn apply_tls_offset(&self, scope: &mut LoadScope) -> Result<()> {
        let definer = self.definer_object(scope);
        let Some(block_offset) = scope.object(definer).tls_block_offset() else {
            return Err(invalid_binary_error(
                "Illegal relocation - dynamically loaded object using static TLS",
            ));
        };
        let tp_offset = scope.object(self.owner).arch().tp_offset;
        let value =
            RelocValue::new(block_offset) + self.addend + self.requested_rel_addr(scope) - tp_offset;
        let size = scope.object(self.owner).arch().word_size();
        scope
            .object_mut(self.owner)
            .memory_mut()
            .pack_word(self.offset, value.0, size, false)
    }

    fn apply_tls_mod_id(&self, scope: &mut LoadScope) -> Result<()> {
        let definer = match self.symbol {
            Some(sym) if scope.symbol(sym).ty() != SymbolType::None => self.definer_object(scope),
            _ => self.owner,
        };
        let Some(module_id) = scope.object(definer).tls_module_id() else {
            return Err(self.error(scope, "definer has no TLS module id assigned"));
        };
        let size = scope.object(self.owner).arch().word_size();
        scope
            .object_mut(self.owner)
            .memory_mut()
            .pack_word(self.offset, module_id, size, false)
    }

    /// Defers the indirect-function resolution: evaluating the resolver
    /// requires code execution, which is outside this engine's scope.
    fn apply_irelative(&self, scope: &mut LoadScope) -> Result<()> {
        let untyped = self
            .symbol
            .map(|sym| scope.symbol(sym).ty() == SymbolType::None)
            .unwrap_or(true);
        let resolver = match self.resolved_by {
            Some(def) if !untyped => scope.rebased_addr(def),
            _ => scope.object(self.owner).to_mapped(self.addend as u64),
        };
        scope
            .object_mut(self.owner)
            .push_irelative(resolver, self.offset);
        Ok(())
    }

    fn apply_copy(&self, scope: &mut LoadScope) -> Result<()> {
        let requested = self
            .symbol
            .ok_or_else(|| self.error(scope, "copy relocation without a requested symbol"))?;
        let def = self.resolved_by.expect("checked in apply");
        let len = scope.symbol(requested).size();
        let definer = scope.symbol(def);
        if definer.size() != len && !(definer.size() == 0 && !definer.is_extern()) {
            log::warn!(
                "Export symbol is different size than import symbol for copy relocation: {}",
                scope.symbol(requested).name()
            );
        }
        let src_owner = definer.owner();
        let src_addr = definer.relative_addr();
        let bytes = scope
            .object(src_owner)
            .memory()
            .load(src_addr, len as usize)?
            .to_vec();
        scope
            .object_mut(self.owner)
            .memory_mut()
            .store(self.offset, &bytes)
    }

    /// MIPS static rebasing: shift the stored word by the delta between the
    /// actual mapped base and the declared static base. Skipped entirely for
    /// the non-relocated primary image.
    fn apply_mips_local(&self, scope: &mut LoadScope) -> Result<()> {
        let obj = scope.object(self.owner);
        if obj.mapped_base() == 0 {
            // don't touch local relocations on the main binary
            return Ok(());
        }
        let delta = obj.mapped_base().wrapping_sub(obj.static_base());
        if delta == 0 {
            return Ok(());
        }
        let size = obj.arch().word_size();
        let word = obj.memory().unpack_word(self.offset, size)?;
        scope
            .object_mut(self.owner)
            .memory_mut()
            .pack_word(self.offset, word.wrapping_add(delta), size, false)
    }

    /// The object whose TLS assignments satisfy this record: the definer's
    /// owner when a definer was found, else the owning object.
    fn definer_object(&self, scope: &LoadScope) -> ObjectId {
        self.resolved_by
            .map(|def| scope.symbol(def).owner())
            .unwrap_or(self.owner)
    }

    #[cold]
    fn error(&self, scope: &LoadScope, err: &str) -> crate::Error {
        match self.symbol {
            Some(sym) => invalid_binary_error(format!(
                "file: {}, relocation type: {}, symbol name: {}, error: {}",
                scope.object(self.owner).name(),
                self.kind.as_str(),
                scope.symbol(sym).name(),
                err
            )),
            None => invalid_binary_error(format!(
                "file: {}, relocation type: {}, no symbol, error: {}",
                scope.object(self.owner).name(),
                self.kind.as_str(),
                err
            )),
        }
    }

    #[cold]
    fn truncation_error(&self, scope: &LoadScope) -> crate::Error {
        operation_error(format!(
            "relocation truncated to fit: {} in {}; consider making relevant \
             addresses fit in the 32-bit address space",
            self.kind.as_str(),
            scope.object(self.owner).name()
        ))
    }
}

/// Runs the two-phase protocol over a whole load pass: Resolution for every
/// record, then Apply for every record, in record order. The first fatal
/// error aborts; writes already performed are not rolled back.
pub fn relocate_all(
    scope: &mut LoadScope,
    records: &mut [RelocRecord],
    solist: &[ObjectId],
) -> Result<()> {
    for record in records.iter_mut() {
        record.resolve(scope, solist);
    }
    for record in records.iter() {
        record.apply(scope)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_handle_absent_matches_variant_table() {
        let auto = [
            RelocKind::TlsDoffset,
            RelocKind::TlsOffset,
            RelocKind::TlsModId,
            RelocKind::IRelative,
            RelocKind::Relative,
            RelocKind::MipsLocal,
        ];
        let strict = [
            RelocKind::AbsoluteAddend,
            RelocKind::PcRelativeAddend,
            RelocKind::JumpSlot,
            RelocKind::Absolute,
            RelocKind::Copy,
            RelocKind::MipsGlobal,
        ];
        assert!(auto.iter().all(|kind| kind.auto_handle_absent()));
        assert!(strict.iter().all(|kind| !kind.auto_handle_absent()));
    }

    #[test]
    fn reloc_value_wraps() {
        assert_eq!((RelocValue::new(0) + (-1i64)).0, u64::MAX);
        assert_eq!((RelocValue::new(1) - 2u64).0, u64::MAX);
        assert_eq!((RelocValue::new(u64::MAX) + 1u64).0, 0);
    }
}
