mod common;

use common::{init, word, x86_64_pair};
use elf_relocator::{
    Arch, Endian, Error, LoadScope, LoadedObject, MemoryImage, ObjectId, RawReloc, RelocKind,
    RelocRecord, Symbol, SymbolId, SymbolType, TruncateCheck, abi, relocate_all,
};
use rstest::rstest;

/// Registers `name` as an import on `importer` and an export at
/// `lib_rel_addr` in `lib`, returning the import's handle.
fn import_export(
    scope: &mut LoadScope,
    importer: ObjectId,
    lib: ObjectId,
    name: &str,
    lib_rel_addr: u64,
) -> SymbolId {
    scope.add_symbol(Symbol::new(lib, name, SymbolType::Func, lib_rel_addr), true);
    scope.add_symbol(Symbol::new(importer, name, SymbolType::Func, 0), false)
}

#[rstest]
#[case(0x20, 0x2030)]
#[case(-0x10, 0x2000)]
fn absolute_addend(#[case] addend: i64, #[case] expected: u64) {
    init();
    let mut scope = LoadScope::new();
    let (app, lib) = x86_64_pair(&mut scope);
    let import = import_export(&mut scope, app, lib, "foo", 0x10);

    let mut rec =
        RelocRecord::new(app, RelocKind::AbsoluteAddend, 0x40, addend).with_symbol(import);
    rec.resolve(&scope, &[app, lib]);
    rec.apply(&mut scope).unwrap();
    assert_eq!(word(&scope, app, 0x40), expected);
}

#[rstest]
fn pc_relative_wraps_to_unsigned_word() {
    init();
    let mut scope = LoadScope::new();
    let app = scope.add_object(LoadedObject::new(
        "app",
        Arch::X86_64,
        0x1000,
        MemoryImage::zeroed(0x100, Endian::Little),
    ));
    let lib = scope.add_object(LoadedObject::new(
        "liblow.so",
        Arch::X86_64,
        0x400,
        MemoryImage::zeroed(0x100, Endian::Little),
    ));
    let import = import_export(&mut scope, app, lib, "low", 0x10);

    // site (0x1040) is above the resolved address (0x410): the raw result is
    // negative and must be stored as an unsigned native word.
    let mut rec =
        RelocRecord::new(app, RelocKind::PcRelativeAddend, 0x40, 0).with_symbol(import);
    rec.resolve(&scope, &[app, lib]);
    rec.apply(&mut scope).unwrap();
    assert_eq!(word(&scope, app, 0x40), 0x410u64.wrapping_sub(0x1040));
}

#[rstest]
#[case(true, 0x2030)]
#[case(false, 0x2010)]
fn jumpslot_addend_depends_on_encoding(#[case] is_rela: bool, #[case] expected: u64) {
    init();
    let mut scope = LoadScope::new();
    let (app, lib) = x86_64_pair(&mut scope);
    let import = import_export(&mut scope, app, lib, "func", 0x10);

    let mut rec = RelocRecord::new(app, RelocKind::JumpSlot, 0x48, 0x20)
        .with_symbol(import)
        .with_explicit_addend(is_rela);
    rec.resolve(&scope, &[app, lib]);
    rec.apply(&mut scope).unwrap();
    assert_eq!(word(&scope, app, 0x48), expected);
}

#[rstest]
fn relative_without_definer_uses_mapped_base() {
    init();
    let mut scope = LoadScope::new();
    let (app, _lib) = x86_64_pair(&mut scope);

    let mut rec = RelocRecord::new(app, RelocKind::Relative, 0x10, 0x20);
    rec.resolve(&scope, &[app]);
    rec.apply(&mut scope).unwrap();
    assert_eq!(word(&scope, app, 0x10), 0x1020);
}

#[rstest]
fn relative_with_definer_ignores_addend() {
    init();
    let mut scope = LoadScope::new();
    let (app, lib) = x86_64_pair(&mut scope);
    let import = import_export(&mut scope, app, lib, "var", 0x30);

    let mut rec = RelocRecord::new(app, RelocKind::Relative, 0x10, 0x9999).with_symbol(import);
    rec.resolve(&scope, &[app, lib]);
    rec.apply(&mut scope).unwrap();
    assert_eq!(word(&scope, app, 0x10), 0x2030);
}

#[rstest]
fn tls_offset_without_block_assignment_fails() {
    init();
    let mut scope = LoadScope::new();
    let (app, lib) = x86_64_pair(&mut scope);
    let import = import_export(&mut scope, app, lib, "tls_var", 0x8);
    scope
        .object_mut(app)
        .memory_mut()
        .store(0x20, &[0xaa; 8])
        .unwrap();

    // The definer never got a static TLS block offset assigned.
    let mut rec = RelocRecord::new(app, RelocKind::TlsOffset, 0x20, 0x4).with_symbol(import);
    rec.resolve(&scope, &[app, lib]);
    let err = rec.apply(&mut scope).unwrap_err();
    assert!(matches!(err, Error::InvalidBinary { .. }));
    // No memory write happened.
    assert_eq!(scope.object(app).memory().load(0x20, 8).unwrap(), &[0xaa; 8]);
}

#[rstest]
fn tls_offset_rebases_against_thread_pointer() {
    init();
    let mut scope = LoadScope::new();
    let (app, lib) = x86_64_pair(&mut scope);
    // The relocation's own symbol entry carries the in-block address.
    scope.add_symbol(Symbol::new(lib, "tls_var", SymbolType::Tls, 0x8), true);
    let import = scope.add_symbol(Symbol::new(app, "tls_var", SymbolType::Tls, 0x8), false);
    scope.object_mut(lib).set_tls_block_offset(0x100);

    let mut rec = RelocRecord::new(app, RelocKind::TlsOffset, 0x20, 0x4).with_symbol(import);
    rec.resolve(&scope, &[app, lib]);
    rec.apply(&mut scope).unwrap();
    // block offset + addend + symbol relative address - tp_offset (0 on x86-64)
    assert_eq!(word(&scope, app, 0x20), 0x10c);
}

#[rstest]
fn tls_mod_id_picks_definer_module() {
    init();
    let mut scope = LoadScope::new();
    let (app, lib) = x86_64_pair(&mut scope);
    scope.object_mut(app).set_tls_module_id(1);
    scope.object_mut(lib).set_tls_module_id(7);
    scope.add_symbol(Symbol::new(lib, "tls_var", SymbolType::Tls, 0x8), true);
    let import = scope.add_symbol(Symbol::new(app, "tls_var", SymbolType::Tls, 0), false);

    // Typed symbol: the resolved definer's module id.
    let mut rec = RelocRecord::new(app, RelocKind::TlsModId, 0x20, 0).with_symbol(import);
    rec.resolve(&scope, &[app, lib]);
    rec.apply(&mut scope).unwrap();
    assert_eq!(word(&scope, app, 0x20), 7);

    // No symbol: the owning object's module id.
    let mut rec = RelocRecord::new(app, RelocKind::TlsModId, 0x28, 0);
    rec.resolve(&scope, &[app, lib]);
    rec.apply(&mut scope).unwrap();
    assert_eq!(word(&scope, app, 0x28), 1);
}

#[rstest]
fn irelative_defers_instead_of_writing() {
    init();
    let mut scope = LoadScope::new();
    let (app, lib) = x86_64_pair(&mut scope);

    // Untyped: the resolver is the translated link-time address of the addend.
    let mut rec = RelocRecord::new(app, RelocKind::IRelative, 0x30, 0x500);
    rec.resolve(&scope, &[app, lib]);
    rec.apply(&mut scope).unwrap();

    // Typed and resolved: the resolver is the definer's mapped address.
    let import = import_export(&mut scope, app, lib, "ifunc_resolver", 0x10);
    let mut rec = RelocRecord::new(app, RelocKind::IRelative, 0x38, 0).with_symbol(import);
    rec.resolve(&scope, &[app, lib]);
    rec.apply(&mut scope).unwrap();

    assert_eq!(word(&scope, app, 0x30), 0);
    assert_eq!(word(&scope, app, 0x38), 0);
    assert_eq!(
        scope.object_mut(app).take_irelatives(),
        vec![(0x1500, 0x30), (0x2010, 0x38)]
    );
    assert!(scope.object(app).irelatives().is_empty());
}

#[rstest]
fn truncation_zero_extend_rejects_high_bits() {
    init();
    let mut scope = LoadScope::new();
    let (app, _) = x86_64_pair(&mut scope);
    let lib = scope.add_object(LoadedObject::new(
        "libhigh.so",
        Arch::X86_64,
        0x1_0000_0000,
        MemoryImage::zeroed(0x100, Endian::Little),
    ));
    let import = import_export(&mut scope, app, lib, "high", 0);

    let mut rec = RelocRecord::new(app, RelocKind::AbsoluteAddend, 0x40, 0)
        .with_symbol(import)
        .with_truncate(TruncateCheck::ZERO_EXTEND);
    rec.resolve(&scope, &[app, lib]);
    let err = rec.apply(&mut scope).unwrap_err();
    assert!(matches!(err, Error::Operation { .. }));
}

#[rstest]
fn truncation_sign_extend_accepts_negative_word() {
    init();
    let mut scope = LoadScope::new();
    let (app, _) = x86_64_pair(&mut scope);
    let lib = scope.add_object(LoadedObject::new(
        "libneg.so",
        Arch::X86_64,
        0xffff_ffff_8000_0000,
        MemoryImage::zeroed(0x100, Endian::Little),
    ));
    let import = import_export(&mut scope, app, lib, "neg", 0);
    scope
        .object_mut(app)
        .memory_mut()
        .store(0x40, &[0xaa; 8])
        .unwrap();

    // Bits >= 32 are the correct sign-extension of bit 31.
    let mut rec = RelocRecord::new(app, RelocKind::AbsoluteAddend, 0x40, 0)
        .with_symbol(import)
        .with_truncate(TruncateCheck::SIGN_EXTEND);
    rec.resolve(&scope, &[app, lib]);
    rec.apply(&mut scope).unwrap();
    // Exactly 4 bytes written, unsigned.
    assert_eq!(scope.object(app).memory().unpack_word(0x40, 4).unwrap(), 0x8000_0000);
    assert_eq!(scope.object(app).memory().load(0x44, 4).unwrap(), &[0xaa; 4]);
}

#[rstest]
fn truncation_sign_extend_rejects_mismatched_high_bits() {
    init();
    let mut scope = LoadScope::new();
    let (app, _) = x86_64_pair(&mut scope);
    let lib = scope.add_object(LoadedObject::new(
        "libhigh.so",
        Arch::X86_64,
        0x1_0000_0000,
        MemoryImage::zeroed(0x100, Endian::Little),
    ));
    let import = import_export(&mut scope, app, lib, "high", 0);

    let mut rec = RelocRecord::new(app, RelocKind::AbsoluteAddend, 0x40, 0)
        .with_symbol(import)
        .with_truncate(TruncateCheck::SIGN_EXTEND);
    rec.resolve(&scope, &[app, lib]);
    assert!(matches!(
        rec.apply(&mut scope),
        Err(Error::Operation { .. })
    ));
}

#[rstest]
fn mips_local_rebasing_is_not_idempotent() {
    init();
    let mut scope = LoadScope::new();
    let obj = scope.add_object(
        LoadedObject::new(
            "libmips.so",
            Arch::MIPS64,
            0x40000,
            MemoryImage::zeroed(0x100, Endian::Big),
        )
        .with_static_base(0x10000),
    );
    scope
        .object_mut(obj)
        .memory_mut()
        .pack_word(0x20, 0x1000, 8, false)
        .unwrap();

    let mut rec = RelocRecord::new(obj, RelocKind::MipsLocal, 0x20, 0);
    rec.resolve(&scope, &[obj]);
    rec.apply(&mut scope).unwrap();
    assert_eq!(word(&scope, obj, 0x20), 0x31000);

    // Re-running doubles the shift.
    rec.apply(&mut scope).unwrap();
    assert_eq!(word(&scope, obj, 0x20), 0x61000);
}

#[rstest]
fn mips_local_skips_primary_image() {
    init();
    let mut scope = LoadScope::new();
    let obj = scope.add_object(
        LoadedObject::new(
            "mips-exec",
            Arch::MIPS64,
            0,
            MemoryImage::zeroed(0x100, Endian::Big),
        )
        .with_static_base(0x10000),
    );
    scope
        .object_mut(obj)
        .memory_mut()
        .pack_word(0x20, 0x1000, 8, false)
        .unwrap();

    let mut rec = RelocRecord::new(obj, RelocKind::MipsLocal, 0x20, 0);
    rec.resolve(&scope, &[obj]);
    rec.apply(&mut scope).unwrap();
    assert_eq!(word(&scope, obj, 0x20), 0x1000);
}

#[rstest]
fn copy_accepts_zero_sized_local_definer() {
    init();
    let mut scope = LoadScope::new();
    let (app, lib) = x86_64_pair(&mut scope);
    scope.add_symbol(
        Symbol::new(lib, "buf", SymbolType::Object, 0x20).with_size(0),
        true,
    );
    let import = scope.add_symbol(
        Symbol::new(app, "buf", SymbolType::Object, 0).with_size(8),
        false,
    );
    let payload = [1, 2, 3, 4, 5, 6, 7, 8];
    scope.object_mut(lib).memory_mut().store(0x20, &payload).unwrap();

    // Requested size 8, definer size 0, definer not externally defined: the
    // accepted relaxation copies the requested length.
    let mut rec = RelocRecord::new(app, RelocKind::Copy, 0x50, 0).with_symbol(import);
    rec.resolve(&scope, &[app, lib]);
    rec.apply(&mut scope).unwrap();
    assert_eq!(scope.object(app).memory().load(0x50, 8).unwrap(), &payload);
}

#[rstest]
fn copy_size_mismatch_still_copies_requested_length() {
    init();
    let mut scope = LoadScope::new();
    let (app, lib) = x86_64_pair(&mut scope);
    scope.add_symbol(
        Symbol::new(lib, "buf", SymbolType::Object, 0x20).with_size(4),
        true,
    );
    let import = scope.add_symbol(
        Symbol::new(app, "buf", SymbolType::Object, 0).with_size(8),
        false,
    );
    let payload = [9, 8, 7, 6, 5, 4, 3, 2];
    scope.object_mut(lib).memory_mut().store(0x20, &payload).unwrap();

    let mut rec = RelocRecord::new(app, RelocKind::Copy, 0x50, 0).with_symbol(import);
    rec.resolve(&scope, &[app, lib]);
    rec.apply(&mut scope).unwrap();
    assert_eq!(scope.object(app).memory().load(0x50, 8).unwrap(), &payload);
}

#[rstest]
fn copy_resolution_excludes_requesting_object() {
    init();
    let mut scope = LoadScope::new();
    let (app, lib) = x86_64_pair(&mut scope);
    // Both objects export the name; the importer is never its own source.
    scope.add_symbol(
        Symbol::new(app, "dup", SymbolType::Object, 0x60).with_size(4),
        true,
    );
    let def = scope.add_symbol(
        Symbol::new(lib, "dup", SymbolType::Object, 0x30).with_size(4),
        true,
    );
    let import = scope.add_symbol(
        Symbol::new(app, "dup", SymbolType::Object, 0).with_size(4),
        false,
    );

    let mut rec = RelocRecord::new(app, RelocKind::Copy, 0x50, 0).with_symbol(import);
    rec.resolve(&scope, &[app, lib]);
    assert_eq!(rec.resolved_by(), Some(def));
}

#[rstest]
fn unresolved_jumpslot_is_fatal() {
    init();
    let mut scope = LoadScope::new();
    let (app, lib) = x86_64_pair(&mut scope);
    let import = scope.add_symbol(Symbol::new(app, "missing", SymbolType::Func, 0), false);

    let mut rec = RelocRecord::new(app, RelocKind::JumpSlot, 0x48, 0).with_symbol(import);
    rec.resolve(&scope, &[app, lib]);
    assert_eq!(rec.resolved_by(), None);
    let err = rec.apply(&mut scope).unwrap_err();
    assert!(matches!(err, Error::InvalidBinary { .. }));
}

#[rstest]
fn unknown_relocation_type_is_rejected() {
    init();
    let mut scope = LoadScope::new();
    let (app, _) = x86_64_pair(&mut scope);

    let raw = RawReloc {
        r_type: abi::R_X86_64_GOT32,
        offset: 0x40,
        symbol: None,
        addend: 0,
        is_rela: true,
    };
    assert!(matches!(
        RelocRecord::from_raw(&scope, app, &raw),
        Err(Error::InvalidBinary { .. })
    ));
}

#[rstest]
fn end_to_end_absolute_addend() {
    init();
    let mut scope = LoadScope::new();
    let (app, lib) = x86_64_pair(&mut scope);
    scope.add_symbol(Symbol::new(lib, "target", SymbolType::Object, 0x10), true);
    let import = scope.add_symbol(Symbol::new(app, "target", SymbolType::Object, 0), false);

    let raw = RawReloc {
        r_type: abi::R_X86_64_64,
        offset: 0x40,
        symbol: Some(import),
        addend: 0x20,
        is_rela: true,
    };
    let mut records = vec![RelocRecord::from_raw(&scope, app, &raw).unwrap()];
    relocate_all(&mut scope, &mut records, &[app, lib]).unwrap();

    // mapped base 0x1000, symbol resolved at 0x2010, addend 0x20
    assert_eq!(scope.object(app).memory().unpack_word(0x40, 8).unwrap(), 0x2030);
}
