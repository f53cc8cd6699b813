use elf_relocator::{Arch, Endian, LoadScope, LoadedObject, MemoryImage, ObjectId};

/// Initialize test logging once; later calls are no-ops.
pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A small load pass: an executable mapped at 0x1000 and a library mapped at
/// 0x2000, both x86-64 with 0x100-byte images.
pub fn x86_64_pair(scope: &mut LoadScope) -> (ObjectId, ObjectId) {
    let app = scope.add_object(LoadedObject::new(
        "app",
        Arch::X86_64,
        0x1000,
        MemoryImage::zeroed(0x100, Endian::Little),
    ));
    let lib = scope.add_object(LoadedObject::new(
        "liba.so",
        Arch::X86_64,
        0x2000,
        MemoryImage::zeroed(0x100, Endian::Little),
    ));
    (app, lib)
}

/// Reads the native word at `offset` in `obj`'s image.
pub fn word(scope: &LoadScope, obj: ObjectId, offset: u64) -> u64 {
    let object = scope.object(obj);
    object
        .memory()
        .unpack_word(offset, object.arch().word_size())
        .unwrap()
}
