//! # elf_relocator
//! The relocation-application engine of a multi-image binary loader used for
//! static binary analysis: after an executable and its shared dependencies
//! have been parsed and mapped into a simulated address space, this crate
//! rewrites the bytes of those images so that every cross-reference points to
//! its final load-time address, mirroring what a dynamic linker does at
//! process start.
//!
//! ## Usage
//! The surrounding loader registers each image and its symbols in a
//! [`LoadScope`], builds one [`RelocRecord`] per raw relocation table entry,
//! and runs [`relocate_all`] — Resolution for every record, then Apply for
//! every record, across all objects.
//!
//! ```
//! use elf_relocator::{
//!     Arch, Endian, LoadScope, LoadedObject, MemoryImage, RawReloc, RelocRecord, Symbol,
//!     SymbolType, relocate_all,
//! };
//!
//! let mut scope = LoadScope::new();
//! let app = scope.add_object(LoadedObject::new(
//!     "app",
//!     Arch::X86_64,
//!     0x1000,
//!     MemoryImage::zeroed(0x100, Endian::Little),
//! ));
//! let libm = scope.add_object(LoadedObject::new(
//!     "libm.so",
//!     Arch::X86_64,
//!     0x2000,
//!     MemoryImage::zeroed(0x100, Endian::Little),
//! ));
//! scope.add_symbol(Symbol::new(libm, "cos", SymbolType::Func, 0x10), true);
//! let want_cos = scope.add_symbol(Symbol::new(app, "cos", SymbolType::Func, 0), false);
//!
//! let raw = RawReloc {
//!     r_type: elf_relocator::abi::R_X86_64_JUMP_SLOT,
//!     offset: 0x18,
//!     symbol: Some(want_cos),
//!     addend: 0,
//!     is_rela: true,
//! };
//! let mut records = vec![RelocRecord::from_raw(&scope, app, &raw).unwrap()];
//! relocate_all(&mut scope, &mut records, &[app, libm]).unwrap();
//! assert_eq!(scope.object(app).memory().unpack_word(0x18, 8).unwrap(), 0x2010);
//! ```
#![no_std]
extern crate alloc;

pub mod arch;
mod error;
pub mod memory;
pub mod object;
pub mod relocation;
pub mod symbol;

pub use arch::{Arch, Endian, Machine};
pub use error::Error;
pub use memory::MemoryImage;
pub use object::{LoadScope, LoadedObject, ObjectId};
pub use relocation::{RawReloc, RelocKind, RelocRecord, TruncateCheck, relocate_all};
pub use symbol::{Symbol, SymbolId, SymbolType};

pub use elf::abi;

pub type Result<T> = core::result::Result<T, Error>;
