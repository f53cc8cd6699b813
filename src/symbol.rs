//! Symbols registered for one load pass.

use crate::object::ObjectId;
use alloc::string::String;

/// Non-owning handle to a [`Symbol`] in a
/// [`LoadScope`](crate::object::LoadScope).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SymbolId(pub(crate) usize);

/// Coarse symbol classification, as reported by the container parser.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolType {
    /// Untyped. TLS and indirect-function relocations treat untyped symbols
    /// as references to the owning object itself.
    None,
    Object,
    Func,
    Tls,
    Other,
}

/// A named location inside a loaded object.
pub struct Symbol {
    name: String,
    ty: SymbolType,
    size: u64,
    /// Set when the definition lives in a synthetic externs object rather
    /// than in a real loaded image.
    is_extern: bool,
    /// Address relative to the owning object's image.
    relative_addr: u64,
    owner: ObjectId,
}

impl Symbol {
    pub fn new(owner: ObjectId, name: impl Into<String>, ty: SymbolType, relative_addr: u64) -> Self {
        Self {
            name: name.into(),
            ty,
            size: 0,
            is_extern: false,
            relative_addr,
            owner,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn with_extern(mut self, is_extern: bool) -> Self {
        self.is_extern = is_extern;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> SymbolType {
        self.ty
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn is_extern(&self) -> bool {
        self.is_extern
    }

    #[inline]
    pub fn relative_addr(&self) -> u64 {
        self.relative_addr
    }

    #[inline]
    pub fn owner(&self) -> ObjectId {
        self.owner
    }
}
