//! Loaded object images and the load-pass arena.
//!
//! Records, symbols and objects have independent, overlapping lifetimes
//! during a single load pass, so back-references are copyable handles
//! ([`ObjectId`], [`SymbolId`]) into a [`LoadScope`] arena instead of owning
//! pointers.

use crate::{
    arch::Arch,
    memory::MemoryImage,
    symbol::{Symbol, SymbolId},
};
use alloc::{string::String, vec::Vec};
use hashbrown::HashMap;

/// Non-owning handle to a [`LoadedObject`] in a [`LoadScope`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectId(pub(crate) usize);

/// One mapped binary image.
///
/// The surrounding loader assigns the bases and the TLS slots; this engine
/// only consumes them. The `irelatives` list accumulates deferred
/// indirect-function resolutions for the loader to execute later.
pub struct LoadedObject {
    name: String,
    arch: Arch,
    mapped_base: u64,
    /// Link-time base, input to address translation.
    linked_base: u64,
    /// Base address the binary declares for static rebasing
    /// (`DT_MIPS_BASE_ADDRESS` analogue).
    static_base: u64,
    tls_block_offset: Option<u64>,
    tls_module_id: Option<u64>,
    irelatives: Vec<(u64, u64)>,
    exports: HashMap<String, SymbolId>,
    memory: MemoryImage,
}

impl LoadedObject {
    pub fn new(name: impl Into<String>, arch: Arch, mapped_base: u64, memory: MemoryImage) -> Self {
        Self {
            name: name.into(),
            arch,
            mapped_base,
            linked_base: 0,
            static_base: 0,
            tls_block_offset: None,
            tls_module_id: None,
            irelatives: Vec::new(),
            exports: HashMap::new(),
            memory,
        }
    }

    pub fn with_linked_base(mut self, linked_base: u64) -> Self {
        self.linked_base = linked_base;
        self
    }

    pub fn with_static_base(mut self, static_base: u64) -> Self {
        self.static_base = static_base;
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn arch(&self) -> &Arch {
        &self.arch
    }

    #[inline]
    pub fn mapped_base(&self) -> u64 {
        self.mapped_base
    }

    #[inline]
    pub fn static_base(&self) -> u64 {
        self.static_base
    }

    #[inline]
    pub fn tls_block_offset(&self) -> Option<u64> {
        self.tls_block_offset
    }

    /// Assigns this object's static TLS block offset. Loader-driven; must
    /// happen before any TLS-variant relocation is applied.
    pub fn set_tls_block_offset(&mut self, offset: u64) {
        self.tls_block_offset = Some(offset);
    }

    #[inline]
    pub fn tls_module_id(&self) -> Option<u64> {
        self.tls_module_id
    }

    /// Assigns this object's TLS module id. Loader-driven.
    pub fn set_tls_module_id(&mut self, id: u64) {
        self.tls_module_id = Some(id);
    }

    /// Translates a link-time virtual address to its mapped address.
    #[inline]
    pub fn to_mapped(&self, link_time_addr: u64) -> u64 {
        link_time_addr
            .wrapping_sub(self.linked_base)
            .wrapping_add(self.mapped_base)
    }

    #[inline]
    pub fn memory(&self) -> &MemoryImage {
        &self.memory
    }

    #[inline]
    pub fn memory_mut(&mut self) -> &mut MemoryImage {
        &mut self.memory
    }

    pub(crate) fn push_irelative(&mut self, resolver: u64, offset: u64) {
        self.irelatives.push((resolver, offset));
    }

    /// Pending (resolver address, target offset) pairs queued by
    /// indirect-function relocations, in application order.
    pub fn irelatives(&self) -> &[(u64, u64)] {
        &self.irelatives
    }

    /// Drains the pending indirect-function list for the external executor.
    pub fn take_irelatives(&mut self) -> Vec<(u64, u64)> {
        core::mem::take(&mut self.irelatives)
    }
}

/// Arena owning every object and symbol of one load pass.
pub struct LoadScope {
    objects: Vec<LoadedObject>,
    symbols: Vec<Symbol>,
}

impl LoadScope {
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            symbols: Vec::new(),
        }
    }

    pub fn add_object(&mut self, object: LoadedObject) -> ObjectId {
        let id = ObjectId(self.objects.len());
        self.objects.push(object);
        id
    }

    /// Registers a symbol; exported symbols become visible to the ordered
    /// candidate lookup through their owner's export table.
    pub fn add_symbol(&mut self, symbol: Symbol, export: bool) -> SymbolId {
        let id = SymbolId(self.symbols.len());
        if export {
            let owner = symbol.owner();
            self.objects[owner.0]
                .exports
                .insert(symbol.name().into(), id);
        }
        self.symbols.push(symbol);
        id
    }

    #[inline]
    pub fn object(&self, id: ObjectId) -> &LoadedObject {
        &self.objects[id.0]
    }

    #[inline]
    pub fn object_mut(&mut self, id: ObjectId) -> &mut LoadedObject {
        &mut self.objects[id.0]
    }

    #[inline]
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    /// Final mapped address of a symbol.
    #[inline]
    pub fn rebased_addr(&self, id: SymbolId) -> u64 {
        let sym = self.symbol(id);
        self.object(sym.owner())
            .mapped_base()
            .wrapping_add(sym.relative_addr())
    }

    /// Scans candidate objects in order and returns the first exported
    /// definition of `name`. This is the shared lookup facility behind the
    /// default resolution rule; absence of a match is legal.
    pub fn lookup(
        &self,
        name: &str,
        candidates: impl IntoIterator<Item = ObjectId>,
    ) -> Option<SymbolId> {
        candidates
            .into_iter()
            .find_map(|id| self.object(id).exports.get(name).copied())
    }
}

impl Default for LoadScope {
    fn default() -> Self {
        Self::new()
    }
}
