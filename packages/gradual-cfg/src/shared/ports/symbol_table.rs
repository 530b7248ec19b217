//! Symbol table port
//!
//! Name resolution and the global symbol table live outside this crate. The
//! builder only needs to render names for debugging and to intern the names
//! of the temporaries it synthesizes.

use crate::shared::models::{NameRef, SymbolRef, TypeRef};
use ahash::AHashMap;
use parking_lot::RwLock;

/// Read access to the global symbol table, plus interning of synthetic names
///
/// Implementations must tolerate concurrent use: several methods may be
/// lowered in parallel against the same table.
pub trait SymbolTable: Send + Sync {
    /// Text of an interned name
    fn name_text(&self, name: NameRef) -> String;

    /// Fully qualified display name of a symbol
    fn symbol_name(&self, symbol: SymbolRef) -> String;

    /// Display form of a lattice type
    fn type_name(&self, ty: TypeRef) -> String;

    /// Receiver for compiler-generated intrinsic calls (`<build-array>`, `<reraise>`, ...)
    fn magic_symbol(&self) -> SymbolRef;

    /// Intern `text`, returning the existing handle when already present
    fn enter_name(&self, text: &str) -> NameRef;

    /// Look up an interned name without entering it
    fn lookup_name(&self, text: &str) -> Option<NameRef>;
}

#[derive(Debug, Default)]
struct Interner {
    entries: Vec<String>,
    index: AHashMap<String, u32>,
}

impl Interner {
    fn enter(&mut self, text: &str) -> u32 {
        if let Some(&id) = self.index.get(text) {
            return id;
        }
        let id = self.entries.len() as u32;
        self.entries.push(text.to_string());
        self.index.insert(text.to_string(), id);
        id
    }

    fn lookup(&self, text: &str) -> Option<u32> {
        self.index.get(text).copied()
    }

    fn text(&self, id: u32) -> Option<&str> {
        self.entries.get(id as usize).map(String::as_str)
    }
}

/// Thread-safe in-memory symbol table
///
/// Reads take a shared lock; interning takes the write lock, which serializes
/// concurrent builders entering the same synthetic names.
#[derive(Debug)]
pub struct InMemorySymbolTable {
    names: RwLock<Interner>,
    symbols: RwLock<Interner>,
    types: RwLock<Interner>,
    magic: SymbolRef,
}

impl InMemorySymbolTable {
    pub fn new() -> Self {
        let mut symbols = Interner::default();
        let magic = SymbolRef(symbols.enter("<Magic>"));
        Self {
            names: RwLock::new(Interner::default()),
            symbols: RwLock::new(symbols),
            types: RwLock::new(Interner::default()),
            magic,
        }
    }

    /// Enter a resolved symbol by its fully qualified name
    pub fn enter_symbol(&self, full_name: &str) -> SymbolRef {
        SymbolRef(self.symbols.write().enter(full_name))
    }

    /// Enter a lattice type by its display form
    pub fn enter_type(&self, display: &str) -> TypeRef {
        TypeRef(self.types.write().enter(display))
    }

    pub fn name_count(&self) -> usize {
        self.names.read().entries.len()
    }
}

impl Default for InMemorySymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable for InMemorySymbolTable {
    fn name_text(&self, name: NameRef) -> String {
        self.names
            .read()
            .text(name.0)
            .map(str::to_string)
            .unwrap_or_else(|| format!("<unknown name {}>", name.0))
    }

    fn symbol_name(&self, symbol: SymbolRef) -> String {
        self.symbols
            .read()
            .text(symbol.0)
            .map(str::to_string)
            .unwrap_or_else(|| format!("<unknown symbol {}>", symbol.0))
    }

    fn type_name(&self, ty: TypeRef) -> String {
        self.types
            .read()
            .text(ty.0)
            .map(str::to_string)
            .unwrap_or_else(|| format!("<unknown type {}>", ty.0))
    }

    fn magic_symbol(&self) -> SymbolRef {
        self.magic
    }

    fn enter_name(&self, text: &str) -> NameRef {
        if let Some(id) = self.names.read().lookup(text) {
            return NameRef(id);
        }
        NameRef(self.names.write().enter(text))
    }

    fn lookup_name(&self, text: &str) -> Option<NameRef> {
        self.names.read().lookup(text).map(NameRef)
    }
}
