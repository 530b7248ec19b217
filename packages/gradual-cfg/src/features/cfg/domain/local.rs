//! Local variable model
//!
//! A method body owns a table of storage slots. Source locals get one slot
//! per resolved `(name, unique)` pair; the builder adds one slot per synthetic
//! temporary. Each write produces a new version of a slot, so reads always
//! name exactly one definition.

use crate::features::ast::LocalRef;
use crate::shared::models::NameRef;
use crate::shared::ports::SymbolTable;
use ahash::AHashMap;
use std::fmt;

/// Storage slot within one method body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalSlot(pub u32);

/// One version of a slot
///
/// Equality is `(slot, version)`. Version 0 of the receiver slot is bound by
/// the method frame itself; every other version is defined by exactly one
/// instruction or block argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalVariable {
    pub slot: LocalSlot,
    pub version: u32,
}

impl LocalVariable {
    pub fn new(slot: LocalSlot, version: u32) -> Self {
        Self { slot, version }
    }

    /// The method receiver, implicitly bound on entry
    pub fn receiver() -> Self {
        Self::new(LocalSlot::RECEIVER, 0)
    }

    pub fn is_receiver(&self) -> bool {
        *self == Self::receiver()
    }
}

impl LocalSlot {
    pub const RECEIVER: LocalSlot = LocalSlot(0);
}

impl fmt::Display for LocalVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}@{}", self.slot.0, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotOrigin {
    /// The method receiver
    Receiver,
    /// Declared in source (parameters, assigned locals)
    Source,
    /// Introduced by the builder
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub name: NameRef,
    pub unique: u32,
    pub origin: SlotOrigin,
}

impl SlotInfo {
    pub fn is_synthetic(&self) -> bool {
        self.origin == SlotOrigin::Synthetic
    }
}

/// Slot table of one method body
#[derive(Debug, Clone)]
pub struct LocalTable {
    slots: Vec<SlotInfo>,
    by_source: AHashMap<LocalRef, LocalSlot>,
    temporaries: u32,
}

impl LocalTable {
    pub fn new(receiver_name: NameRef) -> Self {
        Self {
            slots: vec![SlotInfo {
                name: receiver_name,
                unique: 0,
                origin: SlotOrigin::Receiver,
            }],
            by_source: AHashMap::new(),
            temporaries: 0,
        }
    }

    /// Slot of a source local, created on first use
    pub fn source_slot(&mut self, local: LocalRef) -> LocalSlot {
        if let Some(&slot) = self.by_source.get(&local) {
            return slot;
        }
        let slot = self.push(SlotInfo {
            name: local.name,
            unique: local.unique,
            origin: SlotOrigin::Source,
        });
        self.by_source.insert(local, slot);
        slot
    }

    pub fn lookup_source(&self, local: LocalRef) -> Option<LocalSlot> {
        self.by_source.get(&local).copied()
    }

    /// Fresh synthetic slot; the counter is scoped to this table
    pub fn fresh_temporary(&mut self, name: NameRef) -> LocalSlot {
        self.temporaries += 1;
        self.push(SlotInfo {
            name,
            unique: self.temporaries,
            origin: SlotOrigin::Synthetic,
        })
    }

    /// Synthetic slot that exists once per method (`<result>`, `<return>`);
    /// rendered without a counter suffix
    pub fn reserved_temporary(&mut self, name: NameRef) -> LocalSlot {
        self.push(SlotInfo {
            name,
            unique: 0,
            origin: SlotOrigin::Synthetic,
        })
    }

    fn push(&mut self, info: SlotInfo) -> LocalSlot {
        let slot = LocalSlot(self.slots.len() as u32);
        self.slots.push(info);
        slot
    }

    pub fn info(&self, slot: LocalSlot) -> &SlotInfo {
        &self.slots[slot.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_synthetic(&self, var: LocalVariable) -> bool {
        self.info(var.slot).is_synthetic()
    }

    /// Name shown in diagnostics; identical for every version of a slot
    pub fn display_name(&self, var: LocalVariable, table: &dyn SymbolTable) -> String {
        let info = self.info(var.slot);
        let name = table.name_text(info.name);
        if info.unique == 0 {
            name
        } else {
            format!("{}${}", name, info.unique)
        }
    }

    /// Name used in graph dumps, version included
    pub fn debug_name(&self, var: LocalVariable, table: &dyn SymbolTable) -> String {
        format!("{}@{}", self.display_name(var, table), var.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ports::InMemorySymbolTable;

    #[test]
    fn test_source_slots_are_stable() {
        let table = InMemorySymbolTable::new();
        let mut locals = LocalTable::new(table.enter_name("<self>"));
        let x = LocalRef::new(table.enter_name("x"));

        let first = locals.source_slot(x);
        let second = locals.source_slot(x);
        assert_eq!(first, second);
        assert_ne!(first, LocalSlot::RECEIVER);
        assert_eq!(locals.lookup_source(x), Some(first));
    }

    #[test]
    fn test_shadowed_local_gets_own_slot() {
        let table = InMemorySymbolTable::new();
        let mut locals = LocalTable::new(table.enter_name("<self>"));
        let name = table.enter_name("x");

        let outer = locals.source_slot(LocalRef { name, unique: 0 });
        let inner = locals.source_slot(LocalRef { name, unique: 1 });
        assert_ne!(outer, inner);
        assert_eq!(locals.display_name(LocalVariable::new(inner, 1), &table), "x$1");
    }

    #[test]
    fn test_versions_share_display_name() {
        let table = InMemorySymbolTable::new();
        let mut locals = LocalTable::new(table.enter_name("<self>"));
        let slot = locals.source_slot(LocalRef::new(table.enter_name("count")));

        let v1 = LocalVariable::new(slot, 1);
        let v2 = LocalVariable::new(slot, 2);
        assert_ne!(v1, v2);
        assert_eq!(locals.display_name(v1, &table), locals.display_name(v2, &table));
        assert_eq!(locals.debug_name(v2, &table), "count@2");
    }

    #[test]
    fn test_temporaries_are_synthetic_and_numbered() {
        let table = InMemorySymbolTable::new();
        let mut locals = LocalTable::new(table.enter_name("<self>"));
        let name = table.enter_name("<argTemp>");

        let a = locals.fresh_temporary(name);
        let b = locals.fresh_temporary(name);
        assert_ne!(a, b);
        assert!(locals.is_synthetic(LocalVariable::new(a, 1)));
        assert_eq!(locals.display_name(LocalVariable::new(b, 1), &table), "<argTemp>$2");

        let result = locals.reserved_temporary(table.enter_name("<result>"));
        assert!(locals.is_synthetic(LocalVariable::new(result, 1)));
        assert_eq!(locals.debug_name(LocalVariable::new(result, 1), &table), "<result>@1");
    }
}
