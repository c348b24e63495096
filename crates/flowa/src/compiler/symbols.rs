//! Symbol tables for the compiler.
//!
//! Two kinds of storage exist at runtime: 16-bit global slots and 8-bit
//! frame-local slots. The table stack mirrors that split: one outermost
//! global table (seeded with the builtin names at their fixed indices), the
//! implicit top-level local scope, and one local table per function body
//! being compiled.
//!
//! Function declarations are always attached to the outermost global table,
//! which is what makes forward references between functions resolve.

use ahash::AHashMap;

use crate::{
    builtins::Builtin,
    error::CompileError,
    intern::{Interner, StringId},
};

/// Maximum frame-local slots (8-bit operand).
pub const MAX_LOCALS: usize = 256;
/// Maximum global slots (16-bit operand).
pub const MAX_GLOBALS: usize = 65_536;

/// Where a resolved name lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    /// Fixed-index builtin table entry.
    Builtin,
    /// Program-wide global slot.
    Global,
    /// Frame-relative local slot.
    Local,
}

/// A resolved name: its storage kind and slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub scope: SymbolScope,
    pub index: u16,
}

/// Outcome of a name lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Found(Symbol),
    /// The name is a local of an enclosing function. Flowa has no closures,
    /// so this is a compile error at the use site.
    FreeVariable,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    Globals,
    MainLocals,
    FunctionLocals,
}

#[derive(Debug)]
struct Table {
    kind: TableKind,
    store: AHashMap<StringId, Symbol>,
    num_definitions: u16,
}

impl Table {
    fn new(kind: TableKind) -> Self {
        Self {
            kind,
            store: AHashMap::new(),
            num_definitions: 0,
        }
    }
}

/// The compiler's stack of symbol tables.
#[derive(Debug)]
pub struct SymbolTables {
    tables: Vec<Table>,
    /// In REPL mode top-level definitions become globals so they survive
    /// across lines.
    repl: bool,
}

impl SymbolTables {
    /// Creates the table stack with builtins seeded into the global table at
    /// their fixed indices.
    #[must_use]
    pub fn new(interner: &mut Interner, repl: bool) -> Self {
        let mut globals = Table::new(TableKind::Globals);
        for builtin in Builtin::all() {
            let id = interner.intern(builtin.name());
            globals.store.insert(
                id,
                Symbol {
                    scope: SymbolScope::Builtin,
                    index: u16::from(builtin as u8),
                },
            );
        }
        Self {
            tables: vec![globals, Table::new(TableKind::MainLocals)],
            repl,
        }
    }

    /// Defines a name in the innermost scope, returning its symbol. Existing
    /// definitions in that scope are reused (assignment re-binds the slot).
    pub fn define(&mut self, name: StringId) -> Result<Symbol, CompileError> {
        // REPL top-level definitions go straight to globals.
        let table_idx = if self.repl && self.innermost_kind() == TableKind::MainLocals {
            0
        } else {
            self.tables.len() - 1
        };
        self.define_in(table_idx, name)
    }

    /// Defines a name in the outermost global table. Used for function,
    /// type, and module-block declarations; idempotent for hoisting.
    pub fn define_global(&mut self, name: StringId) -> Result<Symbol, CompileError> {
        self.define_in(0, name)
    }

    fn define_in(&mut self, table_idx: usize, name: StringId) -> Result<Symbol, CompileError> {
        let is_global = table_idx == 0;
        let table = &mut self.tables[table_idx];
        if let Some(existing) = table.store.get(&name) {
            // Builtin names can be shadowed by a real global definition.
            if existing.scope != SymbolScope::Builtin {
                return Ok(*existing);
            }
        }
        let index = usize::from(table.num_definitions);
        if is_global {
            if index >= MAX_GLOBALS {
                return Err(CompileError::new("too many globals (max 65536)"));
            }
        } else if index >= MAX_LOCALS {
            return Err(CompileError::new("too many locals in one frame (max 256)"));
        }
        let symbol = Symbol {
            scope: if is_global { SymbolScope::Global } else { SymbolScope::Local },
            index: table.num_definitions,
        };
        table.store.insert(name, symbol);
        table.num_definitions += 1;
        Ok(symbol)
    }

    /// Resolves a name, searching innermost-out. Locals of enclosing
    /// functions report as free variables instead of resolving.
    #[must_use]
    pub fn resolve(&self, name: StringId) -> Resolution {
        let mut crossed_function = false;
        for table in self.tables.iter().rev() {
            if let Some(symbol) = table.store.get(&name) {
                if symbol.scope == SymbolScope::Local && crossed_function {
                    return Resolution::FreeVariable;
                }
                return Resolution::Found(*symbol);
            }
            if table.kind == TableKind::FunctionLocals {
                crossed_function = true;
            }
        }
        Resolution::Undefined
    }

    /// Enters a function body scope.
    pub fn enter_function(&mut self) {
        self.tables.push(Table::new(TableKind::FunctionLocals));
    }

    /// Leaves a function body scope, returning its local-slot count.
    pub fn leave_function(&mut self) -> u16 {
        let table = self.tables.pop().expect("leave_function without enter_function");
        debug_assert_eq!(table.kind, TableKind::FunctionLocals);
        table.num_definitions
    }

    /// Local slots used by the implicit top-level scope.
    #[must_use]
    pub fn num_main_locals(&self) -> u16 {
        self.tables[1].num_definitions
    }

    /// All non-builtin global bindings, for module export collection.
    #[must_use]
    pub fn global_bindings(&self) -> Vec<(StringId, u16)> {
        self.tables[0]
            .store
            .iter()
            .filter(|(_, sym)| sym.scope == SymbolScope::Global)
            .map(|(name, sym)| (*name, sym.index))
            .collect()
    }

    fn innermost_kind(&self) -> TableKind {
        self.tables.last().expect("table stack is never empty").kind
    }

    /// True while compiling inside a function body.
    #[must_use]
    pub fn in_function(&self) -> bool {
        self.innermost_kind() == TableKind::FunctionLocals
    }
}
