//! Handles into the runtime's stub table.
//!
//! Everything heap-allocated (series, arrays, contexts, actions, pairings)
//! lives behind a `StubId` index; typed wrappers keep the different roles
//! from being mixed up at API boundaries.

/// Handle to a stub in the runtime's stub table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StubId(pub usize);

/// A stub whose storage is an array of cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayId(pub StubId);

/// A context, identified by its varlist stub.  The keylist hangs off the
/// varlist's link field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub StubId);

/// An action, identified by the stub holding its dispatch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(pub StubId);

/// A two-cell pairing, used for quote-depth overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairId(pub StubId);

impl ArrayId {
    pub fn stub(self) -> StubId {
        self.0
    }
}

impl ContextId {
    pub fn varlist(self) -> ArrayId {
        ArrayId(self.0)
    }
}

impl ActionId {
    pub fn stub(self) -> StubId {
        self.0
    }
}

impl PairId {
    pub fn stub(self) -> StubId {
        self.0
    }
}

/// Interned word spelling.  Two words with the same spelling always carry
/// the same symbol, so name comparison is an integer compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);
