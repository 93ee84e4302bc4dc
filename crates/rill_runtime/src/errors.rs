//! Recoverable error conditions raised by the core.
//!
//! `Raise` covers the conditions a caller is allowed to trap and recover
//! from.  Integrity violations (wrong-kind reads, double-manage, unbalanced
//! guard or frame drops) are not represented here; those panic at the point
//! of the defect, since continuing would corrupt the value graph the GC
//! depends on.

use std::fmt;

use rill_core::{Kind, SymbolId, TypeSet};

/// Why a series write was refused.  Each cause is reported distinctly so a
/// caller can explain it to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOnlyCause {
    /// Permanently immutable.
    Frozen,
    /// Locked while the evaluator is walking it.
    Held,
    /// Explicitly protected; may be unprotected later.
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Raise {
    /// Allocation refused at the pool level (memory limit reached).
    OutOfMemory { requested: usize },
    ReadOnly(ReadOnlyCause),
    /// Storage was reclaimed or stolen while this reference was live.
    Inaccessible,
    /// Capacity change on a fixed-size series.
    FixedSize,
    /// Source feed ran out while a mandatory parameter was unfulfilled.
    ArityMismatch { param: SymbolId },
    /// Argument or return value outside the declared constraint.
    TypeMismatch { param: Option<SymbolId>, expected: TypeSet, found: Kind },
    /// Word has no binding, or its binding cannot be resolved here.
    Unbound(SymbolId),
    /// Variable exists but holds null where a value is required.
    NotAValue(SymbolId),
}

impl fmt::Display for Raise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Raise::OutOfMemory { requested } => {
                write!(f, "out of memory (requested {requested} bytes)")
            }
            Raise::ReadOnly(cause) => match cause {
                ReadOnlyCause::Frozen => write!(f, "series is frozen"),
                ReadOnlyCause::Held => write!(f, "series is held by the evaluator"),
                ReadOnlyCause::Protected => write!(f, "series is protected"),
            },
            Raise::Inaccessible => write!(f, "series data is no longer accessible"),
            Raise::FixedSize => write!(f, "series is fixed-size"),
            Raise::ArityMismatch { param } => {
                write!(f, "missing argument for parameter #{}", param.0)
            }
            Raise::TypeMismatch { param, found, .. } => match param {
                Some(p) => write!(f, "parameter #{} does not accept {found:?}", p.0),
                None => write!(f, "return value {found:?} outside declared constraint"),
            },
            Raise::Unbound(sym) => write!(f, "word #{} is not bound", sym.0),
            Raise::NotAValue(sym) => write!(f, "word #{} has no value", sym.0),
        }
    }
}

impl std::error::Error for Raise {}
