//! Series flags, parameter classes, and cached action properties.

use crate::id::SymbolId;
use crate::kind::TypeSet;

/// Bit flags carried in a series stub header.
pub mod series {
    /// Lifetime is owned by the garbage collector rather than the manuals
    /// list.  Set exactly once, by `series_manage`.
    pub const MANAGED: u16 = 1 << 0;
    /// Permanently immutable (deep freeze).
    pub const FROZEN: u16 = 1 << 1;
    /// Explicitly protected by the user; reversible.
    pub const PROTECTED: u16 = 1 << 2;
    /// Temporarily locked while the evaluator is walking it.
    pub const HELD: u16 = 1 << 3;
    /// Capacity may not change.
    pub const FIXED_SIZE: u16 = 1 << 4;
    /// Backing storage was reclaimed or stolen while references remained.
    pub const INACCESSIBLE: u16 = 1 << 5;
    /// Elements are cells.
    pub const IS_ARRAY: u16 = 1 << 6;
    /// Byte storage holds UTF-8 text.
    pub const IS_STRING: u16 = 1 << 7;
    /// Keylist is referenced by more than one context; mutation must fork.
    pub const KEYLIST_SHARED: u16 = 1 << 8;

    /// Flags a caller may pass to `series_alloc`.
    pub const ALLOC_MASK: u16 = FIXED_SIZE | IS_STRING;
}

/// How a declared parameter acquires its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ParamClass {
    /// Pure local; never fulfilled from the feed, starts out null.
    Local = 0,
    /// Ordinary parameter: one full evaluation from the feed.
    Normal = 1,
    /// Taken literally, no evaluation at all.
    HardQuote = 2,
    /// Gates the parameters after it; off unless specialized on.
    Refinement = 3,
    /// Taken literally, except groups and get-words still evaluate.
    SoftQuote = 4,
    /// Local carrying the declared return type constraint.
    Return = 5,
    /// Left unfulfilled by the gather; the dispatcher consumes the feed
    /// itself, one step at a time.
    Variadic = 6,
}

impl ParamClass {
    /// Classes that consume an expression from the source feed.
    pub fn fulfills_from_feed(self) -> bool {
        matches!(
            self,
            ParamClass::Normal | ParamClass::HardQuote | ParamClass::SoftQuote
        )
    }
}

/// One entry of the parameter spec handed to action creation; compiled into
/// a Key cell in the paramlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: SymbolId,
    pub class: ParamClass,
    pub constraint: TypeSet,
    /// Quoted parameters may decline a next value outside their constraint
    /// instead of erroring.
    pub skippable: bool,
}

impl ParamSpec {
    pub fn normal(name: SymbolId, constraint: TypeSet) -> ParamSpec {
        ParamSpec { name, class: ParamClass::Normal, constraint, skippable: false }
    }

    pub fn hard_quote(name: SymbolId, constraint: TypeSet) -> ParamSpec {
        ParamSpec { name, class: ParamClass::HardQuote, constraint, skippable: false }
    }

    pub fn soft_quote(name: SymbolId, constraint: TypeSet) -> ParamSpec {
        ParamSpec { name, class: ParamClass::SoftQuote, constraint, skippable: false }
    }

    pub fn refinement(name: SymbolId) -> ParamSpec {
        ParamSpec {
            name,
            class: ParamClass::Refinement,
            constraint: TypeSet::NONE,
            skippable: false,
        }
    }

    pub fn local(name: SymbolId) -> ParamSpec {
        ParamSpec { name, class: ParamClass::Local, constraint: TypeSet::NONE, skippable: false }
    }

    pub fn variadic(name: SymbolId, constraint: TypeSet) -> ParamSpec {
        ParamSpec { name, class: ParamClass::Variadic, constraint, skippable: false }
    }

    pub fn returns(name: SymbolId, constraint: TypeSet) -> ParamSpec {
        ParamSpec { name, class: ParamClass::Return, constraint, skippable: false }
    }

    pub fn skip(mut self) -> ParamSpec {
        debug_assert!(matches!(
            self.class,
            ParamClass::HardQuote | ParamClass::SoftQuote
        ));
        self.skippable = true;
        self
    }
}

/// Properties computed once from a compiled paramlist, so dispatch does not
/// rescan the spec on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionFlags {
    /// Declares a return constraint that must be checked after dispatch.
    pub checks_return: bool,
}
