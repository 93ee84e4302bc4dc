//! The cell: fixed-size tagged value record.
//!
//! A cell is a header (kind byte + lifetime flags), a binding slot, and a
//! payload whose layout is fixed per kind.  Cells are `Copy`; equality is
//! structural, which is what "bit-for-bit equal" means at this level.
//!
//! Typed accessors panic on a kind mismatch or on a freed cell.  Those are
//! integrity violations in the calling component, not recoverable errors.

use crate::bind::Binding;
use crate::flags::ParamSpec;
use crate::id::{ActionId, ArrayId, ContextId, PairId, StubId, SymbolId};
use crate::kind::{Kind, MAX_INLINE_QUOTE, MAX_KIND};

/// Lifetime flags in the cell header.  `reset` preserves these while
/// overwriting everything else.
pub mod cell_flags {
    /// Cell may not be written through (var slot protection).
    pub const PROTECTED: u8 = 1 << 0;
    /// Cell's contents were invalidated; any typed read is a defect.
    pub const FREED: u8 = 1 << 1;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellHeader {
    /// `kind + 64 * inline_quote_depth`.
    pub byte: u8,
    pub flags: u8,
}

/// Fixed payload layouts, one per kind.  The kind byte is authoritative;
/// the variant must agree with it (checked on construction).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    /// End, Nulled, Blank.
    None,
    Logic(bool),
    Integer(i64),
    Decimal(f64),
    /// Word, SetWord, GetWord.
    Word(SymbolId),
    /// Block, Group: a cell array plus a position into it.
    Array { array: ArrayId, index: u32 },
    /// Text: a byte series plus a position.
    Series { stub: StubId, index: u32 },
    Context(ContextId),
    Action(ActionId),
    Key(ParamSpec),
    /// Quoted: overflow pairing holding the wrapped cell and its depth.
    Pair(PairId),
}

impl Payload {
    fn matches(&self, kind: Kind) -> bool {
        match kind {
            Kind::End | Kind::Nulled | Kind::Blank => matches!(self, Payload::None),
            Kind::Logic => matches!(self, Payload::Logic(_)),
            Kind::Integer => matches!(self, Payload::Integer(_)),
            Kind::Decimal => matches!(self, Payload::Decimal(_)),
            Kind::Word | Kind::SetWord | Kind::GetWord => matches!(self, Payload::Word(_)),
            Kind::Block | Kind::Group => matches!(self, Payload::Array { .. }),
            Kind::Text => matches!(self, Payload::Series { .. }),
            Kind::Object => matches!(self, Payload::Context(_)),
            Kind::Action => matches!(self, Payload::Action(_)),
            Kind::Key => matches!(self, Payload::Key(_)),
            Kind::Quoted => matches!(self, Payload::Pair(_)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub header: CellHeader,
    pub binding: Binding,
    pub payload: Payload,
}

impl Cell {
    /// The canonical end-of-sequence marker.  Its kind byte is 0, so raw
    /// scans can stop on a single byte test.
    pub const END: Cell = Cell {
        header: CellHeader { byte: Kind::End as u8, flags: 0 },
        binding: Binding::Unbound,
        payload: Payload::None,
    };

    pub fn new(kind: Kind, payload: Payload) -> Cell {
        debug_assert!(payload.matches(kind), "payload does not fit kind {kind:?}");
        Cell {
            header: CellHeader { byte: kind as u8, flags: 0 },
            binding: Binding::Unbound,
            payload,
        }
    }

    /// Overwrite kind, payload, and binding, preserving lifetime flags.
    /// Panics if the cell is not writable.
    pub fn reset(&mut self, kind: Kind, payload: Payload) {
        self.assert_writable();
        debug_assert!(payload.matches(kind), "payload does not fit kind {kind:?}");
        self.header.byte = kind as u8;
        self.binding = Binding::Unbound;
        self.payload = payload;
    }

    /// Invalidate the cell.  Reads after this panic, catching use of stale
    /// references to recycled storage.
    pub fn free(&mut self) {
        self.header.flags |= cell_flags::FREED;
    }

    pub fn protect(&mut self) {
        self.header.flags |= cell_flags::PROTECTED;
    }

    pub fn unprotect(&mut self) {
        self.header.flags &= !cell_flags::PROTECTED;
    }

    pub fn is_protected(&self) -> bool {
        self.header.flags & cell_flags::PROTECTED != 0
    }

    pub fn is_freed(&self) -> bool {
        self.header.flags & cell_flags::FREED != 0
    }

    pub fn assert_live(&self) {
        assert!(!self.is_freed(), "read of freed cell");
    }

    pub fn assert_writable(&self) {
        self.assert_live();
        assert!(!self.is_protected(), "write to protected cell");
    }

    // -- kind byte ---------------------------------------------------------

    /// Apparent kind: any inline-quoted value reads as `Quoted`.
    pub fn kind(&self) -> Kind {
        self.assert_live();
        if self.header.byte >= MAX_KIND {
            Kind::Quoted
        } else {
            Kind::from_byte(self.header.byte)
        }
    }

    /// Underlying kind with inline quoting stripped.  An overflow-quoted
    /// cell still reads as `Quoted`; its real kind lives in the pairing.
    pub fn heart(&self) -> Kind {
        self.assert_live();
        Kind::from_byte(self.header.byte % MAX_KIND)
    }

    /// Quote depth encoded in the kind byte (0..=3).  Overflow depth lives
    /// in the pairing and is not visible here.
    pub fn inline_quote_depth(&self) -> u8 {
        self.header.byte / MAX_KIND
    }

    /// Bump the inline quote depth.  Caller must have checked the result
    /// stays within [`MAX_INLINE_QUOTE`].
    pub fn set_inline_quote_depth(&mut self, depth: u8) {
        debug_assert!(depth <= MAX_INLINE_QUOTE);
        self.header.byte = self.header.byte % MAX_KIND + depth * MAX_KIND;
    }

    pub fn is_end(&self) -> bool {
        self.header.byte == 0
    }

    // -- typed constructors ------------------------------------------------

    pub fn nulled() -> Cell {
        Cell::new(Kind::Nulled, Payload::None)
    }

    pub fn blank() -> Cell {
        Cell::new(Kind::Blank, Payload::None)
    }

    pub fn logic(value: bool) -> Cell {
        Cell::new(Kind::Logic, Payload::Logic(value))
    }

    pub fn integer(value: i64) -> Cell {
        Cell::new(Kind::Integer, Payload::Integer(value))
    }

    pub fn decimal(value: f64) -> Cell {
        Cell::new(Kind::Decimal, Payload::Decimal(value))
    }

    pub fn word(symbol: SymbolId) -> Cell {
        Cell::new(Kind::Word, Payload::Word(symbol))
    }

    pub fn set_word(symbol: SymbolId) -> Cell {
        Cell::new(Kind::SetWord, Payload::Word(symbol))
    }

    pub fn get_word(symbol: SymbolId) -> Cell {
        Cell::new(Kind::GetWord, Payload::Word(symbol))
    }

    pub fn block(array: ArrayId) -> Cell {
        Cell::new(Kind::Block, Payload::Array { array, index: 0 })
    }

    pub fn group(array: ArrayId) -> Cell {
        Cell::new(Kind::Group, Payload::Array { array, index: 0 })
    }

    pub fn text(stub: StubId) -> Cell {
        Cell::new(Kind::Text, Payload::Series { stub, index: 0 })
    }

    pub fn object(context: ContextId) -> Cell {
        Cell::new(Kind::Object, Payload::Context(context))
    }

    pub fn action(action: ActionId) -> Cell {
        Cell::new(Kind::Action, Payload::Action(action))
    }

    pub fn key(spec: ParamSpec) -> Cell {
        Cell::new(Kind::Key, Payload::Key(spec))
    }

    pub fn quoted(pair: PairId) -> Cell {
        Cell::new(Kind::Quoted, Payload::Pair(pair))
    }

    // -- typed accessors ---------------------------------------------------

    fn expect(&self, kind: Kind) {
        assert!(
            self.kind() == kind,
            "cell kind mismatch: expected {kind:?}, found {:?}",
            self.kind()
        );
    }

    pub fn as_logic(&self) -> bool {
        self.expect(Kind::Logic);
        match self.payload {
            Payload::Logic(b) => b,
            _ => unreachable!(),
        }
    }

    pub fn as_integer(&self) -> i64 {
        self.expect(Kind::Integer);
        match self.payload {
            Payload::Integer(i) => i,
            _ => unreachable!(),
        }
    }

    pub fn as_decimal(&self) -> f64 {
        self.expect(Kind::Decimal);
        match self.payload {
            Payload::Decimal(d) => d,
            _ => unreachable!(),
        }
    }

    /// Spelling of any word flavor.
    pub fn as_word(&self) -> SymbolId {
        assert!(self.kind().is_word_kind(), "cell is not a word: {:?}", self.kind());
        match self.payload {
            Payload::Word(s) => s,
            _ => unreachable!(),
        }
    }

    /// Backing array of any array flavor, with its position.
    pub fn as_array(&self) -> (ArrayId, u32) {
        assert!(self.kind().is_array_kind(), "cell is not an array: {:?}", self.kind());
        match self.payload {
            Payload::Array { array, index } => (array, index),
            _ => unreachable!(),
        }
    }

    pub fn as_context(&self) -> ContextId {
        self.expect(Kind::Object);
        match self.payload {
            Payload::Context(c) => c,
            _ => unreachable!(),
        }
    }

    pub fn as_action(&self) -> ActionId {
        self.expect(Kind::Action);
        match self.payload {
            Payload::Action(a) => a,
            _ => unreachable!(),
        }
    }

    pub fn as_key(&self) -> ParamSpec {
        self.expect(Kind::Key);
        match self.payload {
            Payload::Key(k) => k,
            _ => unreachable!(),
        }
    }

    pub fn as_pair(&self) -> PairId {
        assert!(
            self.heart() == Kind::Quoted,
            "cell is not overflow-quoted: {:?}",
            self.heart()
        );
        match self.payload {
            Payload::Pair(p) => p,
            _ => unreachable!(),
        }
    }

    /// Truthiness for evaluator conditionals: null, blank, and false are
    /// falsey, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self.kind() {
            Kind::Nulled | Kind::Blank => false,
            Kind::Logic => self.as_logic(),
            _ => true,
        }
    }
}
