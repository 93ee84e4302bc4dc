//! Quote/unquote: the escape-depth transform on cells.
//!
//! Up to three levels ride along in the kind byte with no allocation.
//! Deeper escapes overflow into a two-cell pairing holding the wrapped cell
//! and the full depth; the visible cell becomes a generic `Quoted` pointing
//! at it.  The inline-favored policy is an optimization, not a correctness
//! requirement: only the observable depth matters.

use rill_core::{Cell, Kind, MAX_INLINE_QUOTE, PairId, series_flags as sf};

use crate::core::heap::{Stub, StubData};
use crate::errors::Raise;
use crate::runtime::Runtime;

impl Runtime {
    /// Add `depth` levels of quoting.
    pub fn quotify(&mut self, cell: Cell, depth: u32) -> Result<Cell, Raise> {
        if depth == 0 {
            return Ok(cell);
        }
        cell.assert_live();

        if cell.heart() == Kind::Quoted {
            // Already overflowed: bump the stored depth in place rather
            // than nesting another pairing.
            let pair = cell.as_pair();
            let cells = self.heap.get_mut(pair.stub()).cells_mut();
            let stored = cells[1].as_integer();
            cells[1] = Cell::integer(stored + depth as i64);
            return Ok(cell);
        }

        let inline = cell.inline_quote_depth() as u32;
        let total = inline + depth;
        if total <= MAX_INLINE_QUOTE as u32 {
            let mut quoted = cell;
            quoted.set_inline_quote_depth(total as u8);
            return Ok(quoted);
        }

        let mut wrapped = cell;
        wrapped.set_inline_quote_depth(0);
        let pair = self.pair_alloc([wrapped, Cell::integer(total as i64)])?;
        Ok(Cell::quoted(pair))
    }

    /// Remove `depth` levels of quoting.  Unquoting below zero is a defect
    /// in the caller.  The result never shares mutable depth state with the
    /// input: a pairing may be aliased by other copies of the cell, so the
    /// reduced depth goes into the cell itself or a fresh pairing, leaving
    /// the old one untouched.
    pub fn unquotify(&mut self, cell: Cell, depth: u32) -> Result<Cell, Raise> {
        if depth == 0 {
            return Ok(cell);
        }
        cell.assert_live();

        if cell.heart() != Kind::Quoted {
            let inline = cell.inline_quote_depth() as u32;
            assert!(depth <= inline, "unquote below depth 0 ({inline} < {depth})");
            let mut plain = cell;
            plain.set_inline_quote_depth((inline - depth) as u8);
            return Ok(plain);
        }

        let pair = cell.as_pair();
        let cells = self.heap.get(pair.stub()).cells();
        let stored = cells[1].as_integer();
        let wrapped = cells[0];
        assert!(
            depth as i64 <= stored,
            "unquote below depth 0 ({stored} < {depth})"
        );
        let remaining = stored - depth as i64;
        if remaining <= MAX_INLINE_QUOTE as i64 {
            // Collapses back into the cell; the pairing is left for the GC.
            let mut plain = wrapped;
            plain.set_inline_quote_depth(remaining as u8);
            Ok(plain)
        } else {
            let fresh = self.pair_alloc([wrapped, Cell::integer(remaining)])?;
            Ok(Cell::quoted(fresh))
        }
    }

    /// Total escape depth, wherever it is stored.
    pub fn quote_depth(&self, cell: &Cell) -> u32 {
        if cell.heart() == Kind::Quoted {
            let pair = cell.as_pair();
            self.heap.get(pair.stub()).cells()[1].as_integer() as u32
        } else {
            cell.inline_quote_depth() as u32
        }
    }

    pub(crate) fn pair_alloc(&mut self, cells: [Cell; 2]) -> Result<PairId, Raise> {
        self.check_memory(2 * std::mem::size_of::<Cell>())?;
        let stub = Stub {
            flags: sf::MANAGED | sf::IS_ARRAY,
            width: std::mem::size_of::<Cell>() as u8,
            used: 2,
            cap: 2,
            link: None,
            data: StubData::Pair(Box::new(cells)),
        };
        Ok(PairId(self.heap.alloc(stub)))
    }
}
