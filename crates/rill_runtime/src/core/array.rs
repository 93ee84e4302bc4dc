//! Arrays: series whose elements are cells.
//!
//! Every array keeps a true end-marker cell one slot past `used`, so legacy
//! scans over raw cell memory can stop on the single reserved kind byte
//! instead of trusting a length field.

use hashbrown::HashMap;

use rill_core::{ArrayId, Cell, Kind, Payload, StubId, TypeSet, series_flags as sf};

use crate::core::heap::{Stub, StubData};
use crate::core::series::pool_bytes;
use crate::errors::Raise;
use crate::runtime::Runtime;

const CELL_WIDTH: usize = std::mem::size_of::<Cell>();

/// How much of an array's structure a copy duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Copy the cells; nested arrays stay shared with the original.
    Shallow,
    /// Recurse into nested arrays whose kind is in `types`.
    Deep { types: TypeSet },
    /// Shallow copy with room for that many more elements before expansion.
    Extra(usize),
}

impl Runtime {
    /// Allocate an unmanaged cell array.  One slot beyond `cap` is always
    /// reserved for the end marker.
    pub fn array_alloc(&mut self, cap: usize, flags: u16) -> Result<ArrayId, Raise> {
        assert!(flags & !sf::FIXED_SIZE == 0, "bad array_alloc flags: {flags:#x}");
        let cells = pool_bytes((cap.max(1) + 1) * CELL_WIDTH) / CELL_WIDTH;
        self.check_memory(cells * CELL_WIDTH)?;
        let mut data = Vec::with_capacity(cells);
        data.push(Cell::END);
        let stub = Stub {
            flags: flags | sf::IS_ARRAY,
            width: CELL_WIDTH as u8,
            used: 0,
            cap: cells - 1,
            link: None,
            data: StubData::Cells(data),
        };
        Ok(ArrayId(self.heap.alloc(stub)))
    }

    /// Allocate an array already under GC management (for interior
    /// structure that is reachable from its creator).
    pub(crate) fn array_alloc_gc(&mut self, cap: usize) -> Result<ArrayId, Raise> {
        let arr = self.array_alloc(cap, 0)?;
        self.heap.manage(arr.stub());
        Ok(arr)
    }

    pub fn array_len(&self, arr: ArrayId) -> usize {
        self.heap.get(arr.stub()).used
    }

    pub fn array_push(&mut self, arr: ArrayId, cell: Cell) -> Result<(), Raise> {
        self.ensure_writable(arr.stub())?;
        cell.assert_live();
        let stub = self.heap.get(arr.stub());
        if stub.used == stub.cap {
            let grow = stub.cap.max(1);
            self.series_expand(arr.stub(), grow)?;
        }
        let stub = self.heap.get_mut(arr.stub());
        match &mut stub.data {
            StubData::Cells(v) => {
                let end = v.len() - 1;
                debug_assert!(v[end].is_end());
                v[end] = cell;
                v.push(Cell::END);
            }
            _ => panic!("cell push into non-array stub"),
        }
        stub.used += 1;
        debug_assert!(stub.used <= stub.cap);
        Ok(())
    }

    pub fn array_get(&self, arr: ArrayId, index: usize) -> Result<Cell, Raise> {
        let stub = self.heap.get(arr.stub());
        if stub.flags & sf::INACCESSIBLE != 0 {
            return Err(Raise::Inaccessible);
        }
        assert!(index < stub.used, "array index {index} out of range {}", stub.used);
        Ok(stub.cells()[index])
    }

    pub fn array_set(&mut self, arr: ArrayId, index: usize, cell: Cell) -> Result<(), Raise> {
        self.ensure_writable(arr.stub())?;
        cell.assert_live();
        let stub = self.heap.get_mut(arr.stub());
        assert!(index < stub.used, "array index {index} out of range {}", stub.used);
        let slot = &mut stub.cells_mut()[index];
        slot.assert_writable();
        *slot = cell;
        Ok(())
    }

    /// Direct slot access for components that have already done their own
    /// checking (context vars, argument fulfillment).
    pub(crate) fn array_cell_mut(&mut self, arr: ArrayId, index: usize) -> &mut Cell {
        let stub = self.heap.get_mut(arr.stub());
        assert!(index < stub.used, "array index {index} out of range {}", stub.used);
        &mut stub.cells_mut()[index]
    }

    /// Copy an array per `mode`.  The copy is unmanaged and belongs to the
    /// caller; interior arrays created by a deep copy are GC-managed since
    /// they are reachable from the copy.
    pub fn array_copy(&mut self, src: ArrayId, mode: CopyMode) -> Result<ArrayId, Raise> {
        let mut memo = HashMap::new();
        match mode {
            CopyMode::Shallow => self.copy_array_core(src, 0, None, &mut memo),
            CopyMode::Extra(extra) => self.copy_array_core(src, extra, None, &mut memo),
            CopyMode::Deep { types } => self.copy_array_core(src, 0, Some(types), &mut memo),
        }
    }

    /// Memoized by source stub so sharing already present in the original
    /// is preserved, and no new sharing is introduced.
    fn copy_array_core(
        &mut self,
        src: ArrayId,
        extra: usize,
        deep: Option<TypeSet>,
        memo: &mut HashMap<StubId, StubId>,
    ) -> Result<ArrayId, Raise> {
        let stub = self.heap.get(src.stub());
        if stub.flags & sf::INACCESSIBLE != 0 {
            return Err(Raise::Inaccessible);
        }
        let cells: Vec<Cell> = stub.cells()[..stub.used].to_vec();

        let copy = self.array_alloc(cells.len() + extra, 0)?;
        memo.insert(src.stub(), copy.stub());
        for mut cell in cells {
            if let Some(types) = deep {
                if cell.kind().is_array_kind() && types.contains(cell.kind()) {
                    let (inner, index) = cell.as_array();
                    let inner_copy = match memo.get(&inner.stub()) {
                        Some(&seen) => ArrayId(seen),
                        None => {
                            let c = self.copy_array_core(inner, 0, deep, memo)?;
                            self.heap.manage(c.stub());
                            c
                        }
                    };
                    cell.payload = Payload::Array { array: inner_copy, index };
                }
            }
            self.array_push(copy, cell)?;
        }
        Ok(copy)
    }
}

/// Raw scan helper: count cells up to the end marker with only byte tests,
/// the way collaborators that walk cell memory directly are allowed to.
pub fn scan_to_end(cells: &[Cell]) -> usize {
    let mut n = 0;
    while n < cells.len() && cells[n].header.byte != Kind::End as u8 {
        n += 1;
    }
    n
}
