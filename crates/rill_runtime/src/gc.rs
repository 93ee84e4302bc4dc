//! Mark/sweep garbage collection and the guard stack.
//!
//! Collection runs only at designated safe points (the evaluator's step
//! boundary), never inside arbitrary allocation paths.  Roots are the guard
//! stack, the permanent root values, the data stack, every live frame, and
//! the manuals list: manual stubs themselves are never swept, and tracing
//! through them keeps managed structure they reference alive while its
//! owner is still wiring it up.

use rill_core::{Binding, Cell, Payload, StubId};

use crate::core::heap::StubData;
use crate::runtime::Runtime;

/// One pinned entry on the guard stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Guard {
    Stub(StubId),
    Value(Cell),
}

impl Runtime {
    // -- guard stack -------------------------------------------------------

    /// Pin a stub against collection until the matching drop.
    pub fn guard_push(&mut self, id: StubId) {
        debug_assert!(self.heap.is_live(id), "guarding a dead stub");
        self.guards.push(Guard::Stub(id));
    }

    /// Pin everything reachable from a transient cell.
    pub fn guard_push_value(&mut self, cell: Cell) {
        self.guards.push(Guard::Value(cell));
    }

    /// Drops must mirror pushes exactly; anything else is a fatal usage
    /// error, since an out-of-order drop means some caller's pin is gone.
    pub fn guard_drop(&mut self, id: StubId) {
        let top = self.guards.pop().expect("guard stack empty");
        assert!(top == Guard::Stub(id), "guard dropped out of order");
    }

    pub fn guard_drop_value(&mut self, cell: Cell) {
        let top = self.guards.pop().expect("guard stack empty");
        assert!(top == Guard::Value(cell), "guard dropped out of order");
    }

    pub fn guard_depth(&self) -> usize {
        self.guards.len()
    }

    // -- collection --------------------------------------------------------

    /// Safe-point check: collect if allocation pressure asks for it.
    pub(crate) fn maybe_gc(&mut self) {
        if self.config.gc_enabled && self.heap.should_gc() {
            self.collect_garbage();
        }
    }

    /// Full mark/sweep pass.  Returns the number of surviving stubs.
    pub fn collect_garbage(&mut self) -> usize {
        self.heap.clear_marks();

        let mut pending: Vec<StubId> = Vec::with_capacity(64);
        for guard in &self.guards {
            match guard {
                Guard::Stub(id) => pending.push(*id),
                Guard::Value(cell) => cell_children(cell, &mut pending),
            }
        }
        for cell in &self.roots {
            cell_children(cell, &mut pending);
        }
        for cell in &self.data_stack {
            cell_children(cell, &mut pending);
        }
        for frame in &self.frames {
            pending.push(frame.feed.array.stub());
            cell_children(&frame.out, &mut pending);
            if let Some(args) = frame.args {
                pending.push(args.varlist().stub());
            }
            if let Some(phase) = frame.phase {
                pending.push(phase.stub());
            }
            if let Some(original) = frame.original {
                pending.push(original.stub());
            }
        }
        pending.extend_from_slice(&self.heap.manuals);

        while let Some(id) = pending.pop() {
            if !self.heap.is_live(id) || !self.heap.set_mark(id) {
                continue;
            }
            let stub = self.heap.get(id);
            if let Some(link) = stub.link {
                pending.push(link);
            }
            match &stub.data {
                StubData::Bytes(_) => {}
                StubData::Cells(cells) => {
                    for cell in cells {
                        cell_children(cell, &mut pending);
                    }
                }
                StubData::Pair(pair) => {
                    cell_children(&pair[0], &mut pending);
                    cell_children(&pair[1], &mut pending);
                }
                StubData::Action(info) => {
                    pending.push(info.paramlist.stub());
                    pending.push(info.details.stub());
                    pending.push(info.underlying.stub());
                    if let Some(exemplar) = info.exemplar {
                        pending.push(exemplar.varlist().stub());
                    }
                }
            }
        }

        self.heap.sweep()
    }
}

/// Stubs directly referenced by a cell's payload and binding.  Works on raw
/// payloads without kind checks so it stays safe on freed cells.
fn cell_children(cell: &Cell, out: &mut Vec<StubId>) {
    match cell.payload {
        Payload::Array { array, .. } => out.push(array.stub()),
        Payload::Series { stub, .. } => out.push(stub),
        Payload::Context(ctx) => out.push(ctx.varlist().stub()),
        Payload::Action(act) => out.push(act.stub()),
        Payload::Pair(pair) => out.push(pair.stub()),
        Payload::None
        | Payload::Logic(_)
        | Payload::Integer(_)
        | Payload::Decimal(_)
        | Payload::Word(_)
        | Payload::Key(_) => {}
    }
    match cell.binding {
        Binding::Relative(act) => out.push(act.stub()),
        Binding::Specific(ctx) => out.push(ctx.varlist().stub()),
        Binding::Unbound => {}
    }
}
