//! The runtime: one isolated instance of the execution core.
//!
//! All global mutable state of the system (stub table, manuals list, guard
//! stack, root values, symbol table, data stack, frame stack) hangs off one
//! `Runtime` value created at startup, so multiple isolated instances can
//! coexist and tests never share state.

use rill_core::{Cell, StubId, SymbolId};

use crate::core::heap::Heap;
use crate::core::symbol::SymbolTable;
use crate::eval::Frame;
use crate::gc::Guard;

#[derive(Clone, Copy, Debug)]
pub struct RuntimeConfig {
    /// Refuse series allocations past this many accounted bytes.
    pub memory_limit: Option<usize>,
    /// Frame depth at which the overflow check trips (fatal).
    pub max_frame_depth: usize,
    /// Allows tests to pin the heap while inspecting reachability.
    pub gc_enabled: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            memory_limit: None,
            max_frame_depth: 256,
            gc_enabled: true,
        }
    }
}

pub struct Runtime {
    pub(crate) heap: Heap,
    pub(crate) symbols: SymbolTable,
    pub(crate) guards: Vec<Guard>,
    pub(crate) roots: Vec<Cell>,
    pub(crate) data_stack: Vec<Cell>,
    pub(crate) frames: Vec<Frame>,
    /// Recycled argument storage from dropped calls.  Purely a cache; see
    /// the frame drop path.
    pub(crate) varlist_pool: Vec<Vec<Cell>>,
    pub(crate) config: RuntimeConfig,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            heap: Heap::new(),
            symbols: SymbolTable::new(),
            guards: Vec::new(),
            roots: Vec::new(),
            data_stack: Vec::with_capacity(64),
            frames: Vec::new(),
            varlist_pool: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // -- symbols -----------------------------------------------------------

    pub fn intern(&mut self, spelling: &str) -> SymbolId {
        self.symbols.intern(spelling)
    }

    pub fn spelling(&self, id: SymbolId) -> &str {
        self.symbols.spelling(id)
    }

    // -- introspection -----------------------------------------------------

    /// Whether a stub still occupies its slot (that is, has not been swept
    /// or freed).  A live stub may still be inaccessible.
    pub fn stub_is_live(&self, id: StubId) -> bool {
        self.heap.is_live(id)
    }

    /// Permanent root values, always reachable.
    pub fn root_push(&mut self, cell: Cell) {
        self.roots.push(cell);
    }

    pub fn data_stack_depth(&self) -> usize {
        self.data_stack.len()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn memory_stats(&self) -> String {
        self.heap.memory_stats()
    }
}
