//! The stub table: arena storage for every heap-allocated structure.
//!
//! Series, arrays, contexts, actions, and pairings all live as `Stub`
//! entries in one `Vec<Option<Stub>>` with a free list, so a reference is a
//! stable index rather than a pointer.  Mark bits for the collector are a
//! side bitset.  The "manuals" list tracks allocations whose lifetime is
//! still explicitly owned; the sweep never reclaims those.

use smallvec::SmallVec;

use rill_core::{Cell, StubId, series_flags as sf};

use crate::core::action::ActionInfo;

/// Storage behind one stub.  Small byte series stay inline in the smallvec;
/// larger ones spill to the heap, mirroring the node-inline/pooled split.
pub enum StubData {
    Bytes(SmallVec<[u8; 16]>),
    Cells(Vec<Cell>),
    Pair(Box<[Cell; 2]>),
    Action(Box<ActionInfo>),
}

pub struct Stub {
    pub flags: u16,
    /// Element width in bytes (cell-sized for arrays and pairings).
    pub width: u8,
    pub used: usize,
    pub cap: usize,
    /// Varlist stubs link to their keylist here.
    pub link: Option<StubId>,
    pub data: StubData,
}

impl Stub {
    pub fn is_managed(&self) -> bool {
        self.flags & sf::MANAGED != 0
    }

    pub fn is_array(&self) -> bool {
        self.flags & sf::IS_ARRAY != 0
    }

    pub fn cells(&self) -> &[Cell] {
        match &self.data {
            StubData::Cells(v) => v,
            StubData::Pair(p) => &p[..],
            _ => panic!("stub does not hold cells"),
        }
    }

    pub fn cells_mut(&mut self) -> &mut [Cell] {
        match &mut self.data {
            StubData::Cells(v) => v,
            StubData::Pair(p) => &mut p[..],
            _ => panic!("stub does not hold cells"),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            StubData::Bytes(b) => b,
            _ => panic!("stub does not hold bytes"),
        }
    }

    /// Rough footprint estimate used for allocation-pressure accounting.
    pub fn size(&self) -> usize {
        let base = std::mem::size_of::<Stub>();
        let deep = match &self.data {
            StubData::Bytes(b) => {
                if b.spilled() { b.capacity() } else { 0 }
            }
            StubData::Cells(v) => v.capacity() * std::mem::size_of::<Cell>(),
            StubData::Pair(_) => 2 * std::mem::size_of::<Cell>(),
            StubData::Action(_) => std::mem::size_of::<ActionInfo>(),
        };
        base + deep
    }
}

pub struct Heap {
    pub(crate) stubs: Vec<Option<Stub>>,
    free_list: Vec<usize>,
    marks: Vec<u64>,
    /// Not-yet-managed allocations.  The sweep must never touch these;
    /// `series_manage` removal is the only legal way out.
    pub(crate) manuals: Vec<StubId>,
    pub(crate) alloc_count: usize,
    pub(crate) alloc_bytes: usize,
    pub(crate) gc_threshold: usize,
    pub(crate) gc_threshold_bytes: usize,
}

impl Heap {
    pub fn new() -> Self {
        Self {
            stubs: Vec::with_capacity(256),
            free_list: Vec::new(),
            marks: Vec::new(),
            manuals: Vec::new(),
            alloc_count: 0,
            gc_threshold: 4096,
            gc_threshold_bytes: 4 * 1024 * 1024,
            alloc_bytes: 0,
        }
    }

    /// Place a stub in the table.  Unmanaged stubs are registered on the
    /// manuals list and must be freed or managed by their creator.
    pub fn alloc(&mut self, stub: Stub) -> StubId {
        self.alloc_count += 1;
        self.alloc_bytes += stub.size();
        let managed = stub.is_managed();
        let id = if let Some(slot) = self.free_list.pop() {
            self.stubs[slot] = Some(stub);
            StubId(slot)
        } else {
            self.stubs.push(Some(stub));
            StubId(self.stubs.len() - 1)
        };
        if !managed {
            self.manuals.push(id);
        }
        id
    }

    #[inline]
    pub fn should_gc(&self) -> bool {
        self.alloc_count >= self.gc_threshold || self.alloc_bytes >= self.gc_threshold_bytes
    }

    pub fn get(&self, id: StubId) -> &Stub {
        self.stubs[id.0].as_ref().expect("stub was garbage collected")
    }

    pub fn get_mut(&mut self, id: StubId) -> &mut Stub {
        self.stubs[id.0].as_mut().expect("stub was garbage collected")
    }

    pub fn is_live(&self, id: StubId) -> bool {
        id.0 < self.stubs.len() && self.stubs[id.0].is_some()
    }

    /// One-way transition from the manuals list to GC visibility.  A second
    /// manage of the same stub is a fatal usage error.
    pub fn manage(&mut self, id: StubId) {
        let stub = self.stubs[id.0].as_mut().expect("stub was garbage collected");
        assert!(!stub.is_managed(), "series managed twice");
        stub.flags |= sf::MANAGED;
        let pos = self
            .manuals
            .iter()
            .rposition(|&m| m == id)
            .expect("unmanaged series missing from manuals list");
        self.manuals.swap_remove(pos);
    }

    /// Immediate deallocation of an unmanaged stub.
    pub fn free(&mut self, id: StubId) {
        let stub = self.stubs[id.0].as_ref().expect("stub already freed");
        assert!(!stub.is_managed(), "free of a GC-managed series");
        let size = stub.size();
        let pos = self
            .manuals
            .iter()
            .rposition(|&m| m == id)
            .expect("unmanaged series missing from manuals list");
        self.manuals.swap_remove(pos);
        self.stubs[id.0] = None;
        self.free_list.push(id.0);
        self.alloc_bytes = self.alloc_bytes.saturating_sub(size);
    }

    // -- mark bits ---------------------------------------------------------

    pub fn clear_marks(&mut self) {
        self.marks.clear();
    }

    pub fn is_marked(&self, id: StubId) -> bool {
        let word = id.0 >> 6;
        let bit = id.0 & 63;
        self.marks.get(word).is_some_and(|w| w & (1 << bit) != 0)
    }

    /// Returns true if the stub was newly marked.
    pub fn set_mark(&mut self, id: StubId) -> bool {
        let word = id.0 >> 6;
        let bit = id.0 & 63;
        if word >= self.marks.len() {
            self.marks.resize(word + 1, 0);
        }
        let w = &mut self.marks[word];
        let mask = 1 << bit;
        if *w & mask != 0 {
            return false;
        }
        *w |= mask;
        true
    }

    /// Reclaim unmarked managed stubs and rebuild the free list.  Manual
    /// stubs survive regardless of marks.  Returns surviving stub count.
    pub fn sweep(&mut self) -> usize {
        let mut live_bytes = 0;
        let mut live_count = 0;

        self.free_list.clear();
        for i in 0..self.stubs.len() {
            match &self.stubs[i] {
                Some(stub) if stub.is_managed() && !self.is_marked(StubId(i)) => {
                    self.stubs[i] = None;
                    self.free_list.push(i);
                }
                Some(stub) => {
                    live_bytes += stub.size();
                    live_count += 1;
                }
                None => self.free_list.push(i),
            }
        }

        // Trailing empty slots shrink the table instead of sitting on the
        // free list.
        while self.stubs.last().is_some_and(|s| s.is_none()) {
            self.stubs.pop();
        }
        let len = self.stubs.len();
        self.free_list.retain(|&i| i < len);
        if self.stubs.capacity() > len * 4 && self.stubs.capacity() > 1024 {
            self.stubs.shrink_to(len * 2);
        }

        self.clear_marks();
        self.alloc_count = 0;
        self.alloc_bytes = live_bytes;

        // Grow thresholds from the live set; slower growth once the heap is
        // large to keep pause times bounded.
        let growth = if live_bytes > 8 * 1024 * 1024 { 1.5 } else { 2.0 };
        self.gc_threshold = ((live_count as f64 * growth) as usize).max(4096);
        self.gc_threshold_bytes = ((live_bytes as f64 * growth) as usize).max(1024 * 1024);

        live_count
    }

    /// Diagnostic summary of the table by stub category.
    pub fn memory_stats(&self) -> String {
        let mut bytes = (0usize, 0usize);
        let mut cells = (0usize, 0usize);
        let mut pairs = (0usize, 0usize);
        let mut actions = (0usize, 0usize);
        for stub in self.stubs.iter().flatten() {
            let size = stub.size();
            let slot = match stub.data {
                StubData::Bytes(_) => &mut bytes,
                StubData::Cells(_) => &mut cells,
                StubData::Pair(_) => &mut pairs,
                StubData::Action(_) => &mut actions,
            };
            slot.0 += 1;
            slot.1 += size;
        }
        format!(
            "byte series: {} ({} bytes)\ncell arrays: {} ({} bytes)\n\
             pairings: {} ({} bytes)\nactions: {} ({} bytes)\n\
             manuals: {}, free slots: {}",
            bytes.0, bytes.1, cells.0, cells.1, pairs.0, pairs.1, actions.0, actions.1,
            self.manuals.len(),
            self.free_list.len()
        )
    }
}
