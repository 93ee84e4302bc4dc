//! Contexts: paired keylist/varlist arrays forming a bindable namespace.
//!
//! A context is identified by its varlist stub; the keylist hangs off the
//! varlist's link field.  Slot 0 of the varlist holds the archetype value of
//! the context itself, and slot 0 of the keylist is the reserved root key,
//! so user fields start at index 1.  Field indices are permanent once a word
//! has been bound to them; contexts grow only by appending.

use hashbrown::HashSet;

use rill_core::{
    ArrayId, Binding, Cell, ContextId, ParamSpec, SymbolId, series_flags as sf,
};

use crate::core::heap::StubData;
use crate::errors::Raise;
use crate::runtime::Runtime;

impl Runtime {
    /// Allocate an unmanaged context with room for `cap` fields.  The
    /// keylist starts private to this context and GC-managed; the varlist
    /// belongs to the caller until `context_manage`.
    pub fn context_alloc(&mut self, cap: usize) -> Result<ContextId, Raise> {
        let keylist = self.array_alloc_gc(cap + 1)?;
        self.array_push(keylist, Cell::blank())?; // root key

        let varlist = self.array_alloc(cap + 1, 0)?;
        let ctx = ContextId(varlist.stub());
        self.heap.get_mut(varlist.stub()).link = Some(keylist.stub());
        self.array_push(varlist, Cell::object(ctx))?; // archetype
        Ok(ctx)
    }

    pub fn context_manage(&mut self, ctx: ContextId) {
        self.heap.manage(ctx.varlist().stub());
    }

    pub fn context_keylist(&self, ctx: ContextId) -> ArrayId {
        ArrayId(self.heap.get(ctx.varlist().stub()).link.expect("varlist without keylist"))
    }

    /// Number of fields, excluding the reserved slot 0.
    pub fn context_len(&self, ctx: ContextId) -> usize {
        self.array_len(self.context_keylist(ctx)).saturating_sub(1)
    }

    /// Append a field, extending keylist and varlist together.  The new var
    /// starts out null.  A shared keylist is forked private first, so
    /// sibling contexts are unaffected.
    pub fn context_append_key(&mut self, ctx: ContextId, spec: ParamSpec) -> Result<usize, Raise> {
        self.ensure_writable(ctx.varlist().stub())?;
        let keylist = self.keylist_ensure_private(ctx)?;
        debug_assert!(
            self.context_find(ctx, spec.name).is_none(),
            "duplicate context key #{}",
            spec.name.0
        );

        // Reserve space in both arrays up front so neither push can fail
        // and leave the pair out of parity.
        self.series_expand(keylist.stub(), 1)?;
        self.series_expand(ctx.varlist().stub(), 1)?;
        let index = self.array_len(keylist);
        self.array_push(keylist, Cell::key(spec)).expect("reserved keylist push failed");
        self.array_push(ctx.varlist(), Cell::nulled()).expect("reserved varlist push failed");
        debug_assert_eq!(self.array_len(keylist), self.array_len(ctx.varlist()));
        Ok(index)
    }

    /// Index of the field with this name, if present.
    pub fn context_find(&self, ctx: ContextId, name: SymbolId) -> Option<usize> {
        let keylist = self.context_keylist(ctx);
        let stub = self.heap.get(keylist.stub());
        stub.cells()[1..stub.used]
            .iter()
            .position(|key| key.as_key().name == name)
            .map(|i| i + 1)
    }

    pub fn context_key(&self, ctx: ContextId, index: usize) -> ParamSpec {
        let keylist = self.context_keylist(ctx);
        self.array_get(keylist, index)
            .expect("keylist inaccessible")
            .as_key()
    }

    pub fn context_var(&self, ctx: ContextId, index: usize) -> Result<Cell, Raise> {
        self.array_get(ctx.varlist(), index)
    }

    pub fn context_set_var(&mut self, ctx: ContextId, index: usize, value: Cell) -> Result<(), Raise> {
        assert!(index > 0, "archetype slot is not assignable");
        self.array_set(ctx.varlist(), index, value)
    }

    /// Rip the context's storage out into a fresh GC-managed node and leave
    /// the original as a zero-length inaccessible stub.  Existing references
    /// keep their identity but raise on access; the returned context owns
    /// the values.
    pub fn context_steal(&mut self, ctx: ContextId) -> Result<ContextId, Raise> {
        let old = ctx.varlist().stub();
        let stub = self.heap.get(old);
        if stub.flags & sf::INACCESSIBLE != 0 {
            return Err(Raise::Inaccessible);
        }
        let new_arr = self.array_alloc(stub.cap.max(1), 0)?;
        let new = new_arr.stub();
        self.heap.manage(new);

        let old_stub = self.heap.get_mut(old);
        let data = std::mem::replace(&mut old_stub.data, StubData::Bytes(Default::default()));
        let used = old_stub.used;
        let cap = old_stub.cap;
        let link = old_stub.link.take();
        old_stub.used = 0;
        old_stub.cap = 0;
        old_stub.flags |= sf::INACCESSIBLE;

        let new_stub = self.heap.get_mut(new);
        new_stub.data = data;
        new_stub.used = used;
        new_stub.cap = cap;
        new_stub.link = link;

        let stolen = ContextId(new);
        // The archetype must name its new home.
        let arch = self.array_cell_mut(ArrayId(new), 0);
        *arch = Cell::object(stolen);
        Ok(stolen)
    }

    /// Fork the keylist if it is shared with other contexts, returning the
    /// (now private) keylist.
    pub(crate) fn keylist_ensure_private(&mut self, ctx: ContextId) -> Result<ArrayId, Raise> {
        let keylist = self.context_keylist(ctx);
        if self.heap.get(keylist.stub()).flags & sf::KEYLIST_SHARED == 0 {
            return Ok(keylist);
        }
        let fork = self.array_copy(keylist, super::array::CopyMode::Shallow)?;
        self.heap.manage(fork.stub());
        self.heap.get_mut(ctx.varlist().stub()).link = Some(fork.stub());
        Ok(fork)
    }

    /// Mark a keylist as referenced by more than one context, forcing any
    /// future mutation through a private fork.
    pub(crate) fn keylist_mark_shared(&mut self, keylist: ArrayId) {
        self.heap.get_mut(keylist.stub()).flags |= sf::KEYLIST_SHARED;
    }

    // -- binding -----------------------------------------------------------

    /// Bind every word in the array (deeply through nested arrays) whose
    /// spelling names a field of the context.
    pub fn bind_array_deep(&mut self, arr: ArrayId, ctx: ContextId) -> Result<(), Raise> {
        let mut visited = HashSet::new();
        self.bind_core(arr, ctx, &mut visited)
    }

    fn bind_core(
        &mut self,
        arr: ArrayId,
        ctx: ContextId,
        visited: &mut HashSet<rill_core::StubId>,
    ) -> Result<(), Raise> {
        if !visited.insert(arr.stub()) {
            return Ok(());
        }
        self.ensure_writable(arr.stub())?;
        for i in 0..self.array_len(arr) {
            let cell = self.array_get(arr, i)?;
            if cell.kind().is_word_kind() {
                if self.context_find(ctx, cell.as_word()).is_some() {
                    self.array_cell_mut(arr, i).binding = Binding::Specific(ctx);
                }
            } else if cell.kind().is_array_kind() {
                let (inner, _) = cell.as_array();
                self.bind_core(inner, ctx, visited)?;
            }
        }
        Ok(())
    }
}
