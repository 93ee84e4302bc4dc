//! The series memory manager: width-typed growable buffers.
//!
//! Allocation returns an unmanaged series tracked on the manuals list; the
//! creator either frees it explicitly or hands it to the GC with
//! `series_manage`.  Capacity requests are rounded into size classes (8-byte
//! steps up to 64 bytes, then powers of two) so recycled slots fragment
//! less.

use smallvec::SmallVec;

use rill_core::{StubId, series_flags as sf};

use crate::core::heap::{Stub, StubData};
use crate::errors::{Raise, ReadOnlyCause};
use crate::runtime::Runtime;

/// Round a byte request into its allocation class.
pub(crate) fn pool_bytes(total: usize) -> usize {
    if total <= 64 {
        (total + 7) & !7
    } else {
        total.next_power_of_two()
    }
}

impl Runtime {
    /// Allocate an unmanaged width-typed byte series.
    pub fn series_alloc(&mut self, width: u8, cap: usize, flags: u16) -> Result<StubId, Raise> {
        assert!(width > 0, "zero-width series");
        assert!(flags & !sf::ALLOC_MASK == 0, "bad series_alloc flags: {flags:#x}");
        let rounded = pool_bytes(width as usize * cap.max(1));
        self.check_memory(rounded)?;
        let stub = Stub {
            flags,
            width,
            used: 0,
            cap: rounded / width as usize,
            link: None,
            data: StubData::Bytes(SmallVec::new()),
        };
        Ok(self.heap.alloc(stub))
    }

    /// Hand an unmanaged series over to the garbage collector.  Managing a
    /// series twice is a fatal usage error.
    pub fn series_manage(&mut self, id: StubId) {
        self.heap.manage(id);
    }

    /// Immediately deallocate a series.  Only legal while unmanaged.
    pub fn series_free(&mut self, id: StubId) {
        self.heap.free(id);
    }

    /// Grow capacity by at least `delta` elements, preserving content.
    pub fn series_expand(&mut self, id: StubId, delta: usize) -> Result<(), Raise> {
        self.ensure_writable(id)?;
        let stub = self.heap.get(id);
        if stub.flags & sf::FIXED_SIZE != 0 {
            return Err(Raise::FixedSize);
        }
        let width = stub.width as usize;
        // Arrays reserve one slot past capacity for the end marker.
        let terminator = if stub.is_array() { 1 } else { 0 };
        let want = pool_bytes((stub.cap + delta + terminator) * width);
        let have = (stub.cap + terminator) * width;
        if want <= have {
            return Ok(());
        }
        self.check_memory(want - have)?;
        let stub = self.heap.get_mut(id);
        match &mut stub.data {
            StubData::Bytes(b) => b.reserve(want - b.len()),
            StubData::Cells(v) => v.reserve(want / width - v.len()),
            _ => panic!("expand of non-buffer stub"),
        }
        stub.cap = want / width - terminator;
        self.heap.alloc_bytes += want - have;
        Ok(())
    }

    /// Append one element (exactly `width` bytes).
    pub fn series_push(&mut self, id: StubId, element: &[u8]) -> Result<(), Raise> {
        self.ensure_writable(id)?;
        let stub = self.heap.get(id);
        assert_eq!(element.len(), stub.width as usize, "element width mismatch");
        if stub.used == stub.cap {
            let grow = stub.cap.max(1);
            self.series_expand(id, grow)?;
        }
        let stub = self.heap.get_mut(id);
        match &mut stub.data {
            StubData::Bytes(b) => b.extend_from_slice(element),
            _ => panic!("byte push into non-byte stub"),
        }
        stub.used += 1;
        debug_assert!(stub.used <= stub.cap);
        Ok(())
    }

    /// Read one element.  Out-of-range indexing is a defect, not an error.
    pub fn series_get(&self, id: StubId, index: usize) -> Result<&[u8], Raise> {
        let stub = self.heap.get(id);
        if stub.flags & sf::INACCESSIBLE != 0 {
            return Err(Raise::Inaccessible);
        }
        assert!(index < stub.used, "series index {index} out of range {}", stub.used);
        let width = stub.width as usize;
        Ok(&stub.bytes()[index * width..(index + 1) * width])
    }

    pub fn series_used(&self, id: StubId) -> usize {
        self.heap.get(id).used
    }

    pub fn series_cap(&self, id: StubId) -> usize {
        self.heap.get(id).cap
    }

    pub fn series_is_managed(&self, id: StubId) -> bool {
        self.heap.get(id).is_managed()
    }

    // -- protection --------------------------------------------------------

    /// Permanently freeze a series.
    pub fn series_freeze(&mut self, id: StubId) {
        self.heap.get_mut(id).flags |= sf::FROZEN;
    }

    pub fn series_protect(&mut self, id: StubId) {
        self.heap.get_mut(id).flags |= sf::PROTECTED;
    }

    pub fn series_unprotect(&mut self, id: StubId) {
        self.heap.get_mut(id).flags &= !sf::PROTECTED;
    }

    /// Refuse writes, reporting which protection applies.  Permanent causes
    /// win over transient ones so the report does not change between
    /// retries.
    pub(crate) fn ensure_writable(&self, id: StubId) -> Result<(), Raise> {
        let flags = self.heap.get(id).flags;
        if flags & sf::INACCESSIBLE != 0 {
            return Err(Raise::Inaccessible);
        }
        if flags & sf::FROZEN != 0 {
            return Err(Raise::ReadOnly(ReadOnlyCause::Frozen));
        }
        if flags & sf::PROTECTED != 0 {
            return Err(Raise::ReadOnly(ReadOnlyCause::Protected));
        }
        if flags & sf::HELD != 0 {
            return Err(Raise::ReadOnly(ReadOnlyCause::Held));
        }
        Ok(())
    }

    /// Take the evaluator hold on a series.  Returns false if some enclosing
    /// frame already holds it (and therefore owns the release).
    pub(crate) fn series_take_hold(&mut self, id: StubId) -> bool {
        let stub = self.heap.get_mut(id);
        if stub.flags & sf::HELD != 0 {
            return false;
        }
        stub.flags |= sf::HELD;
        true
    }

    pub(crate) fn series_release_hold(&mut self, id: StubId) {
        let stub = self.heap.get_mut(id);
        debug_assert!(stub.flags & sf::HELD != 0, "release of a hold never taken");
        stub.flags &= !sf::HELD;
    }

    pub(crate) fn check_memory(&self, requested: usize) -> Result<(), Raise> {
        if let Some(limit) = self.config.memory_limit {
            if self.heap.alloc_bytes + requested > limit {
                return Err(Raise::OutOfMemory { requested });
            }
        }
        Ok(())
    }
}
