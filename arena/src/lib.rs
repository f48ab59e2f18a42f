//! A growable, append-only byte arena.
//!
//! A single contiguous allocation that may relocate on growth, matching the
//! table-loader protocol: callers store arena-relative offsets while
//! building a snapshot and only convert them to pointers once via
//! [`Arena::resolve`] after the arena has settled for good.

use common::CacheError;

/// Byte offset into an [`Arena`]. Stable for the lifetime of the arena
/// modulo growth; growth preserves the bytes at a given offset, it just may
/// move where they live in memory.
pub type Offset = usize;

#[derive(Debug)]
pub struct Arena {
    buf: Vec<u8>,
}

impl Arena {
    /// Allocates a new arena with the given initial capacity.
    pub fn build(initial_capacity: usize) -> Self {
        Arena { buf: Vec::with_capacity(initial_capacity) }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.buf.len()
    }

    /// Appends `bytes`, growing (by doubling, via `Vec`'s own growth policy)
    /// if needed. Returns the offset at which the bytes begin.
    pub fn store(&mut self, bytes: &[u8]) -> Result<Offset, CacheError> {
        let offset = self.buf.len();
        self.reserve_for(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(offset)
    }

    /// Writes `len_be(4) || bytes` as a single framed unit. Returns the
    /// offset of the length header; the frame's total length is
    /// `4 + bytes.len()`.
    pub fn store_framed(&mut self, bytes: &[u8]) -> Result<Offset, CacheError> {
        let offset = self.buf.len();
        let len = bytes.len() as u32;
        self.reserve_for(4 + bytes.len())?;
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(bytes);
        Ok(offset)
    }

    fn reserve_for(&mut self, extra: usize) -> Result<(), CacheError> {
        if self.buf.len() + extra > self.buf.capacity() {
            let mut new_cap = self.buf.capacity().max(1);
            while new_cap < self.buf.len() + extra {
                new_cap *= 2;
            }
            self.buf.try_reserve(new_cap - self.buf.len())
                .map_err(|e| CacheError::Allocation(e.to_string()))?;
        }
        Ok(())
    }

    /// Resolves a previously returned offset to a stable pointer into the
    /// arena's current backing storage. Only valid after the last growth for
    /// this snapshot — i.e. after the loader has finished all inserts.
    ///
    /// # Safety
    /// The returned pointer is invalidated by any subsequent `store*` call
    /// that grows the arena, and by `reset`. Callers (the hash index
    /// finalize step) must only call this once the arena is frozen.
    #[inline]
    pub unsafe fn resolve(&self, offset: Offset) -> *const u8 {
        self.buf.as_ptr().add(offset)
    }

    /// Returns the bytes at `[offset, offset+len)`. Same validity caveat as
    /// [`Arena::resolve`].
    #[inline]
    pub fn slice(&self, offset: Offset, len: usize) -> &[u8] {
        &self.buf[offset..offset + len]
    }

    /// Reads a framed payload's `len_be(4) || payload` pair back out as a
    /// `(header+payload)` slice of length `frame_len`.
    #[inline]
    pub fn frame(&self, offset: Offset, frame_len: usize) -> &[u8] {
        self.slice(offset, frame_len)
    }

    /// Sets `used = 0`. Capacity is retained so the next reload of this slot
    /// reuses the allocation.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_preserves_bytes_after_growth() {
        let mut arena = Arena::build(16);
        let o1 = arena.store(b"hello").unwrap();
        let o2 = arena.store(&[0xAAu8; 32]).unwrap(); // forces growth past 16
        assert!(arena.capacity() >= 37);
        assert_eq!(arena.slice(o1, 5), b"hello");
        assert_eq!(arena.slice(o2, 32), &[0xAAu8; 32][..]);
    }

    #[test]
    fn store_framed_round_trips_length_prefix() {
        let mut arena = Arena::build(8);
        let payload = b"{\"id\":42}";
        let offset = arena.store_framed(payload).unwrap();
        let frame = arena.frame(offset, 4 + payload.len());
        let len = u32::from_be_bytes(frame[0..4].try_into().unwrap());
        assert_eq!(len as usize, payload.len());
        assert_eq!(&frame[4..], payload);
    }

    #[test]
    fn reset_keeps_capacity_but_clears_used() {
        let mut arena = Arena::build(64);
        arena.store(b"row one").unwrap();
        let cap_before = arena.capacity();
        arena.reset();
        assert_eq!(arena.used(), 0);
        assert_eq!(arena.capacity(), cap_before);
    }
}
