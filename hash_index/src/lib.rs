//! Open-addressed, linear-probing hash index over arena-stored keys and
//! framed values. Keys and frames live in the table's single [`arena::Arena`];
//! the index itself only stores small fixed-size buckets.

use std::hash::Hasher;
use std::sync::atomic::{AtomicU64, Ordering};

use arena::{Arena, Offset};
use fnv::FnvHasher;

const MAX_PROBE: usize = 1024;

/// A bucket's reference to arena-stored bytes. `Offset` during load,
/// `Pointer` once [`HashIndex::finalize`] has run.
#[derive(Debug, Clone, Copy)]
enum Ref {
    Offset(Offset),
    Pointer(*const u8),
}

unsafe impl Send for Ref {}
unsafe impl Sync for Ref {}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    full_hash: u64,
    key_len: u32,
    key_ref: Ref,
    frame_len: u32,
    frame_ref: Ref,
}

impl Bucket {
    const EMPTY: Bucket = Bucket {
        full_hash: 0,
        key_len: 0,
        key_ref: Ref::Offset(0),
        frame_len: 0,
        frame_ref: Ref::Offset(0),
    };

    #[inline]
    fn is_empty(&self) -> bool {
        self.key_len == 0
    }
}

/// A resolved hit: the framed value's location plus its length, ready to be
/// handed to the response writer without copying.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub frame_ptr: *const u8,
    pub frame_len: u32,
}

unsafe impl Send for Hit {}
unsafe impl Sync for Hit {}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProbeStats {
    pub queries: u64,
    pub probes: u64,
    pub probe_overflows: u64,
}

#[derive(Default)]
struct AtomicProbeStats {
    queries: AtomicU64,
    probes: AtomicU64,
    probe_overflows: AtomicU64,
}

pub struct HashIndex {
    buckets: Vec<Bucket>,
    mask: usize,
    used: usize,
    seed: u64,
    finalized: bool,
    stats: AtomicProbeStats,
}

fn hash_key(seed: u64, key: &[u8]) -> u64 {
    let mut hasher = FnvHasher::with_key(seed);
    hasher.write(key);
    hasher.finish()
}

impl HashIndex {
    /// Builds an empty index. `capacity` is rounded up to the next power of
    /// two with a floor of 8, matching the loader's `hash_cap` rule.
    pub fn build(capacity: usize, seed: u64) -> Self {
        let cap = capacity.max(8).next_power_of_two();
        HashIndex {
            buckets: vec![Bucket::EMPTY; cap],
            mask: cap - 1,
            used: 0,
            seed,
            finalized: false,
            stats: AtomicProbeStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    pub fn len(&self) -> usize {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn load_factor(&self) -> f64 {
        self.used as f64 / self.buckets.len() as f64
    }

    /// Inserts `key` (key bytes already written into the arena at
    /// `key_offset`) pointing at the framed value beginning at
    /// `frame_offset`. Duplicate keys land in a later bucket and are
    /// unreachable by lookup — the first insert wins, matching upstream
    /// source-table semantics.
    pub fn insert(&mut self, key: &[u8], key_offset: Offset, frame_offset: Offset, frame_len: u32) {
        assert!(!key.is_empty(), "hash index keys must be non-empty");
        assert!(!self.finalized, "cannot insert into a finalized hash index");
        let h = hash_key(self.seed, key);
        let mut idx = (h as usize) & self.mask;
        for _ in 0..self.buckets.len() {
            if self.buckets[idx].is_empty() {
                self.buckets[idx] = Bucket {
                    full_hash: h,
                    key_len: key.len() as u32,
                    key_ref: Ref::Offset(key_offset),
                    frame_len,
                    frame_ref: Ref::Offset(frame_offset),
                };
                self.used += 1;
                return;
            }
            idx = (idx + 1) & self.mask;
        }
        panic!("hash index full: {} buckets all occupied, sizing grew stale between count and load", self.buckets.len());
    }

    /// Converts every occupied bucket's offsets into pointers resolved
    /// against `arena`. Must run exactly once, after the arena has settled
    /// for this snapshot, before the snapshot is published to readers.
    pub fn finalize(&mut self, arena: &Arena) {
        for bucket in self.buckets.iter_mut() {
            if bucket.is_empty() {
                continue;
            }
            if let Ref::Offset(o) = bucket.key_ref {
                bucket.key_ref = Ref::Pointer(unsafe { arena.resolve(o) });
            }
            if let Ref::Offset(o) = bucket.frame_ref {
                bucket.frame_ref = Ref::Pointer(unsafe { arena.resolve(o) });
            }
        }
        self.finalized = true;
    }

    /// Looks up `key`. Only meaningful once the index is finalized (i.e. has
    /// been published as part of a snapshot's current slot). Takes `&self`
    /// with atomic counters per §5: the hot path is single-threaded per
    /// connection, so plain atomic adds are cheaper than a lock while still
    /// letting the `s` stats action read counters through a shared snapshot
    /// reference.
    pub fn lookup(&self, key: &[u8]) -> Option<Hit> {
        self.stats.queries.fetch_add(1, Ordering::Relaxed);
        if key.is_empty() {
            return None;
        }
        let h = hash_key(self.seed, key);
        let mut idx = (h as usize) & self.mask;
        let mut probes = 0usize;
        loop {
            let bucket = &self.buckets[idx];
            if bucket.is_empty() {
                return None;
            }
            if bucket.key_len as usize == key.len() && bucket.full_hash == h {
                let key_ptr = match bucket.key_ref {
                    Ref::Pointer(p) => p,
                    Ref::Offset(_) => panic!("lookup against an un-finalized hash index"),
                };
                let found = unsafe { std::slice::from_raw_parts(key_ptr, key.len()) };
                if found == key {
                    let frame_ptr = match bucket.frame_ref {
                        Ref::Pointer(p) => p,
                        Ref::Offset(_) => panic!("lookup against an un-finalized hash index"),
                    };
                    return Some(Hit { frame_ptr, frame_len: bucket.frame_len });
                }
            }
            probes += 1;
            self.stats.probes.fetch_add(1, Ordering::Relaxed);
            if probes >= MAX_PROBE {
                self.stats.probe_overflows.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            idx = (idx + 1) & self.mask;
        }
    }

    pub fn stats(&self) -> ProbeStats {
        ProbeStats {
            queries: self.stats.queries.load(Ordering::Relaxed),
            probes: self.stats.probes.load(Ordering::Relaxed),
            probe_overflows: self.stats.probe_overflows.load(Ordering::Relaxed),
        }
    }
}

unsafe impl Send for HashIndex {}
unsafe impl Sync for HashIndex {}
