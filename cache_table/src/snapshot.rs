use arena::Arena;
use hash_index::HashIndex;

/// One complete `(arena, hash_indexes)` pair — everything a reader needs to
/// answer a fetch against one refresh cycle of a table.
pub struct Snapshot {
    pub arena: Arena,
    pub indexes: Vec<HashIndex>,
}

impl Snapshot {
    pub fn empty(index_count: usize) -> Self {
        Snapshot {
            arena: Arena::build(4096),
            indexes: (0..index_count).map(|_| HashIndex::build(8, 0)).collect(),
        }
    }
}
