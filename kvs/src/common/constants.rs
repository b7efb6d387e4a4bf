/// Database argument that selects the transient in-memory backend.
/// Compared case-insensitively.
pub const IN_MEMORY: &str = ":memory:";

/// Partition used by the persistent backend when none is configured.
pub const DEFAULT_PARTITION: &str = "kvs";

/// Open-mode letter used when no flag is given.
pub const DEFAULT_FLAG: &str = "c";

pub(crate) const STORE_CLOSED_MESSAGE: &str = "Store is already closed";

/// Returns `true` if `database` is the in-memory sentinel.
#[inline]
pub fn is_in_memory(database: &str) -> bool {
    database.eq_ignore_ascii_case(IN_MEMORY)
}
