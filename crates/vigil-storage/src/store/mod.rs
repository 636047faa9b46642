pub mod config;
pub mod events;
pub mod locks;
pub mod tasks;

/// NULL for a zero id.
pub(crate) fn nullable(id: u64) -> Option<i64> {
    (id != 0).then_some(id as i64)
}
