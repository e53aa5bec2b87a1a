use std::alloc::Layout;
use thiserror::Error;

/// Errors returned by the fallible sizing calls (`try_with_capacity`,
/// `try_reserve`). Lookups and removals never fail; absence is reported
/// through `Option` or `bool`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TryReserveError {
    /// The requested slot count does not fit in `usize`.
    #[error("capacity overflow")]
    CapacityOverflow,

    /// The allocator could not provide the slot array.
    #[error("memory allocation of {} bytes failed", .layout.size())]
    AllocError { layout: Layout },
}

pub type Result<T> = std::result::Result<T, TryReserveError>;
