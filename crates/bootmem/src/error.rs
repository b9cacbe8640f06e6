//! Error types surfaced by the boot-memory allocator.

use thiserror::Error;

/// Errors produced by allocator operations.
///
/// All failures are synchronous and leave the shared structures in a
/// consistent state, with one exception: [`CorruptFreeList`] means a block
/// header read back garbage, and no further mutation of the list is
/// attempted past that point.
///
/// [`CorruptFreeList`]: BootmemError::CorruptFreeList
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BootmemError {
    /// The allocator context has not been pointed at a descriptor yet.
    #[error("boot-memory descriptor address not initialized")]
    NotInitialized,

    /// The descriptor's version field is newer than this code understands
    /// (or, for named-block operations, not the exact major they require).
    #[error("incompatible boot-memory descriptor version {major}.{minor}")]
    IncompatibleVersion { major: u32, minor: u32 },

    /// A zero byte count was passed where a real extent is required.
    #[error("zero-sized request")]
    ZeroSize,

    /// The request's address window cannot hold the request, or a freed
    /// range overlaps memory that is already free.
    #[error("request cannot be satisfied within the given address range")]
    ImpossibleRange,

    /// No free block satisfies the size/alignment/range constraints.
    #[error("no free block satisfies the request")]
    NoFreeBlock,

    /// A free-list block header failed validation while scanning.
    #[error("corrupt free list entry at {at:#x} (next {next:#x})")]
    CorruptFreeList { at: u64, next: u64 },

    /// A named block with this name already exists.
    #[error("named block already exists")]
    NameExists,

    /// Every slot in the named-block directory is occupied.
    #[error("named block directory is full")]
    DirectoryFull,

    /// No named block with the given name exists.
    #[error("named block not found")]
    NotFound,
}
