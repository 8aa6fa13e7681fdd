//! Error taxonomy for the engine, in place of the original's small negative
//! integer codes and the teacher's bare `Result<(), ()>`.

use thiserror::Error;

/// Crate-wide result alias used by every public function signature.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Block read/write failed, short read, or interrupted beyond retries.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// BPB failed sanity checks, unsupported FAT12/FAT16, or a corrupt chain
    /// (BAD cluster in a live chain, or a chain cycle).
    #[error("bad volume: {0}")]
    BadVolume(&'static str),

    /// A path segment did not resolve.
    #[error("not found")]
    NotFound,

    /// A path walk or `put` found a file where a directory was required.
    #[error("not a directory")]
    NotADirectory,

    /// `put` found a duplicate name in the parent directory.
    #[error("already exists")]
    Exists,

    /// Name did not fit 8.3 or contained forbidden characters.
    #[error("invalid name (issue mask {0:#04x})")]
    InvalidName(u8),

    /// The handle table is full.
    #[error("handle table full")]
    TableFull,

    /// The allocator found no free cluster after a full wrapped scan.
    #[error("volume full")]
    VolumeFull,

    /// Memory allocation failed inside the engine.
    #[error("out of memory")]
    Oom,
}
