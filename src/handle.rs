//! In-memory open handles and the fixed-size handle table.
//!
//! The table size (50) matches the original engine's `CONTENT_TABLE_SIZE`;
//! the `Option<Handle>` slot vector replaces its linear array of tagged
//! unions with a plain enum match, which is also what fixes the
//! `_unload_content_system` bug described in the design notes: releasing a
//! handle matches on `Handle`'s own variant, so a file's owned chain is
//! always freed and a directory's is never double-checked.

use crate::error::{Error, Result};
use crate::fat::{dir::DirEntry, Cluster};

pub const HANDLE_TABLE_SIZE: usize = 50;

pub type HandleId = usize;

#[derive(Debug, Clone)]
pub struct FileHandle {
    pub parent_cluster: Cluster,
    pub meta: DirEntry,
    pub chain: Vec<Cluster>,
    pub base: String,
    pub ext: String,
    /// Set when `write` updates `meta.file_size` in memory; cleared (and
    /// flushed) on close.
    pub dirty: bool,
}

#[derive(Debug, Clone)]
pub struct DirHandle {
    pub parent_cluster: Cluster,
    pub meta: DirEntry,
    pub name: String,
}

#[derive(Debug, Clone)]
pub enum Handle {
    File(FileHandle),
    Directory(DirHandle),
}

impl Handle {
    pub fn meta(&self) -> &DirEntry {
        match self {
            Handle::File(f) => &f.meta,
            Handle::Directory(d) => &d.meta,
        }
    }

    pub fn parent_cluster(&self) -> Cluster {
        match self {
            Handle::File(f) => f.parent_cluster,
            Handle::Directory(d) => d.parent_cluster,
        }
    }
}

/// A fixed-size, integer-indexed table of open handles.
pub struct HandleTable {
    slots: Vec<Option<Handle>>,
}

impl HandleTable {
    pub fn new() -> Self {
        Self { slots: vec![None; HANDLE_TABLE_SIZE].into_iter().collect() }
    }

    pub fn insert(&mut self, handle: Handle) -> Result<HandleId> {
        let slot = self.slots.iter().position(Option::is_none).ok_or(Error::TableFull)?;
        self.slots[slot] = Some(handle);
        Ok(slot)
    }

    pub fn get(&self, id: HandleId) -> Result<&Handle> {
        self.slots.get(id).and_then(Option::as_ref).ok_or(Error::NotFound)
    }

    pub fn get_mut(&mut self, id: HandleId) -> Result<&mut Handle> {
        self.slots.get_mut(id).and_then(Option::as_mut).ok_or(Error::NotFound)
    }

    /// Releases the slot and returns the handle it held, for the caller to
    /// flush and drop.
    pub fn remove(&mut self, id: HandleId) -> Result<Handle> {
        self.slots.get_mut(id).and_then(Option::take).ok_or(Error::NotFound)
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
