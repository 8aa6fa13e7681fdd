//! The `Engine`: the single owned object that replaces the original's
//! process-wide globals (open image handle, geometry record, allocation
//! hint, handle table), per the "global mutable state" design note. Every
//! public filesystem operation is a `&mut self` method, which is also what
//! enforces "two public calls must not overlap" at compile time rather
//! than at runtime (there is only ever one `&mut Engine` in scope).

use std::path::Path;

use log::{debug, warn};

use crate::block::BlockDevice;
use crate::error::{Error, Result};
use crate::fat::{cluster, dir, dir::DirEntry, Cluster, FatTable};
use crate::geometry::{self, Geometry};
use crate::handle::{DirHandle, FileHandle, Handle, HandleId, HandleTable};
use crate::name;

/// An unowned, not-yet-inserted directory entry, built by `create_object`
/// and consumed by `put`.
pub struct Content {
    pub(crate) entry: DirEntry,
}

#[derive(Debug, Clone)]
pub struct Stat {
    pub is_dir: bool,
    pub size: u32,
    pub base: String,
    pub ext: String,
    pub creation_date: u16,
    pub creation_time: u16,
    pub last_modif_date: u16,
    pub last_modif_time: u16,
}

pub struct Engine {
    dev: BlockDevice,
    geo: Geometry,
    fat: FatTable,
    handles: HandleTable,
}

impl Engine {
    /// Opens `image_path`, probes its geometry, and returns a ready-to-use
    /// engine. Corresponds to the original's `FAT_initialize`.
    pub fn mount<P: AsRef<Path>>(image_path: P) -> Result<Self> {
        let mut dev = BlockDevice::open(image_path, 512)?;
        let geo = geometry::probe(&mut dev)?;
        dev.set_bytes_per_sector(geo.bytes_per_sector);

        debug!(
            "mounted fat32 volume: bps={} spc={} clusters={} root_cluster={}",
            geo.bytes_per_sector, geo.sectors_per_cluster, geo.total_clusters, geo.root_cluster
        );

        Ok(Self { dev, geo, fat: FatTable::new(), handles: HandleTable::new() })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geo
    }

    fn split_path(path: &str) -> Vec<&str> {
        path.split('\\').filter(|s| !s.is_empty()).collect()
    }

    /// Walks `path` segment by segment from the root, validating and
    /// encoding each segment on the way. Returns the resolved entry and the
    /// cluster of the directory that contains it — the cluster entered
    /// just before the terminal segment's search, or the root cluster if
    /// the terminal segment is directly under root. This is the corrected
    /// bookkeeping the original's `FAT_change_meta` gets wrong for
    /// top-level entries.
    fn walk(&mut self, path: &str) -> Result<(DirEntry, Cluster)> {
        let segments = Self::split_path(path);
        if segments.is_empty() {
            return Err(Error::NotFound);
        }

        let mut search_cluster = self.geo.root_cluster;
        let mut parent_of_terminal = self.geo.root_cluster;
        let mut found = None;

        for (i, seg) in segments.iter().enumerate() {
            let name11 = name::encode(seg);
            let (entry, _loc) = dir::search(&mut self.dev, &self.geo, &self.fat, search_cluster, &name11)?;

            parent_of_terminal = search_cluster;

            if i + 1 < segments.len() {
                if !entry.is_dir() {
                    return Err(Error::NotADirectory);
                }
                search_cluster = entry.first_cluster();
            }

            found = Some(entry);
        }

        Ok((found.unwrap(), parent_of_terminal))
    }

    /// Resolves `path` to the cluster of the directory it names. An empty
    /// path (or one consisting only of `\`) names the root directory
    /// itself.
    fn resolve_dir_cluster(&mut self, path: &str) -> Result<Cluster> {
        if Self::split_path(path).is_empty() {
            return Ok(self.geo.root_cluster);
        }
        let (entry, _parent) = self.walk(path)?;
        if !entry.is_dir() {
            return Err(Error::NotADirectory);
        }
        Ok(entry.first_cluster())
    }

    pub fn exists(&mut self, path: &str) -> Result<bool> {
        match self.walk(path) {
            Ok(_) => Ok(true),
            Err(Error::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn open(&mut self, path: &str) -> Result<HandleId> {
        let (entry, parent_cluster) = self.walk(path)?;

        let handle = if entry.is_dir() {
            Handle::Directory(DirHandle { parent_cluster, meta: entry, name: name::decode(&entry.name11) })
        } else {
            let chain = self.fat.chain(&mut self.dev, &self.geo, entry.first_cluster())?;
            let base = trimmed(&entry.name11[0..8]);
            let ext = trimmed(&entry.name11[8..11]);
            Handle::File(FileHandle { parent_cluster, meta: entry, chain, base, ext, dirty: false })
        };

        self.handles.insert(handle)
    }

    /// Releases the slot. If the handle is a dirty file, its `file_size` is
    /// flushed back to the directory entry first — resolving the open
    /// question in favor of "yes, flush at close".
    pub fn close(&mut self, id: HandleId) -> Result<()> {
        let handle = self.handles.remove(id)?;

        if let Handle::File(f) = &handle {
            if f.dirty {
                self.flush_meta(f.parent_cluster, &f.meta)?;
            }
        }

        Ok(())
    }

    fn flush_meta(&mut self, parent_cluster: Cluster, meta: &DirEntry) -> Result<()> {
        let (_on_disk, loc) = dir::search(&mut self.dev, &self.geo, &self.fat, parent_cluster, &meta.name11)?;
        cluster::write_range(&mut self.dev, &self.geo, loc.cluster, loc.offset, &meta.to_bytes(), dir::ENTRY_SIZE)
    }

    pub fn stat(&self, id: HandleId) -> Result<Stat> {
        let handle = self.handles.get(id)?;
        let meta = handle.meta();

        let (base, ext) = match handle {
            Handle::File(f) => (f.base.clone(), f.ext.clone()),
            Handle::Directory(_) => (trimmed(&meta.name11[0..8]), trimmed(&meta.name11[8..11])),
        };

        Ok(Stat {
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.file_size },
            base,
            ext,
            creation_date: meta.creation_date,
            creation_time: meta.creation_time,
            last_modif_date: meta.last_modif_date,
            last_modif_time: meta.last_modif_time,
        })
    }

    pub fn read(&mut self, id: HandleId, buf: &mut [u8], offset: u64, len: usize) -> Result<usize> {
        let f = match self.handles.get(id)? {
            Handle::File(f) => f.clone(),
            Handle::Directory(_) => return Err(Error::NotADirectory),
        };

        let file_size = f.meta.file_size as u64;
        if offset >= file_size {
            return Ok(0);
        }

        let len = len.min((file_size - offset) as usize).min(buf.len());
        let cluster_bytes = self.geo.cluster_bytes as u64;
        let mut done = 0usize;

        while done < len {
            let pos = offset + done as u64;
            let cluster_index = (pos / cluster_bytes) as usize;
            let in_off = (pos % cluster_bytes) as u32;

            if cluster_index >= f.chain.len() {
                break;
            }

            let c = f.chain[cluster_index];
            let chunk = ((cluster_bytes as u32 - in_off) as usize).min(len - done);
            cluster::read_range(&mut self.dev, &self.geo, c, in_off, chunk as u32, &mut buf[done..done + chunk])?;
            done += chunk;
        }

        Ok(done)
    }

    pub fn write(&mut self, id: HandleId, buf: &[u8], offset: u64, len: usize) -> Result<usize> {
        let len = len.min(buf.len());
        let cluster_bytes = self.geo.cluster_bytes as u64;

        let target_end = offset + len as u64;
        let needed_clusters = if len == 0 { 0 } else { ((target_end - 1) / cluster_bytes) as usize + 1 };

        let (mut chain_len, mut tail) = match self.handles.get(id)? {
            Handle::File(f) => (
                f.chain.len(),
                *f.chain.last().ok_or(Error::BadVolume("file handle has no clusters"))?,
            ),
            Handle::Directory(_) => return Err(Error::NotADirectory),
        };

        // Grow the chain first (FAT writes precede the directory-entry
        // write that will later record the new size), collecting the new
        // clusters before touching the handle table again.
        let mut new_clusters = Vec::new();
        while chain_len < needed_clusters {
            let new_cluster = self.fat.extend(&mut self.dev, &self.geo, tail)?;
            cluster::zero_fill(&mut self.dev, &self.geo, new_cluster)?;
            new_clusters.push(new_cluster);
            tail = new_cluster;
            chain_len += 1;
        }

        if !new_clusters.is_empty() {
            if let Handle::File(f) = self.handles.get_mut(id)? {
                f.chain.extend(new_clusters);
            }
        }

        let chain = match self.handles.get(id)? {
            Handle::File(f) => f.chain.clone(),
            Handle::Directory(_) => unreachable!("checked above"),
        };

        let mut done = 0usize;
        while done < len {
            let pos = offset + done as u64;
            let cluster_index = (pos / cluster_bytes) as usize;
            let in_off = (pos % cluster_bytes) as u32;
            let c = chain[cluster_index];
            let chunk = ((cluster_bytes as u32 - in_off) as usize).min(len - done);

            cluster::write_range(&mut self.dev, &self.geo, c, in_off, &buf[done..done + chunk], chunk as u32)?;
            done += chunk;
        }

        if let Handle::File(f) = self.handles.get_mut(id)? {
            f.meta.file_size = f.meta.file_size.max((offset + done as u64) as u32);
            f.dirty = true;
        }

        // Per §6/§7: `1` is the full-success sentinel; a mid-stream I/O
        // failure instead surfaces as `Err` above, with whatever prefix
        // made it to disk already durable (the chain stays extended).
        Ok(if done == len { 1 } else { done })
    }

    /// Allocates a first cluster and builds a directory entry ready to be
    /// inserted via `put`.
    pub fn create_object(&mut self, base: &str, is_dir: bool, ext: &str) -> Result<Content> {
        let user_name = if ext.is_empty() { base.to_string() } else { format!("{}.{}", base, ext) };
        let mask = name::validate(&user_name);
        if mask != 0 {
            return Err(Error::InvalidName(mask));
        }

        let mut name11 = name::encode(&user_name);
        dir::escape_first_byte(&mut name11);

        let first_cluster = self.fat.allocate(&mut self.dev, &self.geo)?;
        cluster::zero_fill(&mut self.dev, &self.geo, first_cluster)?;

        Ok(Content { entry: DirEntry::new(name11, is_dir, first_cluster) })
    }

    /// Inserts `content` into `parent_path`, rejecting duplicates. The
    /// parent is resolved and released within this call; the single-
    /// threaded contract means the geometry it was drawn from stays valid
    /// for the remainder of the operation (the original engine relies on
    /// the same property when it closes the parent handle before
    /// inserting).
    pub fn put(&mut self, parent_path: &str, content: Content) -> Result<()> {
        let dir_cluster = self.resolve_dir_cluster(parent_path)?;

        if dir::exists(&mut self.dev, &self.geo, &self.fat, dir_cluster, &content.entry.name11)? {
            return Err(Error::Exists);
        }

        dir::insert(&mut self.dev, &self.geo, &mut self.fat, dir_cluster, content.entry)
    }

    /// Frees every cluster in the target's chain, then marks its directory
    /// entry free.
    pub fn delete(&mut self, path: &str) -> Result<()> {
        let (entry, parent_cluster) = self.walk(path)?;

        let chain = self.fat.chain(&mut self.dev, &self.geo, entry.first_cluster())?;
        for c in &chain {
            self.fat.free(&mut self.dev, &self.geo, *c)?;
        }

        dir::mark_free(&mut self.dev, &self.geo, &self.fat, parent_cluster, &entry.name11)
    }

    /// Renames the entry at `path` to `new_name`, validating and encoding
    /// it first.
    pub fn rename_meta(&mut self, path: &str, new_name: &str) -> Result<()> {
        let mask = name::validate(new_name);
        if mask != 0 {
            return Err(Error::InvalidName(mask));
        }

        let mut new_name11 = name::encode(new_name);
        dir::escape_first_byte(&mut new_name11);

        let (entry, parent_cluster) = self.walk(path)?;
        if entry.name11 == new_name11 {
            warn!("rename_meta called with a name identical to the current one");
        }

        dir::rename(&mut self.dev, &self.geo, &self.fat, parent_cluster, &entry.name11, &new_name11)
    }
}

fn trimmed(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == b' ').unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
