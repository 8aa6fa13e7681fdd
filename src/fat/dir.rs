//! Directory entries and the directory engine: search, insert, rename, and
//! free-mark over a stream of 32-byte entries laid across a cluster chain.
//!
//! The entry layout and the `from_arr`/field-offset parsing style are
//! grounded on the teacher's `fat/dir.rs` (`DirEntry`, `Attribute`,
//! `AttributeSet`); the walk itself is rewritten from the teacher's
//! `DirIter` (and from `original_source/src/fat.c`'s recursive
//! `_directory_search`/`_directory_add`/`_directory_remove`) into a fully
//! iterative cluster-by-cluster, entry-by-entry scan, per the "recursive to
//! iterative" design note.

use crate::block::BlockDevice;
use crate::error::{Error, Result};
use crate::fat::{cluster, Cluster, FatTable};
use crate::geometry::Geometry;
use crate::{dtime, name};

pub const ENTRY_SIZE: u32 = 32;

pub const ATTR_READ_ONLY: u8 = 0x01;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_SYSTEM: u8 = 0x04;
pub const ATTR_VOLUME_ID: u8 = 0x08;
pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_ARCHIVE: u8 = 0x20;

const LFN_MASK: u8 = ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_VOLUME_ID;

const FIRST_BYTE_END: u8 = 0x00;
const FIRST_BYTE_DELETED: u8 = 0xE5;
/// Literal `0xE5` as the first character of a name (Japanese collation
/// escape), stored on disk as `0x05` so it is not confused with a deleted
/// slot.
const FIRST_BYTE_ESCAPE: u8 = 0x05;

/// A 32-byte on-disk directory entry, field-parsed explicitly rather than
/// overlaid on a packed struct (per the "raw structure overlay" design
/// note).
#[derive(Debug, Clone, Copy)]
pub struct DirEntry {
    pub name11: [u8; 11],
    pub attributes: u8,
    pub creation_tenths: u8,
    pub creation_time: u16,
    pub creation_date: u16,
    pub last_access_date: u16,
    pub cluster_high: u16,
    pub last_modif_time: u16,
    pub last_modif_date: u16,
    pub cluster_low: u16,
    pub file_size: u32,
}

impl DirEntry {
    pub fn from_bytes(raw: &[u8]) -> Self {
        debug_assert_eq!(raw.len(), ENTRY_SIZE as usize);
        Self {
            name11: raw[0..11].try_into().unwrap(),
            attributes: raw[11],
            creation_tenths: raw[13],
            creation_time: u16::from_le_bytes(raw[14..16].try_into().unwrap()),
            creation_date: u16::from_le_bytes(raw[16..18].try_into().unwrap()),
            last_access_date: u16::from_le_bytes(raw[18..20].try_into().unwrap()),
            cluster_high: u16::from_le_bytes(raw[20..22].try_into().unwrap()),
            last_modif_time: u16::from_le_bytes(raw[22..24].try_into().unwrap()),
            last_modif_date: u16::from_le_bytes(raw[24..26].try_into().unwrap()),
            cluster_low: u16::from_le_bytes(raw[26..28].try_into().unwrap()),
            file_size: u32::from_le_bytes(raw[28..32].try_into().unwrap()),
        }
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE as usize] {
        let mut out = [0u8; ENTRY_SIZE as usize];
        out[0..11].copy_from_slice(&self.name11);
        out[11] = self.attributes;
        out[12] = 0;
        out[13] = self.creation_tenths;
        out[14..16].copy_from_slice(&self.creation_time.to_le_bytes());
        out[16..18].copy_from_slice(&self.creation_date.to_le_bytes());
        out[18..20].copy_from_slice(&self.last_access_date.to_le_bytes());
        out[20..22].copy_from_slice(&self.cluster_high.to_le_bytes());
        out[22..24].copy_from_slice(&self.last_modif_time.to_le_bytes());
        out[24..26].copy_from_slice(&self.last_modif_date.to_le_bytes());
        out[26..28].copy_from_slice(&self.cluster_low.to_le_bytes());
        out[28..32].copy_from_slice(&self.file_size.to_le_bytes());
        out
    }

    pub fn empty() -> Self {
        Self {
            name11: [0u8; 11],
            attributes: 0,
            creation_tenths: 0,
            creation_time: 0,
            creation_date: 0,
            last_access_date: 0,
            cluster_high: 0,
            last_modif_time: 0,
            last_modif_date: 0,
            cluster_low: 0,
            file_size: 0,
        }
    }

    pub fn new(name11: [u8; 11], is_dir: bool, first_cluster: Cluster) -> Self {
        let now_date = dtime::now_date();
        let now_time = dtime::now_time();
        Self {
            name11,
            attributes: if is_dir { ATTR_DIRECTORY } else { ATTR_ARCHIVE },
            creation_tenths: 0,
            creation_time: now_time,
            creation_date: now_date,
            last_access_date: now_date,
            cluster_high: (first_cluster >> 16) as u16,
            last_modif_time: now_time,
            last_modif_date: now_date,
            cluster_low: first_cluster as u16,
            file_size: 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.attributes & ATTR_DIRECTORY != 0
    }

    pub fn is_lfn_fragment(&self) -> bool {
        self.attributes & LFN_MASK == LFN_MASK
    }

    pub fn first_cluster(&self) -> Cluster {
        ((self.cluster_high as u32) << 16) | self.cluster_low as u32
    }

    pub fn set_first_cluster(&mut self, c: Cluster) {
        self.cluster_high = (c >> 16) as u16;
        self.cluster_low = c as u16;
    }

    fn first_byte(&self) -> u8 {
        self.name11[0]
    }

    fn is_end(&self) -> bool {
        self.first_byte() == FIRST_BYTE_END
    }

    fn is_deleted(&self) -> bool {
        self.first_byte() == FIRST_BYTE_DELETED
    }

    fn is_dot_entry(&self) -> bool {
        &self.name11[..1] == b"." || &self.name11[..2] == b".."
    }
}

/// Location of a found directory entry: the cluster it lives in and its
/// byte offset within that cluster.
#[derive(Debug, Clone, Copy)]
pub struct EntryLocation {
    pub cluster: Cluster,
    pub offset: u32,
}

/// Walks cluster-by-cluster, entry-by-entry, calling `f` for every live
/// (non-deleted, non-LFN-fragment, non-dot) entry. `f` returning `true`
/// stops the walk and yields that entry's location. A first byte of
/// `0x00` ends the walk.
fn walk_entries(
    dev: &mut BlockDevice,
    geo: &Geometry,
    fat: &FatTable,
    first_cluster: Cluster,
    mut f: impl FnMut(&DirEntry) -> bool,
) -> Result<Option<(DirEntry, EntryLocation)>> {
    let mut current = first_cluster;
    let mut visited = vec![current];

    loop {
        let mut offset = 0u32;
        while offset < geo.cluster_bytes {
            let mut raw = [0u8; ENTRY_SIZE as usize];
            cluster::read_range(dev, geo, current, offset, ENTRY_SIZE, &mut raw)?;
            let entry = DirEntry::from_bytes(&raw);

            if entry.is_end() {
                return Ok(None);
            }

            if !entry.is_deleted() && !entry.is_lfn_fragment() && !entry.is_dot_entry() && f(&entry) {
                return Ok(Some((entry, EntryLocation { cluster: current, offset })));
            }

            offset += ENTRY_SIZE;
        }

        match crate::fat::classify(fat.read_fat(dev, geo, current)?) {
            crate::fat::Entry::Next(next) => {
                if visited.contains(&next) {
                    return Err(Error::BadVolume("chain cycle detected while walking a directory"));
                }
                visited.push(next);
                current = next;
            }
            crate::fat::Entry::End => return Ok(None),
            _ => return Err(Error::BadVolume("directory chain led to a non-live cluster")),
        }
    }
}

/// Search a directory for an entry whose raw 11-byte name matches
/// `name11`.
pub fn search(
    dev: &mut BlockDevice,
    geo: &Geometry,
    fat: &FatTable,
    first_cluster: Cluster,
    name11: &[u8; 11],
) -> Result<(DirEntry, EntryLocation)> {
    walk_entries(dev, geo, fat, first_cluster, |e| &e.name11 == name11)?.ok_or(Error::NotFound)
}

pub fn exists(dev: &mut BlockDevice, geo: &Geometry, fat: &FatTable, first_cluster: Cluster, name11: &[u8; 11]) -> Result<bool> {
    match search(dev, geo, fat, first_cluster, name11) {
        Ok(_) => Ok(true),
        Err(Error::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Find the first slot whose first byte is `0x00` or `0xE5`; extends the
/// chain by one zero-filled cluster if no free slot exists. Stamps the
/// entry's timestamps and writes it into that slot.
pub fn insert(
    dev: &mut BlockDevice,
    geo: &Geometry,
    fat: &mut FatTable,
    first_cluster: Cluster,
    mut entry: DirEntry,
) -> Result<()> {
    let now_date = dtime::now_date();
    let now_time = dtime::now_time();
    entry.creation_date = now_date;
    entry.creation_time = now_time;
    entry.creation_tenths = 0;
    entry.last_access_date = now_date;
    entry.last_modif_date = now_date;
    entry.last_modif_time = now_time;

    let mut current = first_cluster;
    loop {
        let mut offset = 0u32;
        while offset < geo.cluster_bytes {
            let mut raw = [0u8; ENTRY_SIZE as usize];
            cluster::read_range(dev, geo, current, offset, ENTRY_SIZE, &mut raw)?;
            let slot = DirEntry::from_bytes(&raw);

            if slot.is_end() || slot.is_deleted() {
                cluster::write_range(dev, geo, current, offset, &entry.to_bytes(), ENTRY_SIZE)?;

                // If we consumed the terminating slot, stamp a fresh
                // terminator right after it (when there's room left).
                if slot.is_end() && offset + ENTRY_SIZE < geo.cluster_bytes {
                    cluster::write_range(dev, geo, current, offset + ENTRY_SIZE, &DirEntry::empty().to_bytes(), ENTRY_SIZE)?;
                }
                return Ok(());
            }

            offset += ENTRY_SIZE;
        }

        match crate::fat::classify(fat.read_fat(dev, geo, current)?) {
            crate::fat::Entry::Next(next) => current = next,
            crate::fat::Entry::End => {
                let new_cluster = fat.extend(dev, geo, current)?;
                cluster::zero_fill(dev, geo, new_cluster)?;
                cluster::write_range(dev, geo, new_cluster, 0, &entry.to_bytes(), ENTRY_SIZE)?;
                return Ok(());
            }
            _ => return Err(Error::BadVolume("directory chain led to a non-live cluster during insert")),
        }
    }
}

/// Searches for `old_name11`; on a hit, stamps access/modification times,
/// overwrites the 11-byte name, and writes the cluster back.
pub fn rename(
    dev: &mut BlockDevice,
    geo: &Geometry,
    fat: &FatTable,
    first_cluster: Cluster,
    old_name11: &[u8; 11],
    new_name11: &[u8; 11],
) -> Result<()> {
    let (mut entry, loc) = search(dev, geo, fat, first_cluster, old_name11)?;

    entry.name11 = *new_name11;
    entry.last_access_date = dtime::now_date();
    entry.last_modif_date = dtime::now_date();
    entry.last_modif_time = dtime::now_time();

    cluster::write_range(dev, geo, loc.cluster, loc.offset, &entry.to_bytes(), ENTRY_SIZE)
}

/// Searches for `name11`; on a hit, sets its first byte to `0xE5` and
/// writes the cluster back. Does not touch the removed entry's cluster
/// chain; that is the caller's job via the FAT engine.
pub fn mark_free(dev: &mut BlockDevice, geo: &Geometry, fat: &FatTable, first_cluster: Cluster, name11: &[u8; 11]) -> Result<()> {
    let (mut entry, loc) = search(dev, geo, fat, first_cluster, name11)?;
    entry.name11[0] = FIRST_BYTE_DELETED;
    cluster::write_range(dev, geo, loc.cluster, loc.offset, &entry.to_bytes(), ENTRY_SIZE)
}

/// Translate a decoded literal first byte `0xE5` in a user-chosen name back
/// into the on-disk escape `0x05`, so a legitimate name starting with the
/// Japanese-collation character is not mistaken for a deleted slot.
pub fn escape_first_byte(name11: &mut [u8; 11]) {
    if name11[0] == FIRST_BYTE_DELETED {
        name11[0] = FIRST_BYTE_ESCAPE;
    }
}

pub use name::{decode as decode_name, encode as encode_name, validate as validate_name};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_entry_roundtrip() {
        let e = DirEntry::new(*b"ASD     TXT", false, 5);
        let bytes = e.to_bytes();
        let back = DirEntry::from_bytes(&bytes);
        assert_eq!(back.name11, e.name11);
        assert_eq!(back.first_cluster(), 5);
        assert!(!back.is_dir());
    }

    #[test]
    fn lfn_fragment_mask() {
        let mut e = DirEntry::empty();
        e.attributes = ATTR_READ_ONLY | ATTR_HIDDEN | ATTR_SYSTEM | ATTR_VOLUME_ID;
        assert!(e.is_lfn_fragment());
    }

    #[test]
    fn escape_first_byte_guards_deleted_sentinel() {
        let mut name = *b"\xE5BC        ";
        escape_first_byte(&mut name);
        assert_eq!(name[0], FIRST_BYTE_ESCAPE);
    }
}
