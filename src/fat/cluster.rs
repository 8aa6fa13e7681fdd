//! Translating (cluster, in-cluster offset, length) into absolute LBA
//! ranges and performing the actual reads/writes.
//!
//! Grounded on the teacher's `fat/table.rs` range-math helpers
//! (`cluster_to_sector_range`).

use crate::block::BlockDevice;
use crate::error::Result;
use crate::fat::Cluster;
use crate::geometry::Geometry;

pub fn cluster_lba(geo: &Geometry, cluster: Cluster) -> u64 {
    geo.first_data_sector + (cluster as u64 - crate::fat::FIRST_CLUSTER as u64) * geo.sectors_per_cluster as u64
}

/// Reads `len` bytes starting `in_off` bytes into cluster `c`. Requires
/// `in_off + len <= cluster_bytes`.
pub fn read_range(dev: &mut BlockDevice, geo: &Geometry, c: Cluster, in_off: u32, len: u32, buf: &mut [u8]) -> Result<()> {
    debug_assert!(in_off + len <= geo.cluster_bytes);
    let lba = cluster_lba(geo, c);
    dev.read_at(lba, in_off as u64, geo.sectors_per_cluster, &mut buf[..len as usize])
}

/// Writes `len` bytes of `buf` starting `in_off` bytes into cluster `c`.
pub fn write_range(dev: &mut BlockDevice, geo: &Geometry, c: Cluster, in_off: u32, buf: &[u8], len: u32) -> Result<()> {
    debug_assert!(in_off + len <= geo.cluster_bytes);
    let lba = cluster_lba(geo, c);
    dev.write_at(lba, &buf[..len as usize], geo.sectors_per_cluster, in_off as u64, len as u64)
}

/// Zero-fills an entire cluster. Used when a new cluster is added to a
/// chain, so readers at offsets within the allocated-but-unwritten tail see
/// zeros rather than stale disk content.
pub fn zero_fill(dev: &mut BlockDevice, geo: &Geometry, c: Cluster) -> Result<()> {
    let zeros = vec![0u8; geo.cluster_bytes as usize];
    write_range(dev, geo, c, 0, &zeros, geo.cluster_bytes)
}
