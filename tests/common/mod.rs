//! Hand-built minimal FAT32 images for the integration tests. Field offsets
//! mirror `src/geometry.rs`'s `RawBpb::read`; FAT entry offsets mirror
//! `src/fat/mod.rs`'s `FatTable::entry_location`.

use std::io::Write;

use tempfile::NamedTempFile;

pub const BYTES_PER_SECTOR: u32 = 512;
pub const SECTORS_PER_CLUSTER: u32 = 1;
pub const RESERVED_SECTORS: u32 = 32;
pub const FAT_COUNT: u32 = 2;
pub const ROOT_CLUSTER: u32 = 2;

const ENTRY_END: u32 = 0x0FFF_FFFF;

fn fat_size_sectors(total_clusters: u32) -> u32 {
    let entries = total_clusters + 2;
    let bytes = entries as u64 * 4;
    ((bytes + BYTES_PER_SECTOR as u64 - 1) / BYTES_PER_SECTOR as u64) as u32
}

/// Writes `value`'s low 28 bits into both FAT copies at `cluster`, leaving
/// the reserved top nibble untouched (it's zero in a freshly built image).
fn set_fat_entry(buf: &mut [u8], fat_size: u32, cluster: u32, value: u32) {
    let fat0_start = (RESERVED_SECTORS * BYTES_PER_SECTOR) as usize;
    let fat1_start = fat0_start + (fat_size * BYTES_PER_SECTOR) as usize;
    let entry_offset = (cluster * 4) as usize;

    for base in [fat0_start, fat1_start] {
        let at = base + entry_offset;
        buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
}

/// Builds a zeroed, formatted-looking FAT32 volume with `total_clusters`
/// data clusters and an empty root directory occupying exactly cluster 2.
/// `boot_lba` is 0 for a directly-addressable volume, or nonzero to also
/// stamp a covering MBR partition entry in front of it (the "MBR-wrapped"
/// scenario).
pub fn build_image(total_clusters: u32, boot_lba: u32) -> NamedTempFile {
    let fat_size = fat_size_sectors(total_clusters);
    let data_sectors = total_clusters * SECTORS_PER_CLUSTER;
    let volume_sectors = RESERVED_SECTORS + FAT_COUNT * fat_size + data_sectors;
    let total_sectors = boot_lba + volume_sectors;

    let mut image = vec![0u8; total_sectors as usize * BYTES_PER_SECTOR as usize];

    let bpb_at = boot_lba as usize * BYTES_PER_SECTOR as usize;
    let bpb = &mut image[bpb_at..bpb_at + BYTES_PER_SECTOR as usize];
    bpb[11..13].copy_from_slice(&(BYTES_PER_SECTOR as u16).to_le_bytes());
    bpb[13] = SECTORS_PER_CLUSTER as u8;
    bpb[14..16].copy_from_slice(&(RESERVED_SECTORS as u16).to_le_bytes());
    bpb[16] = FAT_COUNT as u8;
    bpb[19..21].copy_from_slice(&0u16.to_le_bytes());
    bpb[22..24].copy_from_slice(&0u16.to_le_bytes());
    bpb[32..36].copy_from_slice(&volume_sectors.to_le_bytes());
    bpb[36..40].copy_from_slice(&fat_size.to_le_bytes());
    bpb[44..48].copy_from_slice(&ROOT_CLUSTER.to_le_bytes());

    if boot_lba != 0 {
        image[510..512].copy_from_slice(&[0x55, 0xAA]);
        let entry_at = 446;
        image[entry_at + 4] = 0x0C; // FAT32 LBA partition type
        image[entry_at + 8..entry_at + 12].copy_from_slice(&boot_lba.to_le_bytes());
    }

    let fat_region = &mut image[bpb_at..];
    set_fat_entry(fat_region, fat_size, ROOT_CLUSTER, ENTRY_END);

    let mut file = NamedTempFile::new().expect("create temp image");
    file.write_all(&image).expect("write temp image");
    file.flush().expect("flush temp image");
    file
}
