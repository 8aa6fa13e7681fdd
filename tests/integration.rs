//! End-to-end tests against hand-built minimal FAT32 images. No real disk
//! or OS driver is involved; `common::build_image` stamps a BPB (and,
//! for the MBR scenario, a covering partition table) directly into a
//! temp file.

mod common;

use fat32_engine::{Engine, Error};

#[test]
fn create_write_read_roundtrip() {
    let image = common::build_image(64, 0);
    let mut engine = Engine::mount(image.path()).expect("mount");

    let content = engine.create_object("HELLO", false, "TXT").expect("create_object");
    engine.put("", content).expect("put");

    let handle = engine.open("HELLO.TXT").expect("open");
    let payload = b"hello, fat32";
    let written = engine.write(handle, payload, 0, payload.len()).expect("write");
    assert_eq!(written, 1, "full-success write reports the §6 sentinel, not a byte count");

    let mut out = vec![0u8; payload.len()];
    let read = engine.read(handle, &mut out, 0, payload.len()).expect("read");
    assert_eq!(read, payload.len());
    assert_eq!(&out, payload);

    engine.close(handle).expect("close");
}

#[test]
fn write_spanning_multiple_clusters() {
    // One sector per cluster, 512 bytes/sector: a cluster holds exactly
    // 512 bytes, so a 1500-byte write must cross three clusters and drive
    // `FatTable::extend` at least twice.
    let image = common::build_image(64, 0);
    let mut engine = Engine::mount(image.path()).expect("mount");

    let content = engine.create_object("BIG", false, "BIN").expect("create_object");
    engine.put("", content).expect("put");

    let handle = engine.open("BIG.BIN").expect("open");
    let payload: Vec<u8> = (0..1500u32).map(|i| (i % 256) as u8).collect();
    let written = engine.write(handle, &payload, 0, payload.len()).expect("write");
    assert_eq!(written, 1, "full-success write reports the §6 sentinel, not a byte count");

    let mut out = vec![0u8; payload.len()];
    engine.read(handle, &mut out, 0, payload.len()).expect("read");
    assert_eq!(out, payload);

    let stat = engine.stat(handle).expect("stat");
    assert_eq!(stat.size as usize, payload.len());

    engine.close(handle).expect("close");
}

#[test]
fn delete_frees_cluster_for_reuse() {
    let image = common::build_image(8, 0);
    let mut engine = Engine::mount(image.path()).expect("mount");

    let content = engine.create_object("A", false, "BIN").expect("create_object A");
    engine.put("", content).expect("put A");
    engine.delete("A.BIN").expect("delete A");
    assert!(!engine.exists("A.BIN").expect("exists A"));

    // With only 8 data clusters, re-creating the same number of files
    // again only succeeds if the deleted file's cluster was actually
    // freed rather than leaked.
    for i in 0..8 {
        let name = format!("B{}", i);
        let content = engine.create_object(&name, false, "BIN").expect("create_object loop");
        engine.put("", content).expect("put loop");
    }
}

#[test]
fn duplicate_name_is_rejected() {
    let image = common::build_image(16, 0);
    let mut engine = Engine::mount(image.path()).expect("mount");

    let first = engine.create_object("DUP", false, "TXT").expect("create_object first");
    engine.put("", first).expect("put first");

    let second = engine.create_object("DUP", false, "TXT").expect("create_object second");
    let err = engine.put("", second).expect_err("duplicate put must fail");
    assert!(matches!(err, Error::Exists));
}

#[test]
fn invalid_name_is_rejected() {
    let image = common::build_image(8, 0);
    let mut engine = Engine::mount(image.path()).expect("mount");

    let err = engine.create_object("lower", false, "txt").expect_err("lowercase name must fail");
    assert!(matches!(err, Error::InvalidName(_)));
}

#[test]
fn mounts_through_an_mbr_partition_table() {
    // The BPB itself lives 63 sectors into the image; `geometry::probe`
    // must fall back from the (zeroed, non-sane) sector 0 to the MBR
    // partition entry to find it.
    let image = common::build_image(32, 63);
    let mut engine = Engine::mount(image.path()).expect("mount through MBR");

    assert_eq!(engine.geometry().boot_lba, 63);

    let content = engine.create_object("MBRTEST", false, "TXT").expect("create_object");
    engine.put("", content).expect("put");
    assert!(engine.exists("MBRTEST.TXT").expect("exists"));
}

#[test]
fn rename_then_reopen_under_new_name() {
    let image = common::build_image(16, 0);
    let mut engine = Engine::mount(image.path()).expect("mount");

    let content = engine.create_object("OLD", false, "TXT").expect("create_object");
    engine.put("", content).expect("put");

    engine.rename_meta("OLD.TXT", "NEW.TXT").expect("rename_meta");

    assert!(!engine.exists("OLD.TXT").expect("exists old"));
    assert!(engine.exists("NEW.TXT").expect("exists new"));
}
