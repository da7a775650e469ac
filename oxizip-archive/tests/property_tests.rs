//! Property tests for archive round trips.

use oxizip_archive::zip::{MemoryIo, Mode, Zip, ZipFlags, ZipReader, ZipWriter};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn entries() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(
        "[a-z]{1,8}(/[a-z0-9]{1,8}){0,2}\\.(txt|bin)",
        prop::collection::vec(any::<u8>(), 0..2048),
        1..12,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_archive_roundtrip(files in entries(), level in 0u8..=10) {
        let mut writer = ZipWriter::new(MemoryIo::new());
        for (name, data) in &files {
            writer.add_mem(name, data, level).unwrap();
        }
        writer.finalize().unwrap();

        let reader = ZipReader::new(writer.into_inner(), ZipFlags::NONE).unwrap();
        prop_assert_eq!(reader.total_entries(), files.len());
        for (name, data) in &files {
            let index = reader.locate(&name.to_uppercase(), None, ZipFlags::NONE);
            prop_assert!(index.is_some());
            prop_assert_eq!(&reader.extract_to_vec(index.unwrap(), ZipFlags::NONE).unwrap(), data);
        }
    }

    #[test]
    fn prop_streamed_entry_matches_data(
        data in prop::collection::vec(any::<u8>(), 0..20_000),
        pieces in 1usize..16,
        level in 0u8..=9,
    ) {
        let mut zip = Zip::open(MemoryIo::new(), level, Mode::Write).unwrap();
        zip.entry_open("stream.bin").unwrap();
        let step = data.len() / pieces + 1;
        for chunk in data.chunks(step) {
            zip.entry_write(chunk).unwrap();
        }
        zip.entry_close().unwrap();

        let mut zip = Zip::open(zip.close().unwrap(), 0, Mode::Read).unwrap();
        zip.entry_open("stream.bin").unwrap();
        prop_assert_eq!(zip.entry_size().unwrap(), data.len() as u64);
        prop_assert_eq!(zip.entry_read().unwrap(), data);
    }
}
