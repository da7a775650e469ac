//! Round trips through the ZIP writer and reader, plus damaged archives.

use oxizip_archive::zip::header::{EOCD_SIZE, LOCAL_HEADER_SIZE, METHOD_DEFLATED, METHOD_STORED};
use oxizip_archive::zip::{
    EntryOptions, MemoryIo, ZipFlags, ZipIo, ZipReader, ZipWriter, read_zip, write_zip,
};
use oxizip_core::error::OxiZipError;

fn pseudo_random(size: usize, mut seed: u32) -> Vec<u8> {
    (0..size)
        .map(|_| {
            seed = seed.wrapping_mul(1103515245).wrapping_add(12345);
            (seed >> 16) as u8
        })
        .collect()
}

/// Archive with `a.txt` and `dir/b.bin`.
fn two_entry_archive() -> (Vec<u8>, Vec<u8>) {
    let random = pseudo_random(1000, 42);
    let mut writer = write_zip();
    writer.add_mem("a.txt", b"hello", 6).unwrap();
    writer.add_mem("dir/b.bin", &random, 6).unwrap();
    writer.finalize().unwrap();
    (writer.into_inner().into_inner(), random)
}

fn data_offset(reader: &ZipReader<MemoryIo>, index: usize) -> usize {
    let stat = reader.file_stat(index).unwrap();
    stat.local_header_offset as usize + LOCAL_HEADER_SIZE + stat.name.len()
}

#[test]
fn test_two_entry_roundtrip() {
    let (bytes, random) = two_entry_archive();
    let reader = read_zip(bytes).unwrap();
    assert_eq!(reader.total_entries(), 2);

    assert_eq!(reader.file_name(0).unwrap(), "a.txt");
    assert_eq!(reader.file_name(1).unwrap(), "dir/b.bin");
    assert_eq!(reader.extract_to_vec(0, ZipFlags::NONE).unwrap(), b"hello");
    assert_eq!(reader.extract_to_vec(1, ZipFlags::NONE).unwrap(), random);
    assert_eq!(
        reader.extract_file_to_vec("dir/b.bin", ZipFlags::NONE).unwrap(),
        random
    );

    let stat = reader.file_stat(0).unwrap();
    assert_eq!(stat.uncompressed_size, 5);
    assert_eq!(stat.crc32, 0x3610_A686);
    assert_eq!(stat.method, METHOD_DEFLATED);
    assert!(stat.is_supported);
    assert!(!stat.is_directory);
    reader.validate().unwrap();
}

#[test]
fn test_locate_case_folding() {
    let (bytes, _) = two_entry_archive();
    let reader = read_zip(bytes).unwrap();

    assert_eq!(reader.locate("A.TXT", None, ZipFlags::NONE), Some(0));
    assert_eq!(reader.locate("a.txt", None, ZipFlags::CASE_SENSITIVE), Some(0));
    assert_eq!(reader.locate("A.TXT", None, ZipFlags::CASE_SENSITIVE), None);
    assert_eq!(reader.locate("Dir/B.Bin", None, ZipFlags::NONE), Some(1));
    assert_eq!(reader.locate("missing", None, ZipFlags::NONE), None);
    assert_eq!(reader.locate("", None, ZipFlags::NONE), None);
}

#[test]
fn test_locate_ignore_path() {
    let (bytes, _) = two_entry_archive();
    let reader = read_zip(bytes).unwrap();
    assert_eq!(reader.locate("B.BIN", None, ZipFlags::IGNORE_PATH), Some(1));
    assert_eq!(reader.locate("dir/b.bin", None, ZipFlags::IGNORE_PATH), None);
    assert_eq!(
        reader.locate("B.BIN", None, ZipFlags::IGNORE_PATH | ZipFlags::CASE_SENSITIVE),
        None
    );
}

#[test]
fn test_unsorted_directory_still_locates() {
    let (bytes, _) = two_entry_archive();
    let reader = ZipReader::new(
        MemoryIo::from_vec(bytes),
        ZipFlags::DO_NOT_SORT_CENTRAL_DIRECTORY,
    )
    .unwrap();
    assert_eq!(reader.locate("DIR/B.BIN", None, ZipFlags::NONE), Some(1));
}

#[test]
fn test_sorted_lookup_many_entries() {
    let mut writer = write_zip();
    let names: Vec<String> = (0..300).rev().map(|i| format!("File{i:03}.TXT")).collect();
    for name in &names {
        writer.add_mem(name, name.as_bytes(), 1).unwrap();
    }
    writer.finalize().unwrap();

    let reader = read_zip(writer.into_inner().into_inner()).unwrap();
    for (index, name) in names.iter().enumerate() {
        assert_eq!(reader.locate(&name.to_lowercase(), None, ZipFlags::NONE), Some(index));
    }
}

#[test]
fn test_byte_flip_fails_extraction() {
    let (bytes, _) = two_entry_archive();
    let reader = read_zip(bytes.clone()).unwrap();
    let stat = reader.file_stat(1).unwrap();
    let target = data_offset(&reader, 1) + stat.compressed_size as usize / 2;

    let mut damaged = bytes;
    damaged[target] ^= 0x01;
    let reader = read_zip(damaged).unwrap();
    assert!(reader.extract_to_vec(1, ZipFlags::NONE).is_err());
    assert!(reader.validate().is_err());
    // The other entry is untouched.
    assert_eq!(reader.extract_to_vec(0, ZipFlags::NONE).unwrap(), b"hello");
}

#[test]
fn test_stored_byte_flip_is_crc_mismatch() {
    let mut writer = write_zip();
    writer.add_mem("plain.txt", b"stored bytes", 0).unwrap();
    writer.finalize().unwrap();
    let mut bytes = writer.into_inner().into_inner();

    let reader = read_zip(bytes.clone()).unwrap();
    assert_eq!(reader.file_stat(0).unwrap().method, METHOD_STORED);
    let target = data_offset(&reader, 0) + 3;
    bytes[target] ^= 0x20;

    let reader = read_zip(bytes).unwrap();
    assert!(matches!(
        reader.extract_to_vec(0, ZipFlags::NONE),
        Err(OxiZipError::CrcMismatch { .. })
    ));
    let mut buf = [0u8; 64];
    assert!(matches!(
        reader.extract_to_buffer(0, &mut buf, ZipFlags::NONE),
        Err(OxiZipError::CrcMismatch { .. })
    ));
    // Raw access skips the check.
    assert_eq!(
        reader.extract_to_vec(0, ZipFlags::COMPRESSED_DATA).unwrap(),
        b"stoRed bytes"
    );
}

#[test]
fn test_append_third_entry() {
    let (bytes, random) = two_entry_archive();
    let reader = read_zip(bytes).unwrap();
    let old_cd = reader.central_dir_offset();

    let mut writer = reader.into_writer().unwrap();
    assert_eq!(writer.total_entries(), 2);
    assert_eq!(writer.archive_size(), old_cd);
    writer.add_mem("c/third.txt", b"third entry, appended", 6).unwrap();
    writer.finalize().unwrap();

    let reader = ZipReader::new(writer.into_inner(), ZipFlags::NONE).unwrap();
    assert_eq!(reader.total_entries(), 3);
    assert_eq!(reader.extract_to_vec(0, ZipFlags::NONE).unwrap(), b"hello");
    assert_eq!(reader.extract_to_vec(1, ZipFlags::NONE).unwrap(), random);
    assert_eq!(
        reader.extract_file_to_vec("C/THIRD.TXT", ZipFlags::NONE).unwrap(),
        b"third entry, appended"
    );
    // The new entry starts where the old directory was.
    assert_eq!(reader.file_stat(2).unwrap().local_header_offset, old_cd);
    reader.validate().unwrap();
}

#[test]
fn test_extract_to_buffer() {
    let (bytes, random) = two_entry_archive();
    let reader = read_zip(bytes).unwrap();

    let mut buf = vec![0u8; 2000];
    let n = reader.extract_to_buffer(1, &mut buf, ZipFlags::NONE).unwrap();
    assert_eq!(&buf[..n], &random[..]);

    let mut small = [0u8; 999];
    assert!(matches!(
        reader.extract_to_buffer(1, &mut small, ZipFlags::NONE),
        Err(OxiZipError::BufferTooSmall {
            needed: 1000,
            available: 999
        })
    ));
}

#[test]
fn test_extract_to_writer_and_callback() {
    let data = "streamed line\n".repeat(10_000).into_bytes();
    let mut writer = write_zip();
    writer.add_mem("big.txt", &data, 9).unwrap();
    writer.finalize().unwrap();
    let reader = read_zip(writer.into_inner().into_inner()).unwrap();

    let mut out = Vec::new();
    reader.extract_to_writer(0, &mut out, ZipFlags::NONE).unwrap();
    assert_eq!(out, data);

    let mut chunks = 0;
    let mut total = 0u64;
    reader
        .extract_to_callback(0, ZipFlags::NONE, |offset, chunk| {
            assert_eq!(offset, total);
            total += chunk.len() as u64;
            chunks += 1;
            Ok(())
        })
        .unwrap();
    assert_eq!(total, data.len() as u64);
    assert!(chunks > 1);
}

#[test]
fn test_raw_copy_between_archives() {
    let (bytes, random) = two_entry_archive();
    let source = read_zip(bytes).unwrap();
    let stat = source.file_stat(1).unwrap();
    let raw = source.extract_to_vec(1, ZipFlags::COMPRESSED_DATA).unwrap();
    assert_eq!(raw.len() as u64, stat.compressed_size);

    let mut writer = write_zip();
    let options = EntryOptions {
        level: 6,
        flags: ZipFlags::COMPRESSED_DATA,
        uncompressed_size: stat.uncompressed_size,
        crc32: stat.crc32,
        ..EntryOptions::default()
    };
    writer.add_mem_ex(&stat.name, &raw, &options).unwrap();
    writer.finalize().unwrap();

    let copy = read_zip(writer.into_inner().into_inner()).unwrap();
    assert_eq!(copy.extract_to_vec(0, ZipFlags::NONE).unwrap(), random);
}

#[test]
fn test_archive_comment_is_found() {
    let (mut bytes, _) = two_entry_archive();
    let comment = b"archive comment ".repeat(400);
    let len_at = bytes.len() - EOCD_SIZE + 20;
    bytes[len_at..len_at + 2].copy_from_slice(&(comment.len() as u16).to_le_bytes());
    bytes.extend_from_slice(&comment);

    let reader = read_zip(bytes).unwrap();
    assert_eq!(reader.comment(), &comment[..]);
    assert_eq!(reader.total_entries(), 2);
    reader.validate().unwrap();
}

#[test]
fn test_missing_end_record() {
    let (bytes, _) = two_entry_archive();
    let truncated = bytes[..bytes.len() - 10].to_vec();
    assert!(matches!(
        read_zip(truncated),
        Err(OxiZipError::Corrupted { .. })
    ));
    assert!(read_zip(vec![0u8; 10]).is_err());
    assert!(read_zip(vec![0u8; 100_000]).is_err());
}

#[test]
fn test_zip64_locator_unsupported() {
    let mut writer = write_zip();
    writer.finalize().unwrap();
    let eocd = writer.into_inner().into_inner();

    let mut bytes = vec![0u8; 20];
    bytes[..4].copy_from_slice(&0x0706_4B50u32.to_le_bytes());
    bytes.extend_from_slice(&eocd);

    assert!(matches!(
        read_zip(bytes),
        Err(OxiZipError::Unsupported { .. })
    ));
}

#[test]
fn test_multi_disk_unsupported() {
    let (mut bytes, _) = two_entry_archive();
    let disk_at = bytes.len() - EOCD_SIZE + 4;
    bytes[disk_at] = 1;
    assert!(matches!(
        read_zip(bytes),
        Err(OxiZipError::Unsupported { .. })
    ));
}

#[test]
fn test_encrypted_entry_unsupported() {
    let (mut bytes, _) = two_entry_archive();
    let cd_offset = read_zip(bytes.clone()).unwrap().central_dir_offset() as usize;
    bytes[cd_offset + 8] |= 0x01;
    assert!(matches!(
        read_zip(bytes),
        Err(OxiZipError::Unsupported { .. })
    ));
}

#[test]
fn test_patch_entry_unsupported() {
    let (mut bytes, _) = two_entry_archive();
    let cd_offset = read_zip(bytes.clone()).unwrap().central_dir_offset() as usize;
    bytes[cd_offset + 8] |= 0x20;
    assert!(matches!(
        read_zip(bytes),
        Err(OxiZipError::Unsupported { .. })
    ));
}

#[test]
fn test_local_header_mismatch_is_corrupted() {
    let (mut bytes, _) = two_entry_archive();
    // Method field of the first local header.
    bytes[8] = 0;
    let reader = read_zip(bytes).unwrap();
    assert!(matches!(
        reader.extract_to_vec(0, ZipFlags::NONE),
        Err(OxiZipError::Corrupted { .. })
    ));
}

#[test]
fn test_local_name_mismatch_is_corrupted() {
    let (mut bytes, _) = two_entry_archive();
    // First byte of "a.txt" in the local header.
    bytes[LOCAL_HEADER_SIZE] = b'z';
    let reader = read_zip(bytes).unwrap();
    assert!(matches!(
        reader.extract_to_vec(0, ZipFlags::NONE),
        Err(OxiZipError::Corrupted { .. })
    ));
    assert!(reader.validate_entry(0).is_err());
    assert_eq!(reader.extract_to_vec(1, ZipFlags::NONE).unwrap().len(), 1000);
}

#[test]
fn test_local_crc_and_size_mismatch_is_corrupted() {
    for at in [14, 18, 22] {
        let (mut bytes, _) = two_entry_archive();
        bytes[at] ^= 0x01;
        let reader = read_zip(bytes).unwrap();
        let mut buf = [0u8; 16];
        assert!(
            matches!(
                reader.extract_to_buffer(0, &mut buf, ZipFlags::NONE),
                Err(OxiZipError::Corrupted { .. })
            ),
            "field at {at}"
        );
    }
}

#[test]
fn test_local_flags_mismatch_is_corrupted() {
    let (mut bytes, _) = two_entry_archive();
    bytes[7] |= 0x08;
    let reader = read_zip(bytes).unwrap();
    assert!(matches!(
        reader.extract_to_vec(0, ZipFlags::COMPRESSED_DATA),
        Err(OxiZipError::Corrupted { .. })
    ));
}

#[test]
fn test_unknown_method_needs_raw_access() {
    let (mut bytes, _) = two_entry_archive();
    let reader = read_zip(bytes.clone()).unwrap();
    let cd_offset = reader.central_dir_offset() as usize;
    // Method 12 (bzip2) in both headers of the first entry.
    bytes[8] = 12;
    bytes[cd_offset + 10] = 12;

    let reader = read_zip(bytes).unwrap();
    let stat = reader.file_stat(0).unwrap();
    assert!(!stat.is_supported);
    assert!(matches!(
        reader.extract_to_vec(0, ZipFlags::NONE),
        Err(OxiZipError::Unsupported { .. })
    ));
    let raw = reader.extract_to_vec(0, ZipFlags::COMPRESSED_DATA).unwrap();
    assert_eq!(raw.len() as u64, stat.compressed_size);
}

#[test]
fn test_directory_bounds_checked() {
    let (mut bytes, _) = two_entry_archive();
    let size_at = bytes.len() - EOCD_SIZE + 12;
    bytes[size_at..size_at + 4].copy_from_slice(&0x00FF_FFFFu32.to_le_bytes());
    assert!(matches!(
        read_zip(bytes),
        Err(OxiZipError::Corrupted { .. })
    ));
}

#[test]
fn test_empty_and_directory_entries() {
    let mut writer = ZipWriter::new(MemoryIo::new());
    writer.add_mem("empty.txt", b"", 6).unwrap();
    writer.add_directory("folder/").unwrap();
    writer.add_mem("one.bin", &[0xAB], 9).unwrap();
    writer.finalize().unwrap();

    let io = writer.into_inner();
    let size = io.size();
    let reader = ZipReader::new(io, ZipFlags::NONE).unwrap();
    assert_eq!(reader.archive_size(), size);
    assert!(reader.extract_to_vec(0, ZipFlags::NONE).unwrap().is_empty());
    assert!(reader.is_directory(1).unwrap());
    assert!(reader.extract_to_vec(1, ZipFlags::NONE).unwrap().is_empty());
    assert_eq!(reader.extract_to_vec(2, ZipFlags::NONE).unwrap(), vec![0xAB]);
    assert_eq!(reader.file_stat(2).unwrap().method, METHOD_STORED);
}

#[test]
fn test_index_out_of_range() {
    let (bytes, _) = two_entry_archive();
    let reader = read_zip(bytes).unwrap();
    assert!(reader.file_stat(2).is_err());
    assert!(reader.extract_to_vec(5, ZipFlags::NONE).is_err());
    assert!(matches!(
        reader.extract_file_to_vec("nope", ZipFlags::NONE),
        Err(OxiZipError::EntryNotFound { .. })
    ));
}
