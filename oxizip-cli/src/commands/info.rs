//! Info command implementation.

use crate::utils::{CliResult, method_name, open_archive, space_savings};
use std::collections::BTreeMap;
use std::path::Path;

pub fn cmd_info(archive: &Path) -> CliResult {
    let reader = open_archive(archive)?;
    let stats = (0..reader.total_entries())
        .map(|index| reader.file_stat(index))
        .collect::<Result<Vec<_>, _>>()?;

    println!("Archive Information");
    println!("===================");
    println!("File: {}", archive.display());
    println!("Size: {} bytes", reader.archive_size());
    println!("Central directory offset: {}", reader.central_dir_offset());
    if !reader.comment().is_empty() {
        println!("Comment: {}", String::from_utf8_lossy(reader.comment()));
    }

    let total_size: u64 = stats.iter().map(|s| s.uncompressed_size).sum();
    let total_compressed: u64 = stats.iter().map(|s| s.compressed_size).sum();
    let mut methods: BTreeMap<u16, usize> = BTreeMap::new();
    for stat in stats.iter().filter(|s| !s.is_directory) {
        *methods.entry(stat.method).or_default() += 1;
    }

    println!();
    println!("Contents:");
    println!(
        "  Files: {}",
        stats.iter().filter(|s| !s.is_directory).count()
    );
    println!(
        "  Directories: {}",
        stats.iter().filter(|s| s.is_directory).count()
    );
    println!("  Total size: {} bytes", total_size);
    println!("  Compressed size: {} bytes", total_compressed);
    if total_size > 0 {
        println!(
            "  Compression ratio: {:.1}%",
            space_savings(total_size, total_compressed)
        );
    }
    for (method, count) in &methods {
        println!("  {}: {} files", method_name(*method), count);
    }
    if let Some(newest) = stats.iter().map(|s| s.time).max() {
        println!("  Newest entry: {}", newest);
    }
    Ok(())
}
