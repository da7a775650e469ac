//! List command implementation.

use crate::utils::{
    CliResult, filtered_stats, method_name, open_archive, print_entries, space_savings,
};
use oxizip_archive::zip::FileStat;
use serde::Serialize;
use std::path::Path;

/// JSON serializable entry data for archive listings.
#[derive(Debug, Serialize)]
struct EntryJson {
    index: usize,
    name: String,
    size: u64,
    compressed_size: u64,
    ratio: f64,
    method: String,
    crc: u32,
    mtime: i64,
    is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

impl EntryJson {
    fn from_stat(stat: &FileStat) -> Self {
        Self {
            index: stat.index,
            name: stat.name.clone(),
            size: stat.uncompressed_size,
            compressed_size: stat.compressed_size,
            ratio: space_savings(stat.uncompressed_size, stat.compressed_size),
            method: method_name(stat.method).into_owned(),
            crc: stat.crc32,
            mtime: stat.modified,
            is_dir: stat.is_directory,
            comment: (!stat.comment.is_empty()).then(|| stat.comment.clone()),
        }
    }
}

/// JSON output for archive listing.
#[derive(Debug, Serialize)]
struct ArchiveListJson {
    archive: String,
    total_entries: usize,
    entries: Vec<EntryJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

pub fn cmd_list(
    archive: &Path,
    verbose: bool,
    json: bool,
    include: &[String],
    exclude: &[String],
) -> CliResult {
    let reader = open_archive(archive)?;
    let stats = filtered_stats(&reader, include, exclude)?;

    if json {
        let comment = String::from_utf8_lossy(reader.comment()).into_owned();
        let output = ArchiveListJson {
            archive: archive.display().to_string(),
            total_entries: reader.total_entries(),
            entries: stats.iter().map(EntryJson::from_stat).collect(),
            comment: (!comment.is_empty()).then_some(comment),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Archive: {}", archive.display());
    println!();
    print_entries(&stats, verbose);
    Ok(())
}
