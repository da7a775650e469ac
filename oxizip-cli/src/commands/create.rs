//! Create command implementation.

use crate::utils::{CliResult, InputPath, collect_inputs};
use oxizip_archive::zip::{
    DosDateTime, EntryOptions, FileIo, ZipFlags, ZipIo, ZipWriter, ZipWriterOptions,
};
use oxizip_core::checksum::Crc32;
use oxizip_core::error::Result;
use oxizip_deflate::deflate;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// A file read and compressed ahead of being written.
struct Prepared {
    payload: Vec<u8>,
    deflated: bool,
    size: u64,
    crc32: u32,
    modified: DosDateTime,
}

fn prepare(input: &InputPath, level: u8) -> Result<Prepared> {
    let data = fs::read(&input.path)?;
    let modified = fs::metadata(&input.path)?
        .modified()
        .map(DosDateTime::from_system_time)
        .unwrap_or_default();
    let size = data.len() as u64;
    let crc32 = Crc32::compute(&data);

    if level > 0 && data.len() > 3 {
        let packed = deflate(&data, level)?;
        if packed.len() < data.len() {
            return Ok(Prepared {
                payload: packed,
                deflated: true,
                size,
                crc32,
                modified,
            });
        }
    }
    Ok(Prepared {
        payload: data,
        deflated: false,
        size,
        crc32,
        modified,
    })
}

/// Compress `inputs` in parallel, then write them to `writer` in order.
///
/// Files that do not shrink are stored.
pub(crate) fn add_inputs<I: ZipIo>(
    writer: &mut ZipWriter<I>,
    inputs: &[InputPath],
    level: u8,
    verbose: bool,
) -> CliResult<usize> {
    let prepared: Vec<Option<Result<Prepared>>> = inputs
        .par_iter()
        .map(|input| (!input.is_dir()).then(|| prepare(input, level)))
        .collect();

    for (input, prepared) in inputs.iter().zip(prepared) {
        match prepared {
            None => {
                writer.add_directory(&input.name)?;
                if verbose {
                    println!("  Added: {}", input.name);
                }
            }
            Some(prepared) => {
                let prepared = prepared?;
                let options = EntryOptions {
                    level: if prepared.deflated { level } else { 0 },
                    flags: ZipFlags::COMPRESSED_DATA,
                    uncompressed_size: prepared.size,
                    crc32: prepared.crc32,
                    modified: Some(prepared.modified),
                    ..EntryOptions::default()
                };
                writer.add_mem_ex(&input.name, &prepared.payload, &options)?;
                if verbose {
                    println!(
                        "  Added: {} ({} -> {} bytes)",
                        input.name,
                        prepared.size,
                        prepared.payload.len()
                    );
                }
            }
        }
    }
    Ok(inputs.len())
}

pub fn cmd_create(
    archive: &Path,
    files: &[PathBuf],
    level: u8,
    align: Option<u64>,
    verbose: bool,
) -> CliResult {
    let inputs = collect_inputs(files)?;
    if inputs.is_empty() {
        return Err("nothing to archive".into());
    }
    if verbose {
        eprintln!("Creating ZIP archive: {}", archive.display());
    }

    let options = ZipWriterOptions {
        alignment: align.unwrap_or(0),
        reserved_prefix: 0,
    };
    let mut writer = ZipWriter::with_options(FileIo::create(archive)?, options)?;
    let added = add_inputs(&mut writer, &inputs, level, verbose)?;
    writer.finalize()?;

    println!(
        "Created {} with {} entries ({} bytes)",
        archive.display(),
        added,
        writer.archive_size()
    );
    Ok(())
}
