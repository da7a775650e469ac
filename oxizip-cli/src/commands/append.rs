//! Append command implementation.

use super::create::add_inputs;
use crate::utils::{CliResult, collect_inputs};
use oxizip_archive::zip::{FileIo, ZipFlags, ZipReader};
use std::path::{Path, PathBuf};

pub fn cmd_append(archive: &Path, files: &[PathBuf], level: u8, verbose: bool) -> CliResult {
    let reader = ZipReader::new(FileIo::open_rw(archive)?, ZipFlags::NONE)?;
    let before = reader.total_entries();

    let mut inputs = collect_inputs(files)?;
    inputs.retain(|input| {
        let present = reader
            .locate(&input.name, None, ZipFlags::CASE_SENSITIVE)
            .is_some();
        if present {
            eprintln!("Skipping {}: already in archive", input.name);
        }
        !present
    });
    if inputs.is_empty() {
        println!("Nothing to add to {}", archive.display());
        return Ok(());
    }

    let mut writer = reader.into_writer()?;
    let added = add_inputs(&mut writer, &inputs, level, verbose)?;
    writer.finalize()?;

    println!(
        "Appended {} entries to {} ({} -> {} entries)",
        added,
        archive.display(),
        before,
        writer.total_entries()
    );
    Ok(())
}
