//! Extract command implementation.

use crate::utils::{CliResult, create_progress_bar, filtered_stats, open_archive, set_mtime};
use oxizip_archive::zip::{ZipFlags, safe_relative_path};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn cmd_extract(
    archive: &Path,
    output: &Path,
    files: &[String],
    include: &[String],
    exclude: &[String],
    verbose: bool,
    progress: bool,
) -> CliResult {
    let reader = open_archive(archive)?;
    let mut stats = filtered_stats(&reader, include, exclude)?;
    if !files.is_empty() {
        stats.retain(|stat| {
            files
                .iter()
                .any(|wanted| wanted.eq_ignore_ascii_case(&stat.name))
        });
        for wanted in files {
            if reader.locate(wanted, None, ZipFlags::NONE).is_none() {
                eprintln!("Warning: {} not found in archive", wanted);
            }
        }
    }

    fs::create_dir_all(output)?;
    let pb = create_progress_bar(stats.len() as u64, progress);
    let mut extracted = 0usize;
    let mut bytes = 0u64;

    for stat in &stats {
        let target = output.join(safe_relative_path(&stat.name)?);
        pb.set_message(stat.name.clone());

        if stat.is_directory {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut writer = BufWriter::new(File::create(&target)?);
            reader.extract_to_writer(stat.index, &mut writer, ZipFlags::NONE)?;
            writer.flush()?;
            drop(writer);
            bytes += stat.uncompressed_size;
        }
        // Timestamps are best effort; the data is already verified.
        if let Err(e) = set_mtime(&target, stat.modified) {
            if verbose {
                pb.suspend(|| {
                    eprintln!("  (could not set time on {}: {})", target.display(), e)
                });
            }
        }

        extracted += 1;
        if verbose {
            pb.suspend(|| println!("  Extracted: {}", stat.name));
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    println!(
        "Extracted {} entries ({} bytes) to {}",
        extracted,
        bytes,
        output.display()
    );
    Ok(())
}
