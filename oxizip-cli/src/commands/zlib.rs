//! zlib compress / decompress commands.

use crate::utils::CliResult;
use oxizip_deflate::{zlib_compress, zlib_decompress};
use std::fs;
use std::path::Path;

pub fn cmd_zlib_compress(input: &Path, output: &Path, level: u8) -> CliResult {
    let data = fs::read(input)?;
    let packed = zlib_compress(&data, level)?;
    fs::write(output, &packed)?;
    println!(
        "{} -> {} ({} -> {} bytes)",
        input.display(),
        output.display(),
        data.len(),
        packed.len()
    );
    Ok(())
}

pub fn cmd_zlib_decompress(input: &Path, output: &Path) -> CliResult {
    let packed = fs::read(input)?;
    let data = zlib_decompress(&packed)?;
    fs::write(output, &data)?;
    println!(
        "{} -> {} ({} -> {} bytes)",
        input.display(),
        output.display(),
        packed.len(),
        data.len()
    );
    Ok(())
}
