//! Utility functions for the CLI.

use filetime::FileTime;
use glob::Pattern;
use indicatif::{ProgressBar, ProgressStyle};
use oxizip_archive::zip::header::{METHOD_DEFLATED, METHOD_STORED};
use oxizip_archive::zip::{FileIo, FileStat, ZipFlags, ZipReader};
use std::borrow::Cow;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Result type shared by all commands.
pub type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Open an archive on disk for reading.
pub fn open_archive(path: &Path) -> CliResult<ZipReader<FileIo>> {
    Ok(ZipReader::new(FileIo::open(path)?, ZipFlags::NONE)?)
}

/// Create a progress bar with standard styling.
pub fn create_progress_bar(len: u64, enable: bool) -> ProgressBar {
    if !enable {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}");
    if let Ok(style) = style {
        pb.set_style(style.progress_chars("█▓▒░ "));
    }
    pb
}

/// Check if an entry name passes the filter patterns.
/// - If include patterns are given, the name must match at least one
/// - If exclude patterns are given, the name must not match any
///
/// Invalid patterns are ignored.
pub fn matches_filters(name: &str, include: &[String], exclude: &[String]) -> bool {
    let matches = |patterns: &[String]| {
        patterns
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|p| p.matches(name))
    };

    if matches(exclude) {
        return false;
    }
    include.is_empty() || matches(include)
}

/// Entries of `reader` that pass the filters.
pub fn filtered_stats(
    reader: &ZipReader<FileIo>,
    include: &[String],
    exclude: &[String],
) -> CliResult<Vec<FileStat>> {
    let mut stats = Vec::with_capacity(reader.total_entries());
    for index in 0..reader.total_entries() {
        let stat = reader.file_stat(index)?;
        if matches_filters(&stat.name, include, exclude) {
            stats.push(stat);
        }
    }
    Ok(stats)
}

/// Display name of a compression method.
pub fn method_name(method: u16) -> Cow<'static, str> {
    match method {
        METHOD_STORED => Cow::Borrowed("Stored"),
        METHOD_DEFLATED => Cow::Borrowed("Deflate"),
        other => Cow::Owned(format!("M{other}")),
    }
}

/// Space saved by compression, in percent.
pub fn space_savings(size: u64, compressed: u64) -> f64 {
    if size == 0 {
        0.0
    } else {
        (1.0 - compressed as f64 / size as f64) * 100.0
    }
}

/// Print entries in a formatted table.
pub fn print_entries(stats: &[FileStat], verbose: bool) {
    if !verbose {
        for stat in stats {
            println!("{}", stat.name);
        }
        return;
    }

    println!(
        "{:>10} {:>10} {:>6} {:>8}  {:<19}  Name",
        "Size", "Compressed", "Ratio", "Method", "Modified",
    );
    println!("{}", "-".repeat(80));

    let mut total_size = 0u64;
    let mut total_compressed = 0u64;
    for stat in stats {
        let ratio = if stat.uncompressed_size > 0 {
            format!(
                "{:.1}%",
                space_savings(stat.uncompressed_size, stat.compressed_size)
            )
        } else {
            "-".to_string()
        };
        let type_prefix = if stat.is_directory { "d " } else { "  " };

        println!(
            "{:>10} {:>10} {:>6} {:>8}  {}  {}{}",
            stat.uncompressed_size,
            stat.compressed_size,
            ratio,
            method_name(stat.method),
            stat.time,
            type_prefix,
            stat.name
        );
        total_size += stat.uncompressed_size;
        total_compressed += stat.compressed_size;
    }

    println!("{}", "-".repeat(80));
    println!(
        "{:>10} {:>10} {:>5.1}%          {} entries",
        total_size,
        total_compressed,
        space_savings(total_size, total_compressed),
        stats.len()
    );
}

/// A path queued for archiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPath {
    /// Name inside the archive; directories end with '/'.
    pub name: String,
    /// Location on disk.
    pub path: PathBuf,
}

impl InputPath {
    /// Whether this is a directory entry.
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }
}

/// Expand `paths` into archive entries, recursing into directories.
///
/// Names are relative to the parent of each given path, so `create out.zip
/// src` stores `src/...`.
pub fn collect_inputs(paths: &[PathBuf]) -> io::Result<Vec<InputPath>> {
    let mut inputs = Vec::new();
    for path in paths {
        let base = path.parent().unwrap_or(path);
        collect_path(path, base, &mut inputs)?;
    }
    Ok(inputs)
}

fn collect_path(path: &Path, base: &Path, inputs: &mut Vec<InputPath>) -> io::Result<()> {
    let name = entry_name(path, base);
    if path.is_dir() {
        if !name.is_empty() {
            inputs.push(InputPath {
                name: format!("{name}/"),
                path: path.to_path_buf(),
            });
        }
        let mut children = fs::read_dir(path)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        children.sort();
        for child in children {
            collect_path(&child, base, inputs)?;
        }
    } else {
        inputs.push(InputPath {
            name,
            path: path.to_path_buf(),
        });
    }
    Ok(())
}

fn entry_name(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Set a file's modification time from seconds since the Unix epoch.
pub fn set_mtime(path: &Path, unix_secs: i64) -> io::Result<()> {
    filetime::set_file_mtime(path, FileTime::from_unix_time(unix_secs, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_filters() {
        let none: Vec<String> = Vec::new();
        let txt = vec!["*.txt".to_string()];
        let docs = vec!["docs/**".to_string()];

        assert!(matches_filters("a.bin", &none, &none));
        assert!(matches_filters("a.txt", &txt, &none));
        assert!(!matches_filters("a.bin", &txt, &none));
        assert!(!matches_filters("docs/a.txt", &txt, &docs));
        assert!(matches_filters("src/a.txt", &txt, &docs));
    }

    #[test]
    fn test_method_name_and_savings() {
        assert_eq!(method_name(0), "Stored");
        assert_eq!(method_name(8), "Deflate");
        assert_eq!(method_name(14), "M14");
        assert_eq!(space_savings(0, 0), 0.0);
        assert_eq!(space_savings(200, 50), 75.0);
    }

    #[test]
    fn test_collect_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("project");
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src").join("main.rs"), b"fn main() {}").unwrap();
        fs::write(root.join("README"), b"readme").unwrap();
        let single = dir.path().join("single.txt");
        fs::write(&single, b"single").unwrap();

        let inputs = collect_inputs(&[root, single]).unwrap();
        let names: Vec<&str> = inputs.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "project/",
                "project/README",
                "project/src/",
                "project/src/main.rs",
                "single.txt"
            ]
        );
        assert!(inputs[0].is_dir());
        assert!(!inputs[1].is_dir());
    }
}
