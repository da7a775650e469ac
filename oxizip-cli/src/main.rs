//! OxiZip CLI - ZIP archives and zlib streams in Pure Rust.

mod commands;
mod utils;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oxizip")]
#[command(author, version, about = "Pure Rust ZIP and zlib utility")]
#[command(long_about = "
OxiZip reads and writes ZIP archives (stored and deflated entries) and
raw zlib streams.

Examples:
  oxizip list archive.zip
  oxizip list --json archive.zip
  oxizip extract -o out archive.zip
  oxizip create archive.zip src/ README.md
  oxizip append archive.zip CHANGELOG.md
  oxizip test archive.zip
  oxizip zlib compress data.bin data.zz
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List contents of an archive
    #[command(alias = "l")]
    List {
        /// Archive file to list
        archive: PathBuf,

        /// Show sizes, methods and timestamps
        #[arg(short, long)]
        verbose: bool,

        /// Output as JSON (machine-readable)
        #[arg(short, long)]
        json: bool,

        /// Include only entries matching pattern (glob syntax: *.txt, src/**/*)
        #[arg(short = 'I', long)]
        include: Vec<String>,

        /// Exclude entries matching pattern (glob syntax)
        #[arg(short = 'X', long)]
        exclude: Vec<String>,
    },

    /// Extract files from an archive
    #[command(alias = "x")]
    Extract {
        /// Archive file to extract
        archive: PathBuf,

        /// Entries to extract (all if empty)
        files: Vec<String>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Include only entries matching pattern (glob syntax)
        #[arg(short = 'I', long)]
        include: Vec<String>,

        /// Exclude entries matching pattern (glob syntax)
        #[arg(short = 'X', long)]
        exclude: Vec<String>,

        /// Print each extracted entry
        #[arg(short, long)]
        verbose: bool,

        /// Show a progress bar
        #[arg(short = 'P', long)]
        progress: bool,
    },

    /// Create a new archive
    #[command(alias = "c")]
    Create {
        /// Output archive file
        archive: PathBuf,

        /// Files and directories to add
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Compression level
        #[arg(short = 'l', long, value_enum, default_value = "normal")]
        compression: CompressionLevel,

        /// Align every local header to this many bytes (a power of two)
        #[arg(long)]
        align: Option<u64>,

        /// Print each added entry
        #[arg(short, long)]
        verbose: bool,
    },

    /// Add files to an existing archive in place
    #[command(alias = "a")]
    Append {
        /// Archive file to extend
        archive: PathBuf,

        /// Files and directories to add
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Compression level
        #[arg(short = 'l', long, value_enum, default_value = "normal")]
        compression: CompressionLevel,

        /// Print each added entry
        #[arg(short, long)]
        verbose: bool,
    },

    /// Test archive integrity
    #[command(alias = "t")]
    Test {
        /// Archive file to test
        archive: PathBuf,

        /// Print the result for every entry
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show information about an archive
    #[command(alias = "i")]
    Info {
        /// Archive file to inspect
        archive: PathBuf,
    },

    /// Compress or decompress a zlib stream
    Zlib {
        #[command(subcommand)]
        action: ZlibAction,
    },
}

#[derive(Subcommand)]
enum ZlibAction {
    /// Compress a file into a zlib stream
    Compress {
        /// Input file
        input: PathBuf,

        /// Output file
        output: PathBuf,

        /// Compression level
        #[arg(short = 'l', long, value_enum, default_value = "normal")]
        compression: CompressionLevel,
    },

    /// Decompress a zlib stream
    Decompress {
        /// Input file
        input: PathBuf,

        /// Output file
        output: PathBuf,
    },
}

/// Compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
enum CompressionLevel {
    /// Store without compression
    Store,
    /// Fast compression
    Fast,
    /// Normal compression (default)
    #[default]
    Normal,
    /// Best compression
    Best,
}

impl CompressionLevel {
    fn level(self) -> u8 {
        match self {
            CompressionLevel::Store => 0,
            CompressionLevel::Fast => 1,
            CompressionLevel::Normal => 6,
            CompressionLevel::Best => 9,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::List {
            archive,
            verbose,
            json,
            include,
            exclude,
        } => commands::cmd_list(&archive, verbose, json, &include, &exclude),
        Commands::Extract {
            archive,
            files,
            output,
            include,
            exclude,
            verbose,
            progress,
        } => commands::cmd_extract(
            &archive,
            &output,
            &files,
            &include,
            &exclude,
            verbose,
            progress,
        ),
        Commands::Create {
            archive,
            files,
            compression,
            align,
            verbose,
        } => commands::cmd_create(&archive, &files, compression.level(), align, verbose),
        Commands::Append {
            archive,
            files,
            compression,
            verbose,
        } => commands::cmd_append(&archive, &files, compression.level(), verbose),
        Commands::Test { archive, verbose } => commands::cmd_test(&archive, verbose),
        Commands::Info { archive } => commands::cmd_info(&archive),
        Commands::Zlib { action } => match action {
            ZlibAction::Compress {
                input,
                output,
                compression,
            } => commands::cmd_zlib_compress(&input, &output, compression.level()),
            ZlibAction::Decompress { input, output } => {
                commands::cmd_zlib_decompress(&input, &output)
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
