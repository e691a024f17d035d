//! Main entry point for the rangezip CLI application.
//!
//! This binary provides a command-line interface for listing and extracting
//! ZIP files from both HTTP URLs and the local filesystem.

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rangezip::{
    Cli, Error, HttpRangeFetcher, LocalFileFetcher, RangeFetch, RangeStream, StreamOptions,
    ZipExtractor, ZipFileEntry,
};

/// Application entry point.
///
/// Parses command-line arguments and dispatches to the appropriate fetcher
/// based on whether the input is a local file or HTTP URL.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    // Reject a bad pattern before touching the network
    if let Err(e) = cli.name_filter() {
        bail!("Invalid --search pattern: {}", e);
    }

    let options = cli.stream_options();
    if cli.is_http_url() {
        let fetcher = HttpRangeFetcher::new(cli.file.clone(), &cli.http_options(), &options)
            .await
            .with_context(|| format!("Failed to open {}", cli.file))?;
        process_zip(fetcher, options, &cli).await
    } else {
        let fetcher = LocalFileFetcher::new(Path::new(&cli.file))
            .with_context(|| format!("Failed to open {}", cli.file))?;
        process_zip(fetcher, options, &cli).await
    }
}

/// Log to stderr so stdout stays clean for `-p` and `--json`.
fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Open the archive and run the listing or extraction requested on the command line.
async fn process_zip<F: RangeFetch>(fetcher: F, options: StreamOptions, cli: &Cli) -> Result<()> {
    let mut stream = RangeStream::open(fetcher, options).await?;
    let handle = stream.handle().clone();
    info!(
        archive = %handle.location,
        size = handle.total_length,
        central_directory = handle.central_directory_size,
        "opened archive"
    );

    // Central directories of large archives run into megabytes
    let bar = progress_bar(cli, handle.central_directory_size, "central directory");
    stream.set_progress(Some(bar_sink(&bar)));
    let extractor = ZipExtractor::open(stream, cli.extract_options()).await;
    bar.finish_and_clear();
    let mut extractor = extractor?;
    extractor.stream_mut().set_progress(None);

    let listing = cli.list || cli.verbose || cli.json;
    if listing {
        list_files(&extractor, cli)?;
    } else {
        extract_files(&mut extractor, cli).await?;
    }

    // Display network transfer statistics for HTTP sources
    if cli.is_http_url() && !cli.is_quiet() {
        let what = if listing { "listing" } else { "extraction" };
        eprintln!(
            "\nBytes transferred for {}: {} of {}",
            what,
            format_size(extractor.stream().transferred_bytes()),
            format_size(handle.total_length)
        );
    }

    Ok(())
}

#[derive(Serialize)]
struct Listing<'a> {
    archive: &'a str,
    total_length: u64,
    transferred_bytes: u64,
    entries: Vec<&'a ZipFileEntry>,
}

/// List files in the ZIP archive.
///
/// Supports three output formats:
/// - Simple format (`-l`): Just file names, one per line
/// - Verbose format (`-v`): Detailed table with size, compression ratio and timestamps
/// - JSON (`--json`): entries with their metadata
fn list_files<F: RangeFetch>(extractor: &ZipExtractor<F>, cli: &Cli) -> Result<()> {
    let filter = cli.name_filter().context("Invalid --search pattern")?;
    let entries: Vec<&ZipFileEntry> = extractor
        .entries()
        .iter()
        .filter(|e| filter.as_ref().is_none_or(|f| f.matches(e)))
        .collect();

    if cli.json {
        let listing = Listing {
            archive: &extractor.handle().location,
            total_length: extractor.handle().total_length,
            transferred_bytes: extractor.stream().transferred_bytes(),
            entries,
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if !cli.verbose {
        for entry in &entries {
            println!("{}", entry.file_name);
        }
        return Ok(());
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:>16}  Name",
        "Length", "Size", "Cmpr", "Modified"
    );
    println!("{}", "-".repeat(70));

    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    for entry in &entries {
        let encrypted = if entry.is_encrypted { " (encrypted)" } else { "" };
        println!(
            "{:>10}  {:>10}  {}  {}  {}{}",
            entry.uncompressed_size,
            entry.compressed_size,
            ratio(entry.compressed_size, entry.uncompressed_size),
            entry.modified(),
            entry.file_name,
            encrypted
        );
        if !entry.comment.is_empty() {
            println!("{:>44}{}", "", entry.comment);
        }

        if !entry.is_directory {
            total_uncompressed += entry.uncompressed_size;
            total_compressed += entry.compressed_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>16}  {} files",
        total_uncompressed,
        total_compressed,
        ratio(total_compressed, total_uncompressed),
        "",
        file_count
    );

    Ok(())
}

/// Compression ratio as percentage saved.
fn ratio(compressed: u64, uncompressed: u64) -> String {
    if uncompressed > 0 {
        format!(
            "{:>4}%",
            100 - (compressed.min(uncompressed) * 100 / uncompressed)
        )
    } else {
        "  0%".to_string()
    }
}

/// Extract the entries selected on the command line.
///
/// Entries are processed in central-directory order so that consecutive
/// selections share one range request.
async fn extract_files<F: RangeFetch>(extractor: &mut ZipExtractor<F>, cli: &Cli) -> Result<()> {
    // Exact names must exist in the archive
    for name in cli.files.iter().filter(|f| !has_glob_chars(f)) {
        if !extractor.files().any(|e| name_matches(name, e)) {
            return Err(Error::EntryNotFound(name.clone()).into());
        }
    }

    let selected: Vec<ZipFileEntry> = extractor
        .files()
        .filter(|e| {
            if !cli.files.is_empty() && !cli.files.iter().any(|f| name_matches(f, e)) {
                return false;
            }
            !cli
                .exclude
                .iter()
                .any(|x| e.file_name.contains(x) || glob_match(x, &e.file_name))
        })
        .cloned()
        .collect();

    // Resolve destinations first so skipped files do not widen the planned fetches
    let mut jobs = Vec::with_capacity(selected.len());
    for entry in selected {
        match output_path(&entry, cli) {
            Some(path) => jobs.push((entry, path)),
            None => continue,
        }
    }
    let run: Vec<ZipFileEntry> = jobs.iter().map(|(e, _)| e.clone()).collect();

    // Report only what the extraction itself downloads
    extractor.stream_mut().reset_transferred_bytes();
    let total: u64 = run.iter().map(|e| e.compressed_size).sum();
    let bar = progress_bar(cli, total, "downloading");
    extractor.stream_mut().set_progress(Some(bar_sink(&bar)));

    let multiple_files = cli.pipe && jobs.len() > 1;
    let result = async {
        for (index, (entry, path)) in jobs.iter().enumerate() {
            extractor.prepare_fetch(&run, index);
            extract_file(extractor, entry, path.as_deref(), &bar, multiple_files).await?;
        }
        Ok::<_, anyhow::Error>(())
    }
    .await;

    bar.finish_and_clear();
    extractor.stream_mut().set_progress(None);
    extractor.stream_mut().reset_limits();
    result
}

/// Where an entry goes: `Some(None)` for stdout, `Some(Some(path))` for a
/// file, `None` to skip it.
fn output_path(entry: &ZipFileEntry, cli: &Cli) -> Option<Option<PathBuf>> {
    if cli.pipe {
        return Some(None);
    }

    let Some(relative) = entry.relative_path() else {
        warn!(entry = %entry.file_name, "skipping entry that escapes the output directory");
        return None;
    };
    let relative = if cli.junk_paths {
        // Junk paths: use only the base filename, ignore directory structure
        relative.file_name().map(PathBuf::from).unwrap_or(relative)
    } else {
        relative
    };
    let path = match cli.extract_dir {
        Some(ref dir) => PathBuf::from(dir).join(relative),
        None => relative,
    };

    // Handle existing files based on overwrite options
    if path.exists() {
        if cli.never_overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", entry.file_name);
            }
            return None;
        }
        if !cli.overwrite {
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", entry.file_name);
            }
            return None;
        }
    }

    Some(Some(path))
}

/// Extract a single file from the archive to `path`, or to stdout when `path` is `None`.
async fn extract_file<F: RangeFetch>(
    extractor: &mut ZipExtractor<F>,
    entry: &ZipFileEntry,
    path: Option<&Path>,
    bar: &ProgressBar,
    show_filename: bool,
) -> Result<()> {
    let Some(path) = path else {
        if show_filename {
            use tokio::io::AsyncWriteExt;
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(format!("--- {} ---\n", entry.file_name).as_bytes())
                .await?;
            stdout.flush().await?;
        }
        extractor.extract_to_stdout(entry).await?;
        return Ok(());
    };

    if !bar.is_hidden() {
        bar.println(format!("  extracting: {}", entry.file_name));
    }
    extractor
        .extract_to_file(entry, path)
        .await
        .with_context(|| format!("Failed to extract {}", entry.file_name))?;

    Ok(())
}

fn progress_bar(cli: &Cli, len: u64, message: &'static str) -> ProgressBar {
    if cli.is_quiet() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(
        "{msg:>17} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec} {eta}",
    ) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.set_message(message);
    bar
}

fn bar_sink(bar: &ProgressBar) -> rangezip::ProgressFn {
    let bar = bar.clone();
    Box::new(move |sample| {
        bar.inc(sample.delta);
        true
    })
}

/// Whether a command-line file argument selects `entry`.
///
/// Patterns with wildcards are glob-matched; plain names match the full path
/// or the base name.
fn name_matches(pattern: &str, entry: &ZipFileEntry) -> bool {
    if has_glob_chars(pattern) {
        return glob_match(pattern, &entry.file_name);
    }
    let basename = Path::new(&entry.file_name)
        .file_name()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    entry.file_name == pattern || basename == pattern
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            // Star matches zero or more characters
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_patterns() {
        assert!(glob_match("*.txt", "readme.txt"));
        assert!(glob_match("file?.dat", "file1.dat"));
        assert!(glob_match("docs/*", "docs/a/b.md"));
        assert!(!glob_match("*.txt", "readme.md"));
    }

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(500), "500 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1048576), "1.00 MB");
    }

    #[test]
    fn ratio_handles_incompressible_entries() {
        assert_eq!(ratio(50, 100), "  50%");
        assert_eq!(ratio(120, 100), "   0%");
        assert_eq!(ratio(0, 0), "  0%");
    }

    fn entry(name: &str) -> ZipFileEntry {
        ZipFileEntry {
            file_name: name.to_string(),
            compression_method: rangezip::zip::CompressionMethod::Stored,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            is_encrypted: false,
            is_directory: false,
            comment: String::new(),
        }
    }

    #[test]
    fn output_paths_stay_inside_the_extract_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let out_arg = out.to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["rangezip", "-d", out_arg.as_str(), "a.zip"]).unwrap();

        assert_eq!(output_path(&entry("../../etc/evil"), &cli), None);
        assert_eq!(output_path(&entry("docs/../../evil"), &cli), None);
        assert_eq!(
            output_path(&entry("/etc/evil2"), &cli),
            Some(Some(out.join("etc/evil2")))
        );
        assert_eq!(
            output_path(&entry("./docs/a.txt"), &cli),
            Some(Some(out.join("docs/a.txt")))
        );
    }

    #[test]
    fn junk_paths_keep_only_the_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let out_arg = dir.path().to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["rangezip", "-j", "-d", out_arg.as_str(), "a.zip"]).unwrap();

        assert_eq!(
            output_path(&entry("/deep/nested/file.bin"), &cli),
            Some(Some(dir.path().join("file.bin")))
        );
        assert_eq!(output_path(&entry("../file.bin"), &cli), None);
    }
}
