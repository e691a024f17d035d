use clap::Parser;
use regex::{Regex, RegexBuilder};
use std::path::Path;
use std::time::Duration;

use crate::io::{HttpOptions, RetryPolicy, StreamOptions};
use crate::zip::{DEFAULT_MAX_WINDOW, ExtractOptions, ZipFileEntry};

/// Listing filter built from `--search` and `--regex`.
///
/// Both forms match the entry's base name, ignoring case. Directory entries
/// never match.
#[derive(Debug)]
pub enum NameFilter {
    Contains(String),
    Pattern(Regex),
}

impl NameFilter {
    pub fn matches(&self, entry: &ZipFileEntry) -> bool {
        if entry.is_directory {
            return false;
        }
        let name = Path::new(&entry.file_name)
            .file_name()
            .map(|s| s.to_string_lossy())
            .unwrap_or_default();
        match self {
            NameFilter::Contains(text) => name.to_lowercase().contains(text),
            NameFilter::Pattern(regex) => regex.is_match(&name),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "rangezip")]
#[command(version)]
#[command(about = "Unzip remote archives by fetching only the byte ranges needed", long_about = None)]
#[command(after_help = "Examples:\n  \
  rangezip -l https://example.com/archive.zip            list files of a remote ZIP\n  \
  rangezip https://example.com/archive.zip docs/a.txt    extract one file\n  \
  rangezip -p archive.zip '*.json' | jq .                 send matching files to stdout")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Only list files whose name contains TEXT (case-insensitive)
    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,

    /// Treat the --search text as a case-insensitive regular expression
    #[arg(long, requires = "search")]
    pub regex: bool,

    /// Print the listing as JSON
    #[arg(long)]
    pub json: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,

    /// Bytes fetched per cache miss
    #[arg(long, value_name = "BYTES", default_value_t = 1024 * 1024)]
    pub window_size: usize,

    /// Largest window planned ahead of an entry
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_WINDOW)]
    pub max_window: u64,

    /// Attempts per range request on connection errors
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub retries: u32,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    pub timeout: u64,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe || self.json
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Default tracing filter for the chosen verbosity.
    pub fn log_level(&self) -> &'static str {
        if self.is_very_quiet() {
            "error"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }

    /// The listing filter, if `--search` was given.
    pub fn name_filter(&self) -> Result<Option<NameFilter>, regex::Error> {
        let Some(ref text) = self.search else {
            return Ok(None);
        };
        let filter = if self.regex {
            NameFilter::Pattern(RegexBuilder::new(text).case_insensitive(true).build()?)
        } else {
            NameFilter::Contains(text.to_lowercase())
        };
        Ok(Some(filter))
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            window_size: self.window_size.max(1),
            retry: RetryPolicy::default().with_attempts(self.retries),
            ..StreamOptions::default()
        }
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            timeout: Duration::from_secs(self.timeout),
            ..HttpOptions::default()
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            max_window: self.max_window,
            ..ExtractOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unzip_style_flags() {
        let cli = Cli::try_parse_from([
            "rangezip",
            "-d",
            "out",
            "-j",
            "-x",
            "skip.txt",
            "--",
            "https://example.com/a.zip",
        ])
        .unwrap();
        assert!(cli.is_http_url());
        assert_eq!(cli.extract_dir.as_deref(), Some("out"));
        assert!(cli.junk_paths);
        assert_eq!(cli.exclude, vec!["skip.txt"]);
        assert!(!cli.is_quiet());
    }

    #[test]
    fn options_follow_flags() {
        let cli = Cli::try_parse_from([
            "rangezip",
            "--window-size",
            "4096",
            "--retries",
            "5",
            "--timeout",
            "7",
            "--json",
            "a.zip",
        ])
        .unwrap();
        assert!(!cli.is_http_url());
        assert!(cli.is_quiet());
        assert_eq!(cli.stream_options().window_size, 4096);
        assert_eq!(cli.stream_options().retry.max_attempts, 5);
        assert_eq!(cli.http_options().timeout, Duration::from_secs(7));
        assert_eq!(cli.extract_options().max_window, DEFAULT_MAX_WINDOW);
    }

    fn entry(name: &str) -> ZipFileEntry {
        ZipFileEntry {
            file_name: name.to_string(),
            compression_method: crate::zip::CompressionMethod::Stored,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            lfh_offset: 0,
            last_mod_time: 0,
            last_mod_date: 0,
            is_encrypted: false,
            is_directory: name.ends_with('/'),
            comment: String::new(),
        }
    }

    #[test]
    fn search_matches_base_names_ignoring_case() {
        let cli = Cli::try_parse_from(["rangezip", "-l", "--search", "READ", "a.zip"]).unwrap();
        let filter = cli.name_filter().unwrap().unwrap();

        assert!(filter.matches(&entry("docs/Readme.md")));
        assert!(!filter.matches(&entry("readme/notes.txt")));
        assert!(!filter.matches(&entry("readme/")));
    }

    #[test]
    fn regex_search_skips_directories() {
        let cli = Cli::try_parse_from(["rangezip", "-l", "--regex", "--search", r"^img_\d+\.PNG$", "a.zip"])
            .unwrap();
        let filter = cli.name_filter().unwrap().unwrap();

        assert!(filter.matches(&entry("photos/IMG_0042.png")));
        assert!(!filter.matches(&entry("photos/img_final.png")));
        assert!(!filter.matches(&entry("img_1.png/")));
    }

    #[test]
    fn invalid_regex_is_reported() {
        let cli = Cli::try_parse_from(["rangezip", "--regex", "--search", "(", "a.zip"]).unwrap();
        assert!(cli.name_filter().is_err());

        let cli = Cli::try_parse_from(["rangezip", "a.zip"]).unwrap();
        assert!(cli.name_filter().unwrap().is_none());
        assert!(Cli::try_parse_from(["rangezip", "--regex", "a.zip"]).is_err());
    }
}
