//! # rangezip
//!
//! List and extract entries of remote ZIP archives while transferring only
//! the byte ranges actually needed.
//!
//! A [`RangeStream`] presents a remote (or local) archive as a seekable,
//! read-only stream. It holds a single cached window and replaces it with one
//! HTTP Range request whenever a read falls outside it. Opening an archive
//! costs a size probe, one fetch of the 22-byte trailer and one fetch of the
//! central directory; extracting an entry costs one fetch sized from the
//! distance between its local header and the next one.
//!
//! ## Example
//!
//! ```no_run
//! use rangezip::{
//!     ExtractOptions, HttpOptions, HttpRangeFetcher, RangeStream, StreamOptions, ZipExtractor,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let options = StreamOptions::default();
//!     let fetcher = HttpRangeFetcher::new(
//!         "https://example.com/archive.zip".to_string(),
//!         &HttpOptions::default(),
//!         &options,
//!     )
//!     .await?;
//!     let stream = RangeStream::open(fetcher, options).await?;
//!     let mut extractor = ZipExtractor::open(stream, ExtractOptions::default()).await?;
//!
//!     let entry = extractor.find("docs/readme.txt")?.clone();
//!     extractor.prepare_fetch(std::slice::from_ref(&entry), 0);
//!     extractor
//!         .extract_to_file(&entry, std::path::Path::new("readme.txt"))
//!         .await?;
//!
//!     println!("transferred {} bytes", extractor.stream().transferred_bytes());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Error, Result};
pub use io::{
    ArchiveHandle, FetchLimits, HttpOptions, HttpRangeFetcher, LocalFileFetcher, ProgressFn,
    ProgressSample, RangeFetch, RangeStream, RetryPolicy, SeekRead, StreamOptions,
};
pub use zip::{ExtractOptions, ZipExtractor, ZipFileEntry};
