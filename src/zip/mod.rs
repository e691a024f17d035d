//! ZIP archive parsing and extraction.
//!
//! This module reads just enough of the ZIP container to list and extract
//! entries through a [`SeekRead`](crate::io::SeekRead) stream.
//!
//! ## Architecture
//!
//! - [`structures`]: EOCD trailer, entry metadata and header constants
//! - [`parser`]: central directory and local header parsing over any `SeekRead`
//! - [`span`]: on-disk span of an entry, derived from neighbouring local-header offsets
//! - [`extractor`]: listing, fetch planning and extraction on a [`RangeStream`](crate::io::RangeStream)
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file (the file area)
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! The central directory records each entry's compressed length but not the
//! size of its local header, so the bytes an entry occupies on disk are only
//! known by comparing consecutive local-header offsets.
//!
//! ## Limitations
//!
//! - No ZIP64 records, no multi-disk archives
//! - The EOCD must be the last 22 bytes of the file
//! - No encryption support
//! - STORED and DEFLATE only

mod extractor;
mod parser;
mod span;
mod structures;

pub use extractor::{DEFAULT_MAX_WINDOW, ExtractOptions, ZipExtractor};
pub use parser::ZipParser;
pub use span::{SPAN_SAFETY_MARGIN, full_length_of, full_length_of_run, span_or_estimate};
pub use structures::*;
