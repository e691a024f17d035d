use flate2::write::DeflateDecoder;
use std::io::{SeekFrom, Write};
use std::path::Path;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::io::{ArchiveHandle, FetchLimits, RangeFetch, RangeStream, SeekRead};

use super::parser::ZipParser;
use super::span::span_or_estimate;
use super::structures::{CompressionMethod, LFH_SIZE, ZipFileEntry};

/// Largest first window planned for one entry or run.
pub const DEFAULT_MAX_WINDOW: u64 = 64 * 1024 * 1024;

/// Size of the sequential reads issued while extracting.
const COPY_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Memory ceiling for the window planned ahead of an entry.
    pub max_window: u64,
    pub verify_crc: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_window: DEFAULT_MAX_WINDOW,
            verify_crc: true,
        }
    }
}

/// ZIP file extractor over a [`RangeStream`]
pub struct ZipExtractor<F: RangeFetch> {
    parser: ZipParser<RangeStream<F>>,
    entries: Vec<ZipFileEntry>,
    options: ExtractOptions,
}

impl<F: RangeFetch> ZipExtractor<F> {
    /// Load and parse the central directory, then release its buffer.
    pub async fn open(mut stream: RangeStream<F>, options: ExtractOptions) -> Result<Self> {
        stream.load_central_directory().await?;

        let mut parser = ZipParser::new(stream);
        let entries = parser.list_files().await;
        parser.stream_mut().trim();
        let entries = entries?;
        debug!(count = entries.len(), "central directory parsed");

        Ok(Self {
            parser,
            entries,
            options,
        })
    }

    /// All entries in central-directory order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Entries that are not directories, in central-directory order.
    pub fn files(&self) -> impl Iterator<Item = &ZipFileEntry> {
        self.entries.iter().filter(|e| !e.is_directory)
    }

    /// Look up an entry by its full path.
    pub fn find(&self, name: &str) -> Result<&ZipFileEntry> {
        self.files()
            .find(|e| e.file_name == name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))
    }

    pub fn handle(&self) -> &ArchiveHandle {
        self.parser.stream().handle()
    }

    pub fn stream(&self) -> &RangeStream<F> {
        self.parser.stream()
    }

    pub fn stream_mut(&mut self) -> &mut RangeStream<F> {
        self.parser.stream_mut()
    }

    /// Size the next fetch so it covers `run[start..]` in one request.
    ///
    /// Does nothing if the entry's local header is already in the window.
    /// Returns the planned span, or `None` when no fetch was planned.
    pub fn prepare_fetch(&mut self, run: &[ZipFileEntry], start: usize) -> Option<u64> {
        let entry = run.get(start)?;
        let stream = self.parser.stream();
        if stream.window().contains(entry.lfh_offset, LFH_SIZE) {
            return None;
        }

        let span = span_or_estimate(run, start, stream.handle().file_area_size, &self.entries);
        let first = span.min(self.options.max_window).max(LFH_SIZE as u64);
        let shrink = stream.default_window_size() as u64;
        debug!(entry = %entry.file_name, span, first, "planning fetch");

        self.parser.stream_mut().set_limits(FetchLimits {
            window_size: first as usize,
            max_fetch: Some(first),
            shrink_after_first: Some(shrink),
        });
        Some(span)
    }

    /// Decompress an entry into `writer`, returning the bytes written.
    pub async fn extract_to_writer<W: AsyncWrite + Unpin + Send>(
        &mut self,
        entry: &ZipFileEntry,
        writer: &mut W,
    ) -> Result<u64> {
        if entry.is_encrypted {
            return Err(Error::Encrypted(entry.file_name.clone()));
        }
        let mut decoder = match entry.compression_method {
            CompressionMethod::Stored => None,
            CompressionMethod::Deflate => Some(DeflateDecoder::new(Vec::new())),
            CompressionMethod::Unknown(method) => return Err(Error::UnsupportedCompression(method)),
        };

        let data_offset = self.parser.data_offset(entry).await?;
        let stream = self.parser.stream_mut();
        stream.seek(SeekFrom::Start(data_offset));

        let mut hasher = crc32fast::Hasher::new();
        let mut written = 0u64;
        let mut remaining = entry.compressed_size;
        let mut chunk = vec![0u8; COPY_CHUNK];

        while remaining > 0 {
            let n = remaining.min(COPY_CHUNK as u64) as usize;
            stream.read_exact(&mut chunk[..n]).await?;
            remaining -= n as u64;

            match decoder.as_mut() {
                Some(decoder) => {
                    decoder.write_all(&chunk[..n])?;
                    let out = std::mem::take(decoder.get_mut());
                    emit(writer, &mut hasher, &out).await?;
                    written += out.len() as u64;
                }
                None => {
                    emit(writer, &mut hasher, &chunk[..n]).await?;
                    written += n as u64;
                }
            }
        }

        if let Some(decoder) = decoder {
            let out = decoder.finish()?;
            emit(writer, &mut hasher, &out).await?;
            written += out.len() as u64;
        }
        writer.flush().await?;

        if written != entry.uncompressed_size {
            return Err(Error::InvalidArchive(format!(
                "{}: expected {} bytes, got {}",
                entry.file_name, entry.uncompressed_size, written
            )));
        }
        let actual = hasher.finalize();
        if self.options.verify_crc && actual != entry.crc32 {
            return Err(Error::ChecksumMismatch {
                name: entry.file_name.clone(),
                expected: entry.crc32,
                actual,
            });
        }

        Ok(written)
    }

    /// Extract an entry to disk. A partially written file is removed on failure.
    pub async fn extract_to_file(&mut self, entry: &ZipFileEntry, output_path: &Path) -> Result<u64> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = fs::File::create(output_path).await?;
        match self.extract_to_writer(entry, &mut file).await {
            Ok(written) => Ok(written),
            Err(err) => {
                drop(file);
                if let Err(e) = fs::remove_file(output_path).await {
                    warn!(path = %output_path.display(), error = %e, "failed to remove partial output");
                }
                Err(err)
            }
        }
    }

    /// Extract an entry to stdout
    pub async fn extract_to_stdout(&mut self, entry: &ZipFileEntry) -> Result<u64> {
        let mut stdout = tokio::io::stdout();
        self.extract_to_writer(entry, &mut stdout).await
    }
}

async fn emit<W: AsyncWrite + Unpin>(
    writer: &mut W,
    hasher: &mut crc32fast::Hasher,
    data: &[u8],
) -> Result<()> {
    hasher.update(data);
    writer.write_all(data).await?;
    Ok(())
}
