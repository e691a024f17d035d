//! Virtual random-access stream over a [`RangeFetch`] source.
//!
//! The stream keeps exactly one cached window of the archive. A read fully
//! inside the window is served from memory; any other read replaces the
//! window with a fresh range fetch starting at the read position.

use async_trait::async_trait;
use std::io::SeekFrom;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Progress, ProgressFn, RangeFetch, RetryPolicy, SeekRead};
use crate::error::{Error, Result};
use crate::zip::EndOfCentralDirectory;

const TRAILER_SIZE: usize = EndOfCentralDirectory::SIZE;

/// Stream configuration.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    /// Default window length for a cache miss.
    pub window_size: usize,
    pub retry: RetryPolicy,
    /// Cancelling this token aborts the in-flight fetch.
    pub cancel: CancellationToken,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            window_size: 1024 * 1024,
            retry: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }
}

/// Sizing rules for the next cache miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    /// Preferred window length.
    pub window_size: usize,
    /// Upper bound for one fetch, never smaller than the read that triggers it.
    pub max_fetch: Option<u64>,
    /// After the next fetch, lower `max_fetch` to this value.
    pub shrink_after_first: Option<u64>,
}

impl FetchLimits {
    pub fn window(window_size: usize) -> Self {
        Self {
            window_size,
            max_fetch: None,
            shrink_after_first: None,
        }
    }
}

/// Geometry of an opened archive, fixed once the trailer is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHandle {
    pub location: String,
    pub total_length: u64,
    pub central_directory_size: u64,
    pub central_directory_offset: u64,
    pub comment_size: u64,
    /// `total_length - 22 - comment_size - central_directory_size`
    pub file_area_size: u64,
}

impl ArchiveHandle {
    pub fn new(location: String, total_length: u64, eocd: &EndOfCentralDirectory) -> Result<Self> {
        Ok(Self {
            location,
            total_length,
            central_directory_size: eocd.cd_size as u64,
            central_directory_offset: eocd.cd_offset as u64,
            comment_size: eocd.comment_len as u64,
            file_area_size: eocd.file_area_size(total_length)?,
        })
    }
}

/// The single most recently fetched contiguous region.
#[derive(Debug, Default)]
pub struct FetchWindow {
    buf: Vec<u8>,
    start: u64,
    len: usize,
}

impl FetchWindow {
    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether `[offset, offset + count)` lies entirely inside the window.
    pub fn contains(&self, offset: u64, count: usize) -> bool {
        offset >= self.start && offset - self.start + count as u64 <= self.len as u64
    }

    /// Copy as many bytes as the window holds from `offset` into `dest`.
    fn copy_to(&self, offset: u64, dest: &mut [u8]) -> usize {
        if offset < self.start || offset - self.start >= self.len as u64 {
            return 0;
        }
        let from = (offset - self.start) as usize;
        let n = dest.len().min(self.len - from);
        dest[..n].copy_from_slice(&self.buf[from..from + n]);
        n
    }
}

/// Seekable, read-only view of a remote archive backed by range fetches.
///
/// Not meant for concurrent use: every operation takes `&mut self`.
pub struct RangeStream<F: RangeFetch> {
    fetcher: F,
    handle: ArchiveHandle,
    trailer: [u8; TRAILER_SIZE],
    window: FetchWindow,
    position: i64,
    default_window: usize,
    limits: FetchLimits,
    retry: RetryPolicy,
    cancel: CancellationToken,
    transferred: u64,
    on_progress: Option<ProgressFn>,
}

impl<F: RangeFetch> RangeStream<F> {
    /// Fetch and parse the trailer of an already probed source.
    pub async fn open(fetcher: F, options: StreamOptions) -> Result<Self> {
        let total_length = fetcher.size();
        if total_length < TRAILER_SIZE as u64 {
            return Err(Error::NotAZipFile);
        }

        let mut trailer = [0u8; TRAILER_SIZE];
        let mut transferred = 0;
        let mut progress = Progress::new(TRAILER_SIZE as u64, &mut transferred, None);
        let n = options
            .retry
            .fetch(
                &fetcher,
                total_length - TRAILER_SIZE as u64,
                &mut trailer,
                &mut progress,
                &options.cancel,
            )
            .await?;
        if n < TRAILER_SIZE {
            return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }

        let eocd = EndOfCentralDirectory::parse_trailer(&trailer)?;
        let handle = ArchiveHandle::new(fetcher.location().to_string(), total_length, &eocd)?;
        debug!(
            location = %handle.location,
            cd_offset = handle.central_directory_offset,
            cd_size = handle.central_directory_size,
            file_area = handle.file_area_size,
            "parsed end of central directory"
        );

        Ok(Self {
            fetcher,
            handle,
            trailer,
            window: FetchWindow::default(),
            position: 0,
            default_window: options.window_size,
            limits: FetchLimits::window(options.window_size),
            retry: options.retry,
            cancel: options.cancel,
            transferred,
            on_progress: None,
        })
    }

    /// Fetch the central directory in one range request.
    ///
    /// The request covers everything from the central directory up to the
    /// trailer, and the trailer bytes already held are appended, so the window
    /// spans `[central_directory_offset, total_length)` and parsing the directory
    /// afterwards costs no further requests. Returns the number of bytes fetched,
    /// short if the progress callback stopped early.
    pub async fn load_central_directory(&mut self) -> Result<usize> {
        let start = self.handle.central_directory_offset;
        let trailer_at = self.handle.total_length - TRAILER_SIZE as u64;
        if start + self.handle.central_directory_size > trailer_at {
            return Err(Error::InvalidArchive(format!(
                "central directory at {} overruns the archive",
                start
            )));
        }
        let len = (trailer_at - start) as usize;

        let mut buf = self.take_window_buffer();
        buf.resize(len + TRAILER_SIZE, 0);
        let n = self.fetch_into(start, &mut buf[..len]).await?;

        let window_len = if n == len {
            buf[len..].copy_from_slice(&self.trailer);
            len + TRAILER_SIZE
        } else {
            n
        };
        self.window = FetchWindow {
            buf,
            start,
            len: window_len,
        };
        self.position = 0;
        debug!(start, len = window_len, "central directory window installed");
        Ok(n)
    }

    /// Release the window buffer. The position is kept.
    pub fn trim(&mut self) {
        self.window = FetchWindow::default();
    }

    pub fn handle(&self) -> &ArchiveHandle {
        &self.handle
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn window(&self) -> &FetchWindow {
        &self.window
    }

    /// Bytes received from the source over the stream's lifetime.
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred
    }

    pub fn reset_transferred_bytes(&mut self) {
        self.transferred = 0;
    }

    /// Install (or clear) the callback notified for every received chunk.
    pub fn set_progress(&mut self, on_progress: Option<ProgressFn>) {
        self.on_progress = on_progress;
    }

    pub fn limits(&self) -> FetchLimits {
        self.limits
    }

    pub fn set_limits(&mut self, limits: FetchLimits) {
        self.limits = limits;
    }

    /// Back to the configured window size with no ceiling.
    pub fn reset_limits(&mut self) {
        self.limits = FetchLimits::window(self.default_window);
    }

    pub fn default_window_size(&self) -> usize {
        self.default_window
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Empty the window, returning its buffer for reuse.
    fn take_window_buffer(&mut self) -> Vec<u8> {
        let mut buf = std::mem::take(&mut self.window).buf;
        buf.clear();
        buf
    }

    async fn fetch_into(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let Self {
            fetcher,
            retry,
            cancel,
            transferred,
            on_progress,
            ..
        } = self;
        let mut progress = Progress::new(buf.len() as u64, transferred, on_progress.as_mut());
        retry.fetch(fetcher, offset, buf, &mut progress, cancel).await
    }

    /// Replace the window with a fresh fetch covering at least `count` bytes at `start`.
    async fn refill(&mut self, start: u64, count: usize) -> Result<()> {
        let remaining = self.handle.total_length - start;
        let mut want = (self.limits.window_size.max(count) as u64).min(remaining);
        if let Some(max_fetch) = self.limits.max_fetch {
            want = want.min(max_fetch);
        }
        let want = want.max(count as u64) as usize;

        let mut buf = self.take_window_buffer();
        buf.resize(want, 0);
        debug!(start, len = want, "window miss, fetching");
        let n = self.fetch_into(start, &mut buf).await?;
        self.window = FetchWindow { buf, start, len: n };

        if let Some(shrink) = self.limits.shrink_after_first.take() {
            self.limits.max_fetch = Some(self.limits.max_fetch.map_or(shrink, |max| max.min(shrink)));
        }
        Ok(())
    }
}

#[async_trait]
impl<F: RangeFetch> SeekRead for RangeStream<F> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let length = self.handle.total_length;
        if self.position < 0 || self.position as u64 >= length {
            return Err(Error::OutOfBounds {
                position: self.position,
                length,
            });
        }

        let offset = self.position as u64;
        let count = (length - offset).min(buf.len() as u64) as usize;
        if !self.window.contains(offset, count) {
            self.refill(offset, count).await?;
        }

        let n = self.window.copy_to(offset, &mut buf[..count]);
        self.position += n as i64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> i64 {
        self.position = match pos {
            SeekFrom::Start(offset) => i64::try_from(offset).unwrap_or(i64::MAX),
            SeekFrom::Current(delta) => self.position.saturating_add(delta),
            SeekFrom::End(delta) => (self.handle.total_length as i64).saturating_add(delta),
        };
        self.position
    }

    fn len(&self) -> u64 {
        self.handle.total_length
    }

    fn position(&self) -> i64 {
        self.position
    }
}
