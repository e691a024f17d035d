mod http;
mod local;
#[cfg(test)]
pub(crate) mod memory;
mod retry;
mod stream;

pub use http::{HttpOptions, HttpRangeFetcher};
pub use local::LocalFileFetcher;
pub use retry::RetryPolicy;
pub use stream::{ArchiveHandle, FetchLimits, FetchWindow, RangeStream, StreamOptions};

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::SeekFrom;

/// A sized byte source that can fill a buffer from an absolute offset.
///
/// Implementations perform exactly one attempt per call; retrying is the
/// job of [`RetryPolicy`].
#[async_trait]
pub trait RangeFetch: Send + Sync {
    /// Fetch `buf.len()` bytes starting at `offset`, reporting every received chunk
    /// to `progress`. Returns the number of bytes written, which is short when the
    /// progress callback asked to stop.
    async fn fetch_once(&self, offset: u64, buf: &mut [u8], progress: &mut Progress<'_>)
    -> Result<usize>;

    /// Total size of the source, known once the fetcher is constructed.
    fn size(&self) -> u64;

    /// Human readable location (URL or path), used in logs.
    fn location(&self) -> &str;
}

/// Seek/read contract consumed by ZIP parsing.
///
/// Positions are signed: seeking outside the source is allowed and only
/// fails once bytes are requested there.
#[async_trait]
pub trait SeekRead: Send {
    /// Read up to `buf.len()` bytes at the current position and advance it.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Move the cursor and return the new position.
    fn seek(&mut self, pos: SeekFrom) -> i64;

    /// Total length of the underlying source.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position(&self) -> i64;

    /// Read exactly `buf.len()` bytes.
    async fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.read(&mut buf[filled..]).await?;
            if n == 0 {
                return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            filled += n;
        }
        Ok(())
    }

    /// Streams are read-only.
    fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(Error::ReadOnly)
    }

    /// Streams are read-only.
    fn flush(&mut self) -> Result<()> {
        Err(Error::ReadOnly)
    }
}

/// One progress notification, sent after every received chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSample {
    /// Bytes in the chunk just received.
    pub delta: u64,
    /// Bytes received so far by the current fetch attempt.
    pub cumulative: u64,
    /// Bytes the current fetch expects in total.
    pub total: u64,
}

/// Progress callback. Returning `false` stops the current fetch early without
/// an error.
pub type ProgressFn = Box<dyn FnMut(ProgressSample) -> bool + Send>;

/// Per-fetch progress tracker handed to [`RangeFetch::fetch_once`].
///
/// Counts every received byte into the caller's lifetime counter and forwards
/// samples to the optional callback.
pub struct Progress<'a> {
    sink: Option<&'a mut ProgressFn>,
    transferred: &'a mut u64,
    cumulative: u64,
    total: u64,
}

impl<'a> Progress<'a> {
    pub fn new(total: u64, transferred: &'a mut u64, sink: Option<&'a mut ProgressFn>) -> Self {
        Self {
            sink,
            transferred,
            cumulative: 0,
            total,
        }
    }

    /// Record a received chunk. Returns `false` when the callback wants the fetch to stop.
    pub fn report(&mut self, delta: usize) -> bool {
        let delta = delta as u64;
        *self.transferred += delta;
        self.cumulative += delta;
        match self.sink.as_mut() {
            Some(sink) => sink(ProgressSample {
                delta,
                cumulative: self.cumulative,
                total: self.total,
            }),
            None => true,
        }
    }

    /// Discard the per-attempt count before a retry. The lifetime counter keeps
    /// the bytes already transferred.
    pub fn restart(&mut self) {
        self.cumulative = 0;
    }

    pub fn cumulative(&self) -> u64 {
        self.cumulative
    }
}
