//! In-memory [`RangeFetch`] used by the unit tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use super::{Progress, RangeFetch};
use crate::error::{Error, Result};

pub(crate) struct MemoryFetcher {
    data: Vec<u8>,
    chunk_size: usize,
    failures: AtomicU32,
    range_support: bool,
    requests: Mutex<Vec<(u64, usize)>>,
}

impl MemoryFetcher {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            chunk_size: 256,
            failures: AtomicU32::new(0),
            range_support: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `n` attempts with a connection reset after delivering one chunk.
    pub(crate) fn fail_next(self, n: u32) -> Self {
        self.inject_failures(n);
        self
    }

    pub(crate) fn inject_failures(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub(crate) fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Answer every request like a server ignoring the Range header.
    pub(crate) fn without_range_support(mut self) -> Self {
        self.range_support = false;
        self
    }

    /// `(offset, len)` of every attempt so far.
    pub(crate) fn requests(&self) -> Vec<(u64, usize)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl RangeFetch for MemoryFetcher {
    async fn fetch_once(
        &self,
        offset: u64,
        buf: &mut [u8],
        progress: &mut Progress<'_>,
    ) -> Result<usize> {
        self.requests.lock().unwrap().push((offset, buf.len()));
        if !self.range_support {
            return Err(Error::RangeNotSupported(StatusCode::OK));
        }

        let start = offset as usize;
        let end = (start + buf.len()).min(self.data.len());
        let source = &self.data[start.min(end)..end];

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        let mut received = 0;
        for chunk in source.chunks(self.chunk_size) {
            buf[received..received + chunk.len()].copy_from_slice(chunk);
            received += chunk.len();
            let keep_going = progress.report(chunk.len());
            if failing {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "connection reset by peer",
                )));
            }
            if !keep_going {
                break;
            }
        }
        Ok(received)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn location(&self) -> &str {
        "memory"
    }
}
