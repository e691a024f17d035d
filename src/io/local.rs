use async_trait::async_trait;
use std::path::Path;

use super::{Progress, RangeFetch};
use crate::error::Result;

/// Chunk size used to report progress while reading from disk.
const CHUNK_SIZE: usize = 64 * 1024;

/// Local archive served through the same fetch seam as a remote one
pub struct LocalFileFetcher {
    file: std::fs::File,
    path: String,
    size: u64,
}

impl LocalFileFetcher {
    pub fn new(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.display().to_string(),
            size,
        })
    }

    fn read_chunk(&self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_at(buf, offset)
        }

        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            let mut file = &self.file;
            file.seek(SeekFrom::Start(offset))?;
            file.read(buf)
        }
    }
}

#[async_trait]
impl RangeFetch for LocalFileFetcher {
    async fn fetch_once(
        &self,
        offset: u64,
        buf: &mut [u8],
        progress: &mut Progress<'_>,
    ) -> Result<usize> {
        let mut received = 0;
        while received < buf.len() {
            let end = (received + CHUNK_SIZE).min(buf.len());
            let n = self.read_chunk(offset + received as u64, &mut buf[received..end])?;
            if n == 0 {
                break;
            }
            received += n;
            if !progress.report(n) {
                break;
            }
        }
        Ok(received)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn location(&self) -> &str {
        &self.path
    }
}
