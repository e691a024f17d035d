//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures, driving
//! any source that implements the [`SeekRead`] trait through plain seek and
//! read calls.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Read the End of Central Directory (EOCD) from the last 22 bytes
//! 2. Read the Central Directory to get metadata for all files
//! 3. For extraction, read each file's Local File Header and data
//!
//! When the source is a [`RangeStream`](crate::io::RangeStream) with its
//! central directory loaded, steps 1 and 2 are served from the cached window.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, SeekFrom};

use crate::error::{Error, Result};
use crate::io::SeekRead;

use super::structures::*;

/// General purpose flag: entry is encrypted.
const FLAG_ENCRYPTED: u16 = 0x0001;

/// Low-level ZIP file parser.
///
/// Owns the stream it reads from; use [`stream_mut`](Self::stream_mut) to
/// tune the stream between calls.
pub struct ZipParser<S: SeekRead> {
    stream: S,
}

impl<S: SeekRead> ZipParser<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Read and parse the End of Central Directory record at the end of the stream.
    pub async fn find_eocd(&mut self) -> Result<EndOfCentralDirectory> {
        if self.stream.len() < EndOfCentralDirectory::SIZE as u64 {
            return Err(Error::NotAZipFile);
        }

        self.stream
            .seek(SeekFrom::End(-(EndOfCentralDirectory::SIZE as i64)));
        let mut buf = [0u8; EndOfCentralDirectory::SIZE];
        self.stream.read_exact(&mut buf).await?;

        EndOfCentralDirectory::parse_trailer(&buf)
    }

    /// List all entries of the archive in central-directory order.
    pub async fn list_files(&mut self) -> Result<Vec<ZipFileEntry>> {
        let eocd = self.find_eocd().await?;

        // Read the entire Central Directory in one call
        self.stream.seek(SeekFrom::Start(eocd.cd_offset as u64));
        let mut cd_data = vec![0u8; eocd.cd_size as usize];
        self.stream.read_exact(&mut cd_data).await?;

        parse_central_directory(&cd_data)
    }

    /// Get the offset where an entry's compressed data begins.
    ///
    /// The Local File Header has variable-length fields (filename, extra
    /// field) that may differ from the Central Directory entry, so the header
    /// itself has to be read.
    pub async fn data_offset(&mut self, entry: &ZipFileEntry) -> Result<u64> {
        self.stream.seek(SeekFrom::Start(entry.lfh_offset));
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.stream.read_exact(&mut lfh_buf).await?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(Error::InvalidArchive(format!(
                "invalid local file header for {} at offset {}",
                entry.file_name, entry.lfh_offset
            )));
        }

        let mut cursor = Cursor::new(&lfh_buf[..]);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Parse every Central Directory File Header in `data`.
pub fn parse_central_directory(data: &[u8]) -> Result<Vec<ZipFileEntry>> {
    let mut cursor = Cursor::new(data);
    let mut entries = Vec::new();

    while cursor.position() as usize + CDFH_MIN_SIZE <= data.len() {
        entries.push(parse_cdfh(&mut cursor)?);
    }

    Ok(entries)
}

/// Parse a Central Directory File Header from a cursor.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
    let start = cursor.position();
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(Error::InvalidArchive(format!(
            "invalid central directory file header at {}",
            start
        )));
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    // Use lossy conversion to handle non-UTF8 filenames gracefully
    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

    cursor.set_position(cursor.position() + extra_field_length as u64);

    let mut comment_bytes = vec![0u8; file_comment_length as usize];
    cursor.read_exact(&mut comment_bytes)?;
    let comment = String::from_utf8_lossy(&comment_bytes).to_string();

    Ok(ZipFileEntry {
        is_directory: file_name.ends_with('/'),
        file_name,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
        last_mod_time,
        last_mod_date,
        is_encrypted: flags & FLAG_ENCRYPTED != 0,
        comment,
    })
}
