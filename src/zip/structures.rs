use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompressionMethod::Stored => "stored",
            CompressionMethod::Deflate => "deflate",
            CompressionMethod::Unknown(_) => "unknown",
        }
    }
}

impl Serialize for CompressionMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// End of Central Directory (EOCD) trailer, the fixed 22-byte non-ZIP64 record.
///
/// Only the fields needed to locate the central directory are kept; the disk
/// and entry counts are skipped since multi-disk archives are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: u32 = 0x0605_4b50;
    pub const SIZE: usize = 22;

    /// Parse the last 22 bytes of an archive.
    ///
    /// The trailer is expected to sit exactly at the end of the file: archives
    /// whose comment pushes the record further back are rejected as
    /// [`Error::NotAZipFile`] instead of being searched for.
    pub fn parse_trailer(data: &[u8; Self::SIZE]) -> Result<Self> {
        let mut cursor = Cursor::new(&data[..]);
        if cursor.read_u32::<LittleEndian>()? != Self::SIGNATURE {
            return Err(Error::NotAZipFile);
        }

        // disk number, disk with CD, entries on disk, total entries
        cursor.set_position(12);

        Ok(Self {
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Size of the region holding local headers and payloads.
    pub fn file_area_size(&self, total_length: u64) -> Result<u64> {
        total_length
            .checked_sub(Self::SIZE as u64 + self.comment_len as u64 + self.cd_size as u64)
            .ok_or_else(|| {
                Error::InvalidArchive(format!(
                    "central directory of {} bytes does not fit in {} bytes",
                    self.cd_size, total_length
                ))
            })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Parsed ZIP file entry information
#[derive(Debug, Clone, Serialize)]
pub struct ZipFileEntry {
    pub file_name: String,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
    /// Offset of the entry's local header within the file area.
    pub lfh_offset: u64,
    #[serde(skip)]
    pub last_mod_time: u16,
    #[serde(skip)]
    pub last_mod_date: u16,
    pub is_encrypted: bool,
    pub is_directory: bool,
    pub comment: String,
}

impl ZipFileEntry {
    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }

    /// Last modification as `YYYY-MM-DD HH:MM`.
    pub fn modified(&self) -> String {
        let (year, month, day) = self.mod_date();
        let (hour, minute, _) = self.mod_time();
        format!("{:04}-{:02}-{:02} {:02}:{:02}", year, month, day, hour, minute)
    }

    /// The entry name as a relative path, with root and `.` components removed.
    ///
    /// Returns `None` for names that climb out with `..` or carry a drive
    /// prefix, and for names with no normal component at all.
    pub fn relative_path(&self) -> Option<PathBuf> {
        let mut path = PathBuf::new();
        for component in Path::new(&self.file_name).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir | Component::RootDir => {}
                Component::ParentDir | Component::Prefix(_) => return None,
            }
        }
        (!path.as_os_str().is_empty()).then_some(path)
    }

    /// Whether two values describe the same central-directory record.
    pub fn same_entry(&self, other: &ZipFileEntry) -> bool {
        self.lfh_offset == other.lfh_offset && self.file_name == other.file_name
    }
}
