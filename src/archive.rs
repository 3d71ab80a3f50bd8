//! Streaming ZIP archive reader
//!
//! Reads the central directory once and hands out member readers that inflate
//! on the fly. All member readers of one [`Archive`] share a single file
//! handle; each remembers its own position and seeks before every read, so
//! several worksheet streams can be consumed in any interleaving.
//!
//! **Memory Usage:**
//! - Central directory entries only (name, sizes, offset per member)
//! - One 64KB read buffer per open member stream

use crate::error::{Result, XlsxStreamError};
use flate2::read::DeflateDecoder;
use log::debug;
use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// ZIP local file header signature
const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034b50;

/// ZIP central directory signature
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;

/// ZIP end of central directory signature
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054b50;

/// ZIP64 end of central directory locator signature
const ZIP64_LOCATOR_SIGNATURE: u32 = 0x07064b50;

/// ZIP64 end of central directory record signature
const ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06064b50;

/// Extra field id carrying 64-bit sizes and offsets
const ZIP64_EXTRA_FIELD_ID: u16 = 0x0001;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATE: u16 = 8;

const MEMBER_BUFFER_SIZE: usize = 64 * 1024;

/// Entry in the ZIP central directory
#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub name: String,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub compression_method: u16,
    pub offset: u64,
}

#[derive(Debug)]
struct ArchiveInner {
    path: PathBuf,
    entries: Vec<ZipEntry>,
    file: RefCell<Option<File>>,
}

/// Shared handle to an open ZIP archive
///
/// Cloning is cheap; every clone and every member reader refers to the same
/// underlying file, which stays open until [`Archive::close`] is called or
/// the last holder is dropped.
#[derive(Debug, Clone)]
pub struct Archive {
    inner: Rc<ArchiveInner>,
}

impl Archive {
    /// Open a ZIP file and read its central directory
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use xlsxstream::archive::Archive;
    ///
    /// let archive = Archive::open("report.xlsx")?;
    /// for entry in archive.entries() {
    ///     println!("{} ({} bytes)", entry.name, entry.uncompressed_size);
    /// }
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => XlsxStreamError::NotFound(path.clone()),
            _ => XlsxStreamError::Io(e),
        })?;

        let entries = read_central_directory(&mut file).map_err(|e| match e {
            XlsxStreamError::Io(io) => {
                XlsxStreamError::corrupt(format!("Failed to read central directory: {}", io))
            }
            other => other,
        })?;
        debug!(
            "opened archive {} with {} members",
            path.display(),
            entries.len()
        );

        Ok(Archive {
            inner: Rc::new(ArchiveInner {
                path,
                entries,
                file: RefCell::new(Some(file)),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Get list of all entries in the ZIP
    pub fn entries(&self) -> &[ZipEntry] {
        &self.inner.entries
    }

    /// Find an entry by name, falling back to a case-insensitive match
    pub fn find_entry(&self, name: &str) -> Option<&ZipEntry> {
        let name = name.trim_start_matches('/');
        self.inner
            .entries
            .iter()
            .find(|e| e.name == name)
            .or_else(|| {
                self.inner
                    .entries
                    .iter()
                    .find(|e| e.name.eq_ignore_ascii_case(name))
            })
    }

    /// Uncompressed size of a member, if present
    pub fn entry_size(&self, name: &str) -> Option<u64> {
        self.find_entry(name).map(|e| e.uncompressed_size)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.file.borrow().is_none()
    }

    /// Release the file handle; later reads from any member stream fail
    pub fn close(&self) {
        if self.inner.file.borrow_mut().take().is_some() {
            debug!("closed archive {}", self.inner.path.display());
        }
    }

    /// Get a streaming reader for a member by name
    ///
    /// Returns `Ok(None)` when the archive has no such member. The reader
    /// decompresses on the fly without loading the member into memory.
    pub fn open_member(&self, name: &str) -> Result<Option<Box<dyn Read>>> {
        let entry = match self.find_entry(name) {
            Some(entry) => entry.clone(),
            None => return Ok(None),
        };
        self.open_entry(&entry).map(Some)
    }

    /// Get a streaming reader for an entry
    pub fn open_entry(&self, entry: &ZipEntry) -> Result<Box<dyn Read>> {
        let data_offset = self.data_offset(entry)?;

        let raw = MemberReader {
            archive: Rc::clone(&self.inner),
            position: data_offset,
            remaining: entry.compressed_size,
        };
        let buffered = BufReader::with_capacity(MEMBER_BUFFER_SIZE, raw);

        match entry.compression_method {
            METHOD_DEFLATE => Ok(Box::new(DeflateDecoder::new(buffered))),
            METHOD_STORED => Ok(Box::new(buffered)),
            other => Err(XlsxStreamError::corrupt(format!(
                "Unsupported compression method {} for '{}'",
                other, entry.name
            ))),
        }
    }

    /// Locate the first byte of member data behind its local header
    fn data_offset(&self, entry: &ZipEntry) -> Result<u64> {
        let mut guard = self.inner.file.borrow_mut();
        let file = guard
            .as_mut()
            .ok_or_else(|| XlsxStreamError::corrupt("Archive is closed"))?;

        file.seek(SeekFrom::Start(entry.offset))?;
        let signature = read_u32_le(file)?;
        if signature != LOCAL_FILE_HEADER_SIGNATURE {
            return Err(XlsxStreamError::corrupt(format!(
                "Invalid local file header signature for '{}'",
                entry.name
            )));
        }

        // Skip version, flags, method, time, date, CRC-32 and both sizes
        file.seek(SeekFrom::Current(22))?;
        let filename_len = read_u16_le(file)? as u64;
        let extra_len = read_u16_le(file)? as u64;

        Ok(entry.offset + 30 + filename_len + extra_len)
    }
}

/// Raw (still compressed) bytes of one member
///
/// Seeks the shared handle to its own position before every read.
struct MemberReader {
    archive: Rc<ArchiveInner>,
    position: u64,
    remaining: u64,
}

impl Read for MemberReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let mut guard = self.archive.file.borrow_mut();
        let file = guard
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "archive is closed"))?;

        let want = buf.len().min(self.remaining.min(usize::MAX as u64) as usize);
        file.seek(SeekFrom::Start(self.position))?;
        let n = file.read(&mut buf[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "archive member is truncated",
            ));
        }

        self.position += n as u64;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Read the central directory from the ZIP file
fn read_central_directory(file: &mut File) -> Result<Vec<ZipEntry>> {
    let eocd_offset = find_eocd(file)?;
    file.seek(SeekFrom::Start(eocd_offset))?;

    let signature = read_u32_le(file)?;
    if signature != END_OF_CENTRAL_DIRECTORY_SIGNATURE {
        return Err(XlsxStreamError::corrupt(format!(
            "Invalid end of central directory signature: 0x{:08x}",
            signature
        )));
    }

    // Skip disk number fields and entries on this disk
    file.seek(SeekFrom::Current(6))?;
    let mut total_entries = read_u16_le(file)? as u64;
    let _cd_size = read_u32_le(file)?;
    let mut cd_offset = read_u32_le(file)? as u64;

    if total_entries == 0xFFFF || cd_offset == 0xFFFF_FFFF {
        if let Some((entries, offset)) = read_zip64_eocd(file, eocd_offset)? {
            total_entries = entries;
            cd_offset = offset;
        }
    }

    file.seek(SeekFrom::Start(cd_offset))?;

    let mut entries = Vec::with_capacity(total_entries.min(4096) as usize);
    for _ in 0..total_entries {
        let signature = read_u32_le(file)?;
        if signature != CENTRAL_DIRECTORY_SIGNATURE {
            break;
        }

        // Skip version made by, version needed, flags
        file.seek(SeekFrom::Current(6))?;
        let compression_method = read_u16_le(file)?;

        // Skip modification time, date, CRC-32
        file.seek(SeekFrom::Current(8))?;
        let mut compressed_size = read_u32_le(file)? as u64;
        let mut uncompressed_size = read_u32_le(file)? as u64;
        let filename_len = read_u16_le(file)? as usize;
        let extra_len = read_u16_le(file)? as usize;
        let comment_len = read_u16_le(file)? as usize;

        // Skip disk number, internal attributes, external attributes
        file.seek(SeekFrom::Current(8))?;
        let mut offset = read_u32_le(file)? as u64;

        let mut filename_buf = vec![0u8; filename_len];
        file.read_exact(&mut filename_buf)?;
        let name = String::from_utf8_lossy(&filename_buf).into_owned();

        let mut extra = vec![0u8; extra_len];
        file.read_exact(&mut extra)?;
        apply_zip64_extra(
            &extra,
            &mut uncompressed_size,
            &mut compressed_size,
            &mut offset,
        );

        file.seek(SeekFrom::Current(comment_len as i64))?;

        entries.push(ZipEntry {
            name,
            compressed_size,
            uncompressed_size,
            compression_method,
            offset,
        });
    }

    Ok(entries)
}

/// Replace saturated 32-bit fields with the values of the ZIP64 extra field
fn apply_zip64_extra(extra: &[u8], uncompressed: &mut u64, compressed: &mut u64, offset: &mut u64) {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let id = u16::from_le_bytes([extra[pos], extra[pos + 1]]);
        let len = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        let body_end = (pos + 4 + len).min(extra.len());
        if id == ZIP64_EXTRA_FIELD_ID {
            let mut fields = extra[pos + 4..body_end].chunks_exact(8).map(|c| {
                let mut b = [0u8; 8];
                b.copy_from_slice(c);
                u64::from_le_bytes(b)
            });
            // Fields appear only for the values that overflowed, in this order
            for target in [uncompressed, compressed, offset] {
                if *target == 0xFFFF_FFFF {
                    match fields.next() {
                        Some(v) => *target = v,
                        None => break,
                    }
                }
            }
            return;
        }
        pos = body_end;
    }
}

/// Read entry count and directory offset from the ZIP64 end record
fn read_zip64_eocd(file: &mut File, eocd_offset: u64) -> Result<Option<(u64, u64)>> {
    if eocd_offset < 20 {
        return Ok(None);
    }
    file.seek(SeekFrom::Start(eocd_offset - 20))?;
    if read_u32_le(file)? != ZIP64_LOCATOR_SIGNATURE {
        return Ok(None);
    }
    file.seek(SeekFrom::Current(4))?;
    let record_offset = read_u64_le(file)?;

    file.seek(SeekFrom::Start(record_offset))?;
    if read_u32_le(file)? != ZIP64_END_OF_CENTRAL_DIRECTORY_SIGNATURE {
        return Err(XlsxStreamError::corrupt(
            "Invalid ZIP64 end of central directory record",
        ));
    }
    // Skip record size, versions, disk numbers and entries on this disk
    file.seek(SeekFrom::Current(8 + 4 + 8 + 8))?;
    let total_entries = read_u64_le(file)?;
    let _cd_size = read_u64_le(file)?;
    let cd_offset = read_u64_le(file)?;

    Ok(Some((total_entries, cd_offset)))
}

/// Find the end of central directory record by scanning from the end of the file
fn find_eocd(file: &mut File) -> Result<u64> {
    let file_size = file.seek(SeekFrom::End(0))?;

    // EOCD is at least 22 bytes, search last 65KB (max comment size + EOCD)
    let search_start = file_size.saturating_sub(65557);
    file.seek(SeekFrom::Start(search_start))?;

    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;

    buffer
        .windows(4)
        .rposition(|w| w == END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes())
        .map(|i| search_start + i as u64)
        .ok_or_else(|| XlsxStreamError::corrupt("End of central directory not found"))
}

fn read_u16_le<R: Read>(r: &mut R) -> Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32_le<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64_le<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}
