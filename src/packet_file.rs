use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::error::PacketFileError;
use super::packet::RawPacket;

/// # PacketFile
/// A flat concatenation of fixed-length packet records with no delimiters or index. Capture files
/// use full EPM buffers as records, cache files use the length of the packet kind they hold.
///
/// The only access method is a sequential scan. A short read at the tail is treated as the end of the file.
#[derive(Debug)]
pub struct PacketFile {
    file_handle: BufReader<File>,
    file_path: PathBuf,
    size_bytes: u64,
    record_length: usize,
    is_eof: bool,
}

impl PacketFile {

    /// Open a packet file in read-only mode.
    pub fn open(path: &Path, record_length: usize) -> Result<Self, PacketFileError> {
        if !path.exists() {
            return Err(PacketFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Self::from_file(file, path, record_length)
    }

    /// Wrap a file that was already opened elsewhere
    pub fn from_file(file: File, path: &Path, record_length: usize) -> Result<Self, PacketFileError> {
        let size_bytes = file.metadata()?.len();
        Ok(PacketFile {
            file_handle: BufReader::new(file),
            file_path: path.to_path_buf(),
            size_bytes,
            record_length,
            is_eof: false,
        })
    }

    /// Retrieve the next record. Returns None once there is no complete record left.
    pub fn get_next_packet(&mut self) -> Result<Option<RawPacket>, PacketFileError> {
        if self.is_eof {
            return Ok(None);
        }
        let mut record: Vec<u8> = vec![0; self.record_length];
        match self.file_handle.read_exact(&mut record) {
            Err(e) => match e.kind() {
                std::io::ErrorKind::UnexpectedEof => {
                    self.is_eof = true;
                    Ok(None)
                }
                _ => Err(PacketFileError::IOError(e)),
            },
            Ok(()) => Ok(Some(RawPacket::try_from(record)?)),
        }
    }

    #[allow(dead_code)]
    pub fn is_eof(&self) -> bool {
        self.is_eof
    }

    pub fn get_filename(&self) -> &Path {
        &self.file_path
    }

    pub fn get_size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Number of complete records the file held when opened
    pub fn get_record_count(&self) -> u64 {
        self.size_bytes / self.record_length as u64
    }
}
