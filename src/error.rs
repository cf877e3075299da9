use std::fmt::Display;
use std::path::PathBuf;
use std::error::Error;

/*
    Packet (codec) errors
 */
#[derive(Debug)]
pub enum PacketError {
    IOError(std::io::Error),
    BufferTooShort(usize, usize),
    BufferTooLong(usize, usize),
}

impl From<std::io::Error> for PacketError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketError::IOError(e) => write!(f, "Error moving fields through packet buffer: {}", e),
            PacketError::BufferTooShort(found, needed) => write!(f, "Packet buffer too short! Found: {} bytes, Needed: {} bytes", found, needed),
            PacketError::BufferTooLong(found, max) => write!(f, "Packet buffer too long! Found: {} bytes, Maximum: {} bytes", found, max),
        }
    }
}

impl Error for PacketError {

}

/*
    PacketFile errors
 */
#[derive(Debug)]
pub enum PacketFileError {
    BadFilePath(PathBuf),
    EmptyFile(PathBuf),
    BadPacket(PacketError),
    IOError(std::io::Error),
}

impl From<std::io::Error> for PacketFileError {
    fn from(value: std::io::Error) -> Self {
        PacketFileError::IOError(value)
    }
}

impl From<PacketError> for PacketFileError {
    fn from(value: PacketError) -> Self {
        PacketFileError::BadPacket(value)
    }
}

impl Display for PacketFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketFileError::BadFilePath(path) => write!(f, "File {} does not exist at PacketFile::open!", path.display()),
            PacketFileError::EmptyFile(path) => write!(f, "File {} does not contain a single complete packet!", path.display()),
            PacketFileError::BadPacket(e) => write!(f, "Bad packet found when reading PacketFile! Error: {}", e),
            PacketFileError::IOError(e) => write!(f, "PacketFile received an io error: {}!", e),
        }
    }
}

impl Error for PacketFileError {

}

/*
    PacketCache errors
 */
#[derive(Debug)]
pub enum CacheError {
    OpenRetriesExhausted(PathBuf, u32, std::io::Error),
    UnrecognizedPacket(PathBuf, u32, u16),
    EmptyCache(PathBuf),
    FileError(PacketFileError),
    BadPacket(PacketError),
}

impl CacheError {
    /// An empty cache only means the writer has not produced anything yet
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CacheError::EmptyCache(_))
    }
}

impl From<PacketFileError> for CacheError {
    fn from(value: PacketFileError) -> Self {
        CacheError::FileError(value)
    }
}

impl From<PacketError> for CacheError {
    fn from(value: PacketError) -> Self {
        CacheError::BadPacket(value)
    }
}

impl Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::OpenRetriesExhausted(path, attempts, e) => write!(f, "Could not open cache {} after {} attempts! Last error: {}", path.display(), attempts, e),
            CacheError::UnrecognizedPacket(path, sync, id) => write!(f, "Unrecognized packet in cache {}! Sync marker: {:#010x}, TM identifier: {:#06x}", path.display(), sync, id),
            CacheError::EmptyCache(path) => write!(f, "Cache {} does not hold any packets yet", path.display()),
            CacheError::FileError(e) => write!(f, "PacketCache received a file error: {}", e),
            CacheError::BadPacket(e) => write!(f, "PacketCache received a packet error: {}", e),
        }
    }
}

impl Error for CacheError {

}

/*
    PacketSource errors
 */
#[derive(Debug)]
pub enum SourceError {
    FileError(PacketFileError),
    BadPacket(PacketError),
}

impl From<PacketFileError> for SourceError {
    fn from(value: PacketFileError) -> Self {
        SourceError::FileError(value)
    }
}

impl From<PacketError> for SourceError {
    fn from(value: PacketError) -> Self {
        SourceError::BadPacket(value)
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::FileError(e) => write!(f, "Packet source failed reading the capture file: {}", e),
            SourceError::BadPacket(e) => write!(f, "Packet source failed building a packet: {}", e),
        }
    }
}

impl Error for SourceError {

}

/*
    SessionServer errors
 */
#[derive(Debug)]
pub enum ServerError {
    IOError(std::io::Error),
    SourceError(SourceError),
}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        ServerError::IOError(value)
    }
}

impl From<SourceError> for ServerError {
    fn from(value: SourceError) -> Self {
        ServerError::SourceError(value)
    }
}

impl Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::IOError(e) => write!(f, "The session server received an io error: {}", e),
            ServerError::SourceError(e) => write!(f, "The session server's packet source failed: {}", e),
        }
    }
}

impl Error for ServerError {

}

/*
    Config errors
 */
#[derive(Debug)]
pub enum ConfigError {
    BadFilePath(PathBuf),
    IOError(std::io::Error),
    ParsingError(serde_yaml::Error)
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::IOError(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        ConfigError::ParsingError(value)
    }
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadFilePath(path) => write!(f, "File {} given to Config does not exist!", path.display()),
            Self::IOError(e) => write!(f, "Config received an io error: {}", e),
            Self::ParsingError(e) => write!(f, "Config received a parsing error: {}", e)
        }
    }
}

impl Error for ConfigError {

}
