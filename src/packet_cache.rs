use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use human_bytes::human_bytes;

use super::config::CacheConfig;
use super::constants::*;
use super::epm_header::TelemetryHeader;
use super::error::CacheError;
use super::housekeeping::HealthAndStatusRecord;
use super::packet::{PacketKind, RawPacket};
use super::packet_file::PacketFile;
use super::realtime::RealtimeDataRecord;

/// Name of the cache file holding packets of the given kind. The root may include a directory.
pub fn cache_filename(root: &Path, kind: PacketKind) -> PathBuf {
    let suffix = match kind {
        PacketKind::Realtime => RT_CACHE_SUFFIX,
        PacketKind::Housekeeping => HK_CACHE_SUFFIX,
        PacketKind::Other(_) => ANY_CACHE_SUFFIX,
    };
    let mut name = root.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Bounded retry for opening a cache the writer may still be creating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub pause: Duration,
}

impl From<&CacheConfig> for RetryPolicy {
    fn from(config: &CacheConfig) -> Self {
        RetryPolicy { max_attempts: config.max_open_retries, pause: config.retry_pause() }
    }
}

/// Open a file read-only, trying up to max_attempts times (at least once) with a pause in between.
pub fn open_with_retry(path: &Path, policy: &RetryPolicy) -> Result<File, CacheError> {
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match File::open(path) {
            Ok(file) => return Ok(file),
            Err(e) if attempt >= attempts => {
                return Err(CacheError::OpenRetriesExhausted(path.to_path_buf(), attempts, e))
            }
            Err(e) => {
                log::debug!("Attempt {} to open {} failed: {}", attempt, path.display(), e);
                std::thread::sleep(policy.pause);
                attempt += 1;
            }
        }
    }
}

/// True if current is a step forward from previous, allowing for the 16-bit wrap
fn counter_advanced(previous: u16, current: u16) -> bool {
    let step = current.wrapping_sub(previous);
    step != 0 && step < 0x8000
}

/// Compare against the last counter seen and remember the new one
fn update_freshness(previous: &mut Option<u16>, counter: u16) -> bool {
    let changed = *previous != Some(counter);
    *previous = Some(counter);
    changed
}

/// The newest record found in a cache file
#[derive(Debug, Clone)]
pub struct CacheReading<T> {
    pub header: TelemetryHeader,
    pub record: T,
    /// The counter differs from the previous read of the same cache. A reader starts with no
    /// counter, so its first successful read always reports changed.
    pub changed: bool,
}

/// # PacketCache
/// Reader for the append-only packet caches written by the ground side. Each read scans the whole
/// file and keeps the last record; the counter of that record is retained per kind so that callers
/// can tell whether anything new arrived since their last read.
#[derive(Debug)]
pub struct PacketCache {
    root: PathBuf,
    retry: RetryPolicy,
    previous_hk_counter: Option<u16>,
    previous_rt_counter: Option<u16>,
}

impl PacketCache {

    pub fn new(root: &Path, retry: RetryPolicy) -> Self {
        PacketCache {
            root: root.to_path_buf(),
            retry,
            previous_hk_counter: None,
            previous_rt_counter: None,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(&config.root, RetryPolicy::from(config))
    }

    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Most recent housekeeping record in {root}.hk.gpk
    pub fn read_last_housekeeping(&mut self) -> Result<CacheReading<HealthAndStatusRecord>, CacheError> {
        let (header, packet) = self.scan_last(PacketKind::Housekeeping)?;
        let record = packet.housekeeping()?;
        let changed = update_freshness(&mut self.previous_hk_counter, header.tm_counter);
        Ok(CacheReading { header, record, changed })
    }

    /// Most recent realtime record in {root}.rt.gpk
    pub fn read_last_realtime(&mut self) -> Result<CacheReading<RealtimeDataRecord>, CacheError> {
        let (header, packet) = self.scan_last(PacketKind::Realtime)?;
        let record = packet.realtime_data()?;
        let changed = update_freshness(&mut self.previous_rt_counter, header.tm_counter);
        Ok(CacheReading { header, record, changed })
    }

    /// Read both caches once and log what they hold. An empty cache is reported, not an error.
    pub fn log_latest(&mut self) -> Result<(), CacheError> {
        match self.read_last_housekeeping() {
            Ok(reading) => log::info!(
                "HK counter {} ({}): user {} protocol {} task {} step {}, targets v{:#06x} h{:#06x}, tracker {} camera {}, cpu {}% mem {}%",
                reading.header.tm_counter,
                if reading.changed { "new" } else { "unchanged" },
                reading.record.user,
                reading.record.protocol,
                reading.record.task,
                reading.record.step,
                reading.record.vertical_target_feedback,
                reading.record.horizontal_target_feedback,
                reading.record.motion_tracker_status_enum,
                reading.record.crew_camera_status_enum,
                reading.record.cpu_usage,
                reading.record.memory_usage
            ),
            Err(e) if !e.is_fatal() => log::info!("{}", e),
            Err(e) => return Err(e),
        }

        match self.read_last_realtime() {
            Ok(reading) => {
                let last = &reading.record.slices[RT_SLICES_PER_PACKET - 1];
                log::info!(
                    "RT counter {} ({}): acquisition {} packet {} at {:.3} s, position [{:.1}, {:.1}, {:.1}], visible {}",
                    reading.header.tm_counter,
                    if reading.changed { "new" } else { "unchanged" },
                    reading.record.acquisition_id,
                    reading.record.rt_packet_count,
                    reading.record.packet_timestamp,
                    last.position[0],
                    last.position[1],
                    last.position[2],
                    last.manipulandum_visibility
                );
            }
            Err(e) if !e.is_fatal() => log::info!("{}", e),
            Err(e) => return Err(e),
        }
        Ok(())
    }

    /// Scan a cache to the end, validating each record, and return the last one
    fn scan_last(&self, kind: PacketKind) -> Result<(TelemetryHeader, RawPacket), CacheError> {
        let path = cache_filename(&self.root, kind);
        let file = open_with_retry(&path, &self.retry)?;
        let mut packets = PacketFile::from_file(file, &path, kind.packet_length())?;
        log::debug!("Scanning {} ({})", path.display(), human_bytes(packets.get_size_bytes() as f64));

        let mut last: Option<(TelemetryHeader, RawPacket)> = None;
        while let Some(packet) = packets.get_next_packet()? {
            let header = packet.telemetry_header()?;
            if !header.is_epm() || header.kind() != kind {
                return Err(CacheError::UnrecognizedPacket(path, header.epm_sync_marker, header.tm_identifier));
            }
            if kind == PacketKind::Realtime {
                if let Some((previous, _)) = &last {
                    if !counter_advanced(previous.tm_counter, header.tm_counter) {
                        log::warn!(
                            "TM counter did not increase in {}: {} followed by {}",
                            path.display(), previous.tm_counter, header.tm_counter
                        );
                    }
                }
            }
            last = Some((header, packet));
        }

        last.ok_or(CacheError::EmptyCache(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_wait(max_attempts: u32) -> RetryPolicy {
        RetryPolicy { max_attempts, pause: Duration::from_millis(1) }
    }

    fn hk_bytes(counter: u16, user: u16) -> Vec<u8> {
        let mut header = TelemetryHeader::grip(PacketKind::Housekeeping, HK_PACKET_LENGTH);
        header.tm_counter = counter;
        let mut packet = RawPacket::new();
        packet.set_telemetry_header(&header).unwrap();
        packet.set_housekeeping(&HealthAndStatusRecord { user, ..Default::default() }).unwrap();
        packet.as_framed_bytes(HK_PACKET_LENGTH).to_vec()
    }

    fn rt_bytes(counter: u16) -> Vec<u8> {
        let mut header = TelemetryHeader::grip(PacketKind::Realtime, RT_PACKET_LENGTH);
        header.tm_counter = counter;
        let mut packet = RawPacket::new();
        packet.set_telemetry_header(&header).unwrap();
        let record = RealtimeDataRecord { rt_packet_count: counter as u32, ..Default::default() };
        packet.set_realtime_data(&record).unwrap();
        packet.as_framed_bytes(RT_PACKET_LENGTH).to_vec()
    }

    fn append(path: &Path, bytes: &[u8]) {
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path).unwrap();
        file.write_all(bytes).unwrap();
    }

    #[test]
    fn test_cache_filenames() {
        let root = Path::new("/tmp/cache/GripPackets");
        assert_eq!(cache_filename(root, PacketKind::Realtime), PathBuf::from("/tmp/cache/GripPackets.rt.gpk"));
        assert_eq!(cache_filename(root, PacketKind::Housekeeping), PathBuf::from("/tmp/cache/GripPackets.hk.gpk"));
        assert_eq!(cache_filename(root, PacketKind::Other(0x4444)), PathBuf::from("/tmp/cache/GripPackets.any.gpk"));
    }

    #[test]
    fn test_housekeeping_freshness() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Grip");
        let path = cache_filename(&root, PacketKind::Housekeeping);
        append(&path, &hk_bytes(3, 11));
        append(&path, &hk_bytes(4, 12));

        let mut cache = PacketCache::new(&root, no_wait(1));
        let first = cache.read_last_housekeeping().unwrap();
        assert_eq!(first.header.tm_counter, 4);
        assert_eq!(first.record.user, 12);
        assert!(first.changed);

        let second = cache.read_last_housekeeping().unwrap();
        assert_eq!(second.header.tm_counter, 4);
        assert!(!second.changed);

        append(&path, &hk_bytes(5, 13));
        let third = cache.read_last_housekeeping().unwrap();
        assert_eq!(third.record.user, 13);
        assert!(third.changed);
    }

    #[test]
    fn test_freshness_is_per_kind() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Grip");
        append(&cache_filename(&root, PacketKind::Housekeeping), &hk_bytes(9, 1));
        append(&cache_filename(&root, PacketKind::Realtime), &rt_bytes(9));

        let mut cache = PacketCache::new(&root, no_wait(1));
        assert!(cache.read_last_housekeeping().unwrap().changed);
        let realtime = cache.read_last_realtime().unwrap();
        assert!(realtime.changed);
        assert_eq!(realtime.record.rt_packet_count, 9);
        assert!(!cache.read_last_realtime().unwrap().changed);
    }

    #[test]
    fn test_short_tail_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Grip");
        let path = cache_filename(&root, PacketKind::Realtime);
        append(&path, &rt_bytes(1));
        append(&path, &rt_bytes(2));
        append(&path, &rt_bytes(3)[..RT_PACKET_LENGTH / 3]);

        let mut cache = PacketCache::new(&root, no_wait(1));
        assert_eq!(cache.read_last_realtime().unwrap().header.tm_counter, 2);
    }

    #[test]
    fn test_empty_cache_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Grip");
        append(&cache_filename(&root, PacketKind::Housekeeping), &[]);

        let mut cache = PacketCache::new(&root, no_wait(1));
        let error = cache.read_last_housekeeping().unwrap_err();
        assert!(matches!(error, CacheError::EmptyCache(_)));
        assert!(!error.is_fatal());
    }

    #[test]
    fn test_open_succeeds_once_file_appears() {
        let dir = tempfile::tempdir().unwrap();
        let path = cache_filename(&dir.path().join("Grip"), PacketKind::Realtime);
        let writer_path = path.clone();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            append(&writer_path, &rt_bytes(1));
        });

        let policy = RetryPolicy { max_attempts: 50, pause: Duration::from_millis(20) };
        let opened = open_with_retry(&path, &policy);
        writer.join().unwrap();
        assert!(opened.is_ok());
    }

    #[test]
    fn test_retries_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = PacketCache::new(&dir.path().join("Missing"), no_wait(3));
        match cache.read_last_housekeeping() {
            Err(CacheError::OpenRetriesExhausted(path, attempts, _)) => {
                assert_eq!(attempts, 3);
                assert!(path.to_string_lossy().ends_with(".hk.gpk"));
            }
            other => panic!("Expected OpenRetriesExhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_packet_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Grip");
        let path = cache_filename(&root, PacketKind::Housekeeping);
        append(&path, &hk_bytes(1, 1));
        append(&path, &vec![0u8; HK_PACKET_LENGTH]);

        let mut cache = PacketCache::new(&root, no_wait(1));
        let error = cache.read_last_housekeeping().unwrap_err();
        assert!(matches!(error, CacheError::UnrecognizedPacket(_, 0, 0)));
        assert!(error.is_fatal());
    }

    #[test]
    fn test_log_latest_tolerates_empty_caches() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("Grip");
        append(&cache_filename(&root, PacketKind::Housekeeping), &hk_bytes(1, 1));
        append(&cache_filename(&root, PacketKind::Realtime), &[]);

        let mut cache = PacketCache::new(&root, no_wait(1));
        cache.log_latest().unwrap();
    }

    #[test]
    fn test_counter_advanced() {
        assert!(counter_advanced(1, 2));
        assert!(counter_advanced(u16::MAX, 0));
        assert!(!counter_advanced(5, 5));
        assert!(!counter_advanced(5, 4));
    }
}
