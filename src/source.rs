use std::io::Write;

use super::config::{Config, PacketSourceKind};
use super::error::SourceError;
use super::playback::RecordedPlayback;
use super::synthesis::ConstructedSynthesis;

/// # PacketSource
/// A producer of outgoing telemetry for one client session. stream() writes packets to the sink
/// until a write fails, then returns how many packets went out. Counters start over with each call.
pub trait PacketSource: Send {
    fn describe(&self) -> String;
    fn stream(&mut self, sink: &mut dyn Write) -> Result<u64, SourceError>;
}

/// Build the engine named in the config. Nothing is opened until the first session streams.
pub fn create_packet_source(config: &Config) -> Box<dyn PacketSource> {
    match config.packet_source {
        PacketSourceKind::Recorded => Box::new(RecordedPlayback::new(&config.playback)),
        PacketSourceKind::Constructed => Box::new(ConstructedSynthesis::new(&config.synthesis)),
    }
}

/// Write one packet, logging the failure if the client went away. Returns false on failure.
pub(crate) fn send_packet(sink: &mut dyn Write, bytes: &[u8], what: &str, counter: u16) -> bool {
    match sink.write_all(bytes) {
        Ok(()) => {
            log::debug!("{} packet {} sent: {} bytes", what, counter, bytes.len());
            true
        }
        Err(e) => {
            log::info!("{} packet send failed: {}", what, e);
            false
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::{self, Write};

    /// A sink that accepts a fixed number of writes, then fails like a closed socket
    pub struct LimitedSink {
        pub writes: Vec<Vec<u8>>,
        remaining: usize,
    }

    impl LimitedSink {
        pub fn new(max_writes: usize) -> Self {
            LimitedSink { writes: Vec::new(), remaining: max_writes }
        }
    }

    impl Write for LimitedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "client closed"));
            }
            self.remaining -= 1;
            self.writes.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
