use std::io::Write;
use std::thread::sleep;

use human_bytes::human_bytes;

use super::config::PlaybackConfig;
use super::constants::EPM_BUFFER_LENGTH;
use super::epm_header::EpmTime;
use super::error::{PacketFileError, SourceError};
use super::packet::{PacketClass, PacketKind};
use super::packet_file::PacketFile;
use super::source::{send_packet, PacketSource};

/// # RecordedPlayback
/// Replays a capture file as if its GRIP packets were being generated now. Time and TM counter are
/// rewritten on every sent packet; everything else goes out as recorded. At the end of the file the
/// engine pauses and starts over, until the client goes away.
///
/// Pacing is a fixed policy per packet kind, the recorded inter-packet timing is not reproduced.
#[derive(Debug, Clone)]
pub struct RecordedPlayback {
    config: PlaybackConfig,
}

impl RecordedPlayback {
    pub fn new(config: &PlaybackConfig) -> Self {
        RecordedPlayback { config: config.clone() }
    }

    fn open_capture(&self) -> Result<PacketFile, PacketFileError> {
        let capture = PacketFile::open(&self.config.capture_file, EPM_BUFFER_LENGTH)?;
        if capture.get_record_count() == 0 {
            return Err(PacketFileError::EmptyFile(self.config.capture_file.clone()));
        }
        log::info!(
            "Sending out recorded packets from {} ({}, {} records)",
            capture.get_filename().display(),
            human_bytes(capture.get_size_bytes() as f64),
            capture.get_record_count()
        );
        Ok(capture)
    }
}

impl PacketSource for RecordedPlayback {

    fn describe(&self) -> String {
        format!("recorded playback of {}", self.config.capture_file.display())
    }

    fn stream(&mut self, sink: &mut dyn Write) -> Result<u64, SourceError> {
        let mut tm_counter: u16 = 0;
        let mut packets_sent: u64 = 0;

        loop {
            let mut capture = self.open_capture()?;
            let mut non_epm: u64 = 0;
            let mut non_grip: u64 = 0;

            while let Some(mut packet) = capture.get_next_packet()? {
                let kind = match packet.classify()? {
                    PacketClass::NotEpm => {
                        non_epm += 1;
                        log::trace!("Skipping non EPM record");
                        continue;
                    }
                    PacketClass::NotGrip => {
                        non_grip += 1;
                        log::trace!("Skipping non GRIP EPM record");
                        continue;
                    }
                    PacketClass::Grip(kind) => kind,
                };

                let mut header = packet.telemetry_header()?;
                header.set_time(EpmTime::now());
                header.tm_counter = tm_counter;
                packet.set_telemetry_header(&header)?;

                if !send_packet(sink, packet.as_bytes(), "Recorded", tm_counter) {
                    return Ok(packets_sent);
                }
                tm_counter = tm_counter.wrapping_add(1);
                packets_sent += 1;

                match kind {
                    PacketKind::Realtime => sleep(self.config.realtime_pause()),
                    _ => sleep(self.config.other_pause()),
                }
            }

            log::info!(
                "Playback completed: {} packets sent so far, {} non EPM and {} non GRIP records skipped. Restarting in {:?}",
                packets_sent, non_epm, non_grip, self.config.restart_pause()
            );
            sleep(self.config.restart_pause());
        }
    }
}
