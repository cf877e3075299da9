use super::constants::*;
use super::epm_header::TelemetryHeader;
use super::error::PacketError;
use super::housekeeping::HealthAndStatusRecord;
use super::realtime::RealtimeDataRecord;

/// Telemetry payload type, selected by the TM identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Realtime,
    Housekeeping,
    Other(u16),
}

impl From<u16> for PacketKind {
    fn from(value: u16) -> Self {
        match value {
            GRIP_RT_ID => PacketKind::Realtime,
            GRIP_HK_ID => PacketKind::Housekeeping,
            _ => PacketKind::Other(value)
        }
    }
}

impl PacketKind {
    /// Number of bytes a packet of this kind occupies on the wire and in its cache file
    pub fn packet_length(&self) -> usize {
        match self {
            PacketKind::Realtime => RT_PACKET_LENGTH,
            PacketKind::Housekeeping => HK_PACKET_LENGTH,
            PacketKind::Other(_) => EPM_BUFFER_LENGTH,
        }
    }
}

/// What a RawPacket turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketClass {
    NotEpm,
    NotGrip,
    Grip(PacketKind),
}

/// # RawPacket
/// A fixed EPM_BUFFER_LENGTH byte buffer, the unit of network transfer and file storage.
/// Everything above this layer reads and writes it through the typed records.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPacket {
    buffer: Vec<u8>,
}

impl Default for RawPacket {
    fn default() -> Self {
        RawPacket { buffer: vec![0; EPM_BUFFER_LENGTH] }
    }
}

/// Records shorter than a full buffer (cache records, short frames) are zero padded
impl TryFrom<Vec<u8>> for RawPacket {
    type Error = PacketError;

    fn try_from(mut buffer: Vec<u8>) -> Result<Self, Self::Error> {
        if buffer.len() > EPM_BUFFER_LENGTH {
            return Err(PacketError::BufferTooLong(buffer.len(), EPM_BUFFER_LENGTH));
        }
        buffer.resize(EPM_BUFFER_LENGTH, 0);
        Ok(RawPacket { buffer })
    }
}

impl RawPacket {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// The leading length bytes, i.e. what goes on the wire for a packet of that size
    pub fn as_framed_bytes(&self, length: usize) -> &[u8] {
        &self.buffer[..length.min(EPM_BUFFER_LENGTH)]
    }

    pub fn telemetry_header(&self) -> Result<TelemetryHeader, PacketError> {
        TelemetryHeader::read_from_buffer(&self.buffer)
    }

    pub fn set_telemetry_header(&mut self, header: &TelemetryHeader) -> Result<(), PacketError> {
        header.write_to_buffer(&mut self.buffer)
    }

    pub fn realtime_data(&self) -> Result<RealtimeDataRecord, PacketError> {
        RealtimeDataRecord::read_from_buffer(&self.buffer)
    }

    pub fn set_realtime_data(&mut self, record: &RealtimeDataRecord) -> Result<(), PacketError> {
        record.write_to_buffer(&mut self.buffer)
    }

    pub fn housekeeping(&self) -> Result<HealthAndStatusRecord, PacketError> {
        HealthAndStatusRecord::read_from_buffer(&self.buffer)
    }

    pub fn set_housekeeping(&mut self, record: &HealthAndStatusRecord) -> Result<(), PacketError> {
        record.write_to_buffer(&mut self.buffer)
    }

    pub fn classify(&self) -> Result<PacketClass, PacketError> {
        let header = self.telemetry_header()?;
        if !header.is_epm() {
            Ok(PacketClass::NotEpm)
        } else if !header.is_grip() {
            Ok(PacketClass::NotGrip)
        } else {
            Ok(PacketClass::Grip(header.kind()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_identifier() {
        assert_eq!(PacketKind::from(GRIP_RT_ID), PacketKind::Realtime);
        assert_eq!(PacketKind::from(GRIP_HK_ID), PacketKind::Housekeeping);
        assert_eq!(PacketKind::from(0x7777), PacketKind::Other(0x7777));
    }

    #[test]
    fn test_short_record_is_padded() {
        let packet = RawPacket::try_from(vec![0xAB; HK_PACKET_LENGTH]).unwrap();
        assert_eq!(packet.as_bytes().len(), EPM_BUFFER_LENGTH);
        assert_eq!(packet.as_bytes()[HK_PACKET_LENGTH - 1], 0xAB);
        assert_eq!(packet.as_bytes()[HK_PACKET_LENGTH], 0);
    }

    #[test]
    fn test_oversized_record_rejected() {
        assert!(matches!(
            RawPacket::try_from(vec![0; EPM_BUFFER_LENGTH + 1]),
            Err(PacketError::BufferTooLong(_, _))
        ));
    }

    #[test]
    fn test_classify() {
        let mut packet = RawPacket::new();
        assert_eq!(packet.classify().unwrap(), PacketClass::NotEpm);

        let mut header = TelemetryHeader::grip(PacketKind::Realtime, RT_PACKET_LENGTH);
        header.subsystem_id = GRIP_SUBSYSTEM_ID + 1;
        packet.set_telemetry_header(&header).unwrap();
        assert_eq!(packet.classify().unwrap(), PacketClass::NotGrip);

        header.subsystem_id = GRIP_SUBSYSTEM_ID;
        packet.set_telemetry_header(&header).unwrap();
        assert_eq!(packet.classify().unwrap(), PacketClass::Grip(PacketKind::Realtime));
    }
}
