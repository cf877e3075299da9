use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, Utc};

use super::constants::*;
use super::error::PacketError;
use super::packet::PacketKind;

/// # EpmTime
/// The EPM coarse/fine timestamp pair. Coarse time is whole GPS seconds, fine time is tenths of a millisecond.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpmTime {
    pub coarse: u32,
    pub fine: u16,
}

impl EpmTime {

    /// Current wall-clock time in EPM representation
    pub fn now() -> Self {
        Self::from_datetime(&Utc::now())
    }

    pub fn from_datetime(time: &DateTime<Utc>) -> Self {
        //UTC counts leap seconds, GPS does not
        let coarse = time.timestamp() - UNIX_TO_GPS_OFFSET_SECONDS + GPS_LEAP_SECONDS;
        //subsec millis can read past 999 inside a leap second
        let millis = time.timestamp_subsec_millis().min(999);
        EpmTime { coarse: coarse as u32, fine: (millis * 10) as u16 }
    }

    pub fn to_seconds(&self) -> f64 {
        self.coarse as f64 + (self.fine as f64 / FINE_TIME_PER_SECOND)
    }
}

fn check_length(buffer_length: usize, needed: usize) -> Result<(), PacketError> {
    if buffer_length < needed {
        return Err(PacketError::BufferTooShort(buffer_length, needed));
    }
    Ok(())
}

/// # TransferFrameHeader
/// The outer framing of every EPM LAN packet, including the bare connect frame sent by clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferFrameHeader {
    pub sync_marker: u32,
    pub spare1: u8,
    pub software_unit_id: u8,
    pub packet_type: u16,
    pub spare2: u16,
    pub number_of_words: u16, //16-bit words following this header
}

impl TransferFrameHeader {

    /// The frame a client sends to start the telemetry stream
    pub fn connect(software_unit_id: u8) -> Self {
        TransferFrameHeader {
            sync_marker: EPM_TRANSFER_FRAME_SYNC_VALUE,
            spare1: 0,
            software_unit_id,
            packet_type: TRANSFER_FRAME_CONNECT,
            spare2: 0,
            number_of_words: 0,
        }
    }

    pub fn is_connect(&self) -> bool {
        self.packet_type == TRANSFER_FRAME_CONNECT
    }

    pub fn read_from_buffer(buffer: &[u8]) -> Result<Self, PacketError> {
        check_length(buffer.len(), TRANSFER_FRAME_HEADER_LENGTH)?;
        let mut cursor = Cursor::new(buffer);
        Self::read_from_cursor(&mut cursor)
    }

    pub fn write_to_buffer(&self, buffer: &mut [u8]) -> Result<(), PacketError> {
        check_length(buffer.len(), TRANSFER_FRAME_HEADER_LENGTH)?;
        let mut cursor = Cursor::new(buffer);
        self.write_to_cursor(&mut cursor)
    }

    fn read_from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self, PacketError> {
        let mut header = TransferFrameHeader::default();
        header.sync_marker = cursor.read_u32::<BigEndian>()?;
        header.spare1 = cursor.read_u8()?;
        header.software_unit_id = cursor.read_u8()?;
        header.packet_type = cursor.read_u16::<BigEndian>()?;
        header.spare2 = cursor.read_u16::<BigEndian>()?;
        header.number_of_words = cursor.read_u16::<BigEndian>()?;
        Ok(header)
    }

    fn write_to_cursor(&self, cursor: &mut Cursor<&mut [u8]>) -> Result<(), PacketError> {
        cursor.write_u32::<BigEndian>(self.sync_marker)?;
        cursor.write_u8(self.spare1)?;
        cursor.write_u8(self.software_unit_id)?;
        cursor.write_u16::<BigEndian>(self.packet_type)?;
        cursor.write_u16::<BigEndian>(self.spare2)?;
        cursor.write_u16::<BigEndian>(self.number_of_words)?;
        Ok(())
    }
}

/// # TelemetryHeader
/// The transfer frame plus the EPM telemetry fields. Every GRIP RT and HK packet starts with one.
/// All multi-byte fields are big-endian on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetryHeader {
    pub transfer_frame: TransferFrameHeader,
    pub epm_sync_marker: u32,
    pub subsystem_mode: u8,
    pub subsystem_id: u8,
    pub destination: u8,
    pub subsystem_unit_id: u8,
    pub tm_identifier: u16,
    pub tm_counter: u16,
    pub model: u8,
    pub task_id: u8,
    pub subsystem_unit_version: u16,
    pub coarse_time: u32,
    pub fine_time: u16,
    pub timer_status: u8,
    pub experiment_mode: u8,
    pub checksum_indicator: u16,
    pub receiver_subsystem_id: u8,
    pub receiver_subsystem_unit_id: u8,
    pub number_of_words: u16, //16-bit words following this header
}

impl TelemetryHeader {

    /// A GRIP header of the given kind, sized for a packet of packet_length bytes. Counter and time are left at zero.
    pub fn grip(kind: PacketKind, packet_length: usize) -> Self {
        let tm_identifier = match kind {
            PacketKind::Realtime => GRIP_RT_ID,
            PacketKind::Housekeeping => GRIP_HK_ID,
            PacketKind::Other(id) => id,
        };
        TelemetryHeader {
            transfer_frame: TransferFrameHeader {
                sync_marker: EPM_TRANSFER_FRAME_SYNC_VALUE,
                spare1: 0,
                software_unit_id: GRIP_ONBOARD_SOFTWARE_UNIT_ID,
                packet_type: TRANSFER_FRAME_TELEMETRY,
                spare2: 0,
                number_of_words: ((packet_length - TRANSFER_FRAME_HEADER_LENGTH) / 2) as u16,
            },
            epm_sync_marker: EPM_TELEMETRY_SYNC_VALUE,
            subsystem_mode: 0x02,
            subsystem_id: GRIP_SUBSYSTEM_ID,
            destination: 0,
            subsystem_unit_id: GRIP_SUBSYSTEM_UNIT_ID,
            tm_identifier,
            receiver_subsystem_id: 0,
            receiver_subsystem_unit_id: 0,
            number_of_words: ((packet_length - TELEMETRY_HEADER_LENGTH) / 2) as u16,
            ..Default::default()
        }
    }

    pub fn read_from_buffer(buffer: &[u8]) -> Result<Self, PacketError> {
        check_length(buffer.len(), TELEMETRY_HEADER_LENGTH)?;
        let mut cursor = Cursor::new(buffer);
        let mut header = TelemetryHeader::default();
        header.transfer_frame = TransferFrameHeader::read_from_cursor(&mut cursor)?;
        header.epm_sync_marker = cursor.read_u32::<BigEndian>()?;
        header.subsystem_mode = cursor.read_u8()?;
        header.subsystem_id = cursor.read_u8()?;
        header.destination = cursor.read_u8()?;
        header.subsystem_unit_id = cursor.read_u8()?;
        header.tm_identifier = cursor.read_u16::<BigEndian>()?;
        header.tm_counter = cursor.read_u16::<BigEndian>()?;
        header.model = cursor.read_u8()?;
        header.task_id = cursor.read_u8()?;
        header.subsystem_unit_version = cursor.read_u16::<BigEndian>()?;
        header.coarse_time = cursor.read_u32::<BigEndian>()?;
        header.fine_time = cursor.read_u16::<BigEndian>()?;
        header.timer_status = cursor.read_u8()?;
        header.experiment_mode = cursor.read_u8()?;
        header.checksum_indicator = cursor.read_u16::<BigEndian>()?;
        header.receiver_subsystem_id = cursor.read_u8()?;
        header.receiver_subsystem_unit_id = cursor.read_u8()?;
        header.number_of_words = cursor.read_u16::<BigEndian>()?;
        Ok(header)
    }

    pub fn write_to_buffer(&self, buffer: &mut [u8]) -> Result<(), PacketError> {
        check_length(buffer.len(), TELEMETRY_HEADER_LENGTH)?;
        let mut cursor = Cursor::new(buffer);
        self.transfer_frame.write_to_cursor(&mut cursor)?;
        cursor.write_u32::<BigEndian>(self.epm_sync_marker)?;
        cursor.write_u8(self.subsystem_mode)?;
        cursor.write_u8(self.subsystem_id)?;
        cursor.write_u8(self.destination)?;
        cursor.write_u8(self.subsystem_unit_id)?;
        cursor.write_u16::<BigEndian>(self.tm_identifier)?;
        cursor.write_u16::<BigEndian>(self.tm_counter)?;
        cursor.write_u8(self.model)?;
        cursor.write_u8(self.task_id)?;
        cursor.write_u16::<BigEndian>(self.subsystem_unit_version)?;
        cursor.write_u32::<BigEndian>(self.coarse_time)?;
        cursor.write_u16::<BigEndian>(self.fine_time)?;
        cursor.write_u8(self.timer_status)?;
        cursor.write_u8(self.experiment_mode)?;
        cursor.write_u16::<BigEndian>(self.checksum_indicator)?;
        cursor.write_u8(self.receiver_subsystem_id)?;
        cursor.write_u8(self.receiver_subsystem_unit_id)?;
        cursor.write_u16::<BigEndian>(self.number_of_words)?;
        Ok(())
    }

    pub fn time(&self) -> EpmTime {
        EpmTime { coarse: self.coarse_time, fine: self.fine_time }
    }

    pub fn set_time(&mut self, time: EpmTime) {
        self.coarse_time = time.coarse;
        self.fine_time = time.fine;
    }

    /// Packet timestamp in seconds since the GPS epoch
    pub fn timestamp(&self) -> f64 {
        self.time().to_seconds()
    }

    pub fn is_epm(&self) -> bool {
        self.epm_sync_marker == EPM_TELEMETRY_SYNC_VALUE
    }

    pub fn is_grip(&self) -> bool {
        self.is_epm() && self.subsystem_id == GRIP_SUBSYSTEM_ID
    }

    pub fn kind(&self) -> PacketKind {
        PacketKind::from(self.tm_identifier)
    }
}
