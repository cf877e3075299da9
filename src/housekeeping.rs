use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::constants::*;
use super::error::PacketError;

const HK_VALUES_START: usize = TELEMETRY_HEADER_LENGTH + HK_VALUES_OFFSET;

/// # HealthAndStatusRecord
/// The subset of GRIP housekeeping values the ground side cares about. They sit at a fixed offset
/// inside the HK payload; the values before them are not decoded.
/// Decoding does not re-check the sync marker, the caller is expected to have validated the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthAndStatusRecord {
    pub horizontal_target_feedback: u16,
    pub vertical_target_feedback: u16,
    pub tone_feedback: u8,
    pub cradle_detectors: u8,
    pub user: u16,
    pub protocol: u16,
    pub task: u16,
    pub step: u16,
    pub script_engine_status_enum: u16,
    pub iochannel_status_enum: u16,
    pub motion_tracker_status_enum: u16,
    pub crew_camera_status_enum: u16,
    pub crew_camera_rate: u16,
    pub running_bits: u16,
    pub cpu_usage: u16,
    pub memory_usage: u16,
    pub free_disk_space_c: u32,
    pub free_disk_space_d: u32,
    pub free_disk_space_e: u32,
    pub crc: u16,
}

impl HealthAndStatusRecord {

    pub fn read_from_buffer(buffer: &[u8]) -> Result<Self, PacketError> {
        if buffer.len() < HK_PACKET_LENGTH {
            return Err(PacketError::BufferTooShort(buffer.len(), HK_PACKET_LENGTH));
        }
        let mut cursor = Cursor::new(buffer);
        cursor.set_position(HK_VALUES_START as u64);

        let mut record = HealthAndStatusRecord::default();
        record.horizontal_target_feedback = cursor.read_u16::<BigEndian>()?;
        record.vertical_target_feedback = cursor.read_u16::<BigEndian>()?;
        record.tone_feedback = cursor.read_u8()?;
        record.cradle_detectors = cursor.read_u8()?;

        record.user = cursor.read_u16::<BigEndian>()?;
        record.protocol = cursor.read_u16::<BigEndian>()?;
        record.task = cursor.read_u16::<BigEndian>()?;
        record.step = cursor.read_u16::<BigEndian>()?;

        record.script_engine_status_enum = cursor.read_u16::<BigEndian>()?;
        record.iochannel_status_enum = cursor.read_u16::<BigEndian>()?;
        record.motion_tracker_status_enum = cursor.read_u16::<BigEndian>()?;
        record.crew_camera_status_enum = cursor.read_u16::<BigEndian>()?;
        record.crew_camera_rate = cursor.read_u16::<BigEndian>()?;

        record.running_bits = cursor.read_u16::<BigEndian>()?;
        record.cpu_usage = cursor.read_u16::<BigEndian>()?;
        record.memory_usage = cursor.read_u16::<BigEndian>()?;

        record.free_disk_space_c = cursor.read_u32::<BigEndian>()?;
        record.free_disk_space_d = cursor.read_u32::<BigEndian>()?;
        record.free_disk_space_e = cursor.read_u32::<BigEndian>()?;

        record.crc = cursor.read_u16::<BigEndian>()?;
        Ok(record)
    }

    pub fn write_to_buffer(&self, buffer: &mut [u8]) -> Result<(), PacketError> {
        if buffer.len() < HK_PACKET_LENGTH {
            return Err(PacketError::BufferTooShort(buffer.len(), HK_PACKET_LENGTH));
        }
        let mut cursor = Cursor::new(buffer);
        cursor.set_position(HK_VALUES_START as u64);

        cursor.write_u16::<BigEndian>(self.horizontal_target_feedback)?;
        cursor.write_u16::<BigEndian>(self.vertical_target_feedback)?;
        cursor.write_u8(self.tone_feedback)?;
        cursor.write_u8(self.cradle_detectors)?;

        cursor.write_u16::<BigEndian>(self.user)?;
        cursor.write_u16::<BigEndian>(self.protocol)?;
        cursor.write_u16::<BigEndian>(self.task)?;
        cursor.write_u16::<BigEndian>(self.step)?;

        cursor.write_u16::<BigEndian>(self.script_engine_status_enum)?;
        cursor.write_u16::<BigEndian>(self.iochannel_status_enum)?;
        cursor.write_u16::<BigEndian>(self.motion_tracker_status_enum)?;
        cursor.write_u16::<BigEndian>(self.crew_camera_status_enum)?;
        cursor.write_u16::<BigEndian>(self.crew_camera_rate)?;

        cursor.write_u16::<BigEndian>(self.running_bits)?;
        cursor.write_u16::<BigEndian>(self.cpu_usage)?;
        cursor.write_u16::<BigEndian>(self.memory_usage)?;

        cursor.write_u32::<BigEndian>(self.free_disk_space_c)?;
        cursor.write_u32::<BigEndian>(self.free_disk_space_d)?;
        cursor.write_u32::<BigEndian>(self.free_disk_space_e)?;

        cursor.write_u16::<BigEndian>(self.crc)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> HealthAndStatusRecord {
        HealthAndStatusRecord {
            horizontal_target_feedback: 0x0004,
            vertical_target_feedback: 0x0100,
            tone_feedback: 5,
            cradle_detectors: 0b0010_0100,
            user: 11,
            protocol: 201,
            task: 210,
            step: 10,
            script_engine_status_enum: 1,
            iochannel_status_enum: 2,
            motion_tracker_status_enum: 2,
            crew_camera_status_enum: 0,
            crew_camera_rate: 25,
            running_bits: 0x00FF,
            cpu_usage: 37,
            memory_usage: 61,
            free_disk_space_c: 120_000,
            free_disk_space_d: 0xDEAD_BEEF,
            free_disk_space_e: 7,
            crc: 0xA5A5,
        }
    }

    #[test]
    fn test_round_trip() {
        let record = sample_record();
        let mut buffer = vec![0u8; HK_PACKET_LENGTH];
        record.write_to_buffer(&mut buffer).unwrap();
        assert_eq!(HealthAndStatusRecord::read_from_buffer(&buffer).unwrap(), record);
    }

    #[test]
    fn test_fixed_offset_and_byte_order() {
        let mut buffer = vec![0u8; EPM_BUFFER_LENGTH];
        sample_record().write_to_buffer(&mut buffer).unwrap();

        //Nothing lands in the header or the skipped part of the payload
        assert!(buffer[..HK_VALUES_START].iter().all(|byte| *byte == 0));
        assert_eq!(&buffer[HK_VALUES_START..HK_VALUES_START + 2], &[0x00, 0x04]);
        assert_eq!(buffer[HK_VALUES_START + 4], 5);
        //disk D comes after the target/tone/cradle bytes, twelve u16 values and disk C
        let disk_d = HK_VALUES_START + 6 + 12 * 2 + 4;
        assert_eq!(&buffer[disk_d..disk_d + 4], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(&buffer[HK_PACKET_LENGTH - 2..HK_PACKET_LENGTH], &[0xA5, 0xA5]);
    }

    #[test]
    fn test_short_buffer_rejected() {
        let mut buffer = vec![0u8; HK_PACKET_LENGTH - 1];
        assert!(HealthAndStatusRecord::read_from_buffer(&buffer).is_err());
        assert!(sample_record().write_to_buffer(&mut buffer).is_err());
    }
}
