use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::constants::*;
use super::epm_header::TelemetryHeader;
use super::error::PacketError;

pub const X: usize = 0;
pub const Y: usize = 1;
pub const Z: usize = 2;
pub const M: usize = 3;

/// One 3-axis force/torque sensor reading, force in N and torque in Nm
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ForceTorque {
    pub force: [f64; 3],
    pub torque: [f64; 3],
}

/// # DataSlice
/// A single time sample of manipulandum pose and analog data within a realtime packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataSlice {
    pub pose_tick: u32,
    pub position: [f64; 3], //mm
    pub quaternion: [f64; 4], //x, y, z, m
    pub marker_visibility: [u32; 2],
    pub manipulandum_visibility: bool,
    pub analog_tick: u32,
    pub ft: [ForceTorque; 2],
    pub acceleration: [f64; 3],
    pub best_guess_pose_timestamp: f64,
    pub best_guess_analog_timestamp: f64,
}

impl Default for DataSlice {
    fn default() -> Self {
        DataSlice {
            pose_tick: 0,
            position: [0.0; 3],
            quaternion: [0.0, 0.0, 0.0, 1.0], //null rotation
            marker_visibility: [0; 2],
            manipulandum_visibility: false,
            analog_tick: 0,
            ft: [ForceTorque::default(); 2],
            acceleration: [0.0; 3],
            best_guess_pose_timestamp: 0.0,
            best_guess_analog_timestamp: 0.0,
        }
    }
}

impl DataSlice {

    //Field order is the only way to find a field, so read and write must stay mirrored
    fn read_from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self, PacketError> {
        let mut slice = DataSlice::default();
        slice.pose_tick = cursor.read_u32::<BigEndian>()?;
        for axis in slice.position.iter_mut() {
            *axis = cursor.read_i16::<BigEndian>()? as f64 / POSITION_SCALE;
        }
        for component in slice.quaternion.iter_mut() {
            *component = cursor.read_f32::<BigEndian>()? as f64;
        }
        for mask in slice.marker_visibility.iter_mut() {
            *mask = cursor.read_u32::<BigEndian>()?;
        }
        slice.manipulandum_visibility = cursor.read_u8()? != 0;

        slice.analog_tick = cursor.read_u32::<BigEndian>()?;
        for sensor in slice.ft.iter_mut() {
            for axis in sensor.force.iter_mut() {
                *axis = cursor.read_i16::<BigEndian>()? as f64 / FORCE_SCALE;
            }
            for axis in sensor.torque.iter_mut() {
                *axis = cursor.read_i16::<BigEndian>()? as f64 / TORQUE_SCALE;
            }
        }
        for axis in slice.acceleration.iter_mut() {
            *axis = cursor.read_i32::<BigEndian>()? as f64 / ACCELERATION_SCALE / GRAVITY;
        }
        Ok(slice)
    }

    //Float to integer casts truncate toward zero, same as the wire format's producers.
    //A decoded value can therefore sit up to one full scale step closer to zero than the original.
    fn write_to_cursor(&self, cursor: &mut Cursor<&mut [u8]>) -> Result<(), PacketError> {
        cursor.write_u32::<BigEndian>(self.pose_tick)?;
        for axis in self.position.iter() {
            cursor.write_i16::<BigEndian>((axis * POSITION_SCALE) as i16)?;
        }
        for component in self.quaternion.iter() {
            cursor.write_f32::<BigEndian>(*component as f32)?;
        }
        for mask in self.marker_visibility.iter() {
            cursor.write_u32::<BigEndian>(*mask)?;
        }
        cursor.write_u8(self.manipulandum_visibility as u8)?;

        cursor.write_u32::<BigEndian>(self.analog_tick)?;
        for sensor in self.ft.iter() {
            for axis in sensor.force.iter() {
                cursor.write_i16::<BigEndian>((axis * FORCE_SCALE) as i16)?;
            }
            for axis in sensor.torque.iter() {
                cursor.write_i16::<BigEndian>((axis * TORQUE_SCALE) as i16)?;
            }
        }
        for axis in self.acceleration.iter() {
            cursor.write_i32::<BigEndian>((axis * ACCELERATION_SCALE * GRAVITY) as i32)?;
        }
        Ok(())
    }
}

/// # RealtimeDataRecord
/// The science payload of a GRIP RT packet: acquisition bookkeeping plus RT_SLICES_PER_PACKET data slices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealtimeDataRecord {
    pub acquisition_id: u32,
    pub rt_packet_count: u32,
    pub slices: [DataSlice; RT_SLICES_PER_PACKET],
    pub packet_timestamp: f64,
}

impl RealtimeDataRecord {

    /// Decode the payload of a full RT packet. The header is read as well, to timestamp the slices.
    pub fn read_from_buffer(buffer: &[u8]) -> Result<Self, PacketError> {
        if buffer.len() < RT_PACKET_LENGTH {
            return Err(PacketError::BufferTooShort(buffer.len(), RT_PACKET_LENGTH));
        }
        let header = TelemetryHeader::read_from_buffer(buffer)?;

        let mut cursor = Cursor::new(buffer);
        cursor.set_position(TELEMETRY_HEADER_LENGTH as u64);
        let mut record = RealtimeDataRecord::default();
        record.acquisition_id = cursor.read_u32::<BigEndian>()?;
        record.rt_packet_count = cursor.read_u32::<BigEndian>()?;
        for slice in record.slices.iter_mut() {
            *slice = DataSlice::read_from_cursor(&mut cursor)?;
        }

        record.assign_slice_timestamps(header.timestamp());
        Ok(record)
    }

    /// Encode the payload into a packet buffer. The header region is left untouched.
    pub fn write_to_buffer(&self, buffer: &mut [u8]) -> Result<(), PacketError> {
        if buffer.len() < RT_PACKET_LENGTH {
            return Err(PacketError::BufferTooShort(buffer.len(), RT_PACKET_LENGTH));
        }
        let mut cursor = Cursor::new(buffer);
        cursor.set_position(TELEMETRY_HEADER_LENGTH as u64);
        cursor.write_u32::<BigEndian>(self.acquisition_id)?;
        cursor.write_u32::<BigEndian>(self.rt_packet_count)?;
        for slice in self.slices.iter() {
            slice.write_to_cursor(&mut cursor)?;
        }
        Ok(())
    }

    /// The packet time is set once all of its data exist, so it belongs to the last slice.
    /// Earlier slices are assumed evenly spaced before it; the ticks are not trustworthy enough to do better.
    fn assign_slice_timestamps(&mut self, packet_timestamp: f64) {
        self.packet_timestamp = packet_timestamp;
        let mut timestamp = packet_timestamp;
        for slice in self.slices.iter_mut().rev() {
            slice.best_guess_pose_timestamp = timestamp;
            slice.best_guess_analog_timestamp = timestamp;
            timestamp -= RT_DEFAULT_SECONDS_PER_SLICE;
        }
    }
}
