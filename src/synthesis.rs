use std::f64::consts::PI;
use std::io::Write;
use std::thread::sleep;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::SynthesisConfig;
use super::constants::*;
use super::epm_header::{EpmTime, TelemetryHeader};
use super::error::SourceError;
use super::housekeeping::HealthAndStatusRecord;
use super::packet::{PacketKind, RawPacket};
use super::realtime::{DataSlice, RealtimeDataRecord, M, X, Y, Z};
use super::source::{send_packet, PacketSource};

//Script engine state. These depend on the loaded scripts, so they are held constant
const SCRIPT_USER: u16 = 11;
const SCRIPT_PROTOCOL: u16 = 201;
const SCRIPT_TASK: u16 = 210;
const SCRIPT_STEP: u16 = 10;

const STATUS_IDLE: u16 = 0;
const STATUS_ACTIVE: u16 = 2; //acquiring or filming

const N_MOTION_PATTERNS: u32 = 6;
const N_TONES: u32 = 8;
const N_CRADLE_STATES: u32 = 4;

/// Housekeeping values that stay fixed for the length of an epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochStatus {
    pub vertical_targets: u16,
    pub horizontal_targets: u16,
    pub tone: u8,
    pub cradle: u8,
    pub motion_tracker_status: u16,
    pub crew_camera_status: u16,
}

/// Before the first epoch boundary nothing is lit, but the tracker and camera are running
impl Default for EpochStatus {
    fn default() -> Self {
        EpochStatus {
            vertical_targets: 0,
            horizontal_targets: 0,
            tone: 0,
            cradle: 0,
            motion_tracker_status: STATUS_ACTIVE,
            crew_camera_status: STATUS_ACTIVE,
        }
    }
}

impl EpochStatus {
    pub fn housekeeping_record(&self) -> HealthAndStatusRecord {
        HealthAndStatusRecord {
            horizontal_target_feedback: self.horizontal_targets,
            vertical_target_feedback: self.vertical_targets,
            tone_feedback: self.tone,
            cradle_detectors: self.cradle,
            user: SCRIPT_USER,
            protocol: SCRIPT_PROTOCOL,
            task: SCRIPT_TASK,
            step: SCRIPT_STEP,
            motion_tracker_status_enum: self.motion_tracker_status,
            crew_camera_status_enum: self.crew_camera_status,
            ..Default::default()
        }
    }
}

/// Status for an epoch: targets, tones and cradles cycle, the tracker idles one epoch in three
/// and the camera every other epoch.
pub fn epoch_status(epoch: u32) -> EpochStatus {
    let cradle = (epoch % N_CRADLE_STATES)
        | ((epoch + 1) % N_CRADLE_STATES) << 2
        | ((epoch + 2) % N_CRADLE_STATES) << 4;
    EpochStatus {
        vertical_targets: 1 << (epoch % N_VERTICAL_TARGETS),
        horizontal_targets: 1 << (epoch % N_HORIZONTAL_TARGETS),
        tone: (epoch % N_TONES) as u8,
        cradle: cradle as u8,
        motion_tracker_status: if epoch % 3 != 0 { STATUS_ACTIVE } else { STATUS_IDLE },
        crew_camera_status: if epoch % 2 != 0 { STATUS_ACTIVE } else { STATUS_IDLE },
    }
}

/// One slice of the motion pattern for this epoch, evaluated at time t (s) on a 1 Hz cycle.
/// Position, force and orientation are plausible each on their own, not coherent with each other.
/// The marker masks are (wrist, frame); visibility of the manipulandum is left to the occlusion model.
pub fn synthesize_slice(epoch: u32, t: f64) -> DataSlice {
    let s = (t * PI * 2.0).sin();
    let c = (t * PI * 2.0).cos();
    let dt2 = RT_DEFAULT_SECONDS_PER_SLICE * RT_DEFAULT_SECONDS_PER_SLICE;
    let sliding_force = -14.0 + 8.5 * s;

    let mut slice = DataSlice::default();
    match epoch % N_MOTION_PATTERNS {
        0 => { //left-right
            slice.position[X] = 300.0 + 300.0 * c;
            slice.acceleration[X] = -300.0 * c * dt2;
            slice.ft[0].force[X] = sliding_force;
            slice.ft[1].force[X] = -sliding_force;
            slice.marker_visibility = [0x000ff, 0xf0fff];
        }
        1 => { //up-down, frame partly hidden
            slice.position[Y] = 300.0 + 300.0 * c;
            slice.acceleration[Y] = -300.0 * c * dt2;
            slice.ft[0].force[Y] = 2.0 * s;
            slice.ft[1].force[Y] = 1.8 * s;
            slice.marker_visibility = [0x000ff, 0x0f0ff];
        }
        2 => { //in-out, wrist partly hidden
            slice.position[Z] = -300.0 + 200.0 * c;
            slice.acceleration[Z] = -200.0 * c * dt2;
            slice.ft[0].force[Z] = 3.0 * s;
            slice.ft[1].force[Z] = 3.2 * s;
            slice.marker_visibility = [0x00fff, 0x000ff];
        }
        3 => { //pitch, horizontal sliding centre of pressure
            slice.quaternion[X] = s / 2.0;
            slice.quaternion[M] = c / 2.0;
            slice.ft[0].force[X] = sliding_force;
            slice.ft[1].force[X] = -sliding_force;
            slice.ft[0].torque[Y] = sliding_force * 0.01 * s;
            slice.ft[1].torque[Y] = -sliding_force * 0.011 * s;
            slice.marker_visibility = [0xf0f0f, 0xfffff];
        }
        4 => { //yaw, vertical sliding centre of pressure
            slice.quaternion[Y] = s / 2.0;
            slice.quaternion[M] = c / 2.0;
            slice.ft[0].force[X] = sliding_force;
            slice.ft[1].force[X] = -sliding_force;
            slice.ft[0].torque[Z] = sliding_force * 0.01 * s;
            slice.ft[1].torque[Z] = -sliding_force * 0.011 * s;
            slice.marker_visibility = [0x0f0f0, 0xfffff];
        }
        _ => { //roll, diagonal sliding centre of pressure
            slice.quaternion[Z] = s / 2.0;
            slice.quaternion[M] = c / 2.0;
            slice.ft[0].force[X] = sliding_force;
            slice.ft[1].force[X] = -sliding_force;
            slice.ft[0].torque[Y] = sliding_force * 0.01 * s;
            slice.ft[1].torque[Y] = -sliding_force * 0.011 * s;
            slice.ft[0].torque[Z] = sliding_force * 0.01 * s;
            slice.ft[1].torque[Z] = -sliding_force * 0.011 * s;
            slice.marker_visibility = [0xfffff, 0xfffff];
        }
    }
    slice
}

/// A usable probability for random_bool. Anything that is not a finite number disables occlusion.
fn dropout_probability(configured: f64) -> f64 {
    if configured.is_finite() {
        configured.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// # OcclusionModel
/// Random dropouts of the manipulandum. A visible slice may start a dropout; the slices of the
/// dropout run are marked invisible and lose the low markers of both masks.
#[derive(Debug)]
pub struct OcclusionModel {
    probability: f64,
    min_slices: u32,
    max_slices: u32,
    remaining: u32,
    rng: StdRng,
}

impl OcclusionModel {
    pub fn new(config: &SynthesisConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        OcclusionModel {
            probability: dropout_probability(config.occlusion_probability),
            min_slices: config.min_dropout_slices.min(config.max_dropout_slices),
            max_slices: config.max_dropout_slices,
            remaining: 0,
            rng,
        }
    }

    pub fn apply(&mut self, slice: &mut DataSlice) {
        if self.remaining == 0 {
            slice.manipulandum_visibility = true;
            if self.rng.random_bool(self.probability) {
                self.remaining = self.rng.random_range(self.min_slices..=self.max_slices);
            }
        } else {
            slice.manipulandum_visibility = false;
            slice.marker_visibility[0] &= 0xfff00;
            slice.marker_visibility[1] &= 0xfff00;
            self.remaining -= 1;
        }
    }
}

/// # ConstructedSynthesis
/// Generates realtime packets on a 2 Hz wall-clock grid with a housekeeping packet every other cycle.
/// Every few packets the stream pauses to mimic a break between trials, and the motion pattern
/// and housekeeping status move on to the next epoch.
#[derive(Debug)]
pub struct ConstructedSynthesis {
    config: SynthesisConfig,
    occlusion: OcclusionModel,
}

impl ConstructedSynthesis {
    pub fn new(config: &SynthesisConfig) -> Self {
        ConstructedSynthesis { config: config.clone(), occlusion: OcclusionModel::new(config) }
    }

    /// Sleep past the last boundary, then up to the next multiple of the cadence, so the rate does not drift
    fn wait_for_cadence(&self) {
        sleep(self.config.settle());
        if self.config.cadence_ms == 0 {
            return;
        }
        let millis = Utc::now().timestamp_subsec_millis() as u64;
        let wait = (self.config.cadence_ms - millis % self.config.cadence_ms) % self.config.cadence_ms;
        sleep(Duration::from_millis(wait));
    }

    fn realtime_packet(&mut self, tm_counter: u16, rt_packet_count: u32, epoch: u32) -> Result<RawPacket, SourceError> {
        let mut header = TelemetryHeader::grip(PacketKind::Realtime, RT_PACKET_LENGTH);
        header.tm_counter = tm_counter;
        header.set_time(EpmTime::now());
        let packet_timestamp = header.timestamp();
        log::debug!("Timestamp: {:.3}", packet_timestamp);

        let tick = rt_packet_count.wrapping_add(1).wrapping_mul(RT_SLICES_PER_PACKET as u32);
        let mut record = RealtimeDataRecord { acquisition_id: 0, rt_packet_count, ..Default::default() };
        for (index, slice) in record.slices.iter_mut().enumerate() {
            let t = packet_timestamp + index as f64 * RT_DEFAULT_SECONDS_PER_SLICE;
            *slice = synthesize_slice(epoch, t);
            slice.pose_tick = tick;
            slice.analog_tick = tick;
            self.occlusion.apply(slice);
        }

        let mut packet = RawPacket::new();
        packet.set_telemetry_header(&header)?;
        packet.set_realtime_data(&record)?;

        let decoded = packet.realtime_data()?;
        log::trace!("RT packet {} last slice: {:?}", tm_counter, decoded.slices[RT_SLICES_PER_PACKET - 1]);
        Ok(packet)
    }

    fn housekeeping_packet(tm_counter: u16, status: &EpochStatus) -> Result<RawPacket, SourceError> {
        let mut header = TelemetryHeader::grip(PacketKind::Housekeeping, HK_PACKET_LENGTH);
        header.tm_counter = tm_counter;
        header.set_time(EpmTime::now());

        let mut packet = RawPacket::new();
        packet.set_telemetry_header(&header)?;
        packet.set_housekeeping(&status.housekeeping_record())?;
        Ok(packet)
    }
}

impl PacketSource for ConstructedSynthesis {

    fn describe(&self) -> String {
        String::from("constructed synthesis")
    }

    fn stream(&mut self, sink: &mut dyn Write) -> Result<u64, SourceError> {
        let mut packet_count: u64 = 0;
        let mut rt_packet_count: u32 = 0;
        let mut send_hk = true;
        let mut epoch: u32 = 0;
        let mut status = EpochStatus::default();

        loop {
            self.wait_for_cadence();
            let cycle_start = packet_count;

            let tm_counter = packet_count as u16;
            let packet = self.realtime_packet(tm_counter, rt_packet_count, epoch)?;
            if !send_packet(sink, packet.as_framed_bytes(RT_PACKET_LENGTH), "RT", tm_counter) {
                return Ok(packet_count);
            }
            packet_count += 1;
            rt_packet_count = rt_packet_count.wrapping_add(1);

            if send_hk {
                let tm_counter = packet_count as u16;
                let packet = Self::housekeeping_packet(tm_counter, &status)?;
                if !send_packet(sink, packet.as_framed_bytes(HK_PACKET_LENGTH), "HK", tm_counter) {
                    return Ok(packet_count);
                }
                packet_count += 1;
            }
            send_hk = !send_hk;

            //a cycle sends one or two packets, so look for a crossed boundary rather than an exact multiple
            let per_epoch = self.config.packets_per_epoch;
            if per_epoch != 0 && cycle_start / per_epoch != packet_count / per_epoch {
                log::info!("Simulating inter-trial pause after {} packets", packet_count);
                sleep(self.config.epoch_pause());
                status = epoch_status(epoch);
                epoch += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::testing::LimitedSink;

    fn fast_config() -> SynthesisConfig {
        SynthesisConfig {
            settle_ms: 0,
            cadence_ms: 0,
            packets_per_epoch: 20,
            epoch_pause_ms: 0,
            occlusion_probability: 0.0,
            min_dropout_slices: 5,
            max_dropout_slices: 15,
            seed: Some(42),
        }
    }

    fn counter_of(bytes: &[u8]) -> u16 {
        TelemetryHeader::read_from_buffer(bytes).unwrap().tm_counter
    }

    #[test]
    fn test_motion_patterns() {
        let slice = synthesize_slice(0, 0.0);
        assert_eq!(slice.position, [600.0, 0.0, 0.0]);
        assert_eq!(slice.ft[0].force[X], -14.0);
        assert_eq!(slice.ft[1].force[X], 14.0);
        assert_eq!(slice.marker_visibility, [0x000ff, 0xf0fff]);
        assert_eq!(slice.quaternion, [0.0, 0.0, 0.0, 1.0]);

        let slice = synthesize_slice(2, 0.5);
        assert!((slice.position[Z] - -500.0).abs() < 1e-9);
        assert_eq!(slice.marker_visibility, [0x00fff, 0x000ff]);

        let slice = synthesize_slice(4, 0.25);
        assert!((slice.quaternion[Y] - 0.5).abs() < 1e-9);
        assert!(slice.quaternion[M].abs() < 1e-9);

        //patterns recycle every six epochs
        assert_eq!(synthesize_slice(7, 0.3), synthesize_slice(1, 0.3));
    }

    #[test]
    fn test_epoch_status() {
        let status = epoch_status(0);
        assert_eq!(status.vertical_targets, 1);
        assert_eq!(status.horizontal_targets, 1);
        assert_eq!(status.tone, 0);
        assert_eq!(status.cradle, 0b10_01_00);
        assert_eq!(status.motion_tracker_status, STATUS_IDLE);
        assert_eq!(status.crew_camera_status, STATUS_IDLE);

        let status = epoch_status(3);
        assert_eq!(status.vertical_targets, 1 << 3);
        assert_eq!(status.cradle, 0b01_00_11);
        assert_eq!(status.motion_tracker_status, STATUS_IDLE);
        assert_eq!(status.crew_camera_status, STATUS_ACTIVE);

        let status = epoch_status(13);
        assert_eq!(status.vertical_targets, 1);
        assert_eq!(status.horizontal_targets, 1 << 4);
        assert_eq!(status.tone, 5);
        assert_eq!(status.motion_tracker_status, STATUS_ACTIVE);
    }

    #[test]
    fn test_occlusion_run() {
        let config = SynthesisConfig { occlusion_probability: 1.0, min_dropout_slices: 3, max_dropout_slices: 3, ..fast_config() };
        let mut occlusion = OcclusionModel::new(&config);
        let mut visibility = Vec::new();
        for _ in 0..5 {
            let mut slice = synthesize_slice(5, 0.0);
            occlusion.apply(&mut slice);
            if !slice.manipulandum_visibility {
                assert_eq!(slice.marker_visibility, [0xfff00, 0xfff00]);
            }
            visibility.push(slice.manipulandum_visibility);
        }
        assert_eq!(visibility, vec![true, false, false, false, true]);
    }

    #[test]
    fn test_unusable_probability_disables_occlusion() {
        assert_eq!(dropout_probability(f64::NAN), 0.0);
        assert_eq!(dropout_probability(f64::INFINITY), 0.0);
        assert_eq!(dropout_probability(1.5), 1.0);
        assert_eq!(dropout_probability(-0.5), 0.0);

        let config = SynthesisConfig { occlusion_probability: f64::NAN, ..fast_config() };
        let mut occlusion = OcclusionModel::new(&config);
        let mut slice = DataSlice::default();
        occlusion.apply(&mut slice);
        assert!(slice.manipulandum_visibility);
    }

    #[test]
    fn test_tick_wraps_with_packet_count() {
        let mut engine = ConstructedSynthesis::new(&fast_config());
        let packet = engine.realtime_packet(0, u32::MAX, 0).unwrap();
        let record = packet.realtime_data().unwrap();
        assert_eq!(record.rt_packet_count, u32::MAX);
        assert!(record.slices.iter().all(|slice| slice.pose_tick == 0 && slice.analog_tick == 0));
    }

    #[test]
    fn test_epoch_boundary_every_twenty_packets() {
        let mut engine = ConstructedSynthesis::new(&fast_config());
        let mut sink = LimitedSink::new(130);
        engine.stream(&mut sink).unwrap();

        //index of the first RT packet sent with a different motion pattern
        let mut changes = Vec::new();
        let mut previous_markers = None;
        for (index, bytes) in sink.writes.iter().enumerate() {
            if bytes.len() != RT_PACKET_LENGTH {
                continue;
            }
            let rt = RawPacket::try_from(bytes.clone()).unwrap().realtime_data().unwrap();
            let markers = rt.slices[0].marker_visibility;
            if previous_markers.is_some_and(|previous| previous != markers) {
                changes.push(index);
            }
            previous_markers = Some(markers);
        }

        assert_eq!(changes.len(), 6);
        for (epoch, index) in changes.iter().enumerate() {
            let boundary = 20 * (epoch + 1);
            assert!(*index == boundary || *index == boundary + 1, "epoch {} started at packet {}", epoch + 1, index);
        }
    }

    #[test]
    fn test_no_occlusion_when_disabled() {
        let mut occlusion = OcclusionModel::new(&fast_config());
        for _ in 0..100 {
            let mut slice = DataSlice::default();
            occlusion.apply(&mut slice);
            assert!(slice.manipulandum_visibility);
        }
    }

    #[test]
    fn test_realtime_then_housekeeping_alternation() {
        let mut engine = ConstructedSynthesis::new(&fast_config());
        let mut sink = LimitedSink::new(3);
        assert_eq!(engine.stream(&mut sink).unwrap(), 3);

        let lengths: Vec<usize> = sink.writes.iter().map(|bytes| bytes.len()).collect();
        assert_eq!(lengths, vec![RT_PACKET_LENGTH, HK_PACKET_LENGTH, RT_PACKET_LENGTH]);
        let counters: Vec<u16> = sink.writes.iter().map(|bytes| counter_of(bytes)).collect();
        assert_eq!(counters, vec![0, 1, 2]);

        let hk_packet = RawPacket::try_from(sink.writes[1].clone()).unwrap();
        let hk = hk_packet.housekeeping().unwrap();
        assert_eq!((hk.user, hk.protocol, hk.task, hk.step), (11, 201, 210, 10));
        assert_eq!(hk.motion_tracker_status_enum, STATUS_ACTIVE);

        let rt_packet = RawPacket::try_from(sink.writes[2].clone()).unwrap();
        let rt = rt_packet.realtime_data().unwrap();
        assert_eq!(rt.rt_packet_count, 1);
        assert_eq!(rt.slices[0].pose_tick, 2 * RT_SLICES_PER_PACKET as u32);
        assert!(rt.slices.iter().all(|slice| slice.manipulandum_visibility));
    }

    #[test]
    fn test_epoch_advances() {
        let config = SynthesisConfig { packets_per_epoch: 3, ..fast_config() };
        let mut engine = ConstructedSynthesis::new(&config);
        let mut sink = LimitedSink::new(6);
        engine.stream(&mut sink).unwrap();

        //RT HK RT | RT HK RT
        let lengths: Vec<usize> = sink.writes.iter().map(|bytes| bytes.len()).collect();
        assert_eq!(lengths, vec![RT_PACKET_LENGTH, HK_PACKET_LENGTH, RT_PACKET_LENGTH, RT_PACKET_LENGTH, HK_PACKET_LENGTH, RT_PACKET_LENGTH]);

        let first_hk = RawPacket::try_from(sink.writes[1].clone()).unwrap().housekeeping().unwrap();
        assert_eq!(first_hk.vertical_target_feedback, 0);
        let second_hk = RawPacket::try_from(sink.writes[4].clone()).unwrap().housekeeping().unwrap();
        assert_eq!(second_hk.vertical_target_feedback, 1);
        assert_eq!(second_hk.motion_tracker_status_enum, STATUS_IDLE);

        let rt = RawPacket::try_from(sink.writes[3].clone()).unwrap().realtime_data().unwrap();
        assert_eq!(rt.slices[0].marker_visibility, [0x000ff, 0x0f0ff]);
    }
}
