//Buffer and header sizes (bytes)
pub const EPM_BUFFER_LENGTH: usize = 1412;
pub const TRANSFER_FRAME_HEADER_LENGTH: usize = 12;
pub const TELEMETRY_HEADER_LENGTH: usize = 42;
pub const CONNECT_FRAME_LENGTH: usize = TRANSFER_FRAME_HEADER_LENGTH;

//Sync markers
pub const EPM_TRANSFER_FRAME_SYNC_VALUE: u32 = 0xEB90_146F;
pub const EPM_TELEMETRY_SYNC_VALUE: u32 = 0x1357_9BDF;

//Transfer frame packet types
pub const TRANSFER_FRAME_CONNECT: u16 = 0x0101;
pub const TRANSFER_FRAME_TELEMETRY: u16 = 0x0301;

//GRIP identifiers
pub const GRIP_SUBSYSTEM_ID: u8 = 0x21;
pub const GRIP_SUBSYSTEM_UNIT_ID: u8 = 0x01;
pub const GRIP_RT_ID: u16 = 0x1001;
pub const GRIP_HK_ID: u16 = 0x0301;
pub const GRIP_MMI_SOFTWARE_UNIT_ID: u8 = 0x2A;
pub const GRIP_MMI_SOFTWARE_ALT_UNIT_ID: u8 = 0x2B;
pub const GRIP_ONBOARD_SOFTWARE_UNIT_ID: u8 = 0x20;

//Realtime science payload
pub const RT_SLICES_PER_PACKET: usize = 10;
pub const RT_DEFAULT_SECONDS_PER_SLICE: f64 = 0.050;
pub const RT_SLICE_LENGTH: usize = 75;
pub const RT_PAYLOAD_LENGTH: usize = 8 + RT_SLICES_PER_PACKET * RT_SLICE_LENGTH;
pub const RT_PACKET_LENGTH: usize = TELEMETRY_HEADER_LENGTH + RT_PAYLOAD_LENGTH;

//Housekeeping payload. The ICD puts these values 68 bytes in, plus 8 bytes of HK list bookkeeping.
pub const HK_VALUES_OFFSET: usize = 76;
pub const HK_VALUES_LENGTH: usize = 44;
pub const HK_PACKET_LENGTH: usize = TELEMETRY_HEADER_LENGTH + HK_VALUES_OFFSET + HK_VALUES_LENGTH;

//Scale factors between wire integers and engineering units
pub const POSITION_SCALE: f64 = 10.0;
pub const FORCE_SCALE: f64 = 100.0;
pub const TORQUE_SCALE: f64 = 1000.0;
pub const ACCELERATION_SCALE: f64 = 1000.0;
pub const GRAVITY: f64 = 9.8;

//Time. EPM coarse time counts GPS seconds (epoch 1980-01-06), fine time tenths of a millisecond.
pub const UNIX_TO_GPS_OFFSET_SECONDS: i64 = 315_964_800;
pub const GPS_LEAP_SECONDS: i64 = 16;
pub const FINE_TIME_PER_SECOND: f64 = 10_000.0;

//Experiment hardware
pub const N_VERTICAL_TARGETS: u32 = 13;
pub const N_HORIZONTAL_TARGETS: u32 = 9;

//Cache file suffixes
pub const RT_CACHE_SUFFIX: &str = ".rt.gpk";
pub const HK_CACHE_SUFFIX: &str = ".hk.gpk";
pub const ANY_CACHE_SUFFIX: &str = ".any.gpk";
