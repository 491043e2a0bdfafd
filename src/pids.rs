//! Parameter ids of ANSI E1.20 Table A-3.
//!
//! Parameter ids are plain `u16` values on the wire. New ones can be used with
//! [crate::rdm_controller::RdmController::rdm_get] and
//! [crate::rdm_controller::RdmController::rdm_set] without any change to the framing.

// Network management
pub const DISC_UNIQUE_BRANCH: u16 = 0x0001;
pub const DISC_MUTE: u16 = 0x0002;
pub const DISC_UN_MUTE: u16 = 0x0003;
pub const PROXIED_DEVICES: u16 = 0x0010;
pub const PROXIED_DEVICE_COUNT: u16 = 0x0011;

// Status collection
pub const QUEUED_MESSAGE: u16 = 0x0020;
pub const STATUS_MESSAGES: u16 = 0x0030;

// Rdm information
pub const SUPPORTED_PARAMETERS: u16 = 0x0050;
pub const PARAMETER_DESCRIPTION: u16 = 0x0051;

// Product information
pub const DEVICE_INFO: u16 = 0x0060;
pub const PRODUCT_DETAIL_ID_LIST: u16 = 0x0070;
pub const DEVICE_MODEL_DESCRIPTION: u16 = 0x0080;
pub const MANUFACTURER_LABEL: u16 = 0x0081;
pub const DEVICE_LABEL: u16 = 0x0082;
pub const SOFTWARE_VERSION_LABEL: u16 = 0x00C0;
pub const BOOT_SOFTWARE_VERSION_ID: u16 = 0x00C1;
pub const BOOT_SOFTWARE_VERSION_LABEL: u16 = 0x00C2;

// Dmx512 setup
pub const DMX_PERSONALITY: u16 = 0x00E0;
pub const DMX_PERSONALITY_DESCRIPTION: u16 = 0x00E1;
pub const DMX_START_ADDRESS: u16 = 0x00F0;

// Sensors
pub const SENSOR_DEFINITION: u16 = 0x0200;
pub const SENSOR_VALUE: u16 = 0x0201;

// Control
pub const IDENTIFY_DEVICE: u16 = 0x1000;
pub const RESET_DEVICE: u16 = 0x1001;
