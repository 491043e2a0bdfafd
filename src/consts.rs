pub const SC_RDM: u8 = 0xCC;
pub const SC_SUB_MESSAGE: u8 = 0x01;

pub const PREAMBLE_BYTE: u8 = 0xFE;
pub const SEPARATOR_BYTE: u8 = 0xAA;

pub const BROADCAST_UID: u64 = 0xFFFF_FFFFFFFF;
/// Highest value of the 48 bit uid space.
pub const MAX_UID: u64 = BROADCAST_UID;

pub const RDM_PROTOCOL_VERSION: u16 = 0x0100;
pub const PRODUCT_CATEGORY_FIXTURE: u16 = 0x0100;

/// Start code through parameter data length.
pub const RDM_HEADER_SIZE: usize = 24;
pub const RDM_CHECKSUM_SIZE: usize = 2;
pub const RDM_MAX_PARAMETER_DATA_LENGTH: usize = 230;
pub const RDM_MIN_PACKAGE_SIZE: usize = RDM_HEADER_SIZE + RDM_CHECKSUM_SIZE;
pub const RDM_MAX_PACKAGE_SIZE: usize = RDM_MIN_PACKAGE_SIZE + RDM_MAX_PARAMETER_DATA_LENGTH;
/// Excluding preamble and separator
pub const RDM_DISCOVERY_RESPONSE_SIZE: usize = 16;
/// Including 7 bytes preamble + 1 byte separator
pub const RDM_MAX_DISCOVERY_RESPONSE_SIZE: usize = RDM_DISCOVERY_RESPONSE_SIZE + 8;

pub const RDM_DEVICE_INFO_SIZE: usize = 0x13;
pub const RDM_MAX_SUPPORTED_PARAMETERS_PER_REQUEST: usize = RDM_MAX_PARAMETER_DATA_LENGTH / 2;

/// DMX512 channels in one universe, start code excluded.
pub const DMX_UNIVERSE_SIZE: usize = 512;

// Bus command bytes of the transceiver.
pub const TIMO_WRITE_REG_FLAG: u8 = 0x40;
pub const TIMO_READ_DMX_COMMAND: u8 = 0x81;
pub const TIMO_READ_ASC_COMMAND: u8 = 0x82;
pub const TIMO_READ_RDM_COMMAND: u8 = 0x83;
pub const TIMO_WRITE_DMX_COMMAND: u8 = 0x91;
pub const TIMO_WRITE_RDM_COMMAND: u8 = 0x92;
pub const TIMO_FW_BLOCK_CMD_1_COMMAND: u8 = 0x8E;
pub const TIMO_FW_BLOCK_CMD_2_COMMAND: u8 = 0x8F;
/// Padding byte. Never carries data.
pub const TIMO_NOP_COMMAND: u8 = 0xFF;

/// Largest register in the register table.
pub const TIMO_MAX_REGISTER_LENGTH: usize = 11;
/// Payload of the rdm bulk commands: one length byte plus a padded rdm package.
pub const TIMO_RDM_FRAME_SIZE: usize = 1 + RDM_MAX_PACKAGE_SIZE;
pub const TIMO_MAX_ASC_FRAME_SIZE: usize = DMX_UNIVERSE_SIZE;
pub const TIMO_FIRMWARE_BLOCK_SIZE: usize = 128;
/// Largest payload phase of any bus transaction, irq status byte excluded.
pub const TIMO_MAX_PAYLOAD_SIZE: usize = DMX_UNIVERSE_SIZE;
