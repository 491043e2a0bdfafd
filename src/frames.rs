//! Payload codec of the bulk commands.
//!
//! These functions only check sizes. What the bytes mean is up to the rdm codec and
//! the application.

use crate::consts::{
    DMX_UNIVERSE_SIZE, RDM_MAX_PACKAGE_SIZE, TIMO_FIRMWARE_BLOCK_SIZE, TIMO_FW_BLOCK_CMD_1_COMMAND,
    TIMO_FW_BLOCK_CMD_2_COMMAND, TIMO_MAX_ASC_FRAME_SIZE, TIMO_MAX_PAYLOAD_SIZE,
    TIMO_NOP_COMMAND, TIMO_RDM_FRAME_SIZE, TIMO_READ_ASC_COMMAND, TIMO_READ_DMX_COMMAND,
    TIMO_READ_RDM_COMMAND, TIMO_WRITE_DMX_COMMAND, TIMO_WRITE_RDM_COMMAND,
};
use crate::layouts::{asc_frame_layout, dmx_window_layout};
use crate::rdm_data::BinaryRdmPackage;

/// Command byte of a bulk transfer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BulkCommand {
    ReadDmx = TIMO_READ_DMX_COMMAND,
    ReadAsc = TIMO_READ_ASC_COMMAND,
    ReadRdm = TIMO_READ_RDM_COMMAND,
    WriteDmx = TIMO_WRITE_DMX_COMMAND,
    WriteRdm = TIMO_WRITE_RDM_COMMAND,
    FirmwareBlock1 = TIMO_FW_BLOCK_CMD_1_COMMAND,
    FirmwareBlock2 = TIMO_FW_BLOCK_CMD_2_COMMAND,
}

/// A buffer handed to the codec does not have the size the command expects.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameLengthError {
    pub command: BulkCommand,
    /// The largest acceptable size.
    pub expected: usize,
    pub actual: usize,
}

impl core::fmt::Display for FrameLengthError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "frame for command {:#04X} expects {} bytes, got {}",
            self.command as u8, self.expected, self.actual
        )
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FrameLengthError {}

/// Payload phase of a bulk transfer as it is clocked out.
pub type BulkFrame = heapless::Vec<u8, TIMO_MAX_PAYLOAD_SIZE>;
/// Dmx channel data, start code excluded.
pub type DmxFrame = heapless::Vec<u8, DMX_UNIVERSE_SIZE>;
/// Payload of an alternate start code frame.
pub type AscFrame = heapless::Vec<u8, TIMO_MAX_ASC_FRAME_SIZE>;
pub type FirmwareBlock = [u8; TIMO_FIRMWARE_BLOCK_SIZE];

fn length_error(command: BulkCommand, expected: usize, actual: usize) -> FrameLengthError {
    FrameLengthError {
        command,
        expected,
        actual,
    }
}

/// The part of the universe the transceiver exposes on read dmx.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmxWindow {
    /// Amount of channels, 1 to 512.
    pub size: u16,
    /// First channel of the window, 0 based.
    pub start_address: u16,
}

impl Default for DmxWindow {
    fn default() -> Self {
        Self {
            size: DMX_UNIVERSE_SIZE as u16,
            start_address: 0,
        }
    }
}

impl DmxWindow {
    pub fn is_valid(&self) -> bool {
        (1..=DMX_UNIVERSE_SIZE as u16).contains(&self.size)
            && (self.start_address as usize + self.size as usize) <= DMX_UNIVERSE_SIZE
    }

    pub fn from_register(value: &[u8; 4]) -> Self {
        let view = dmx_window_layout::View::new(value);

        Self {
            size: view.window_size().read(),
            start_address: view.start_address().read(),
        }
    }

    pub fn to_register(&self) -> [u8; 4] {
        let mut value = [0u8; 4];
        let mut view = dmx_window_layout::View::new(&mut value);
        view.window_size_mut().write(self.size);
        view.start_address_mut().write(self.start_address);

        value
    }
}

/// Describes the alternate start code frame waiting in the transceiver.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AscFrameInfo {
    pub start_code: u8,
    pub length: u16,
}

impl AscFrameInfo {
    pub fn from_register(value: &[u8; 3]) -> Self {
        let view = asc_frame_layout::View::new(value);

        Self {
            start_code: view.start_code().read(),
            length: view.asc_frame_length().read(),
        }
    }
}

pub fn encode_write_dmx(channels: &[u8]) -> Result<BulkFrame, FrameLengthError> {
    if channels.is_empty() || channels.len() > DMX_UNIVERSE_SIZE {
        return Err(length_error(
            BulkCommand::WriteDmx,
            DMX_UNIVERSE_SIZE,
            channels.len(),
        ));
    }

    BulkFrame::from_slice(channels)
        .map_err(|_| length_error(BulkCommand::WriteDmx, DMX_UNIVERSE_SIZE, channels.len()))
}

/// The payload has to be exactly as big as the window.
pub fn decode_read_dmx(payload: &[u8], window: &DmxWindow) -> Result<DmxFrame, FrameLengthError> {
    let expected = window.size as usize;
    if !window.is_valid() || payload.len() != expected {
        return Err(length_error(BulkCommand::ReadDmx, expected, payload.len()));
    }

    DmxFrame::from_slice(payload)
        .map_err(|_| length_error(BulkCommand::ReadDmx, expected, payload.len()))
}

/// The payload has to be exactly as big as announced by the ASC_FRAME register.
pub fn decode_read_asc(payload: &[u8], info: &AscFrameInfo) -> Result<AscFrame, FrameLengthError> {
    let expected = info.length as usize;
    if payload.len() != expected {
        return Err(length_error(BulkCommand::ReadAsc, expected, payload.len()));
    }

    AscFrame::from_slice(payload)
        .map_err(|_| length_error(BulkCommand::ReadAsc, TIMO_MAX_ASC_FRAME_SIZE, expected))
}

/// Rdm frames travel as one length byte followed by the package, padded with nop bytes
/// to [TIMO_RDM_FRAME_SIZE].
pub fn encode_write_rdm(package: &[u8]) -> Result<BulkFrame, FrameLengthError> {
    if package.is_empty() || package.len() > RDM_MAX_PACKAGE_SIZE {
        return Err(length_error(
            BulkCommand::WriteRdm,
            RDM_MAX_PACKAGE_SIZE,
            package.len(),
        ));
    }

    let mut frame = BulkFrame::new();
    frame
        .resize(TIMO_RDM_FRAME_SIZE, TIMO_NOP_COMMAND)
        .map_err(|_| length_error(BulkCommand::WriteRdm, RDM_MAX_PACKAGE_SIZE, package.len()))?;
    frame[0] = package.len() as u8;
    frame[1..=package.len()].copy_from_slice(package);

    Ok(frame)
}

/// Returns the bytes announced by the length byte. An empty result means the
/// transceiver had nothing buffered.
pub fn decode_read_rdm(payload: &[u8]) -> Result<BinaryRdmPackage, FrameLengthError> {
    if payload.len() != TIMO_RDM_FRAME_SIZE {
        return Err(length_error(
            BulkCommand::ReadRdm,
            TIMO_RDM_FRAME_SIZE,
            payload.len(),
        ));
    }

    let length = payload[0] as usize;

    BinaryRdmPackage::from_slice(&payload[1..=length])
        .map_err(|_| length_error(BulkCommand::ReadRdm, RDM_MAX_PACKAGE_SIZE, length))
}

/// Firmware blocks are passed through untouched.
pub fn encode_firmware_block(
    command: BulkCommand,
    block: &[u8],
) -> Result<BulkFrame, FrameLengthError> {
    if !matches!(
        command,
        BulkCommand::FirmwareBlock1 | BulkCommand::FirmwareBlock2
    ) || block.len() != TIMO_FIRMWARE_BLOCK_SIZE
    {
        return Err(length_error(command, TIMO_FIRMWARE_BLOCK_SIZE, block.len()));
    }

    BulkFrame::from_slice(block)
        .map_err(|_| length_error(command, TIMO_FIRMWARE_BLOCK_SIZE, block.len()))
}
