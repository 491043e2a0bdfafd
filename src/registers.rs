//! Register map of the transceiver and the access rules around it.
//!
//! Every register has a fixed length and independent read/write permissions. A register
//! transaction is rejected before anything is put on the bus unless it matches the table
//! entry exactly. The read command byte is the register address, the write command byte is
//! the address with bit 6 set.

use crate::consts::{TIMO_MAX_REGISTER_LENGTH, TIMO_WRITE_REG_FLAG};
use modular_bitfield::bitfield;
use modular_bitfield::prelude::{B1, B2, B28, B3};

/// Register addresses.
pub mod reg {
    /// Uart output, radio mode, spi rdm and radio enable
    pub const CONFIG: u8 = 0x00;
    /// Link and dmx status
    pub const STATUS: u8 = 0x01;
    /// Irq sources that drive the irq line
    pub const IRQ_MASK: u8 = 0x02;
    /// Pending irq flags
    pub const IRQ_FLAGS: u8 = 0x03;
    /// Size and start address of the dmx window
    pub const DMX_WINDOW: u8 = 0x04;
    /// Start code and length of the last alternate start code frame
    pub const ASC_FRAME: u8 = 0x05;
    pub const LINK_QUALITY: u8 = 0x06;
    pub const ANTENNA: u8 = 0x07;
    /// Dmx output timing
    pub const DMX_SPEC: u8 = 0x08;
    pub const DMX_CONTROL: u8 = 0x09;
    /// Extended irq sources that drive the irq line
    pub const EXT_IRQ_MASK: u8 = 0x0A;
    /// Pending extended irq flags
    pub const EXT_IRQ_FLAGS: u8 = 0x0B;
    /// Hardware and software version
    pub const VERSION: u8 = 0x10;
    pub const RF_POWER: u8 = 0x11;
    pub const BLOCKED_CHANNELS: u8 = 0x12;
    pub const BINDING_UID: u8 = 0x20;
    pub const BLE_STATUS: u8 = 0x30;
    pub const BLE_PIN: u8 = 0x31;
    pub const BATTERY: u8 = 0x32;
    pub const UNIVERSE_COLOR: u8 = 0x33;
    pub const OEM_INFO: u8 = 0x34;
}

/// Content of a single register.
pub type RegisterValue = heapless::Vec<u8, TIMO_MAX_REGISTER_LENGTH>;

/// Static description of one register.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterInfo {
    pub address: u8,
    pub length: usize,
    pub readable: bool,
    pub writable: bool,
    pub name: &'static str,
}

impl RegisterInfo {
    const fn new(
        address: u8,
        length: usize,
        readable: bool,
        writable: bool,
        name: &'static str,
    ) -> Self {
        Self {
            address,
            length,
            readable,
            writable,
            name,
        }
    }

    pub fn read_command(&self) -> u8 {
        self.address
    }

    pub fn write_command(&self) -> u8 {
        TIMO_WRITE_REG_FLAG | self.address
    }
}

/// The register table.
///
/// IRQ_FLAGS is writable: flags are cleared by writing back the bits that were observed.
pub static TIMO_REGISTERS: [RegisterInfo; 19] = [
    RegisterInfo::new(reg::CONFIG, 1, true, true, "CONFIG"),
    RegisterInfo::new(reg::STATUS, 1, true, true, "STATUS"),
    RegisterInfo::new(reg::IRQ_MASK, 1, true, true, "IRQ_MASK"),
    RegisterInfo::new(reg::IRQ_FLAGS, 1, true, true, "IRQ_FLAGS"),
    RegisterInfo::new(reg::DMX_WINDOW, 4, true, true, "DMX_WINDOW"),
    RegisterInfo::new(reg::ASC_FRAME, 3, true, false, "ASC_FRAME"),
    RegisterInfo::new(reg::LINK_QUALITY, 1, true, false, "LINK_QUALITY"),
    RegisterInfo::new(reg::ANTENNA, 1, true, true, "ANTENNA"),
    RegisterInfo::new(reg::DMX_SPEC, 8, true, true, "DMX_SPEC"),
    RegisterInfo::new(reg::DMX_CONTROL, 1, true, true, "DMX_CONTROL"),
    RegisterInfo::new(reg::VERSION, 8, true, false, "VERSION"),
    RegisterInfo::new(reg::RF_POWER, 1, true, true, "RF_POWER"),
    RegisterInfo::new(reg::BLOCKED_CHANNELS, 11, true, true, "BLOCKED_CHANNELS"),
    RegisterInfo::new(reg::BINDING_UID, 6, true, true, "BINDING_UID"),
    RegisterInfo::new(reg::BLE_STATUS, 1, true, true, "BLE_STATUS"),
    RegisterInfo::new(reg::BLE_PIN, 6, false, true, "BLE_PIN"),
    RegisterInfo::new(reg::BATTERY, 1, false, true, "BATTERY"),
    RegisterInfo::new(reg::UNIVERSE_COLOR, 3, true, true, "UNIVERSE_COLOR"),
    RegisterInfo::new(reg::OEM_INFO, 6, true, true, "OEM_INFO"),
];

/// The extended irq pair, consulted after [TIMO_REGISTERS].
pub static TIMO_EXT_IRQ_REGISTERS: [RegisterInfo; 2] = [
    RegisterInfo::new(reg::EXT_IRQ_MASK, 4, true, true, "EXT_IRQ_MASK"),
    RegisterInfo::new(reg::EXT_IRQ_FLAGS, 4, true, true, "EXT_IRQ_FLAGS"),
];

/// Looks up a register by address.
pub fn register_info(address: u8) -> Option<&'static RegisterInfo> {
    TIMO_REGISTERS
        .iter()
        .chain(TIMO_EXT_IRQ_REGISTERS.iter())
        .find(|info| info.address == address)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterError {
    /// The address is not in the table or does not permit the requested direction.
    AccessDenied(u8),
    /// The amount of bytes does not match the table length of the register.
    LengthMismatch {
        address: u8,
        expected: usize,
        actual: usize,
    },
}

impl core::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RegisterError::AccessDenied(address) => {
                write!(f, "access to register {:#04X} denied", address)
            },
            RegisterError::LengthMismatch {
                address,
                expected,
                actual,
            } => write!(
                f,
                "register {:#04X} has {} bytes, got {}",
                address, expected, actual
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RegisterError {}

fn check_length(info: &RegisterInfo, length: usize) -> Result<(), RegisterError> {
    if info.length != length {
        return Err(RegisterError::LengthMismatch {
            address: info.address,
            expected: info.length,
            actual: length,
        });
    }

    Ok(())
}

/// Validates a read of exactly `length` bytes.
pub fn check_read(address: u8, length: usize) -> Result<&'static RegisterInfo, RegisterError> {
    let info = register_info(address)
        .filter(|info| info.readable)
        .ok_or(RegisterError::AccessDenied(address))?;

    check_length(info, length)?;
    Ok(info)
}

/// Validates a write of exactly `length` bytes.
pub fn check_write(address: u8, length: usize) -> Result<&'static RegisterInfo, RegisterError> {
    let info = register_info(address)
        .filter(|info| info.writable)
        .ok_or(RegisterError::AccessDenied(address))?;

    check_length(info, length)?;
    Ok(info)
}

/// Content of the CONFIG register.
#[bitfield]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ConfigFlags {
    /// Dmx is output on the uart.
    pub uart_en: bool,
    /// Set for transmitter mode, cleared for receiver mode.
    pub radio_tx_rx_mode: bool,
    #[skip]
    reserved_0: B1,
    /// Rdm frames are exchanged over spi instead of the uart.
    pub spi_rdm_en: bool,
    #[skip]
    reserved_1: B3,
    pub radio_en: bool,
}

impl ConfigFlags {
    pub fn from_register(value: u8) -> Self {
        Self::from_bytes([value])
    }

    pub fn to_register(self) -> u8 {
        self.into_bytes()[0]
    }
}

/// Content of the IRQ_FLAGS and IRQ_MASK registers.
#[bitfield]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct IrqFlags {
    #[skip]
    reserved_0: B2,
    pub dmx_changed: bool,
    pub rf_link: bool,
    #[skip]
    reserved_1: B2,
    /// EXT_IRQ_FLAGS holds at least one pending flag.
    pub extended: bool,
    #[skip]
    reserved_2: B1,
}

impl IrqFlags {
    pub fn from_register(value: u8) -> Self {
        Self::from_bytes([value])
    }

    pub fn to_register(self) -> u8 {
        self.into_bytes()[0]
    }
}

/// Content of the EXT_IRQ_FLAGS and EXT_IRQ_MASK registers.
#[bitfield]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ExtIrqFlags {
    /// An rdm frame is ready to be read.
    pub spi_rdm: bool,
    #[skip]
    reserved_0: B2,
    pub spi_radio_disc: bool,
    #[skip]
    reserved_1: B28,
}

impl ExtIrqFlags {
    /// The register holds a big endian word, the bitfield is laid out little endian.
    pub fn from_register(value: &[u8; 4]) -> Self {
        Self::from_bytes(u32::from_be_bytes(*value).to_le_bytes())
    }

    pub fn to_register(self) -> [u8; 4] {
        u32::from_le_bytes(self.into_bytes()).to_be_bytes()
    }

    pub fn bits(self) -> u32 {
        u32::from_le_bytes(self.into_bytes())
    }
}
