use crate::consts::RDM_MAX_PARAMETER_DATA_LENGTH;

pub type DataPack = heapless::Vec<u8, RDM_MAX_PARAMETER_DATA_LENGTH>;

/// Command class of an rdm package (ANSI E1.20 Table A-1).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandClass {
    DiscoveryCommand = 0x10,
    DiscoveryCommandResponse = 0x11,
    GetCommand = 0x20,
    GetCommandResponse = 0x21,
    SetCommand = 0x30,
    SetCommandResponse = 0x31,
}

impl CommandClass {
    /// Responses have the lowest bit set.
    pub fn is_response(&self) -> bool {
        (*self as u8) & 0x01 != 0
    }

    pub fn is_request(&self) -> bool {
        !self.is_response()
    }

    pub fn is_discovery(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryCommand | Self::DiscoveryCommandResponse
        )
    }

    /// Returns the class a responder answers this request class with.
    /// Response classes map to themselves.
    pub fn response_class(&self) -> Self {
        match self {
            Self::DiscoveryCommand => Self::DiscoveryCommandResponse,
            Self::GetCommand => Self::GetCommandResponse,
            Self::SetCommand => Self::SetCommandResponse,
            response => *response,
        }
    }

    /// Returns the request class that this response class answers.
    /// Request classes map to themselves.
    pub fn request_class(&self) -> Self {
        match self {
            Self::DiscoveryCommandResponse => Self::DiscoveryCommand,
            Self::GetCommandResponse => Self::GetCommand,
            Self::SetCommandResponse => Self::SetCommand,
            request => *request,
        }
    }
}

impl TryFrom<u8> for CommandClass {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        Ok(match value {
            0x10 => Self::DiscoveryCommand,
            0x11 => Self::DiscoveryCommandResponse,
            0x20 => Self::GetCommand,
            0x21 => Self::GetCommandResponse,
            0x30 => Self::SetCommand,
            0x31 => Self::SetCommandResponse,
            _ => return Err(()),
        })
    }
}

/// Response status of a rdm package
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ResponseType {
    /// The request was acknowledged.
    ResponseTypeAck = 0x00,
    /// The request was acknowledged but the result isn't ready yet.
    ResponseTypeAckTimer = 0x01,
    /// The request was not acknowledged.
    ResponseTypeNackReason = 0x02,
    /// The request was acknowledged but the response does not fit into a single responds.
    ResponseTypeAckOverflow = 0x03,
}

impl TryFrom<u8> for ResponseType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        Ok(match value {
            0x00 => Self::ResponseTypeAck,
            0x01 => Self::ResponseTypeAckTimer,
            0x02 => Self::ResponseTypeNackReason,
            0x03 => Self::ResponseTypeAckOverflow,
            _ => {
                return Err(());
            },
        })
    }
}

/// Reason codes a responder attaches to a NACK_REASON response (ANSI E1.20 Table A-17).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum NackReason {
    UnknownPid = 0x0000,
    FormatError = 0x0001,
    HardwareFault = 0x0002,
    ProxyReject = 0x0003,
    WriteProtect = 0x0004,
    UnsupportedCommandClass = 0x0005,
    DataOutOfRange = 0x0006,
    BufferFull = 0x0007,
    PacketSizeUnsupported = 0x0008,
    SubDeviceOutOfRange = 0x0009,
    ProxyBufferFull = 0x000A,
}

impl NackReason {
    pub fn to_bytes(&self) -> [u8; 2] {
        (*self as u16).to_be_bytes()
    }
}

impl core::fmt::Display for NackReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let reason = match self {
            NackReason::UnknownPid => "unknown pid",
            NackReason::FormatError => "format error",
            NackReason::HardwareFault => "hardware fault",
            NackReason::ProxyReject => "proxy reject",
            NackReason::WriteProtect => "write protect",
            NackReason::UnsupportedCommandClass => "unsupported command class",
            NackReason::DataOutOfRange => "data out of range",
            NackReason::BufferFull => "buffer full",
            NackReason::PacketSizeUnsupported => "packet size unsupported",
            NackReason::SubDeviceOutOfRange => "sub device out of range",
            NackReason::ProxyBufferFull => "proxy buffer full",
        };

        write!(f, "{}", reason)
    }
}

impl TryFrom<u16> for NackReason {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, ()> {
        match value {
            0x0000 => Ok(Self::UnknownPid),
            0x0001 => Ok(Self::FormatError),
            0x0002 => Ok(Self::HardwareFault),
            0x0003 => Ok(Self::ProxyReject),
            0x0004 => Ok(Self::WriteProtect),
            0x0005 => Ok(Self::UnsupportedCommandClass),
            0x0006 => Ok(Self::DataOutOfRange),
            0x0007 => Ok(Self::BufferFull),
            0x0008 => Ok(Self::PacketSizeUnsupported),
            0x0009 => Ok(Self::SubDeviceOutOfRange),
            0x000A => Ok(Self::ProxyBufferFull),
            _ => Err(()),
        }
    }
}

/// Sub device addressing of an rdm package.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SubDevice {
    /// The root device (0x0000).
    Root,
    /// All sub devices at once (0xFFFF).
    AllSubDevices,
    /// A single sub unit of the responder.
    Unit(u16),
}

impl From<u16> for SubDevice {
    fn from(value: u16) -> Self {
        match value {
            0x0000 => Self::Root,
            0xFFFF => Self::AllSubDevices,
            unit => Self::Unit(unit),
        }
    }
}

impl From<SubDevice> for u16 {
    fn from(value: SubDevice) -> Self {
        match value {
            SubDevice::Root => 0x0000,
            SubDevice::AllSubDevices => 0xFFFF,
            SubDevice::Unit(unit) => unit,
        }
    }
}
