use crate::consts::{BROADCAST_UID, MAX_UID};
use crate::rdm_types::DeserializationError;

/// The unique id that is used as a source id in the packages.
/// There shouldn't be multiple devices with same unique id.
/// The manufacturer uids are assigned by the esta.
/// [more information](https://tsp.esta.org/tsp/working_groups/CP/mfctrIDs.php)
///
/// Ordering follows the 48 bit integer value, which is what the discovery
/// range arithmetic works on.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct UniqueIdentifier {
    manufacturer_uid: u16,
    device_uid: u32,
}

impl core::fmt::Display for UniqueIdentifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:04X}:{:08X}", self.manufacturer_uid, self.device_uid)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for UniqueIdentifier {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{:04X}:{:08X}", self.manufacturer_uid, self.device_uid);
    }
}

impl UniqueIdentifier {
    /// Fails for the reserved all zero uid and for anything that is a broadcast pattern.
    pub fn new(manufacturer_uid: u16, device_uid: u32) -> Result<Self, DeserializationError> {
        if device_uid == u32::MAX || manufacturer_uid == u16::MAX {
            return Err(DeserializationError);
        }

        if manufacturer_uid == 0 && device_uid == 0 {
            return Err(DeserializationError);
        }

        Ok(UniqueIdentifier {
            manufacturer_uid,
            device_uid,
        })
    }

    pub fn manufacturer_uid(&self) -> u16 {
        self.manufacturer_uid
    }

    pub fn device_uid(&self) -> u32 {
        self.device_uid
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        let mut buffer = [0u8; 6];

        buffer[..2].copy_from_slice(&self.manufacturer_uid.to_be_bytes());
        buffer[2..].copy_from_slice(&self.device_uid.to_be_bytes());

        buffer
    }

    /// Parses big endian wire bytes. Reserved and broadcast patterns are rejected.
    pub fn from_bytes(buffer: &[u8; 6]) -> Result<Self, DeserializationError> {
        let manufacturer_uid = u16::from_be_bytes([buffer[0], buffer[1]]);
        let device_uid = u32::from_be_bytes([buffer[2], buffer[3], buffer[4], buffer[5]]);

        Self::new(manufacturer_uid, device_uid)
    }

    /// The uid as unsigned 48 bit integer.
    pub fn as_u64(&self) -> u64 {
        (*self).into()
    }
}

/// Used by the default controller config. 0x7FF0 is the prototyping manufacturer id.
pub(crate) const DEFAULT_CONTROLLER_UID: UniqueIdentifier = UniqueIdentifier {
    manufacturer_uid: 0x7FF0,
    device_uid: 0x0000_0001,
};

impl TryFrom<u64> for UniqueIdentifier {
    type Error = DeserializationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > MAX_UID {
            return Err(DeserializationError);
        }

        Self::new((value >> u32::BITS) as u16, (value & u32::MAX as u64) as u32)
    }
}

impl From<UniqueIdentifier> for u64 {
    fn from(value: UniqueIdentifier) -> Self {
        ((value.manufacturer_uid as u64) << u32::BITS) | value.device_uid as u64
    }
}

/// An inclusive range of uids, as addressed by DISC_UNIQUE_BRANCH.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UidRange {
    lower: u64,
    upper: u64,
}

impl UidRange {
    /// The whole uid space, including the reserved uids at both ends.
    pub const FULL: Self = Self {
        lower: 0,
        upper: MAX_UID,
    };

    /// Returns None if the bounds are swapped or exceed 48 bits.
    pub fn new(lower: u64, upper: u64) -> Option<Self> {
        if lower > upper || upper > MAX_UID {
            return None;
        }

        Some(Self { lower, upper })
    }

    pub fn lower(&self) -> u64 {
        self.lower
    }

    pub fn upper(&self) -> u64 {
        self.upper
    }

    pub fn contains(&self, uid: u64) -> bool {
        (self.lower..=self.upper).contains(&uid)
    }

    /// A range of exactly one uid.
    pub fn is_leaf(&self) -> bool {
        self.lower == self.upper
    }

    /// Splits the range at its midpoint. The lower half keeps the midpoint.
    pub fn split(&self) -> Option<(Self, Self)> {
        if self.is_leaf() {
            return None;
        }

        let midpoint = self.lower + (self.upper - self.lower) / 2;

        Some((
            Self {
                lower: self.lower,
                upper: midpoint,
            },
            Self {
                lower: midpoint + 1,
                upper: self.upper,
            },
        ))
    }

    /// The DISC_UNIQUE_BRANCH parameter data, lower bound first.
    pub fn to_bytes(&self) -> [u8; 12] {
        let mut buffer = [0u8; 12];

        buffer[..6].copy_from_slice(&self.lower.to_be_bytes()[2..]);
        buffer[6..].copy_from_slice(&self.upper.to_be_bytes()[2..]);

        buffer
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PackageAddress {
    /// Broadcast to all devices.
    Broadcast,
    /// Broadcast to all devices from a specific manufacturer identified by the manufacturer id
    /// in the u16.
    ManufacturerBroadcast(u16),
    /// Send package to a specific device.
    Device(UniqueIdentifier),
}

impl PackageAddress {
    /// Fails for the reserved all zero uid.
    pub fn from_bytes(buffer: &[u8; 6]) -> Result<Self, DeserializationError> {
        let manufacturer_uid = u16::from_be_bytes([buffer[0], buffer[1]]);
        let device_uid = u32::from_be_bytes([buffer[2], buffer[3], buffer[4], buffer[5]]);

        Ok(match (manufacturer_uid, device_uid) {
            (u16::MAX, u32::MAX) => Self::Broadcast,
            (manufacturer_uid, u32::MAX) => Self::ManufacturerBroadcast(manufacturer_uid),
            (manufacturer_uid, device_uid) => {
                Self::Device(UniqueIdentifier::new(manufacturer_uid, device_uid)?)
            },
        })
    }

    pub fn to_bytes(&self) -> [u8; 6] {
        match self {
            Self::Broadcast => [0xFFu8; 6],
            Self::ManufacturerBroadcast(manufacturer_uid) => {
                let mut buffer = [0xFFu8; 6];
                buffer[..2].copy_from_slice(&manufacturer_uid.to_be_bytes());

                buffer
            },
            Self::Device(uid) => uid.to_bytes(),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        !matches!(self, PackageAddress::Device(_))
    }
}

impl TryFrom<u64> for PackageAddress {
    type Error = DeserializationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > MAX_UID {
            return Err(DeserializationError);
        }

        let buffer: [u8; 6] = value.to_be_bytes()[2..]
            .try_into()
            .map_err(|_| DeserializationError)?;

        Self::from_bytes(&buffer)
    }
}

impl From<PackageAddress> for u64 {
    fn from(value: PackageAddress) -> Self {
        match value {
            PackageAddress::Broadcast => BROADCAST_UID,
            PackageAddress::ManufacturerBroadcast(manufacturer_uid) => {
                ((manufacturer_uid as u64) << u32::BITS) | u32::MAX as u64
            },
            PackageAddress::Device(uid) => uid.into(),
        }
    }
}
