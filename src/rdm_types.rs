//! Parameter data of the parameter ids the controller understands natively.
//! Anything else stays opaque [DataPack] content.

use crate::consts::{
    RDM_DEVICE_INFO_SIZE, RDM_MAX_SUPPORTED_PARAMETERS_PER_REQUEST, RDM_PROTOCOL_VERSION,
};
use crate::layouts::rdm_device_info_layout;
use crate::types::DataPack;
use crate::unique_identifier::UniqueIdentifier;
use modular_bitfield::bitfield;
use modular_bitfield::prelude::B12;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeserializationError;

impl core::fmt::Display for DeserializationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "There was a deserialization error.")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DeserializationError {}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmxStartAddress {
    /// The requested device has a dmx footprint of 0.
    NoAddress,
    /// The requested device does allocate dmx addresses.
    Address(u16),
}

impl DmxStartAddress {
    pub fn as_u16(&self) -> u16 {
        match self {
            DmxStartAddress::Address(address) => *address,
            DmxStartAddress::NoAddress => 0xFFFF,
        }
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializationError> {
        let start_address = u16::from_be_bytes(data.try_into().map_err(|_| DeserializationError)?);

        start_address.try_into()
    }

    pub fn serialize(&self) -> [u8; 2] {
        self.as_u16().to_be_bytes()
    }
}

impl TryFrom<u16> for DmxStartAddress {
    type Error = DeserializationError;

    fn try_from(start_address: u16) -> Result<Self, Self::Error> {
        if start_address == 0xFFFF {
            return Ok(Self::NoAddress);
        }

        if !(1..=512).contains(&start_address) {
            return Err(DeserializationError);
        }

        Ok(Self::Address(start_address))
    }
}

/// Response to discovery mute/unmute requests.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DiscoveryMuteResponse {
    /// The responder is a proxy device.
    pub managed_proxy: bool,
    /// The responder supports sub devices.
    pub sub_device: bool,
    /// The responder is not operational before receiving a firmware update.
    pub boot_loader: bool,
    /// A proxy device has responded on behalf of another device.
    pub proxy_device: bool,
    /// Included if the responding device contains multiple responder ports.
    /// It is the UID to the primary port of the device.
    pub binding_uid: Option<UniqueIdentifier>,
}

#[bitfield]
struct DiscControlField {
    managed_proxy: bool,
    sub_device: bool,
    boot_loader: bool,
    proxy_device: bool,
    #[skip]
    reserved: B12,
}

impl DiscoveryMuteResponse {
    /// The control field is sent big endian, the flags live in the low byte.
    pub fn deserialize(data: &[u8]) -> Result<Self, DeserializationError> {
        let (control_field, binding_uid) = match data.len() {
            2 => (&data[0..2], None),
            8 => {
                let binding_uid: &[u8; 6] =
                    data[2..8].try_into().map_err(|_| DeserializationError)?;
                (&data[0..2], Some(UniqueIdentifier::from_bytes(binding_uid)?))
            },
            _ => return Err(DeserializationError),
        };

        let control_field = DiscControlField::from_bytes([control_field[1], control_field[0]]);

        Ok(Self {
            managed_proxy: control_field.managed_proxy(),
            sub_device: control_field.sub_device(),
            boot_loader: control_field.boot_loader(),
            proxy_device: control_field.proxy_device(),
            binding_uid,
        })
    }

    pub fn serialize(&self) -> DataPack {
        let control_field = DiscControlField::new()
            .with_managed_proxy(self.managed_proxy)
            .with_sub_device(self.sub_device)
            .with_boot_loader(self.boot_loader)
            .with_proxy_device(self.proxy_device)
            .into_bytes();

        let mut data_pack = DataPack::new();
        let _ = data_pack.extend_from_slice(&[control_field[1], control_field[0]]);
        if let Some(uid) = self.binding_uid {
            let _ = data_pack.extend_from_slice(&uid.to_bytes());
        }

        data_pack
    }
}

pub type SupportedParameters = heapless::Vec<u16, RDM_MAX_SUPPORTED_PARAMETERS_PER_REQUEST>;

pub fn deserialize_supported_parameters(
    buffer: &[u8],
) -> Result<SupportedParameters, DeserializationError> {
    if buffer.len() % 2 != 0 {
        return Err(DeserializationError);
    }

    buffer
        .chunks_exact(2)
        .map(|pid| u16::from_be_bytes([pid[0], pid[1]]))
        .try_fold(SupportedParameters::new(), |mut parameters, pid| {
            parameters.push(pid).map_err(|_| DeserializationError)?;
            Ok(parameters)
        })
}

pub fn deserialize_identify(buffer: &[u8]) -> Result<bool, DeserializationError> {
    match buffer {
        [0x00] => Ok(false),
        [0x01] => Ok(true),
        _ => Err(DeserializationError),
    }
}

pub fn deserialize_software_version_label(
    buffer: &[u8],
) -> Result<heapless::String<32>, DeserializationError> {
    let label = core::str::from_utf8(buffer).map_err(|_| DeserializationError)?;

    let mut software_version_label = heapless::String::new();
    software_version_label
        .push_str(label)
        .map_err(|_| DeserializationError)?;

    Ok(software_version_label)
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct DeviceInfo {
    pub protocol_version: u16,
    pub device_model_id: u16,
    pub product_category: u16,
    pub software_version: u32,
    pub dmx_footprint: u16,
    pub dmx_personality: u16,
    pub dmx_start_address: DmxStartAddress,
    pub sub_device_count: u16,
    pub sensor_count: u8,
}

impl DeviceInfo {
    pub fn deserialize(buffer: &[u8]) -> Result<Self, DeserializationError> {
        if buffer.len() != RDM_DEVICE_INFO_SIZE {
            return Err(DeserializationError);
        }

        let device_info_view = rdm_device_info_layout::View::new(buffer);
        Ok(DeviceInfo {
            protocol_version: device_info_view.protocol_version().read(),
            device_model_id: device_info_view.device_model_id().read(),
            product_category: device_info_view.product_category().read(),
            software_version: device_info_view.software_version_id().read(),
            dmx_footprint: device_info_view.dmx_footprint().read(),
            dmx_personality: device_info_view.dmx_personality().read(),
            dmx_start_address: device_info_view.dmx_start_address().read().try_into()?,
            sub_device_count: device_info_view.sub_device_count().read(),
            sensor_count: device_info_view.sensor_count().read(),
        })
    }

    pub fn serialize(&self) -> [u8; RDM_DEVICE_INFO_SIZE] {
        let mut resp_buffer = [0u8; RDM_DEVICE_INFO_SIZE];
        let mut device_info_view = rdm_device_info_layout::View::new(&mut resp_buffer);

        device_info_view
            .protocol_version_mut()
            .write(RDM_PROTOCOL_VERSION);
        device_info_view
            .device_model_id_mut()
            .write(self.device_model_id);
        device_info_view
            .product_category_mut()
            .write(self.product_category);
        device_info_view
            .software_version_id_mut()
            .write(self.software_version);
        device_info_view
            .dmx_footprint_mut()
            .write(self.dmx_footprint);
        device_info_view
            .dmx_personality_mut()
            .write(self.dmx_personality);
        device_info_view
            .dmx_start_address_mut()
            .write(self.dmx_start_address.as_u16());
        device_info_view
            .sub_device_count_mut()
            .write(self.sub_device_count);
        device_info_view.sensor_count_mut().write(self.sensor_count);

        resp_buffer
    }
}
