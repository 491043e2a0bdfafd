use crate::pids;
use crate::rdm_data::{RdmData, RdmRequestData, ResponseStatus};
use crate::rdm_driver::{
    ControllerDriverErrorDef, DiscoveryOption, DmxControllerDriver, DmxError, RdmControllerDriver,
};
use crate::rdm_types::{
    deserialize_identify, deserialize_software_version_label, deserialize_supported_parameters,
    DeserializationError, DeviceInfo, DiscoveryMuteResponse, DmxStartAddress,
    SupportedParameters,
};
use crate::types::{CommandClass, DataPack, NackReason, SubDevice};
use crate::unique_identifier::{
    PackageAddress, UidRange, UniqueIdentifier, DEFAULT_CONTROLLER_UID,
};

#[derive(Debug, Clone)]
pub struct RdmControllerConfig {
    /// Source uid of every request.
    pub rdm_uid: UniqueIdentifier,
    /// Port id of every request. Ports are numbered from 1.
    pub port_id: u8,
}

impl Default for RdmControllerConfig {
    fn default() -> Self {
        Self {
            rdm_uid: DEFAULT_CONTROLLER_UID,
            port_id: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RdmRequest {
    /// The unique id of the recipient of the request.
    pub destination_uid: PackageAddress,
    pub sub_device: SubDevice,
    /// The id that specifies the type of the package.
    pub parameter_id: u16,
    /// The parameter data.
    pub data: DataPack,
}

impl RdmRequest {
    /// Creates a request to the root device with empty parameter data.
    pub fn empty(uid: PackageAddress, pid: u16) -> Self {
        Self {
            destination_uid: uid,
            sub_device: SubDevice::Root,
            parameter_id: pid,
            data: DataPack::new(),
        }
    }

    /// Creates a request to the root device.
    pub fn with_data(uid: PackageAddress, pid: u16, data: &[u8]) -> Option<Self> {
        Some(Self {
            destination_uid: uid,
            sub_device: SubDevice::Root,
            parameter_id: pid,
            data: DataPack::from_slice(data).ok()?,
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RdmResponseInfo {
    pub parameter_id: u16,
    pub message_count: u8,
    pub data: DataPack,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RdmResponse {
    /// The message data of the response.
    Response(RdmResponseInfo),
    /// The request has been excepted but the message data is too big to fit into one response.
    /// Use the get command on the same pid to receive the rest of it until you just receive a Response.
    IncompleteResponse(RdmResponseInfo),
    /// No response was received since the request was a broadcast.
    RequestWasBroadcast,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum OverflowMessageResp<T> {
    /// Has received the complete message.
    Complete(T),
    /// Has not received the complete message.
    /// Request the same pid to get the next part until you receive [OverflowMessageResp::Complete].
    Incomplete(T),
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RdmResponseError<E> {
    /// The received package doesn't match the request.
    NotMatching,
    /// The parameter data couldn't be deserialized.
    ParameterDataNotDeserializable,
    /// The response has an error status but the contents aren't deserializable.
    ErrorNotDeserializable,
    /// The response isn't ready yet. The value is the estimated time in 100ms steps.
    NotReady(u16),
    /// The responder didn't acknowledge the request.
    NotAcknowledged {
        parameter_id: u16,
        reason: NackReason,
    },
    /// The underlying driver raised an error.
    DmxError(DmxError<E>),
}

impl<E: core::fmt::Display> core::fmt::Display for RdmResponseError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RdmResponseError::NotMatching => write!(f, "response does not match the request"),
            RdmResponseError::ParameterDataNotDeserializable => {
                write!(f, "parameter data is not deserializable")
            },
            RdmResponseError::ErrorNotDeserializable => {
                write!(f, "error response is not deserializable")
            },
            RdmResponseError::NotReady(steps) => {
                write!(f, "response not ready, retry in {} ms", *steps as u32 * 100)
            },
            RdmResponseError::NotAcknowledged {
                parameter_id,
                reason,
            } => write!(f, "pid {:#06X} not acknowledged: {}", parameter_id, reason),
            RdmResponseError::DmxError(error) => write!(f, "{}", error),
        }
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Debug + core::fmt::Display> std::error::Error for RdmResponseError<E> {}

impl<E> From<DmxError<E>> for RdmResponseError<E> {
    fn from(value: DmxError<E>) -> Self {
        Self::DmxError(value)
    }
}

impl<E> From<DeserializationError> for RdmResponseError<E> {
    fn from(_: DeserializationError) -> Self {
        Self::ParameterDataNotDeserializable
    }
}

/// An RDM controller.
pub struct RdmController<D: ControllerDriverErrorDef> {
    driver: D,
    uid: UniqueIdentifier,
    port_id: u8,
    current_transaction_id: u8,
    last_message_count: u8,
}

impl<D: ControllerDriverErrorDef> RdmController<D> {
    pub fn new(driver: D, config: &RdmControllerConfig) -> Self {
        Self {
            driver,
            uid: config.rdm_uid,
            port_id: config.port_id,
            current_transaction_id: 0,
            last_message_count: 0,
        }
    }

    /// Get a reference to the underlying driver.
    pub fn get_driver(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn uid(&self) -> UniqueIdentifier {
        self.uid
    }

    /// Transaction number of the last request that was sent.
    pub fn current_transaction_id(&self) -> u8 {
        self.current_transaction_id
    }

    /// Returns the message count that was received on the last request using this instance.
    pub fn rdm_get_last_message_count(&self) -> u8 {
        self.last_message_count
    }

    fn next_transaction_id(&mut self) -> u8 {
        self.current_transaction_id = self.current_transaction_id.wrapping_add(1);
        self.current_transaction_id
    }
}

impl<D: DmxControllerDriver> RdmController<D> {
    /// Sends a dmx package. Package can't be bigger than 512 bytes.
    pub fn send_dmx_package(
        &mut self,
        package: &[u8],
    ) -> Result<(), RdmResponseError<D::DriverError>> {
        self.driver
            .send_dmx_package(package)
            .map_err(RdmResponseError::DmxError)
    }
}

impl<D: RdmControllerDriver> RdmController<D> {
    fn rdm_request(
        &mut self,
        command_class: CommandClass,
        request: RdmRequest,
    ) -> Result<RdmResponse, RdmResponseError<D::DriverError>> {
        let transaction_number = self.next_transaction_id();

        self.driver.send_rdm(RdmData::Request(RdmRequestData {
            destination_uid: request.destination_uid,
            source_uid: self.uid,
            transaction_number,
            port_id: self.port_id,
            message_count: 0,
            sub_device: request.sub_device.into(),
            command_class,
            parameter_id: request.parameter_id,
            parameter_data: request.data,
        }))?;

        if request.destination_uid.is_broadcast() {
            return Ok(RdmResponse::RequestWasBroadcast);
        }

        let response = loop {
            let response = match self.driver.receive_rdm()? {
                RdmData::Request(_) => {
                    return Err(RdmResponseError::NotMatching);
                },
                RdmData::Response(response) => response,
            };

            if transaction_number == response.transaction_number {
                break response;
            }

            debug!(
                "dropped response to transaction {} while waiting for {}",
                response.transaction_number,
                transaction_number
            );
        };

        if response.destination_uid != PackageAddress::Device(self.uid)
            || request.destination_uid != PackageAddress::Device(response.source_uid)
            || response.command_class != command_class.response_class()
            || response.parameter_id != request.parameter_id
        {
            return Err(RdmResponseError::NotMatching);
        }

        self.last_message_count = response.message_count;

        let status = response
            .status()
            .map_err(|_| RdmResponseError::ErrorNotDeserializable)?;

        let response_info = RdmResponseInfo {
            parameter_id: response.parameter_id,
            message_count: response.message_count,
            data: response.parameter_data,
        };

        match status {
            ResponseStatus::Acknowledged => Ok(RdmResponse::Response(response_info)),
            ResponseStatus::AcknowledgedOverflow => {
                Ok(RdmResponse::IncompleteResponse(response_info))
            },
            ResponseStatus::AcknowledgedTimer(steps) => Err(RdmResponseError::NotReady(steps)),
            ResponseStatus::NotAcknowledged(reason) => {
                debug!(
                    "pid {} not acknowledged with reason {}",
                    response_info.parameter_id,
                    reason as u16
                );

                Err(RdmResponseError::NotAcknowledged {
                    parameter_id: response_info.parameter_id,
                    reason,
                })
            },
        }
    }

    /// Sends a get request.
    pub fn rdm_get(
        &mut self,
        request: RdmRequest,
    ) -> Result<RdmResponse, RdmResponseError<D::DriverError>> {
        self.rdm_request(CommandClass::GetCommand, request)
    }

    /// Sends a set request.
    pub fn rdm_set(
        &mut self,
        request: RdmRequest,
    ) -> Result<RdmResponse, RdmResponseError<D::DriverError>> {
        self.rdm_request(CommandClass::SetCommand, request)
    }

    /// Repeats a get request for as long as the responder answers with ACK_OVERFLOW and
    /// returns the concatenated parameter data.
    pub fn rdm_get_complete<const N: usize>(
        &mut self,
        request: RdmRequest,
    ) -> Result<heapless::Vec<u8, N>, RdmResponseError<D::DriverError>> {
        let mut data = heapless::Vec::new();

        loop {
            let (response_info, complete) = match self.rdm_get(request.clone())? {
                RdmResponse::Response(response_info) => (response_info, true),
                RdmResponse::IncompleteResponse(response_info) => (response_info, false),
                RdmResponse::RequestWasBroadcast => return Err(RdmResponseError::NotMatching),
            };

            data.extend_from_slice(&response_info.data)
                .map_err(|_| RdmResponseError::ParameterDataNotDeserializable)?;

            if complete {
                return Ok(data);
            }
        }
    }

    /// Sends a discovery request to a range of device ids and returns the found uid
    /// if there is no collision and the device does not have its discovery muted.
    pub fn rdm_discover(
        &mut self,
        range: UidRange,
    ) -> Result<DiscoveryOption, RdmResponseError<D::DriverError>> {
        let mut parameter_data = DataPack::new();
        parameter_data
            .extend_from_slice(&range.to_bytes())
            .map_err(|_| RdmResponseError::ParameterDataNotDeserializable)?;

        let transaction_number = self.next_transaction_id();
        self.driver.send_rdm(RdmData::Request(RdmRequestData {
            destination_uid: PackageAddress::Broadcast,
            source_uid: self.uid,
            transaction_number,
            port_id: self.port_id,
            message_count: 0,
            sub_device: SubDevice::Root.into(),
            command_class: CommandClass::DiscoveryCommand,
            parameter_id: pids::DISC_UNIQUE_BRANCH,
            parameter_data,
        }))?;

        Ok(self.driver.receive_rdm_discovery_response()?)
    }

    /// Mute device from discovery. It will not respond to discovery requests anymore.
    /// Returns None if the request was a broadcast.
    pub fn rdm_disc_mute(
        &mut self,
        uid: PackageAddress,
    ) -> Result<Option<DiscoveryMuteResponse>, RdmResponseError<D::DriverError>> {
        let response = self.rdm_request(
            CommandClass::DiscoveryCommand,
            RdmRequest::empty(uid, pids::DISC_MUTE),
        )?;

        deserialize_discovery_mute_response(&response)
    }

    /// Unmute device from discovery. It will respond to discovery requests again.
    /// Returns None if the request was a broadcast.
    pub fn rdm_disc_un_mute(
        &mut self,
        uid: PackageAddress,
    ) -> Result<Option<DiscoveryMuteResponse>, RdmResponseError<D::DriverError>> {
        let response = self.rdm_request(
            CommandClass::DiscoveryCommand,
            RdmRequest::empty(uid, pids::DISC_UN_MUTE),
        )?;

        deserialize_discovery_mute_response(&response)
    }

    /// Get the identify state in the rdm device (led for searching)
    pub fn rdm_get_identify(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<bool, RdmResponseError<D::DriverError>> {
        let response = self.rdm_get(RdmRequest::empty(
            PackageAddress::Device(uid),
            pids::IDENTIFY_DEVICE,
        ))?;

        match response {
            RdmResponse::Response(response_info) => Ok(deserialize_identify(&response_info.data)?),
            _ => Err(RdmResponseError::ParameterDataNotDeserializable),
        }
    }

    /// Set the identify state in the rdm device (led for searching)
    pub fn rdm_set_identify(
        &mut self,
        uid: PackageAddress,
        enabled: bool,
    ) -> Result<(), RdmResponseError<D::DriverError>> {
        let mut request = RdmRequest::empty(uid, pids::IDENTIFY_DEVICE);
        request
            .data
            .push(enabled as u8)
            .map_err(|_| RdmResponseError::ParameterDataNotDeserializable)?;

        self.rdm_set(request)?;

        Ok(())
    }

    /// Get the software version label.
    pub fn rdm_get_software_version_label(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<heapless::String<32>, RdmResponseError<D::DriverError>> {
        let response_info = match self.rdm_get(RdmRequest::empty(
            PackageAddress::Device(uid),
            pids::SOFTWARE_VERSION_LABEL,
        ))? {
            RdmResponse::Response(response_info) => response_info,
            _ => return Err(RdmResponseError::ParameterDataNotDeserializable),
        };

        Ok(deserialize_software_version_label(&response_info.data)?)
    }

    /// Get the current start address of the dmx slave.
    pub fn rdm_get_dmx_start_address(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<DmxStartAddress, RdmResponseError<D::DriverError>> {
        let response = match self.rdm_get(RdmRequest::empty(
            PackageAddress::Device(uid),
            pids::DMX_START_ADDRESS,
        ))? {
            RdmResponse::Response(response) => response,
            _ => return Err(RdmResponseError::ParameterDataNotDeserializable),
        };

        Ok(DmxStartAddress::deserialize(&response.data)?)
    }

    /// Set the current start address of the dmx slave. The address has to be between 1 and 512.
    pub fn rdm_set_dmx_start_address(
        &mut self,
        uid: PackageAddress,
        start_address: u16,
    ) -> Result<(), RdmResponseError<D::DriverError>> {
        let start_address = match DmxStartAddress::try_from(start_address)? {
            DmxStartAddress::NoAddress => return Err(RdmResponseError::ParameterDataNotDeserializable),
            address => address,
        };

        let mut request = RdmRequest::empty(uid, pids::DMX_START_ADDRESS);
        request
            .data
            .extend_from_slice(&start_address.serialize())
            .map_err(|_| RdmResponseError::ParameterDataNotDeserializable)?;

        self.rdm_set(request)?;

        Ok(())
    }

    /// Get the parameter ids that are supported by the responder.
    ///
    /// <div class="warning">Note that this only includes optional parameter ids that are not
    /// required to be compliant with ANSI E1.20.</div>
    pub fn rdm_get_supported_parameters(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<OverflowMessageResp<SupportedParameters>, RdmResponseError<D::DriverError>> {
        let response = self.rdm_get(RdmRequest::empty(
            PackageAddress::Device(uid),
            pids::SUPPORTED_PARAMETERS,
        ))?;

        match response {
            RdmResponse::Response(response_info) => Ok(OverflowMessageResp::Complete(
                deserialize_supported_parameters(&response_info.data)?,
            )),
            RdmResponse::IncompleteResponse(response_info) => Ok(OverflowMessageResp::Incomplete(
                deserialize_supported_parameters(&response_info.data)?,
            )),
            _ => Err(RdmResponseError::ParameterDataNotDeserializable),
        }
    }

    /// Get the device info from the rdm device.
    pub fn rdm_get_device_info(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<DeviceInfo, RdmResponseError<D::DriverError>> {
        let response = self.rdm_get(RdmRequest::empty(
            PackageAddress::Device(uid),
            pids::DEVICE_INFO,
        ))?;
        match response {
            RdmResponse::Response(response_info) => {
                Ok(DeviceInfo::deserialize(&response_info.data)?)
            },
            _ => Err(RdmResponseError::ParameterDataNotDeserializable),
        }
    }
}

fn deserialize_discovery_mute_response<E>(
    response: &RdmResponse,
) -> Result<Option<DiscoveryMuteResponse>, RdmResponseError<E>> {
    Ok(match response {
        RdmResponse::Response(response_info) => Some(
            DiscoveryMuteResponse::deserialize(&response_info.data)
                .map_err(|_| RdmResponseError::ParameterDataNotDeserializable)?,
        ),
        RdmResponse::RequestWasBroadcast => None,
        RdmResponse::IncompleteResponse(_) => {
            return Err(RdmResponseError::ParameterDataNotDeserializable)
        },
    })
}
