use crate::consts::{
    PREAMBLE_BYTE, RDM_CHECKSUM_SIZE, RDM_DISCOVERY_RESPONSE_SIZE, RDM_HEADER_SIZE,
    RDM_MAX_DISCOVERY_RESPONSE_SIZE, RDM_MAX_PACKAGE_SIZE, RDM_MIN_PACKAGE_SIZE, SC_RDM,
    SC_SUB_MESSAGE, SEPARATOR_BYTE,
};
use crate::layouts::rdm_message_layout;
use crate::types::{CommandClass, DataPack, NackReason, ResponseType};
use crate::unique_identifier::{PackageAddress, UniqueIdentifier};
use crate::utils::{calculate_checksum, decode_disc_unique, encode_disc_unique};

/// Binary representation of an RDM package including its checksum.
pub type BinaryRdmPackage = heapless::Vec<u8, RDM_MAX_PACKAGE_SIZE>;

#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RdmDeserializationError {
    /// Buffer must be at least 26 bytes
    BufferTooSmall,
    /// Buffer must be at most 256 bytes
    BufferTooBig,
    /// The trailing checksum does not match the sum of the preceding bytes.
    ChecksumError,
    /// Received wrong start code (0xCC) or sub start code (0x01).
    BadStartCode,
    /// The message length or parameter data length field is incorrect; contains the field value.
    LengthMismatch(usize),
    /// The command class was not found; contains contents of command class field
    CommandClassNotFound(u8),
    /// The response type was not found; contains contents of response type field
    ResponseTypeNotFound(u8),
    /// The source uid is a broadcast address.
    SourceUidIsBroadcast,
    /// A uid field contains the reserved all zero uid.
    ReservedUid,
    /// The parameter data is too short for the response type.
    ParameterDataTooShort,
    /// The NACK reason code is not part of ANSI E1.20 Table A-17.
    UnknownNackReason(u16),
}

impl core::fmt::Display for RdmDeserializationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RdmDeserializationError::BufferTooSmall => write!(f, "buffer too small"),
            RdmDeserializationError::BufferTooBig => write!(f, "buffer to big"),
            RdmDeserializationError::ChecksumError => write!(f, "checksum is incorrect"),
            RdmDeserializationError::BadStartCode => write!(f, "start code is incorrect"),
            RdmDeserializationError::LengthMismatch(length) => {
                write!(f, "length field {} is incorrect", length)
            },
            RdmDeserializationError::CommandClassNotFound(command_class) => {
                write!(f, "command class {} not found", command_class)
            },
            RdmDeserializationError::ResponseTypeNotFound(response_type) => {
                write!(f, "response type {} is unknown", response_type)
            },
            RdmDeserializationError::SourceUidIsBroadcast => write!(f, "source uid is a broadcast"),
            RdmDeserializationError::ReservedUid => write!(f, "uid is reserved"),
            RdmDeserializationError::ParameterDataTooShort => {
                write!(f, "parameter data too short")
            },
            RdmDeserializationError::UnknownNackReason(reason) => {
                write!(f, "nack reason {} is unknown", reason)
            },
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RdmDeserializationError {}

/// The wire shape shared by requests and responses.
///
/// The byte after the transaction number is a port id on requests and a response type
/// on responses. It is kept untyped here, use [RdmMessage::port_id] or
/// [RdmMessage::response_type] to read it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RdmMessage {
    pub destination_uid: PackageAddress,
    pub source_uid: UniqueIdentifier,
    pub transaction_number: u8,
    pub port_id_or_response_type: u8,
    pub message_count: u8,
    pub sub_device: u16,
    pub command_class: CommandClass,
    pub parameter_id: u16,
    pub parameter_data: DataPack,
}

impl RdmMessage {
    /// Value of the message length field: header plus parameter data, checksum excluded.
    pub fn message_length(&self) -> usize {
        RDM_HEADER_SIZE + self.parameter_data.len()
    }

    /// The port id if this is a request.
    pub fn port_id(&self) -> Option<u8> {
        self.command_class
            .is_request()
            .then_some(self.port_id_or_response_type)
    }

    /// The response type if this is a response.
    pub fn response_type(&self) -> Option<Result<ResponseType, RdmDeserializationError>> {
        self.command_class.is_response().then(|| {
            ResponseType::try_from(self.port_id_or_response_type).map_err(|_| {
                RdmDeserializationError::ResponseTypeNotFound(self.port_id_or_response_type)
            })
        })
    }

    /// Serializes the message including the trailing checksum.
    pub fn serialize(&self) -> BinaryRdmPackage {
        let mut dst = [0u8; RDM_MAX_PACKAGE_SIZE];
        let message_length = self.message_length();
        let total_package_length = message_length + RDM_CHECKSUM_SIZE;

        let mut view = rdm_message_layout::View::new(&mut dst[..total_package_length]);
        view.start_code_mut().write(SC_RDM);
        view.sub_start_code_mut().write(SC_SUB_MESSAGE);
        view.message_length_mut().write(message_length as u8);
        view.destination_uid_mut()
            .copy_from_slice(&self.destination_uid.to_bytes());
        view.source_uid_mut()
            .copy_from_slice(&self.source_uid.to_bytes());
        view.transaction_number_mut().write(self.transaction_number);
        view.port_id_response_type_mut()
            .write(self.port_id_or_response_type);
        view.message_count_mut().write(self.message_count);
        view.sub_device_mut().write(self.sub_device);
        view.command_class_mut().write(self.command_class as u8);
        view.parameter_id_mut().write(self.parameter_id);
        view.parameter_data_length_mut()
            .write(self.parameter_data.len() as u8);
        view.parameter_data_and_checksum_mut()[..self.parameter_data.len()]
            .copy_from_slice(&self.parameter_data);

        let checksum = calculate_checksum(&dst[..message_length]);
        dst[message_length..total_package_length].copy_from_slice(&checksum.to_be_bytes());

        let mut package = BinaryRdmPackage::new();
        let _ = package.extend_from_slice(&dst[..total_package_length]);
        package
    }

    /// Deserialize an rdm package.
    ///
    /// The checksum is verified before anything else, so any single corrupted byte
    /// is reported as [RdmDeserializationError::ChecksumError].
    pub fn deserialize(buffer: &[u8]) -> Result<Self, RdmDeserializationError> {
        let buffer_size = buffer.len();

        if buffer_size < RDM_MIN_PACKAGE_SIZE {
            return Err(RdmDeserializationError::BufferTooSmall);
        }

        if buffer_size > RDM_MAX_PACKAGE_SIZE {
            return Err(RdmDeserializationError::BufferTooBig);
        }

        let message_end = buffer_size - RDM_CHECKSUM_SIZE;
        let expected_checksum = calculate_checksum(&buffer[..message_end]);
        let actual_checksum = u16::from_be_bytes([buffer[message_end], buffer[message_end + 1]]);

        if expected_checksum != actual_checksum {
            return Err(RdmDeserializationError::ChecksumError);
        }

        let view = rdm_message_layout::View::new(buffer);

        if view.start_code().read() != SC_RDM || view.sub_start_code().read() != SC_SUB_MESSAGE {
            return Err(RdmDeserializationError::BadStartCode);
        }

        let message_length = view.message_length().read() as usize;
        if message_length != message_end {
            return Err(RdmDeserializationError::LengthMismatch(message_length));
        }

        let parameter_data_length = view.parameter_data_length().read() as usize;
        if RDM_HEADER_SIZE + parameter_data_length != message_length {
            return Err(RdmDeserializationError::LengthMismatch(
                parameter_data_length,
            ));
        }

        let command_class_field = view.command_class().read();
        let command_class = CommandClass::try_from(command_class_field)
            .map_err(|_| RdmDeserializationError::CommandClassNotFound(command_class_field))?;

        let destination_uid = PackageAddress::from_bytes(view.destination_uid())
            .map_err(|_| RdmDeserializationError::ReservedUid)?;
        let source_uid = match PackageAddress::from_bytes(view.source_uid())
            .map_err(|_| RdmDeserializationError::ReservedUid)?
        {
            PackageAddress::Device(uid) => uid,
            _ => return Err(RdmDeserializationError::SourceUidIsBroadcast),
        };

        let parameter_data =
            DataPack::from_slice(&view.parameter_data_and_checksum()[..parameter_data_length])
                .map_err(|_| RdmDeserializationError::BufferTooBig)?;

        Ok(Self {
            destination_uid,
            source_uid,
            transaction_number: view.transaction_number().read(),
            port_id_or_response_type: view.port_id_response_type().read(),
            message_count: view.message_count().read(),
            sub_device: view.sub_device().read(),
            command_class,
            parameter_id: view.parameter_id().read(),
            parameter_data,
        })
    }
}

/// An RDM Request package that does not have its parameter data deserialized.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RdmRequestData {
    pub destination_uid: PackageAddress,
    pub source_uid: UniqueIdentifier,
    pub transaction_number: u8,
    pub port_id: u8,
    pub message_count: u8,
    pub sub_device: u16,
    /// Always one of the request classes.
    pub command_class: CommandClass,
    pub parameter_id: u16,
    pub parameter_data: DataPack,
}

/// How a responder answered a request.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponseStatus {
    /// The parameter data holds the complete answer.
    Acknowledged,
    /// More data is pending. Issue the same GET again to receive the next part.
    AcknowledgedOverflow,
    /// Retry after the contained amount of 100ms steps.
    AcknowledgedTimer(u16),
    /// The responder refused the request.
    NotAcknowledged(NackReason),
}

/// An RDM Response package that does not have its parameter data deserialized.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RdmResponseData {
    pub destination_uid: PackageAddress,
    pub source_uid: UniqueIdentifier,
    pub transaction_number: u8,
    pub response_type: ResponseType,
    pub message_count: u8,
    pub sub_device: u16,
    /// Always one of the response classes.
    pub command_class: CommandClass,
    pub parameter_id: u16,
    pub parameter_data: DataPack,
}

impl RdmResponseData {
    /// Interprets the response type together with the parameter data it governs.
    pub fn status(&self) -> Result<ResponseStatus, RdmDeserializationError> {
        let leading_word = || {
            if self.parameter_data.len() < 2 {
                return Err(RdmDeserializationError::ParameterDataTooShort);
            }

            Ok(u16::from_be_bytes([
                self.parameter_data[0],
                self.parameter_data[1],
            ]))
        };

        Ok(match self.response_type {
            ResponseType::ResponseTypeAck => ResponseStatus::Acknowledged,
            ResponseType::ResponseTypeAckOverflow => ResponseStatus::AcknowledgedOverflow,
            ResponseType::ResponseTypeAckTimer => {
                ResponseStatus::AcknowledgedTimer(leading_word()?)
            },
            ResponseType::ResponseTypeNackReason => {
                let reason_code = leading_word()?;
                ResponseStatus::NotAcknowledged(
                    NackReason::try_from(reason_code)
                        .map_err(|_| RdmDeserializationError::UnknownNackReason(reason_code))?,
                )
            },
        })
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RdmData {
    Request(RdmRequestData),
    Response(RdmResponseData),
}

impl RdmData {
    pub fn deserialize(buf: &[u8]) -> Result<Self, RdmDeserializationError> {
        RdmMessage::deserialize(buf)?.try_into()
    }

    pub fn serialize(&self) -> BinaryRdmPackage {
        RdmMessage::from(self).serialize()
    }
}

impl TryFrom<RdmMessage> for RdmData {
    type Error = RdmDeserializationError;

    fn try_from(message: RdmMessage) -> Result<Self, Self::Error> {
        if message.command_class.is_request() {
            return Ok(RdmData::Request(RdmRequestData {
                destination_uid: message.destination_uid,
                source_uid: message.source_uid,
                transaction_number: message.transaction_number,
                port_id: message.port_id_or_response_type,
                message_count: message.message_count,
                sub_device: message.sub_device,
                command_class: message.command_class,
                parameter_id: message.parameter_id,
                parameter_data: message.parameter_data,
            }));
        }

        let response_type = ResponseType::try_from(message.port_id_or_response_type).map_err(
            |_| RdmDeserializationError::ResponseTypeNotFound(message.port_id_or_response_type),
        )?;

        Ok(RdmData::Response(RdmResponseData {
            destination_uid: message.destination_uid,
            source_uid: message.source_uid,
            transaction_number: message.transaction_number,
            response_type,
            message_count: message.message_count,
            sub_device: message.sub_device,
            command_class: message.command_class,
            parameter_id: message.parameter_id,
            parameter_data: message.parameter_data,
        }))
    }
}

impl From<&RdmData> for RdmMessage {
    fn from(rdm_data: &RdmData) -> Self {
        match rdm_data {
            RdmData::Request(request) => RdmMessage {
                destination_uid: request.destination_uid,
                source_uid: request.source_uid,
                transaction_number: request.transaction_number,
                port_id_or_response_type: request.port_id,
                message_count: request.message_count,
                sub_device: request.sub_device,
                command_class: request.command_class,
                parameter_id: request.parameter_id,
                parameter_data: request.parameter_data.clone(),
            },
            RdmData::Response(response) => RdmMessage {
                destination_uid: response.destination_uid,
                source_uid: response.source_uid,
                transaction_number: response.transaction_number,
                port_id_or_response_type: response.response_type as u8,
                message_count: response.message_count,
                sub_device: response.sub_device,
                command_class: response.command_class,
                parameter_id: response.parameter_id,
                parameter_data: response.parameter_data.clone(),
            },
        }
    }
}

/// Binary representation of a DISC_UNIQUE_BRANCH response.
pub type BinaryDiscoveryResponse = [u8; RDM_MAX_DISCOVERY_RESPONSE_SIZE];

/// Builds the discovery response a responder sends without a break:
/// seven preamble bytes, the separator, the encoded uid and the encoded checksum.
pub fn serialize_discovery_response(uid: UniqueIdentifier) -> BinaryDiscoveryResponse {
    let mut frame_buffer = [PREAMBLE_BYTE; RDM_MAX_DISCOVERY_RESPONSE_SIZE];
    frame_buffer[7] = SEPARATOR_BYTE;

    encode_disc_unique(&uid.to_bytes(), &mut frame_buffer[8..20]);

    let checksum = calculate_checksum(&frame_buffer[8..20]);
    encode_disc_unique(&checksum.to_be_bytes(), &mut frame_buffer[20..24]);

    frame_buffer
}

/// Returns received device id if there is no collision.
pub fn deserialize_discovery_response(
    buffer: &[u8],
) -> Result<UniqueIdentifier, RdmDeserializationError> {
    let index_of_separator_byte = buffer
        .iter()
        .position(|&x| x == SEPARATOR_BYTE)
        .ok_or(RdmDeserializationError::BadStartCode)?;

    if buffer[..index_of_separator_byte]
        .iter()
        .any(|&byte| byte != PREAMBLE_BYTE)
    {
        return Err(RdmDeserializationError::BadStartCode);
    }

    let start_index = index_of_separator_byte + 1;
    let message_length = buffer.len() - start_index;
    if message_length < RDM_DISCOVERY_RESPONSE_SIZE {
        return Err(RdmDeserializationError::LengthMismatch(message_length));
    }

    let euid = &buffer[start_index..start_index + 12];
    let calculated_checksum = calculate_checksum(euid);

    let mut checksum_buf = [0u8; 2];
    decode_disc_unique(
        &buffer[start_index + 12..start_index + 16],
        &mut checksum_buf,
    );

    if calculated_checksum != u16::from_be_bytes(checksum_buf) {
        return Err(RdmDeserializationError::ChecksumError);
    }

    let mut device_id_buf = [0u8; 6];
    decode_disc_unique(euid, &mut device_id_buf);

    match PackageAddress::from_bytes(&device_id_buf)
        .map_err(|_| RdmDeserializationError::ReservedUid)?
    {
        PackageAddress::Device(uid) => Ok(uid),
        _ => Err(RdmDeserializationError::SourceUidIsBroadcast),
    }
}
