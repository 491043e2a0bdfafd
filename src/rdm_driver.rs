use crate::frames::{DmxFrame, FrameLengthError};
use crate::irq::{IrqOutcome, PollingError, TimoIrqHandler};
use crate::rdm_data::{
    deserialize_discovery_response, BinaryRdmPackage, RdmData, RdmDeserializationError,
};
use crate::registers::RegisterError;
use crate::spi_driver::TimoSpiDriver;
use crate::timo::{Timo, TimoError};
use crate::unique_identifier::UniqueIdentifier;

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmxError<E> {
    /// The request timed time out.
    /// **Important:** If you implement a driver make sure this error gets raised instead
    /// of a driver specific error.
    TimeoutError,
    /// Raised when an RDM package could not be deserialized.
    DeserializationError(RdmDeserializationError),
    /// A register access was rejected.
    Register(RegisterError),
    /// A bulk frame had the wrong size.
    FrameLength(FrameLengthError),
    /// An error raised by the spi driver.
    DriverError(E),
}

impl<E: core::fmt::Display> core::fmt::Display for DmxError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DmxError::TimeoutError => write!(f, "request timed out"),
            DmxError::DeserializationError(error) => write!(f, "{}", error),
            DmxError::Register(error) => write!(f, "{}", error),
            DmxError::FrameLength(error) => write!(f, "{}", error),
            DmxError::DriverError(error) => error.fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Display + core::fmt::Debug> std::error::Error for DmxError<E> {}

impl<E> From<TimoError<E>> for DmxError<E> {
    fn from(value: TimoError<E>) -> Self {
        match value {
            TimoError::TimeoutError => Self::TimeoutError,
            TimoError::Register(error) => Self::Register(error),
            TimoError::FrameLength(error) => Self::FrameLength(error),
            TimoError::DriverError(driver_error) => Self::DriverError(driver_error),
        }
    }
}

impl<E> DmxError<E> {
    /// True if the error says something about the bus traffic, not about this host.
    /// Such errors are worth a retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DmxError::TimeoutError | DmxError::DeserializationError(_) | DmxError::FrameLength(_)
        )
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryOption {
    /// No device responded to the discovery request.
    /// There aren't any devices in the specified unique id range.
    NoDevice,
    /// The response to the discovery request couldn't be deserialized.
    /// There are multiple devices in the specified unique id range.
    Collision,
    /// The discovery response was successfully deserialized.
    /// There is only one device in the specified unique id range.
    Found(UniqueIdentifier),
}

/// Trait that ensures that the same Error is used in the [DmxControllerDriver] as well as the [RdmControllerDriver].
pub trait ControllerDriverErrorDef {
    /// The driver specific error.
    type DriverError;
}

/// Trait for controlling DMX fixtures.
pub trait DmxControllerDriver: ControllerDriverErrorDef {
    /// Send a DMX512 package. It shouldn't be bigger than 512 bytes.
    fn send_dmx_package(&mut self, package: &[u8]) -> Result<(), DmxError<Self::DriverError>>;
}

/// Trait for sending and receiving RDM packages from a controller point of view.
pub trait RdmControllerDriver: ControllerDriverErrorDef {
    /// Sends an RDM package.
    fn send_rdm(&mut self, package: RdmData) -> Result<(), DmxError<Self::DriverError>>;
    /// Receives an RDM package.
    fn receive_rdm(&mut self) -> Result<RdmData, DmxError<Self::DriverError>>;
    /// Receives an RDM discovery response.
    /// Returns the received device id.
    fn receive_rdm_discovery_response(
        &mut self,
    ) -> Result<DiscoveryOption, DmxError<Self::DriverError>>;
}

/// Trait for receiving the dmx window of the transceiver.
pub trait DmxReceiver: ControllerDriverErrorDef {
    /// Receive a DMX512 package.
    fn receive_package(&mut self) -> Result<DmxFrame, DmxError<Self::DriverError>>;
}

/// Picks up rdm frames and leaves every other flag to the application.
struct RdmCapture {
    package: Option<BinaryRdmPackage>,
}

impl<D: TimoSpiDriver> TimoIrqHandler<D> for RdmCapture {
    type Error = TimoError<D::DriverError>;

    fn on_dmx_changed(&mut self, _timo: &mut Timo<'_, D>) -> Result<IrqOutcome, Self::Error> {
        Ok(IrqOutcome::Deferred)
    }

    fn on_spi_rdm(&mut self, timo: &mut Timo<'_, D>) -> Result<IrqOutcome, Self::Error> {
        let package = timo.read_rdm()?;
        if !package.is_empty() {
            self.package = Some(package);
        }

        Ok(IrqOutcome::Consumed)
    }

    fn on_radio_discovery(
        &mut self,
        _timo: &mut Timo<'_, D>,
    ) -> Result<IrqOutcome, Self::Error> {
        Ok(IrqOutcome::Deferred)
    }
}

impl<'a, D: TimoSpiDriver> Timo<'a, D> {
    /// Polls the irq until an rdm frame arrived or the timeout elapsed.
    fn receive_rdm_frame(
        &mut self,
        timeout_us: u32,
    ) -> Result<Option<BinaryRdmPackage>, DmxError<D::DriverError>> {
        let poll_interval_us = self.config().poll_interval_us;
        let mut capture = RdmCapture { package: None };
        let mut waited_us = 0u32;

        loop {
            self.poll_irq(&mut capture).map_err(|error| match error {
                PollingError::Transport(error) | PollingError::Handler(error) => {
                    DmxError::from(error)
                },
            })?;

            if let Some(package) = capture.package.take() {
                return Ok(Some(package));
            }

            if waited_us >= timeout_us {
                return Ok(None);
            }

            self.delay_us(poll_interval_us);
            waited_us = waited_us.saturating_add(poll_interval_us.max(1));
        }
    }
}

impl<'a, D: TimoSpiDriver> ControllerDriverErrorDef for Timo<'a, D> {
    type DriverError = D::DriverError;
}

impl<'a, D: TimoSpiDriver> DmxControllerDriver for Timo<'a, D> {
    fn send_dmx_package(&mut self, package: &[u8]) -> Result<(), DmxError<Self::DriverError>> {
        Ok(self.write_dmx(package)?)
    }
}

impl<'a, D: TimoSpiDriver> DmxReceiver for Timo<'a, D> {
    fn receive_package(&mut self) -> Result<DmxFrame, DmxError<Self::DriverError>> {
        Ok(self.read_dmx()?)
    }
}

impl<'a, D: TimoSpiDriver> RdmControllerDriver for Timo<'a, D> {
    fn send_rdm(&mut self, package: RdmData) -> Result<(), DmxError<Self::DriverError>> {
        Ok(self.write_rdm(&package.serialize())?)
    }

    fn receive_rdm(&mut self) -> Result<RdmData, DmxError<Self::DriverError>> {
        let timeout_us = self.config().rdm_response_timeout_us;
        let package = self
            .receive_rdm_frame(timeout_us)?
            .ok_or(DmxError::TimeoutError)?;

        RdmData::deserialize(&package).map_err(DmxError::DeserializationError)
    }

    fn receive_rdm_discovery_response(
        &mut self,
    ) -> Result<DiscoveryOption, DmxError<Self::DriverError>> {
        let timeout_us = self.config().discovery_response_timeout_us;
        let package = match self.receive_rdm_frame(timeout_us)? {
            None => return Ok(DiscoveryOption::NoDevice),
            Some(package) => package,
        };

        // anything that does not decode is the signature of overlapping responses
        Ok(deserialize_discovery_response(&package)
            .map_or(DiscoveryOption::Collision, DiscoveryOption::Found))
    }
}
