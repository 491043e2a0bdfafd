use crate::consts::{
    DMX_UNIVERSE_SIZE, TIMO_MAX_PAYLOAD_SIZE, TIMO_NOP_COMMAND, TIMO_RDM_FRAME_SIZE,
};
use crate::frames::{
    decode_read_asc, decode_read_dmx, decode_read_rdm, encode_firmware_block, encode_write_dmx,
    encode_write_rdm, AscFrame, AscFrameInfo, BulkCommand, DmxFrame, DmxWindow,
    FrameLengthError,
};
use crate::layouts::version_layout;
use crate::rdm_data::BinaryRdmPackage;
use crate::registers::{
    check_read, check_write, reg, register_info, ConfigFlags, ExtIrqFlags, IrqFlags,
    RegisterError, RegisterValue,
};
use crate::spi_driver::{TimoDevice, TimoSpiDriver};
use crate::unique_identifier::UniqueIdentifier;

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimoError<E> {
    /// The transceiver did not become ready for the payload phase in time.
    TimeoutError,
    /// The register access was rejected before touching the bus.
    Register(RegisterError),
    /// A bulk payload had the wrong size.
    FrameLength(FrameLengthError),
    /// An error raised by the spi driver.
    DriverError(E),
}

impl<E: core::fmt::Display> core::fmt::Display for TimoError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TimoError::TimeoutError => write!(f, "transceiver did not get ready"),
            TimoError::Register(error) => write!(f, "{}", error),
            TimoError::FrameLength(error) => write!(f, "{}", error),
            TimoError::DriverError(error) => error.fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Display + core::fmt::Debug> std::error::Error for TimoError<E> {}

impl<E> From<RegisterError> for TimoError<E> {
    fn from(value: RegisterError) -> Self {
        Self::Register(value)
    }
}

impl<E> From<FrameLengthError> for TimoError<E> {
    fn from(value: FrameLengthError) -> Self {
        Self::FrameLength(value)
    }
}

/// Timing of the transport. All values are in microseconds.
#[derive(Debug, Clone)]
pub struct TimoConfig {
    /// How long to wait for the irq line between command and payload phase.
    pub irq_ready_timeout_us: u32,
    /// How long to wait for an rdm response after the request left.
    pub rdm_response_timeout_us: u32,
    /// How long to wait for a DISC_UNIQUE_BRANCH response.
    pub discovery_response_timeout_us: u32,
    /// Pause between two polls of the irq line.
    pub poll_interval_us: u32,
}

impl Default for TimoConfig {
    fn default() -> Self {
        Self {
            irq_ready_timeout_us: 1_000,
            rdm_response_timeout_us: 25_000,
            discovery_response_timeout_us: 10_000,
            poll_interval_us: 100,
        }
    }
}

/// Hardware and software version of the transceiver.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimoVersion {
    pub hardware_version: u32,
    pub software_version: u32,
}

/// A TiMo transceiver on the spi bus.
///
/// Every operation is one blocking transaction. Only one transaction is in flight at a time,
/// which `&mut self` enforces.
pub struct Timo<'a, D: TimoSpiDriver> {
    driver: D,
    device: &'a TimoDevice,
    config: TimoConfig,
}

impl<'a, D: TimoSpiDriver> Timo<'a, D> {
    pub fn new(driver: D, device: &'a TimoDevice, config: TimoConfig) -> Self {
        Self {
            driver,
            device,
            config,
        }
    }

    pub fn device(&self) -> &'a TimoDevice {
        self.device
    }

    pub fn config(&self) -> &TimoConfig {
        &self.config
    }

    /// Get a reference to the underlying driver.
    pub fn get_driver(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Releases the underlying driver.
    pub fn release(self) -> D {
        self.driver
    }

    pub(crate) fn irq_line_asserted(&mut self) -> Result<bool, TimoError<D::DriverError>> {
        self.driver
            .irq_asserted(self.device.irq_pin())
            .map_err(TimoError::DriverError)
    }

    pub(crate) fn delay_us(&mut self, us: u32) {
        self.driver.delay_us(us);
    }

    /// Waits for the falling edge that ends the busy period after a command phase.
    ///
    /// Pending irq flags keep the line asserted, so a level read alone cannot tell a
    /// ready transceiver from one that has not started the command yet. The line has to
    /// be seen released before an asserted level counts.
    fn wait_ready(&mut self) -> Result<(), TimoError<D::DriverError>> {
        let mut waited_us = 0u32;
        let mut released = false;

        loop {
            let asserted = self.irq_line_asserted()?;
            if released && asserted {
                return Ok(());
            }
            released |= !asserted;

            if waited_us >= self.config.irq_ready_timeout_us {
                return Err(TimoError::TimeoutError);
            }

            self.driver.delay_us(self.config.poll_interval_us);
            waited_us = waited_us.saturating_add(self.config.poll_interval_us.max(1));
        }
    }

    /// Runs one transaction and returns the irq flag byte clocked out in the payload phase.
    ///
    /// The payload phase is as long as the longer of `tx_payload` and `rx_payload`, callers
    /// keep both within [TIMO_MAX_PAYLOAD_SIZE]. Unused mosi bytes are nop padding.
    fn transaction(
        &mut self,
        command: u8,
        tx_payload: &[u8],
        rx_payload: &mut [u8],
    ) -> Result<u8, TimoError<D::DriverError>> {
        let csn_pin = self.device.csn_pin();
        let payload_length = tx_payload.len().max(rx_payload.len());

        let mut command_rx = [0u8; 1];
        self.driver
            .transfer(csn_pin, &[command], &mut command_rx)
            .map_err(TimoError::DriverError)?;

        self.wait_ready()?;

        let mut tx_buffer = [TIMO_NOP_COMMAND; 1 + TIMO_MAX_PAYLOAD_SIZE];
        let mut rx_buffer = [0u8; 1 + TIMO_MAX_PAYLOAD_SIZE];
        tx_buffer[1..=tx_payload.len()].copy_from_slice(tx_payload);

        self.driver
            .transfer(
                csn_pin,
                &tx_buffer[..=payload_length],
                &mut rx_buffer[..=payload_length],
            )
            .map_err(TimoError::DriverError)?;

        rx_payload.copy_from_slice(&rx_buffer[1..=rx_payload.len()]);

        trace!(
            "command {} with {} payload bytes, irq flags {}",
            command,
            payload_length,
            rx_buffer[0]
        );

        Ok(rx_buffer[0])
    }

    /// Reads a register into a buffer that has to be exactly as long as the register.
    pub fn read_register_into(
        &mut self,
        address: u8,
        buffer: &mut [u8],
    ) -> Result<(), TimoError<D::DriverError>> {
        let info = check_read(address, buffer.len()).map_err(|error| {
            warn!("read of register {} rejected", address);
            error
        })?;

        self.transaction(info.read_command(), &[], buffer)?;
        Ok(())
    }

    /// Reads a register and returns exactly as many bytes as the register is long.
    pub fn read_register(&mut self, address: u8) -> Result<RegisterValue, TimoError<D::DriverError>> {
        let length = register_info(address)
            .ok_or(RegisterError::AccessDenied(address))?
            .length;

        let mut value = RegisterValue::new();
        value
            .resize(length, 0)
            .map_err(|_| RegisterError::AccessDenied(address))?;
        self.read_register_into(address, &mut value)?;

        Ok(value)
    }

    /// Writes a register. Returns after the transfer completed.
    pub fn write_register(
        &mut self,
        address: u8,
        value: &[u8],
    ) -> Result<(), TimoError<D::DriverError>> {
        let info = check_write(address, value.len()).map_err(|error| {
            warn!("write of register {} rejected", address);
            error
        })?;

        self.transaction(info.write_command(), value, &mut [])?;
        Ok(())
    }

    fn read_u8(&mut self, address: u8) -> Result<u8, TimoError<D::DriverError>> {
        let mut value = [0u8; 1];
        self.read_register_into(address, &mut value)?;

        Ok(value[0])
    }

    pub fn read_config(&mut self) -> Result<ConfigFlags, TimoError<D::DriverError>> {
        Ok(ConfigFlags::from_register(self.read_u8(reg::CONFIG)?))
    }

    pub fn write_config(&mut self, config: ConfigFlags) -> Result<(), TimoError<D::DriverError>> {
        self.write_register(reg::CONFIG, &[config.to_register()])
    }

    /// Raw content of the STATUS register.
    pub fn read_status(&mut self) -> Result<u8, TimoError<D::DriverError>> {
        self.read_u8(reg::STATUS)
    }

    pub fn read_irq_mask(&mut self) -> Result<IrqFlags, TimoError<D::DriverError>> {
        Ok(IrqFlags::from_register(self.read_u8(reg::IRQ_MASK)?))
    }

    pub fn write_irq_mask(&mut self, mask: IrqFlags) -> Result<(), TimoError<D::DriverError>> {
        self.write_register(reg::IRQ_MASK, &[mask.to_register()])
    }

    pub fn read_ext_irq_mask(&mut self) -> Result<ExtIrqFlags, TimoError<D::DriverError>> {
        let mut value = [0u8; 4];
        self.read_register_into(reg::EXT_IRQ_MASK, &mut value)?;

        Ok(ExtIrqFlags::from_register(&value))
    }

    pub fn write_ext_irq_mask(
        &mut self,
        mask: ExtIrqFlags,
    ) -> Result<(), TimoError<D::DriverError>> {
        self.write_register(reg::EXT_IRQ_MASK, &mask.to_register())
    }

    pub(crate) fn read_irq_flags(&mut self) -> Result<IrqFlags, TimoError<D::DriverError>> {
        Ok(IrqFlags::from_register(self.read_u8(reg::IRQ_FLAGS)?))
    }

    pub(crate) fn read_ext_irq_flags(&mut self) -> Result<ExtIrqFlags, TimoError<D::DriverError>> {
        let mut value = [0u8; 4];
        self.read_register_into(reg::EXT_IRQ_FLAGS, &mut value)?;

        Ok(ExtIrqFlags::from_register(&value))
    }

    pub fn read_dmx_window(&mut self) -> Result<DmxWindow, TimoError<D::DriverError>> {
        let mut value = [0u8; 4];
        self.read_register_into(reg::DMX_WINDOW, &mut value)?;

        Ok(DmxWindow::from_register(&value))
    }

    pub fn write_dmx_window(&mut self, window: &DmxWindow) -> Result<(), TimoError<D::DriverError>> {
        self.write_register(reg::DMX_WINDOW, &window.to_register())
    }

    pub fn read_asc_frame_info(&mut self) -> Result<AscFrameInfo, TimoError<D::DriverError>> {
        let mut value = [0u8; 3];
        self.read_register_into(reg::ASC_FRAME, &mut value)?;

        Ok(AscFrameInfo::from_register(&value))
    }

    /// Link quality from 0 (no link) to 255.
    pub fn read_link_quality(&mut self) -> Result<u8, TimoError<D::DriverError>> {
        self.read_u8(reg::LINK_QUALITY)
    }

    pub fn read_version(&mut self) -> Result<TimoVersion, TimoError<D::DriverError>> {
        let mut value = [0u8; 8];
        self.read_register_into(reg::VERSION, &mut value)?;
        let view = version_layout::View::new(&value);

        Ok(TimoVersion {
            hardware_version: view.hardware_version().read(),
            software_version: view.software_version().read(),
        })
    }

    pub fn read_rf_power(&mut self) -> Result<u8, TimoError<D::DriverError>> {
        self.read_u8(reg::RF_POWER)
    }

    pub fn write_rf_power(&mut self, rf_power: u8) -> Result<(), TimoError<D::DriverError>> {
        self.write_register(reg::RF_POWER, &[rf_power])
    }

    /// Returns None if the transceiver is not bound.
    pub fn read_binding_uid(
        &mut self,
    ) -> Result<Option<UniqueIdentifier>, TimoError<D::DriverError>> {
        let mut value = [0u8; 6];
        self.read_register_into(reg::BINDING_UID, &mut value)?;

        Ok(UniqueIdentifier::from_bytes(&value).ok())
    }

    pub fn write_binding_uid(
        &mut self,
        uid: UniqueIdentifier,
    ) -> Result<(), TimoError<D::DriverError>> {
        self.write_register(reg::BINDING_UID, &uid.to_bytes())
    }

    /// Writes up to 512 channels, start code excluded.
    pub fn write_dmx(&mut self, channels: &[u8]) -> Result<(), TimoError<D::DriverError>> {
        let frame = encode_write_dmx(channels)?;
        self.transaction(BulkCommand::WriteDmx as u8, &frame, &mut [])?;

        Ok(())
    }

    /// Reads the configured dmx window.
    pub fn read_dmx(&mut self) -> Result<DmxFrame, TimoError<D::DriverError>> {
        let window = self.read_dmx_window()?;
        if !window.is_valid() {
            return Err(TimoError::FrameLength(FrameLengthError {
                command: BulkCommand::ReadDmx,
                expected: DMX_UNIVERSE_SIZE,
                actual: window.size as usize,
            }));
        }

        let mut payload = [0u8; DMX_UNIVERSE_SIZE];
        let payload = &mut payload[..window.size as usize];
        self.transaction(BulkCommand::ReadDmx as u8, &[], payload)?;

        Ok(decode_read_dmx(payload, &window)?)
    }

    /// Reads the last alternate start code frame together with its description.
    pub fn read_asc(&mut self) -> Result<(AscFrameInfo, AscFrame), TimoError<D::DriverError>> {
        let info = self.read_asc_frame_info()?;
        let length = info.length as usize;
        if length > TIMO_MAX_PAYLOAD_SIZE {
            return Err(TimoError::FrameLength(FrameLengthError {
                command: BulkCommand::ReadAsc,
                expected: TIMO_MAX_PAYLOAD_SIZE,
                actual: length,
            }));
        }

        let mut payload = [0u8; TIMO_MAX_PAYLOAD_SIZE];
        let payload = &mut payload[..length];
        self.transaction(BulkCommand::ReadAsc as u8, &[], payload)?;

        Ok((info, decode_read_asc(payload, &info)?))
    }

    /// Hands a serialized rdm package or discovery response to the radio.
    pub fn write_rdm(&mut self, package: &[u8]) -> Result<(), TimoError<D::DriverError>> {
        let frame = encode_write_rdm(package)?;
        self.transaction(BulkCommand::WriteRdm as u8, &frame, &mut [])?;

        Ok(())
    }

    /// Reads the buffered rdm frame. An empty package means nothing was buffered.
    pub fn read_rdm(&mut self) -> Result<BinaryRdmPackage, TimoError<D::DriverError>> {
        let mut payload = [0u8; TIMO_RDM_FRAME_SIZE];
        self.transaction(BulkCommand::ReadRdm as u8, &[], &mut payload)?;

        Ok(decode_read_rdm(&payload)?)
    }

    /// Transfers one opaque firmware block.
    pub fn write_firmware_block(
        &mut self,
        command: BulkCommand,
        block: &[u8],
    ) -> Result<(), TimoError<D::DriverError>> {
        let frame = encode_firmware_block(command, block)?;
        self.transaction(command as u8, &frame, &mut [])?;

        Ok(())
    }
}
