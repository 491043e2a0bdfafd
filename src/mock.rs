//! Simulated transceiver and rdm bus for the unit tests.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::consts::{
    DMX_UNIVERSE_SIZE, PREAMBLE_BYTE, RDM_MAX_DISCOVERY_RESPONSE_SIZE, SEPARATOR_BYTE,
    TIMO_FW_BLOCK_CMD_1_COMMAND, TIMO_FW_BLOCK_CMD_2_COMMAND, TIMO_MAX_PAYLOAD_SIZE,
    TIMO_MAX_REGISTER_LENGTH, TIMO_NOP_COMMAND, TIMO_READ_ASC_COMMAND, TIMO_READ_DMX_COMMAND,
    TIMO_READ_RDM_COMMAND, TIMO_RDM_FRAME_SIZE, TIMO_WRITE_DMX_COMMAND, TIMO_WRITE_REG_FLAG,
    TIMO_WRITE_RDM_COMMAND,
};
use crate::frames::{AscFrame, DmxFrame, DmxWindow};
use crate::pids;
use crate::rdm_data::{
    serialize_discovery_response, BinaryRdmPackage, RdmData, RdmRequestData, RdmResponseData,
};
use crate::rdm_types::DiscoveryMuteResponse;
use crate::registers::{reg, register_info, ExtIrqFlags, IrqFlags};
use crate::spi_driver::TimoSpiDriver;
use crate::types::{CommandClass, DataPack, ResponseType};
use crate::unique_identifier::{PackageAddress, UniqueIdentifier};

/// Whatever sits on the far side of the radio link.
pub(crate) trait MockRdmBus {
    /// Called with every package the host writes. Returns what the transceiver receives back.
    fn on_rdm_write(&mut self, package: &[u8]) -> Option<BinaryRdmPackage>;
}

pub(crate) struct NoResponder;

impl MockRdmBus for NoResponder {
    fn on_rdm_write(&mut self, _package: &[u8]) -> Option<BinaryRdmPackage> {
        None
    }
}

pub(crate) struct Responder<F>(pub F);

impl<F: FnMut(&[u8]) -> Option<BinaryRdmPackage>> MockRdmBus for Responder<F> {
    fn on_rdm_write(&mut self, package: &[u8]) -> Option<BinaryRdmPackage> {
        (self.0)(package)
    }
}

#[derive(Debug)]
pub(crate) struct MockError;

/// Answers a unicast request the way a responder would.
pub(crate) fn build_response(
    request: &RdmRequestData,
    response_type: ResponseType,
    parameter_data: DataPack,
    message_count: u8,
) -> RdmResponseData {
    let source_uid = match request.destination_uid {
        PackageAddress::Device(uid) => uid,
        other => panic!("cannot answer a request to {:?}", other),
    };

    RdmResponseData {
        destination_uid: PackageAddress::Device(request.source_uid),
        source_uid,
        transaction_number: request.transaction_number,
        response_type,
        message_count,
        sub_device: request.sub_device,
        command_class: request.command_class.response_class(),
        parameter_id: request.parameter_id,
        parameter_data,
    }
}

/// Models the register file, the irq flags with write back clearing and the bulk buffers.
pub(crate) struct MockTimo<B: MockRdmBus> {
    pub registers: [[u8; TIMO_MAX_REGISTER_LENGTH]; 0x40],
    pending_command: Option<u8>,
    register_reads: [usize; 0x40],
    register_writes: [usize; 0x40],
    pub transfers: usize,
    pub last_command_phase: [u8; 1],
    pub last_payload_phase: heapless::Vec<u8, { 1 + TIMO_MAX_PAYLOAD_SIZE }>,
    pub never_ready: bool,
    /// Polls right after a command phase that still see the level of the pending flags.
    pub latch_polls: u8,
    latch_left: u8,
    /// Polls of the irq line that read released after each command phase.
    pub busy_polls: u8,
    busy_left: u8,
    ready_seen: bool,
    pub raise_after_flags_read: Option<IrqFlags>,
    pub delayed_us: u64,
    pub dmx_in: [u8; DMX_UNIVERSE_SIZE],
    pub dmx_out: DmxFrame,
    asc_in: AscFrame,
    rdm_in: heapless::Deque<BinaryRdmPackage, 4>,
    pub last_rdm_out: Option<BinaryRdmPackage>,
    pub rdm_writes: usize,
    pub firmware_blocks: usize,
    pub bus: B,
}

impl<B: MockRdmBus> MockTimo<B> {
    pub fn new(bus: B) -> Self {
        let mut registers = [[0u8; TIMO_MAX_REGISTER_LENGTH]; 0x40];
        registers[reg::IRQ_MASK as usize][0] = 0xFF;
        registers[reg::EXT_IRQ_MASK as usize][..4].copy_from_slice(&[0xFF; 4]);
        registers[reg::DMX_WINDOW as usize][..4]
            .copy_from_slice(&DmxWindow::default().to_register());

        Self {
            registers,
            pending_command: None,
            register_reads: [0; 0x40],
            register_writes: [0; 0x40],
            transfers: 0,
            last_command_phase: [0],
            last_payload_phase: heapless::Vec::new(),
            never_ready: false,
            latch_polls: 0,
            latch_left: 0,
            busy_polls: 1,
            busy_left: 0,
            ready_seen: false,
            raise_after_flags_read: None,
            delayed_us: 0,
            dmx_in: [0; DMX_UNIVERSE_SIZE],
            dmx_out: DmxFrame::new(),
            asc_in: AscFrame::new(),
            rdm_in: heapless::Deque::new(),
            last_rdm_out: None,
            rdm_writes: 0,
            firmware_blocks: 0,
            bus,
        }
    }

    /// IRQ_FLAGS as the host reads it. EXTENDED follows EXT_IRQ_FLAGS.
    pub fn irq_flags(&self) -> u8 {
        let flags = IrqFlags::from_register(self.registers[reg::IRQ_FLAGS as usize][0])
            .with_extended(self.ext_irq_flags() != 0);

        flags.to_register()
    }

    pub fn ext_irq_flags(&self) -> u32 {
        let mut value = [0u8; 4];
        value.copy_from_slice(&self.registers[reg::EXT_IRQ_FLAGS as usize][..4]);

        u32::from_be_bytes(value)
    }

    fn set_ext_irq_flags(&mut self, value: u32) {
        self.registers[reg::EXT_IRQ_FLAGS as usize][..4].copy_from_slice(&value.to_be_bytes());
    }

    pub fn raise(&mut self, flags: IrqFlags, ext_flags: ExtIrqFlags) {
        self.registers[reg::IRQ_FLAGS as usize][0] |= flags.to_register();
        self.set_ext_irq_flags(self.ext_irq_flags() | ext_flags.bits());
    }

    pub fn register_reads(&self, address: u8) -> usize {
        self.register_reads[address as usize]
    }

    pub fn register_writes(&self, address: u8) -> usize {
        self.register_writes[address as usize]
    }

    pub fn set_asc_frame(&mut self, start_code: u8, data: &[u8]) {
        self.asc_in = AscFrame::from_slice(data).unwrap();
        let value = &mut self.registers[reg::ASC_FRAME as usize];
        value[0] = start_code;
        value[1..3].copy_from_slice(&(data.len() as u16).to_be_bytes());
    }

    /// Makes a frame available for read rdm and raises SPI_RDM.
    pub fn queue_rdm(&mut self, package: &[u8]) {
        self.rdm_in
            .push_back(BinaryRdmPackage::from_slice(package).unwrap())
            .unwrap();
        self.raise(IrqFlags::new(), ExtIrqFlags::new().with_spi_rdm(true));
    }

    fn payload_phase(&mut self, command: u8, tx: &[u8], rx: &mut [u8]) {
        match command {
            address @ 0x00..=0x3F => {
                let info = register_info(address).unwrap();
                self.register_reads[address as usize] += 1;

                match address {
                    reg::IRQ_FLAGS => rx[0] = self.irq_flags(),
                    _ => rx[..info.length]
                        .copy_from_slice(&self.registers[address as usize][..info.length]),
                }

                if address == reg::IRQ_FLAGS {
                    if let Some(flags) = self.raise_after_flags_read.take() {
                        self.raise(flags, ExtIrqFlags::new());
                    }
                }
            },
            0x40..=0x7F => {
                let address = command & !TIMO_WRITE_REG_FLAG;
                let info = register_info(address).unwrap();
                self.register_writes[address as usize] += 1;

                match address {
                    reg::IRQ_FLAGS => self.registers[address as usize][0] &= !tx[0],
                    reg::EXT_IRQ_FLAGS => {
                        let mut value = [0u8; 4];
                        value.copy_from_slice(&tx[..4]);
                        self.set_ext_irq_flags(self.ext_irq_flags() & !u32::from_be_bytes(value));
                    },
                    _ => self.registers[address as usize][..info.length]
                        .copy_from_slice(&tx[..info.length]),
                }
            },
            TIMO_READ_DMX_COMMAND => {
                let mut value = [0u8; 4];
                value.copy_from_slice(&self.registers[reg::DMX_WINDOW as usize][..4]);
                let window = DmxWindow::from_register(&value);
                let start = window.start_address as usize;

                rx.copy_from_slice(&self.dmx_in[start..start + rx.len()]);
            },
            TIMO_READ_ASC_COMMAND => rx.copy_from_slice(&self.asc_in[..rx.len()]),
            TIMO_READ_RDM_COMMAND => {
                rx.fill(TIMO_NOP_COMMAND);
                rx[0] = 0;
                if let Some(package) = self.rdm_in.pop_front() {
                    rx[0] = package.len() as u8;
                    rx[1..=package.len()].copy_from_slice(&package);
                }
            },
            TIMO_WRITE_DMX_COMMAND => self.dmx_out = DmxFrame::from_slice(tx).unwrap(),
            TIMO_WRITE_RDM_COMMAND => {
                assert_eq!(tx.len(), TIMO_RDM_FRAME_SIZE);
                let package = BinaryRdmPackage::from_slice(&tx[1..=tx[0] as usize]).unwrap();
                self.rdm_writes += 1;

                if let Some(response) = self.bus.on_rdm_write(&package) {
                    self.queue_rdm(&response);
                }
                self.last_rdm_out = Some(package);
            },
            TIMO_FW_BLOCK_CMD_1_COMMAND | TIMO_FW_BLOCK_CMD_2_COMMAND => {
                self.firmware_blocks += 1;
            },
            unknown => panic!("unknown command {:#04X}", unknown),
        }
    }
}

impl<B: MockRdmBus> TimoSpiDriver for MockTimo<B> {
    type DriverError = MockError;

    fn transfer(&mut self, _csn_pin: u8, tx: &[u8], rx: &mut [u8]) -> Result<(), MockError> {
        assert_eq!(tx.len(), rx.len());
        self.transfers += 1;

        match self.pending_command.take() {
            None => {
                assert_eq!(tx.len(), 1, "command phase is a single byte");
                self.last_command_phase = [tx[0]];
                rx[0] = self.irq_flags();
                self.pending_command = Some(tx[0]);
                self.latch_left = self.latch_polls;
                self.busy_left = self.busy_polls;
                self.ready_seen = false;
            },
            Some(command) => {
                assert_eq!(tx[0], TIMO_NOP_COMMAND);
                assert!(self.ready_seen, "payload phase clocked while the transceiver was busy");
                self.last_payload_phase = heapless::Vec::from_slice(tx).unwrap();
                rx[0] = self.irq_flags();
                self.payload_phase(command, &tx[1..], &mut rx[1..]);
            },
        }

        Ok(())
    }

    fn irq_asserted(&mut self, _irq_pin: u8) -> Result<bool, MockError> {
        let mask = self.registers[reg::IRQ_MASK as usize][0];

        if self.pending_command.is_some() {
            if self.latch_left > 0 {
                self.latch_left -= 1;
                return Ok(self.irq_flags() & mask != 0);
            }

            if self.busy_left > 0 {
                self.busy_left -= 1;
                return Ok(false);
            }

            self.ready_seen = !self.never_ready;
            return Ok(self.ready_seen);
        }

        Ok(self.irq_flags() & mask != 0)
    }

    fn delay_us(&mut self, us: u32) {
        self.delayed_us += us as u64;
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum ResponderKind {
    /// Follows the protocol.
    Conformant,
    /// Answers branches but never acknowledges DISC_MUTE.
    Deaf,
    /// Answers every branch that covers it with noise.
    Jammer,
    /// Acknowledges DISC_MUTE but keeps answering branches.
    Sticky,
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct SimResponder {
    pub uid: UniqueIdentifier,
    pub kind: ResponderKind,
    pub muted: bool,
}

/// A shared rdm bus of discovery responders. Overlapping responses combine by wired or.
pub(crate) struct SimulatedBus {
    pub responders: heapless::Vec<SimResponder, 16>,
    pub branches: usize,
    pub broadcast_un_mutes: usize,
    /// Set once a responder acknowledged DISC_MUTE.
    pub cancel_on_mute: Option<&'static AtomicBool>,
}

impl SimulatedBus {
    pub fn new(responders: &[(u64, ResponderKind)]) -> Self {
        Self {
            responders: responders
                .iter()
                .map(|&(uid, kind)| SimResponder {
                    uid: UniqueIdentifier::try_from(uid).unwrap(),
                    kind,
                    muted: false,
                })
                .collect(),
            branches: 0,
            broadcast_un_mutes: 0,
            cancel_on_mute: None,
        }
    }

    pub fn conformant(uids: &[u64]) -> Self {
        let mut bus = Self::new(&[]);
        for &uid in uids {
            bus.responders
                .push(SimResponder {
                    uid: UniqueIdentifier::try_from(uid).unwrap(),
                    kind: ResponderKind::Conformant,
                    muted: false,
                })
                .unwrap();
        }

        bus
    }

    pub fn muted(&self, uid: u64) -> bool {
        self.responders
            .iter()
            .any(|responder| responder.uid.as_u64() == uid && responder.muted)
    }

    fn branch(&mut self, request: &RdmRequestData) -> Option<BinaryRdmPackage> {
        self.branches += 1;
        let data = &request.parameter_data;
        let bound = |bytes: &[u8]| {
            let mut value = [0u8; 8];
            value[2..].copy_from_slice(bytes);
            u64::from_be_bytes(value)
        };
        let (lower, upper) = (bound(&data[..6]), bound(&data[6..12]));

        let mut combined: Option<[u8; RDM_MAX_DISCOVERY_RESPONSE_SIZE]> = None;
        for responder in self.responders.iter().filter(|responder| {
            !responder.muted && (lower..=upper).contains(&responder.uid.as_u64())
        }) {
            let frame = match responder.kind {
                ResponderKind::Jammer => {
                    let mut noise = [0x5A; RDM_MAX_DISCOVERY_RESPONSE_SIZE];
                    noise[..7].fill(PREAMBLE_BYTE);
                    noise[7] = SEPARATOR_BYTE;
                    noise
                },
                _ => serialize_discovery_response(responder.uid),
            };

            combined = Some(match combined {
                None => frame,
                Some(mut wired) => {
                    wired.iter_mut().zip(frame).for_each(|(byte, other)| *byte |= other);
                    wired
                },
            });
        }

        combined.map(|frame| BinaryRdmPackage::from_slice(&frame).unwrap())
    }

    fn set_muted(&mut self, request: &RdmRequestData, muted: bool) -> Option<BinaryRdmPackage> {
        match request.destination_uid {
            PackageAddress::Device(uid) => {
                let responder = self
                    .responders
                    .iter_mut()
                    .find(|responder| responder.uid == uid)?;
                if responder.kind == ResponderKind::Deaf {
                    return None;
                }

                if responder.kind != ResponderKind::Sticky {
                    responder.muted = muted;
                }
                if let Some(cancel) = self.cancel_on_mute.filter(|_| muted) {
                    cancel.store(true, Ordering::Release);
                }

                let mute_response = DiscoveryMuteResponse {
                    managed_proxy: false,
                    sub_device: false,
                    boot_loader: false,
                    proxy_device: false,
                    binding_uid: None,
                };

                Some(
                    RdmData::Response(build_response(
                        request,
                        ResponseType::ResponseTypeAck,
                        mute_response.serialize(),
                        0,
                    ))
                    .serialize(),
                )
            },
            _ => {
                if !muted {
                    self.broadcast_un_mutes += 1;
                }

                self.responders
                    .iter_mut()
                    .filter(|responder| {
                        !matches!(responder.kind, ResponderKind::Deaf | ResponderKind::Sticky)
                    })
                    .for_each(|responder| responder.muted = muted);

                None
            },
        }
    }
}

impl MockRdmBus for SimulatedBus {
    fn on_rdm_write(&mut self, package: &[u8]) -> Option<BinaryRdmPackage> {
        let request = match RdmData::deserialize(package).ok()? {
            RdmData::Request(request) => request,
            RdmData::Response(_) => return None,
        };

        if request.command_class != CommandClass::DiscoveryCommand {
            return None;
        }

        match request.parameter_id {
            pids::DISC_UNIQUE_BRANCH => self.branch(&request),
            pids::DISC_MUTE => self.set_muted(&request, true),
            pids::DISC_UN_MUTE => self.set_muted(&request, false),
            _ => None,
        }
    }
}
