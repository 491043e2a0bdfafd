//! Rust library for driving SPI attached wireless DMX512 (ANSI E1.11) and DMX-RDM (ANSI E1.20)
//! transceivers of the TiMo family. It covers the register file, the bulk dmx and rdm frames, the
//! interrupt flags, the rdm packet codec and uid discovery. This library features no-std as well as
//! no-alloc support (no heap allocation) to target embedded as well as os platforms.
//!
//! Please refer to the [official specifications](https://tsp.esta.org/) published by the ESTA.
//!
//! <div class="warning">This library is wip, it has not yet received extensive testing and the api
//! might not be final.</div>
//!
//! # Usage
//! The spi bus is abstracted by [spi_driver::TimoSpiDriver]. Implement it for the spi peripheral
//! and gpio pins of your platform.
//!
//! ## Controller
//!
//! ```rust,ignore
//! use core::sync::atomic::AtomicBool;
//! use timo_rdm::discovery::{run_discovery, DiscoveryConfig, DiscoveryReport, UnmutePolicy};
//! use timo_rdm::rdm_controller::{RdmController, RdmControllerConfig};
//! use timo_rdm::spi_driver::TimoDevice;
//! use timo_rdm::timo::{Timo, TimoConfig};
//! use timo_rdm::unique_identifier::PackageAddress;
//!
//! // chip select on pin 5, irq on pin 6
//! static TIMO_DEVICE: TimoDevice = TimoDevice::new(5, 6);
//!
//! // call TIMO_DEVICE.signal_irq() from the falling edge interrupt of the irq pin
//!
//! let timo = Timo::new(MySpiBus::new(), &TIMO_DEVICE, TimoConfig::default());
//! let mut controller = RdmController::new(timo, &RdmControllerConfig::default());
//!
//! // Unmute all dmx responders.
//! controller.rdm_disc_un_mute(PackageAddress::Broadcast).unwrap();
//!
//! let cancel = AtomicBool::new(false);
//! let config = DiscoveryConfig {
//!     after_pass: UnmutePolicy::KeepMuted,
//!     ..DiscoveryConfig::default()
//! };
//! let report: DiscoveryReport<32> = run_discovery(&mut controller, &config, &cancel).unwrap();
//!
//! for device in report.found {
//!     match controller.rdm_set_identify(PackageAddress::Device(device), true) {
//!         Ok(_) => println!("Activated identify for device_uid {device}"),
//!         Err(error) => {
//!             println!("Activating identify for device_uid {device} failed with {error}")
//!         },
//!     }
//! }
//!
//! controller.send_dmx_package(&[0xFF; 512]).unwrap();
//! ```
//!
//! ## Interrupts
//!
//! Everything the transceiver reports arrives through its irq flags. Poll them with a
//! [irq::TimoIrqHandler] from your main loop.
//!
//! ```rust,ignore
//! use timo_rdm::irq::{IrqOutcome, LinkOutcome, TimoIrqHandler};
//! use timo_rdm::spi_driver::TimoSpiDriver;
//! use timo_rdm::timo::Timo;
//!
//! struct Receiver;
//!
//! impl<D: TimoSpiDriver> TimoIrqHandler<D> for Receiver {
//!     type Error = timo_rdm::timo::TimoError<D::DriverError>;
//!
//!     fn on_rf_link(&mut self, timo: &mut Timo<'_, D>) -> Result<LinkOutcome, Self::Error> {
//!         match timo.read_link_quality()? {
//!             0 => Ok(LinkOutcome::Stale),
//!             _ => Ok(LinkOutcome::Healthy),
//!         }
//!     }
//!
//!     fn on_dmx_changed(&mut self, timo: &mut Timo<'_, D>) -> Result<IrqOutcome, Self::Error> {
//!         let channels = timo.read_dmx()?;
//!         println!("first channel is {}", channels[0]);
//!
//!         Ok(IrqOutcome::Consumed)
//!     }
//! }
//!
//! loop {
//!     if TIMO_DEVICE.irq_pending() {
//!         timo.poll_irq(&mut Receiver).unwrap();
//!     }
//! }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
mod fmt;

pub mod consts;
/// Uid discovery on top of the [rdm_controller::RdmController].
pub mod discovery;
/// Encoding and decoding of the bulk frames of the transceiver.
pub mod frames;
/// Interrupt flag dispatching.
pub mod irq;
mod layouts;
#[cfg(test)]
mod mock;
pub mod pids;
/// Module for building rdm controllers.
pub mod rdm_controller;
pub mod rdm_data;
/// Driver traits for sending and receiving dmx and rdm packages, implemented by [timo::Timo].
pub mod rdm_driver;
pub mod rdm_types;
/// The register map of the transceiver.
pub mod registers;
pub mod spi_driver;
pub mod timo;
pub mod types;
pub mod unique_identifier;
mod utils;
