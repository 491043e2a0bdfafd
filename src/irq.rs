//! Servicing of the transceiver interrupt.
//!
//! IRQ_FLAGS is read once per poll, EXT_IRQ_FLAGS only if the EXTENDED meta flag is set.
//! Flags are cleared by writing back exactly the bits that were observed and consumed, a
//! flag raised between the read and the write back stays pending. RF_LINK is serviced
//! first, a stale link keeps the data flags pending for the next poll.

use crate::registers::{reg, ExtIrqFlags, IrqFlags};
use crate::spi_driver::TimoSpiDriver;
use crate::timo::{Timo, TimoError};

/// What a handler did with the flag it was handed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqOutcome {
    /// Serviced, the flag will be cleared.
    Consumed,
    /// Not serviced, the flag stays set and is handed out again on the next poll.
    Deferred,
}

/// What the rf link handler found.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkOutcome {
    /// Link is up, continue with the data flags.
    Healthy,
    /// Link went away. RF_LINK is cleared but data flags are not handed out in this poll.
    Stale,
    /// Not serviced, RF_LINK stays set.
    Deferred,
}

/// Receives the flags observed by [Timo::poll_irq].
///
/// Every handler runs to completion before the next one is called. Handlers may use the
/// transceiver, for example to read the frame that raised the flag.
/// Unimplemented handlers consume their flag without any further action.
pub trait TimoIrqHandler<D: TimoSpiDriver> {
    type Error;

    fn on_rf_link(&mut self, _timo: &mut Timo<'_, D>) -> Result<LinkOutcome, Self::Error> {
        Ok(LinkOutcome::Healthy)
    }

    fn on_dmx_changed(&mut self, _timo: &mut Timo<'_, D>) -> Result<IrqOutcome, Self::Error> {
        Ok(IrqOutcome::Consumed)
    }

    fn on_spi_rdm(&mut self, _timo: &mut Timo<'_, D>) -> Result<IrqOutcome, Self::Error> {
        Ok(IrqOutcome::Consumed)
    }

    fn on_radio_discovery(
        &mut self,
        _timo: &mut Timo<'_, D>,
    ) -> Result<IrqOutcome, Self::Error> {
        Ok(IrqOutcome::Consumed)
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollingError<DriverError, HandlerError> {
    /// Reading or clearing the flags failed.
    Transport(TimoError<DriverError>),
    /// A handler failed. Flags consumed before it are cleared anyway.
    Handler(HandlerError),
}

impl<DriverError: core::fmt::Display, HandlerError: core::fmt::Display> core::fmt::Display
    for PollingError<DriverError, HandlerError>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PollingError::Transport(error) => write!(f, "{}", error),
            PollingError::Handler(error) => error.fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl<
        DriverError: core::fmt::Display + core::fmt::Debug,
        HandlerError: core::fmt::Display + core::fmt::Debug,
    > std::error::Error for PollingError<DriverError, HandlerError>
{
}

impl<DriverError, HandlerError> From<TimoError<DriverError>>
    for PollingError<DriverError, HandlerError>
{
    fn from(value: TimoError<DriverError>) -> Self {
        Self::Transport(value)
    }
}

/// Raw flag words of one poll.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IrqReport {
    /// IRQ_FLAGS as read.
    pub flags: u8,
    /// EXT_IRQ_FLAGS as read, zero if EXTENDED was not set.
    pub ext_flags: u32,
    /// Bits written back to IRQ_FLAGS.
    pub cleared_flags: u8,
    /// Bits written back to EXT_IRQ_FLAGS.
    pub cleared_ext_flags: u32,
}

impl IrqReport {
    /// True if the poll found nothing to do.
    pub fn is_idle(&self) -> bool {
        self.flags == 0
    }

    /// Flags that are still pending after the poll.
    pub fn pending_flags(&self) -> u8 {
        self.flags & !self.cleared_flags
    }

    pub fn pending_ext_flags(&self) -> u32 {
        self.ext_flags & !self.cleared_ext_flags
    }
}

struct Consumed {
    flags: IrqFlags,
    ext_flags: ExtIrqFlags,
}

impl<'a, D: TimoSpiDriver> Timo<'a, D> {
    /// Services pending interrupt flags.
    ///
    /// Returns immediately if neither the pending flag of the [crate::spi_driver::TimoDevice]
    /// is set nor the irq line is asserted.
    pub fn poll_irq<H: TimoIrqHandler<D>>(
        &mut self,
        handler: &mut H,
    ) -> Result<IrqReport, PollingError<D::DriverError, H::Error>> {
        if !self.device().irq_pending() && !self.irq_line_asserted()? {
            return Ok(IrqReport::default());
        }

        self.device().clear_irq_pending();

        let flags = self.read_irq_flags()?;
        let ext_flags = if flags.extended() {
            self.read_ext_irq_flags()?
        } else {
            ExtIrqFlags::new()
        };

        debug!(
            "irq flags {} extended flags {}",
            flags.to_register(),
            ext_flags.bits()
        );

        let mut consumed = Consumed {
            flags: IrqFlags::new(),
            ext_flags: ExtIrqFlags::new(),
        };
        let dispatched = self.dispatch(handler, flags, ext_flags, &mut consumed);

        if flags.extended() && ext_flags.bits() & !consumed.ext_flags.bits() == 0 {
            consumed.flags.set_extended(true);
        }

        let written_back = self.write_back(&consumed);
        dispatched.map_err(PollingError::Handler)?;
        written_back?;

        Ok(IrqReport {
            flags: flags.to_register(),
            ext_flags: ext_flags.bits(),
            cleared_flags: consumed.flags.to_register(),
            cleared_ext_flags: consumed.ext_flags.bits(),
        })
    }

    fn dispatch<H: TimoIrqHandler<D>>(
        &mut self,
        handler: &mut H,
        flags: IrqFlags,
        ext_flags: ExtIrqFlags,
        consumed: &mut Consumed,
    ) -> Result<(), H::Error> {
        if flags.rf_link() {
            match handler.on_rf_link(self)? {
                LinkOutcome::Healthy => consumed.flags.set_rf_link(true),
                LinkOutcome::Stale => {
                    warn!("rf link is stale, data flags stay pending");
                    consumed.flags.set_rf_link(true);
                    return Ok(());
                },
                LinkOutcome::Deferred => {},
            }
        }

        if flags.dmx_changed() && handler.on_dmx_changed(self)? == IrqOutcome::Consumed {
            consumed.flags.set_dmx_changed(true);
        }

        if ext_flags.spi_rdm() && handler.on_spi_rdm(self)? == IrqOutcome::Consumed {
            consumed.ext_flags.set_spi_rdm(true);
        }

        if ext_flags.spi_radio_disc() && handler.on_radio_discovery(self)? == IrqOutcome::Consumed
        {
            consumed.ext_flags.set_spi_radio_disc(true);
        }

        Ok(())
    }

    /// Extended flags are cleared first so EXTENDED is not raised again by them.
    fn write_back(&mut self, consumed: &Consumed) -> Result<(), TimoError<D::DriverError>> {
        if consumed.ext_flags.bits() != 0 {
            self.write_register(reg::EXT_IRQ_FLAGS, &consumed.ext_flags.to_register())?;
        }

        if consumed.flags.to_register() != 0 {
            self.write_register(reg::IRQ_FLAGS, &[consumed.flags.to_register()])?;
        }

        trace!(
            "cleared irq flags {} extended flags {}",
            consumed.flags.to_register(),
            consumed.ext_flags.bits()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTimo, NoResponder};
    use crate::spi_driver::TimoDevice;
    use crate::timo::TimoConfig;

    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    enum Event {
        RfLink,
        DmxChanged,
        SpiRdm,
        RadioDiscovery,
    }

    struct Recorder {
        events: heapless::Vec<Event, 8>,
        link: LinkOutcome,
        dmx: IrqOutcome,
        fail_on_dmx: bool,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                events: heapless::Vec::new(),
                link: LinkOutcome::Healthy,
                dmx: IrqOutcome::Consumed,
                fail_on_dmx: false,
            }
        }
    }

    impl TimoIrqHandler<MockTimo<NoResponder>> for Recorder {
        type Error = ();

        fn on_rf_link(
            &mut self,
            _timo: &mut Timo<'_, MockTimo<NoResponder>>,
        ) -> Result<LinkOutcome, ()> {
            self.events.push(Event::RfLink).unwrap();
            Ok(self.link)
        }

        fn on_dmx_changed(
            &mut self,
            _timo: &mut Timo<'_, MockTimo<NoResponder>>,
        ) -> Result<IrqOutcome, ()> {
            self.events.push(Event::DmxChanged).unwrap();
            if self.fail_on_dmx {
                return Err(());
            }

            Ok(self.dmx)
        }

        fn on_spi_rdm(
            &mut self,
            _timo: &mut Timo<'_, MockTimo<NoResponder>>,
        ) -> Result<IrqOutcome, ()> {
            self.events.push(Event::SpiRdm).unwrap();
            Ok(IrqOutcome::Consumed)
        }

        fn on_radio_discovery(
            &mut self,
            _timo: &mut Timo<'_, MockTimo<NoResponder>>,
        ) -> Result<IrqOutcome, ()> {
            self.events.push(Event::RadioDiscovery).unwrap();
            Ok(IrqOutcome::Consumed)
        }
    }

    fn timo(device: &TimoDevice) -> Timo<'_, MockTimo<NoResponder>> {
        Timo::new(MockTimo::new(NoResponder), device, TimoConfig::default())
    }

    #[test]
    fn test_idle_poll_touches_nothing() {
        let device = TimoDevice::new(0, 1);
        let mut timo = timo(&device);
        let mut recorder = Recorder::new();

        assert!(timo.poll_irq(&mut recorder).unwrap().is_idle());
        assert!(recorder.events.is_empty());
        assert_eq!(timo.get_driver().transfers, 0);
    }

    #[test]
    fn test_extended_is_read_once_and_rf_link_goes_first() {
        let device = TimoDevice::new(0, 1);
        let mut timo = timo(&device);
        timo.get_driver()
            .raise(IrqFlags::new().with_rf_link(true), ExtIrqFlags::new().with_spi_rdm(true));
        device.signal_irq();

        let mut recorder = Recorder::new();
        let report = timo.poll_irq(&mut recorder).unwrap();

        assert_eq!(recorder.events.as_slice(), &[Event::RfLink, Event::SpiRdm]);
        assert_eq!(timo.get_driver().register_reads(reg::IRQ_FLAGS), 1);
        assert_eq!(timo.get_driver().register_reads(reg::EXT_IRQ_FLAGS), 1);
        assert!(!device.irq_pending());

        assert_eq!(report.flags, (1 << 6) | (1 << 3));
        assert_eq!(report.cleared_flags, report.flags);
        assert_eq!(report.cleared_ext_flags, 1);
        assert_eq!(timo.get_driver().irq_flags(), 0);
        assert_eq!(timo.get_driver().ext_irq_flags(), 0);
    }

    #[test]
    fn test_no_extended_read_without_extended_flag() {
        let device = TimoDevice::new(0, 1);
        let mut timo = timo(&device);
        timo.get_driver()
            .raise(IrqFlags::new().with_dmx_changed(true), ExtIrqFlags::new());

        let mut recorder = Recorder::new();
        timo.poll_irq(&mut recorder).unwrap();

        assert_eq!(recorder.events.as_slice(), &[Event::DmxChanged]);
        assert_eq!(timo.get_driver().register_reads(reg::EXT_IRQ_FLAGS), 0);
    }

    #[test]
    fn test_stale_link_keeps_data_pending() {
        let device = TimoDevice::new(0, 1);
        let mut timo = timo(&device);
        timo.get_driver().raise(
            IrqFlags::new().with_rf_link(true).with_dmx_changed(true),
            ExtIrqFlags::new().with_spi_rdm(true),
        );

        let mut recorder = Recorder::new();
        recorder.link = LinkOutcome::Stale;
        let report = timo.poll_irq(&mut recorder).unwrap();

        assert_eq!(recorder.events.as_slice(), &[Event::RfLink]);
        assert_eq!(report.cleared_flags, 1 << 3);
        assert_eq!(report.pending_flags(), (1 << 6) | (1 << 2));
        assert_eq!(report.pending_ext_flags(), 1);

        recorder.link = LinkOutcome::Healthy;
        recorder.events.clear();
        timo.poll_irq(&mut recorder).unwrap();
        assert_eq!(recorder.events.as_slice(), &[Event::DmxChanged, Event::SpiRdm]);
        assert_eq!(timo.get_driver().irq_flags(), 0);
    }

    #[test]
    fn test_deferred_flag_is_retried() {
        let device = TimoDevice::new(0, 1);
        let mut timo = timo(&device);
        timo.get_driver()
            .raise(IrqFlags::new().with_dmx_changed(true), ExtIrqFlags::new());

        let mut recorder = Recorder::new();
        recorder.dmx = IrqOutcome::Deferred;
        let report = timo.poll_irq(&mut recorder).unwrap();

        assert_eq!(report.cleared_flags, 0);
        assert_eq!(timo.get_driver().register_writes(reg::IRQ_FLAGS), 0);

        recorder.dmx = IrqOutcome::Consumed;
        timo.poll_irq(&mut recorder).unwrap();
        assert_eq!(
            recorder.events.as_slice(),
            &[Event::DmxChanged, Event::DmxChanged]
        );
        assert_eq!(timo.get_driver().irq_flags(), 0);
    }

    #[test]
    fn test_flag_raised_after_read_survives_write_back() {
        let device = TimoDevice::new(0, 1);
        let mut timo = timo(&device);
        timo.get_driver()
            .raise(IrqFlags::new().with_rf_link(true), ExtIrqFlags::new());
        timo.get_driver().raise_after_flags_read = Some(IrqFlags::new().with_dmx_changed(true));

        let mut recorder = Recorder::new();
        timo.poll_irq(&mut recorder).unwrap();

        assert_eq!(recorder.events.as_slice(), &[Event::RfLink]);
        assert_eq!(timo.get_driver().irq_flags(), 1 << 2);
    }

    #[test]
    fn test_handler_error_still_clears_consumed_flags() {
        let device = TimoDevice::new(0, 1);
        let mut timo = timo(&device);
        timo.get_driver().raise(
            IrqFlags::new().with_rf_link(true).with_dmx_changed(true),
            ExtIrqFlags::new(),
        );

        let mut recorder = Recorder::new();
        recorder.fail_on_dmx = true;

        assert!(matches!(
            timo.poll_irq(&mut recorder),
            Err(PollingError::Handler(()))
        ));
        assert_eq!(timo.get_driver().irq_flags(), 1 << 2);
    }
}
