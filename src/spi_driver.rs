use core::sync::atomic::{AtomicBool, Ordering};

/// Object to implement access to the spi bus the transceiver is attached to.
///
/// The bus runs in mode 0. Every call to [TimoSpiDriver::transfer] is framed by exactly one
/// assertion of the chip select line.
pub trait TimoSpiDriver {
    type DriverError;

    /// Full duplex transfer. `tx` and `rx` always have the same length.
    fn transfer(
        &mut self,
        csn_pin: u8,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<(), Self::DriverError>;

    /// Returns true while the active low irq line is asserted.
    fn irq_asserted(&mut self, irq_pin: u8) -> Result<bool, Self::DriverError>;

    /// Busy wait or sleep.
    fn delay_us(&mut self, us: u32);
}

/// Handle of one attached transceiver.
///
/// It owns no buffers, it only names the lines and carries the irq pending flag. Share it
/// with the pin interrupt handler and call [TimoDevice::signal_irq] from there.
#[derive(Debug)]
pub struct TimoDevice {
    csn_pin: u8,
    irq_pin: u8,
    irq_pending: AtomicBool,
}

impl TimoDevice {
    pub const fn new(csn_pin: u8, irq_pin: u8) -> Self {
        Self {
            csn_pin,
            irq_pin,
            irq_pending: AtomicBool::new(false),
        }
    }

    pub fn csn_pin(&self) -> u8 {
        self.csn_pin
    }

    pub fn irq_pin(&self) -> u8 {
        self.irq_pin
    }

    /// Marks the device as having pending irq work. Safe to call from interrupt context.
    pub fn signal_irq(&self) {
        self.irq_pending.store(true, Ordering::Release);
    }

    pub fn irq_pending(&self) -> bool {
        self.irq_pending.load(Ordering::Acquire)
    }

    /// Only the irq dispatcher clears the flag, right before it reads the flag registers.
    pub(crate) fn clear_irq_pending(&self) {
        self.irq_pending.store(false, Ordering::Release);
    }
}
