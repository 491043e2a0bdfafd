//! Binary search over the 48 bit uid space (ANSI E1.20 Section 7).
//!
//! [run_discovery] borrows the [RdmController] mutably for the whole pass, so no other
//! dmx or rdm traffic can interleave with the branch requests.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::rdm_controller::{RdmController, RdmResponseError};
use crate::rdm_driver::{DiscoveryOption, RdmControllerDriver};
use crate::unique_identifier::{PackageAddress, UidRange, UniqueIdentifier};

/// Ranges still to be searched. A pass never holds more than one pending sibling per
/// halving, 48 halvings deep.
const DISCOVERY_STACK_SIZE: usize = 64;
/// Capacity of the lists of misbehaving responders in a [DiscoveryReport].
pub const MAX_DISCOVERY_FAULTS: usize = 8;

/// What happens to the mutes after a completed pass.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UnmutePolicy {
    /// Broadcast DISC_UN_MUTE so every responder takes part in the next discovery.
    UnmuteAll,
    /// Leave the found responders muted, e.g. to address them one by one right away.
    KeepMuted,
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// How often a single uid range that still collides is retried before it is abandoned.
    pub leaf_retries: u8,
    /// How often DISC_MUTE is sent to a found uid before it is reported as unmutable.
    pub mute_attempts: u8,
    pub after_pass: UnmutePolicy,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            leaf_retries: 3,
            mute_attempts: 3,
            after_pass: UnmutePolicy::UnmuteAll,
        }
    }
}

#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiscoveryStats {
    /// DISC_UNIQUE_BRANCH requests sent.
    pub branches_sent: u32,
    /// Branches nobody answered.
    pub empty_branches: u32,
    /// Branches answered with something that isn't a single discovery response.
    pub collisions: u32,
    pub range_splits: u32,
}

#[derive(Debug, Clone)]
pub struct DiscoveryReport<const N: usize> {
    /// Found and muted responders.
    pub found: heapless::Vec<UniqueIdentifier, N>,
    /// Single uids that kept colliding. Something there is not conformant.
    pub faulty_leaves: heapless::Vec<u64, MAX_DISCOVERY_FAULTS>,
    /// Responders that answered the branch but never acknowledged DISC_MUTE.
    pub unmutable: heapless::Vec<UniqueIdentifier, MAX_DISCOVERY_FAULTS>,
    /// Set if one of the lists above ran out of space. If `found` is full the pass stops
    /// early and keeps its mutes, so running another pass continues where this one stopped.
    pub truncated: bool,
    pub stats: DiscoveryStats,
}

impl<const N: usize> DiscoveryReport<N> {
    fn new() -> Self {
        Self {
            found: heapless::Vec::new(),
            faulty_leaves: heapless::Vec::new(),
            unmutable: heapless::Vec::new(),
            truncated: false,
            stats: DiscoveryStats::default(),
        }
    }
}

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiscoveryError<E> {
    /// The pass was cancelled. A DISC_UN_MUTE broadcast has been attempted.
    Cancelled,
    /// The range stack overflowed.
    SearchDepthExceeded,
    /// The bus failed. A DISC_UN_MUTE broadcast has been attempted.
    Transport(RdmResponseError<E>),
}

impl<E: core::fmt::Display> core::fmt::Display for DiscoveryError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DiscoveryError::Cancelled => write!(f, "discovery was cancelled"),
            DiscoveryError::SearchDepthExceeded => write!(f, "discovery search depth exceeded"),
            DiscoveryError::Transport(error) => write!(f, "discovery failed: {}", error),
        }
    }
}

#[cfg(feature = "std")]
impl<E: core::fmt::Debug + core::fmt::Display> std::error::Error for DiscoveryError<E> {}

impl<E> From<RdmResponseError<E>> for DiscoveryError<E> {
    fn from(value: RdmResponseError<E>) -> Self {
        Self::Transport(value)
    }
}

#[derive(Debug, Copy, Clone)]
struct PendingRange {
    range: UidRange,
    attempts: u8,
}

type RangeStack = heapless::Vec<PendingRange, DISCOVERY_STACK_SIZE>;

/// Runs one full discovery pass.
///
/// Found responders are muted as they are found. Responders muted by an earlier pass
/// stay silent, so broadcast a DISC_UN_MUTE through [RdmController::rdm_disc_un_mute]
/// first for a fresh enumeration.
///
/// `cancel` is checked before every branch. A branch that is already waiting for its
/// discovery response, or the DISC_MUTE retries for a found uid, run to completion before
/// the flag takes effect. If it is set, or the bus fails, the pass releases every mute with
/// a broadcast and returns an error.
pub fn run_discovery<D: RdmControllerDriver, const N: usize>(
    controller: &mut RdmController<D>,
    config: &DiscoveryConfig,
    cancel: &AtomicBool,
) -> Result<DiscoveryReport<N>, DiscoveryError<D::DriverError>> {
    let mut report = DiscoveryReport::new();

    match search(controller, config, cancel, &mut report) {
        Ok(false) => Ok(report),
        Ok(true) => {
            if config.after_pass == UnmutePolicy::UnmuteAll {
                controller.rdm_disc_un_mute(PackageAddress::Broadcast)?;
            }

            Ok(report)
        },
        Err(error) => {
            // best effort, the pass already failed
            let _ = controller.rdm_disc_un_mute(PackageAddress::Broadcast);

            Err(error)
        },
    }
}

/// Returns false if the pass stopped because `found` is full.
fn search<D: RdmControllerDriver, const N: usize>(
    controller: &mut RdmController<D>,
    config: &DiscoveryConfig,
    cancel: &AtomicBool,
    report: &mut DiscoveryReport<N>,
) -> Result<bool, DiscoveryError<D::DriverError>> {
    let mut stack = RangeStack::new();
    push(&mut stack, UidRange::FULL, 0)?;

    while let Some(PendingRange { range, attempts }) = stack.pop() {
        if cancel.load(Ordering::Acquire) {
            debug!("discovery cancelled with {} ranges pending", stack.len() + 1);

            return Err(DiscoveryError::Cancelled);
        }

        report.stats.branches_sent += 1;
        let uid = match controller.rdm_discover(range)? {
            DiscoveryOption::NoDevice => {
                trace!("branch {} to {} is empty", range.lower(), range.upper());
                report.stats.empty_branches += 1;

                continue;
            },
            DiscoveryOption::Collision => None,
            DiscoveryOption::Found(uid) => Some(uid),
        };

        if let Some(uid) = uid {
            if report.unmutable.contains(&uid) {
                // a clean answer means nobody else answers in this range
                continue;
            }

            if range.contains(uid.as_u64()) && !report.found.contains(&uid) {
                debug!("branch {} to {} found {}", range.lower(), range.upper(), uid);

                if report.found.is_full() {
                    report.truncated = true;

                    return Ok(false);
                }

                if mute(controller, uid, config.mute_attempts)? {
                    let _ = report.found.push(uid);
                    push(&mut stack, range, 0)?;
                } else {
                    warn!("{} never acknowledged DISC_MUTE", uid);
                    report.truncated |= report.unmutable.push(uid).is_err();
                }

                continue;
            }

            // answered outside of the range or already muted, not to be trusted
        }

        report.stats.collisions += 1;
        trace!("branch {} to {} collided", range.lower(), range.upper());

        match range.split() {
            Some((lower_half, upper_half)) => {
                report.stats.range_splits += 1;
                push(&mut stack, lower_half, 0)?;
                push(&mut stack, upper_half, 0)?;
            },
            None if attempts + 1 < config.leaf_retries => push(&mut stack, range, attempts + 1)?,
            None => {
                warn!("abandoned uid {} after {} collisions", range.lower(), attempts + 1);
                report.truncated |= report.faulty_leaves.push(range.lower()).is_err();
            },
        }
    }

    Ok(true)
}

fn push<E>(
    stack: &mut RangeStack,
    range: UidRange,
    attempts: u8,
) -> Result<(), DiscoveryError<E>> {
    stack
        .push(PendingRange { range, attempts })
        .map_err(|_| DiscoveryError::SearchDepthExceeded)
}

/// Returns false if the responder never acknowledged. Only bus failures are errors.
fn mute<D: RdmControllerDriver>(
    controller: &mut RdmController<D>,
    uid: UniqueIdentifier,
    attempts: u8,
) -> Result<bool, DiscoveryError<D::DriverError>> {
    for _ in 0..attempts.max(1) {
        match controller.rdm_disc_mute(PackageAddress::Device(uid)) {
            Ok(_) => return Ok(true),
            Err(RdmResponseError::DmxError(error)) if !error.is_transient() => {
                return Err(DiscoveryError::Transport(RdmResponseError::DmxError(error)));
            },
            Err(_) => trace!("DISC_MUTE to {} got no valid acknowledge", uid),
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockTimo, ResponderKind, SimulatedBus};
    use crate::rdm_controller::RdmControllerConfig;
    use crate::spi_driver::TimoDevice;
    use crate::timo::{Timo, TimoConfig};

    const FIRST: u64 = 0x0001_0000_0001;
    const SECOND: u64 = 0x0001_0000_0002;

    type SimController = RdmController<Timo<'static, MockTimo<SimulatedBus>>>;

    fn controller(device: &'static TimoDevice, bus: SimulatedBus) -> SimController {
        RdmController::new(
            Timo::new(MockTimo::new(bus), device, TimoConfig::default()),
            &RdmControllerConfig::default(),
        )
    }

    fn bus(controller: &mut SimController) -> &mut SimulatedBus {
        &mut controller.get_driver().get_driver().bus
    }

    fn uid(uid: u64) -> UniqueIdentifier {
        UniqueIdentifier::try_from(uid).unwrap()
    }

    #[test]
    fn test_colliding_pair_converges() {
        static DEVICE: TimoDevice = TimoDevice::new(0, 1);
        let mut controller = controller(&DEVICE, SimulatedBus::conformant(&[FIRST, SECOND]));

        let report: DiscoveryReport<8> = run_discovery(
            &mut controller,
            &DiscoveryConfig::default(),
            &AtomicBool::new(false),
        )
        .unwrap();

        let mut found = report.found.clone();
        found.sort_unstable_by_key(|uid| uid.as_u64());
        assert_eq!(found.as_slice(), &[uid(FIRST), uid(SECOND)]);
        assert!(report.stats.range_splits >= 1);
        assert!(report.stats.collisions >= 1);
        assert!(report.faulty_leaves.is_empty() && report.unmutable.is_empty());
        assert!(!report.truncated);

        // released by the final broadcast
        let bus = bus(&mut controller);
        assert_eq!(bus.broadcast_un_mutes, 1);
        assert!(!bus.muted(FIRST) && !bus.muted(SECOND));
        assert_eq!(bus.branches as u32, report.stats.branches_sent);
    }

    #[test]
    fn test_empty_bus_sends_one_branch() {
        static DEVICE: TimoDevice = TimoDevice::new(0, 1);
        let mut controller = controller(&DEVICE, SimulatedBus::conformant(&[]));

        let report: DiscoveryReport<8> = run_discovery(
            &mut controller,
            &DiscoveryConfig::default(),
            &AtomicBool::new(false),
        )
        .unwrap();

        assert!(report.found.is_empty());
        assert_eq!(report.stats.branches_sent, 1);
        assert_eq!(report.stats.empty_branches, 1);
        assert_eq!(bus(&mut controller).branches, 1);
    }

    #[test]
    fn test_keep_muted() {
        static DEVICE: TimoDevice = TimoDevice::new(0, 1);
        let mut controller = controller(&DEVICE, SimulatedBus::conformant(&[FIRST, SECOND]));

        let config = DiscoveryConfig {
            after_pass: UnmutePolicy::KeepMuted,
            ..DiscoveryConfig::default()
        };
        let report: DiscoveryReport<8> =
            run_discovery(&mut controller, &config, &AtomicBool::new(false)).unwrap();

        assert_eq!(report.found.len(), 2);
        let bus = bus(&mut controller);
        assert_eq!(bus.broadcast_un_mutes, 0);
        assert!(bus.muted(FIRST) && bus.muted(SECOND));
    }

    #[test]
    fn test_misbehaving_responders_are_reported() {
        static DEVICE: TimoDevice = TimoDevice::new(0, 1);
        const CONFORMANT: u64 = 0x0002_0000_0010;
        const DEAF: u64 = 0x0003_0000_0020;
        const JAMMER: u64 = 0x0004_0000_0030;

        let mut controller = controller(
            &DEVICE,
            SimulatedBus::new(&[
                (CONFORMANT, ResponderKind::Conformant),
                (DEAF, ResponderKind::Deaf),
                (JAMMER, ResponderKind::Jammer),
            ]),
        );

        let report: DiscoveryReport<8> = run_discovery(
            &mut controller,
            &DiscoveryConfig::default(),
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(report.found.as_slice(), &[uid(CONFORMANT)]);
        assert_eq!(report.unmutable.as_slice(), &[uid(DEAF)]);
        assert_eq!(report.faulty_leaves.as_slice(), &[JAMMER]);
        assert!(!report.truncated);
    }

    #[test]
    fn test_cancel_releases_mutes() {
        static DEVICE: TimoDevice = TimoDevice::new(0, 1);
        let mut controller = controller(&DEVICE, SimulatedBus::conformant(&[FIRST]));

        let result: Result<DiscoveryReport<8>, _> = run_discovery(
            &mut controller,
            &DiscoveryConfig::default(),
            &AtomicBool::new(true),
        );

        assert!(matches!(result, Err(DiscoveryError::Cancelled)));
        let bus = bus(&mut controller);
        assert_eq!(bus.branches, 0);
        assert_eq!(bus.broadcast_un_mutes, 1);
    }

    #[test]
    fn test_cancel_during_pass_releases_mutes() {
        static DEVICE: TimoDevice = TimoDevice::new(0, 1);
        static CANCEL: AtomicBool = AtomicBool::new(false);
        let mut responders = SimulatedBus::conformant(&[FIRST, SECOND]);
        responders.cancel_on_mute = Some(&CANCEL);
        let mut controller = controller(&DEVICE, responders);

        let result: Result<DiscoveryReport<8>, _> =
            run_discovery(&mut controller, &DiscoveryConfig::default(), &CANCEL);

        assert!(matches!(result, Err(DiscoveryError::Cancelled)));
        let bus = bus(&mut controller);
        assert!(bus.branches > 1);
        assert_eq!(bus.broadcast_un_mutes, 1);
        assert!(!bus.muted(FIRST) && !bus.muted(SECOND));
    }

    #[test]
    fn test_responder_ignoring_its_mute_is_abandoned() {
        static DEVICE: TimoDevice = TimoDevice::new(0, 1);
        let mut controller = controller(
            &DEVICE,
            SimulatedBus::new(&[(FIRST, ResponderKind::Sticky)]),
        );

        let report: DiscoveryReport<8> = run_discovery(
            &mut controller,
            &DiscoveryConfig::default(),
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(report.found.as_slice(), &[uid(FIRST)]);
        assert_eq!(report.faulty_leaves.as_slice(), &[FIRST]);
        assert!(report.unmutable.is_empty());
        assert!(!report.truncated);
        assert_eq!(report.stats.collisions, report.stats.range_splits + 3);
    }

    #[test]
    fn test_full_report_resumes_in_next_pass() {
        static DEVICE: TimoDevice = TimoDevice::new(0, 1);
        let mut controller = controller(&DEVICE, SimulatedBus::conformant(&[FIRST, SECOND]));

        let first: DiscoveryReport<1> = run_discovery(
            &mut controller,
            &DiscoveryConfig::default(),
            &AtomicBool::new(false),
        )
        .unwrap();
        assert!(first.truncated);
        assert_eq!(first.found.len(), 1);
        assert_eq!(bus(&mut controller).broadcast_un_mutes, 0);

        let second: DiscoveryReport<1> = run_discovery(
            &mut controller,
            &DiscoveryConfig::default(),
            &AtomicBool::new(false),
        )
        .unwrap();
        assert!(!second.truncated);
        assert_eq!(second.found.len(), 1);
        assert_ne!(first.found[0], second.found[0]);
    }
}
