//! Per-descriptor cadence control (spec §4.2).
//!
//! A [`Schedule`] is either `every-cycle` (fires on every `collect()`) or
//! `periodic(interval)`, tracking when it last fired. Activation decisions
//! for an entire collection cycle are made against a single `now` snapshot
//! (taken once by the caller) so descriptors never half-activate mid-cycle.

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Schedule {
    EveryCycle,
    Periodic {
        interval: Duration,
        last_fired: Option<Instant>,
    },
}

impl Schedule {
    #[must_use]
    pub const fn every_cycle() -> Self {
        Self::EveryCycle
    }

    #[must_use]
    pub const fn periodic(interval: Duration) -> Self {
        Self::Periodic {
            interval,
            last_fired: None,
        }
    }

    /// Is this schedule due to fire, given a single cycle-start snapshot of `now`?
    #[must_use]
    pub fn active_now(&self, now: Instant) -> bool {
        match self {
            Self::EveryCycle => true,
            Self::Periodic {
                interval,
                last_fired,
            } => match last_fired {
                None => true,
                Some(last) => now.saturating_duration_since(*last) >= *interval,
            },
        }
    }

    /// Record that this schedule fired at `now`.
    pub fn mark_fired(&mut self, now: Instant) {
        if let Self::Periodic { last_fired, .. } = self {
            *last_fired = Some(now);
        }
    }
}
