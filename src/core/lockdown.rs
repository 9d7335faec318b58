//! Lockdown policy of a single population.
//!
//! The policy watches the fraction of infected hosts. It switches to the locked-down regime
//! once the fraction reaches the start threshold and returns to the normal regime once the
//! fraction falls to the end threshold. Between the two thresholds the regime is kept.

use std::fmt;

use crate::config::{LockdownConfig, PopulationConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Normal,
    LockedDown,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Normal => write!(f, "normal"),
            Regime::LockedDown => write!(f, "locked-down"),
        }
    }
}

/// Rate multipliers the engine applies to a population in a given regime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeMultipliers {
    pub contact_density: f64,
    pub sampling_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LockdownPolicy {
    normal: RegimeMultipliers,
    lockdown: Option<LockdownConfig>,
    regime: Regime,
    switches: usize,
}

impl LockdownPolicy {
    pub fn new(config: &PopulationConfig) -> Self {
        Self {
            normal: RegimeMultipliers {
                contact_density: config.contact_density,
                sampling_multiplier: config.sampling_multiplier,
            },
            lockdown: config.lockdown,
            regime: Regime::Normal,
            switches: 0,
        }
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    /// Number of regime changes so far.
    pub fn switches(&self) -> usize {
        self.switches
    }

    pub fn multipliers(&self) -> RegimeMultipliers {
        match (self.regime, &self.lockdown) {
            (Regime::LockedDown, Some(lockdown)) => RegimeMultipliers {
                contact_density: lockdown.contact_density,
                sampling_multiplier: lockdown.sampling_multiplier,
            },
            _ => self.normal,
        }
    }

    /// Re-evaluate the regime for the current number of infected hosts.
    ///
    /// Returns the new regime if the policy switched.
    pub fn update(&mut self, infected: u64, size: u64) -> Option<Regime> {
        let lockdown = self.lockdown.as_ref()?;
        let fraction = infected as f64 / size as f64;

        let next = match self.regime {
            Regime::Normal if fraction >= lockdown.start => Regime::LockedDown,
            Regime::LockedDown if fraction <= lockdown.end => Regime::Normal,
            current => current,
        };

        if next == self.regime {
            return None;
        }

        self.regime = next;
        self.switches += 1;
        Some(next)
    }
}
