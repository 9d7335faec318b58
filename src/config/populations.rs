use serde::{Deserialize, Serialize};

use super::matrix::SquareMatrix;
use crate::errors::{Result, VgsimError};

/// Population size used when no population model is given.
pub const DEFAULT_POPULATION_SIZE: u64 = 1_000_000;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LockdownConfig {
    /// Contact density while the lockdown is in place.
    pub contact_density: f64,

    /// Sampling multiplier while the lockdown is in place.
    pub sampling_multiplier: f64,

    /// Infected fraction at which the lockdown starts.
    pub start: f64,

    /// Infected fraction at or below which the lockdown ends.
    pub end: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PopulationConfig {
    /// Number of hosts in the population.
    pub size: u64,

    /// Number of hosts infected at time zero.
    pub infected: u64,

    /// Scales the transmission rate of infected lineages in this population.
    #[serde(default = "default_multiplier")]
    pub contact_density: f64,

    /// Scales the sampling rate of infected lineages in this population.
    #[serde(default = "default_multiplier")]
    pub sampling_multiplier: f64,

    #[serde(default)]
    pub lockdown: Option<LockdownConfig>,
}

fn default_multiplier() -> f64 {
    1.
}

impl PopulationConfig {
    pub fn new(size: u64, infected: u64) -> Self {
        Self {
            size,
            infected,
            contact_density: 1.,
            sampling_multiplier: 1.,
            lockdown: None,
        }
    }

    pub fn with_lockdown(mut self, lockdown: LockdownConfig) -> Self {
        self.lockdown = Some(lockdown);
        self
    }

    fn validate(&self, index: usize) -> Result<()> {
        if self.size == 0 {
            return Err(VgsimError::ConfigurationError(format!(
                "Population {index} has no hosts"
            )));
        }
        if self.infected > self.size {
            return Err(VgsimError::ConfigurationError(format!(
                "Population {index} has {} infected hosts but only {} hosts",
                self.infected, self.size
            )));
        }
        for (name, value) in [
            ("contact density", self.contact_density),
            ("sampling multiplier", self.sampling_multiplier),
        ] {
            if !value.is_finite() || value < 0. {
                return Err(VgsimError::ConfigurationError(format!(
                    "Population {index} has invalid {name} {value}"
                )));
            }
        }
        if let Some(lockdown) = &self.lockdown {
            for (name, value) in [
                ("lockdown contact density", lockdown.contact_density),
                ("lockdown sampling multiplier", lockdown.sampling_multiplier),
                ("lockdown start", lockdown.start),
                ("lockdown end", lockdown.end),
            ] {
                if !value.is_finite() || value < 0. {
                    return Err(VgsimError::ConfigurationError(format!(
                        "Population {index} has invalid {name} {value}"
                    )));
                }
            }
            if lockdown.end > lockdown.start {
                return Err(VgsimError::ConfigurationError(format!(
                    "Population {index} ends its lockdown at {} above its start at {}",
                    lockdown.end, lockdown.start
                )));
            }
        }
        Ok(())
    }
}

/// Host populations and the migration rates between them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PopulationModel {
    pub populations: Vec<PopulationConfig>,

    /// Rate at which an infected lineage of population `row` infects hosts of population `col`.
    pub migration: SquareMatrix<f64>,
}

impl PopulationModel {
    pub fn new(populations: Vec<PopulationConfig>, migration: SquareMatrix<f64>) -> Result<Self> {
        let model = Self {
            populations,
            migration,
        };
        model.validate()?;
        Ok(model)
    }

    /// A single population of default size with `infected` founders.
    pub fn single(infected: u64) -> Self {
        Self {
            populations: vec![PopulationConfig::new(DEFAULT_POPULATION_SIZE, infected)],
            migration: SquareMatrix::zeros(1),
        }
    }

    pub fn n_populations(&self) -> usize {
        self.populations.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.populations.is_empty() {
            return Err(VgsimError::ConfigurationError(
                "At least one population is required".to_string(),
            ));
        }
        for (index, population) in self.populations.iter().enumerate() {
            population.validate(index)?;
        }
        if self.migration.size() != self.populations.len() {
            return Err(VgsimError::ConfigurationError(format!(
                "Migration matrix has size {}, expected {}",
                self.migration.size(),
                self.populations.len()
            )));
        }
        self.migration.validate_rates("Migration matrix")
    }
}

impl Default for PopulationModel {
    fn default() -> Self {
        Self::single(1)
    }
}
