//! Per-lineage event rates and the mutation model.

use serde::{Deserialize, Serialize};

use super::susceptibility::SusceptibilityModel;
use crate::encoding::Nucleotide;
use crate::errors::{Result, VgsimError};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Rates {
    /// Rate at which an infected lineage transmits to a fully susceptible population.
    pub birth: f64,

    /// Rate at which an infected lineage recovers without being observed.
    pub death: f64,

    /// Rate at which an infected lineage is sampled, ending its infection.
    pub sampling: f64,

    /// Rate of mutations per lineage and unit of time, summed over all sites.
    pub mutation: f64,
}

impl Rates {
    pub fn new(birth: f64, death: f64, sampling: f64, mutation: f64) -> Self {
        Self {
            birth,
            death,
            sampling,
            mutation,
        }
    }

    fn validate(&self, context: &str) -> Result<()> {
        for (name, value) in [
            ("birth", self.birth),
            ("death", self.death),
            ("sampling", self.sampling),
            ("mutation", self.mutation),
        ] {
            if !value.is_finite() || value < 0. {
                return Err(VgsimError::ConfigurationError(format!(
                    "{context}: {name} rate must be finite and non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MutationModel {
    /// Relative probability of each site to carry a mutation.
    pub site_weights: Vec<f64>,

    /// The substitution matrix holds the relative weights of nucleotide substitutions,
    /// indexed by `Nucleotide::index`.
    pub substitution_matrix: [[f64; 4]; 4],
}

impl MutationModel {
    pub fn uniform(n_sites: usize) -> Self {
        Self {
            site_weights: vec![1.; n_sites],
            substitution_matrix: [
                [0., 1., 1., 1.],
                [1., 0., 1., 1.],
                [1., 1., 0., 1.],
                [1., 1., 1., 0.],
            ],
        }
    }

    pub fn n_sites(&self) -> usize {
        self.site_weights.len()
    }

    fn validate(&self) -> Result<()> {
        if self.site_weights.is_empty() {
            return Err(VgsimError::ConfigurationError(
                "Mutation model needs at least one site".to_string(),
            ));
        }
        if self
            .site_weights
            .iter()
            .any(|w| !w.is_finite() || *w < 0.)
            || self.site_weights.iter().sum::<f64>() <= 0.
        {
            return Err(VgsimError::ConfigurationError(
                "Site weights must be non-negative with a positive sum".to_string(),
            ));
        }
        for (from, row) in self.substitution_matrix.iter().enumerate() {
            let off_diagonal: f64 = row
                .iter()
                .enumerate()
                .filter(|(to, _)| *to != from)
                .map(|(_, w)| *w)
                .sum();
            if row.iter().any(|w| !w.is_finite() || *w < 0.) || off_diagonal <= 0. {
                return Err(VgsimError::ConfigurationError(format!(
                    "Substitution weights from {} must be non-negative with a positive sum",
                    Nucleotide::from_index(from).unwrap_or(Nucleotide::REFERENCE)
                )));
            }
        }
        Ok(())
    }
}

impl Default for MutationModel {
    fn default() -> Self {
        Self::uniform(1)
    }
}

/// Immutable bundle of all rate parameters of a simulation.
///
/// Use `RateModel::new` to construct a validated instance. Population-specific
/// rates replace the default rates of the population with the same index.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RateModel {
    rates: Rates,
    #[serde(default)]
    population_rates: Vec<Option<Rates>>,
    #[serde(default)]
    mutation_model: MutationModel,
    #[serde(default)]
    susceptibility: SusceptibilityModel,
}

impl RateModel {
    pub fn new(
        rates: Rates,
        population_rates: Vec<Option<Rates>>,
        mutation_model: MutationModel,
        susceptibility: SusceptibilityModel,
    ) -> Result<Self> {
        let model = Self {
            rates,
            population_rates,
            mutation_model,
            susceptibility,
        };
        model.validate()?;
        Ok(model)
    }

    /// Rate model with a single set of rates, one site and a single susceptibility class.
    pub fn from_rates(rates: Rates) -> Result<Self> {
        Self::new(
            rates,
            Vec::new(),
            MutationModel::default(),
            SusceptibilityModel::default(),
        )
    }

    pub fn validate(&self) -> Result<()> {
        self.rates.validate("default rates")?;
        for (population, rates) in self.population_rates.iter().enumerate() {
            if let Some(rates) = rates {
                rates.validate(&format!("rates of population {population}"))?;
            }
        }
        self.mutation_model.validate()?;
        self.susceptibility.validate()
    }

    pub fn rates(&self, population: usize) -> &Rates {
        self.population_rates
            .get(population)
            .and_then(|rates| rates.as_ref())
            .unwrap_or(&self.rates)
    }

    pub fn default_rates(&self) -> &Rates {
        &self.rates
    }

    /// Number of populations with explicitly configured rates.
    pub fn n_population_rates(&self) -> usize {
        self.population_rates.len()
    }

    pub fn mutation_model(&self) -> &MutationModel {
        &self.mutation_model
    }

    pub fn susceptibility(&self) -> &SusceptibilityModel {
        &self.susceptibility
    }

    pub fn with_mutation_model(mut self, mutation_model: MutationModel) -> Result<Self> {
        self.mutation_model = mutation_model;
        self.validate()?;
        Ok(self)
    }

    pub fn with_susceptibility(mut self, susceptibility: SusceptibilityModel) -> Result<Self> {
        self.susceptibility = susceptibility;
        self.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn population_rates_override_default() {
        let model = RateModel::new(
            Rates::new(2., 1., 0.1, 0.01),
            vec![None, Some(Rates::new(3., 1., 0.2, 0.))],
            MutationModel::default(),
            SusceptibilityModel::default(),
        )
        .unwrap();
        assert_eq!(model.rates(0).birth, 2.);
        assert_eq!(model.rates(1).birth, 3.);
        assert_eq!(model.rates(5).birth, 2.);
    }

    #[test]
    fn reject_negative_rates() {
        assert!(RateModel::from_rates(Rates::new(-1., 1., 0.1, 0.)).is_err());
        assert!(RateModel::from_rates(Rates::new(1., f64::NAN, 0.1, 0.)).is_err());
        let population_error = RateModel::new(
            Rates::new(2., 1., 0.1, 0.),
            vec![Some(Rates::new(2., 1., -0.1, 0.))],
            MutationModel::default(),
            SusceptibilityModel::default(),
        );
        assert!(matches!(
            population_error,
            Err(VgsimError::ConfigurationError(_))
        ));
    }

    #[test]
    fn reject_broken_mutation_model() {
        let rates = Rates::new(2., 1., 0.1, 0.1);
        let empty = MutationModel {
            site_weights: vec![],
            ..MutationModel::default()
        };
        assert!(RateModel::from_rates(rates).unwrap().with_mutation_model(empty).is_err());

        let mut stuck = MutationModel::uniform(3);
        stuck.substitution_matrix[2] = [0., 0., 1., 0.];
        assert!(RateModel::from_rates(rates).unwrap().with_mutation_model(stuck).is_err());
    }

    #[test]
    fn read_write_yaml() {
        let model = RateModel::from_rates(Rates::new(2., 1., 0.1, 0.5))
            .unwrap()
            .with_mutation_model(MutationModel::uniform(10))
            .unwrap();
        let yaml = serde_yaml::to_string(&model).unwrap();
        let read: RateModel = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(read, model);
    }
}
