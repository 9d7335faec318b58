//! Susceptibility classes of hosts and transitions between them.

use serde::{Deserialize, Serialize};

use super::matrix::SquareMatrix;
use crate::errors::{Result, VgsimError};

const GENERATOR_TOLERANCE: f64 = 1e-9;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct SusceptibilityClass {
    /// Relative probability of a host of this class to be infected on contact.
    pub multiplier: f64,

    /// Class a host of this class enters once its infection ends.
    pub recovery_class: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SusceptibilityModel {
    pub classes: Vec<SusceptibilityClass>,

    /// Rates at which infected lineages move between classes. The diagonal is either zero or
    /// the negative row sum (generator form) and is never used as a rate.
    pub transitions: SquareMatrix<f64>,
}

impl SusceptibilityModel {
    pub fn new(
        classes: Vec<SusceptibilityClass>,
        transitions: Option<SquareMatrix<f64>>,
    ) -> Result<Self> {
        let n_classes = classes.len();
        let model = Self {
            classes,
            transitions: transitions.unwrap_or_else(|| SquareMatrix::zeros(n_classes)),
        };
        model.validate()?;
        Ok(model)
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn multiplier(&self, class: usize) -> f64 {
        self.classes[class].multiplier
    }

    pub fn recovery_class(&self, class: usize) -> usize {
        self.classes[class].recovery_class
    }

    pub fn transition_rate(&self, from: usize, to: usize) -> f64 {
        if from == to {
            return 0.;
        }
        *self.transitions.get(from, to)
    }

    pub fn validate(&self) -> Result<()> {
        let n_classes = self.classes.len();
        if n_classes == 0 {
            return Err(VgsimError::ConfigurationError(
                "At least one susceptibility class is required".to_string(),
            ));
        }

        for (index, class) in self.classes.iter().enumerate() {
            if !class.multiplier.is_finite() || class.multiplier < 0. {
                return Err(VgsimError::ConfigurationError(format!(
                    "Susceptibility class {index} has invalid multiplier {}",
                    class.multiplier
                )));
            }
            if class.recovery_class >= n_classes {
                return Err(VgsimError::ConfigurationError(format!(
                    "Susceptibility class {index} recovers into unknown class {}",
                    class.recovery_class
                )));
            }
        }

        if self.transitions.size() != n_classes {
            return Err(VgsimError::ConfigurationError(format!(
                "Susceptibility transition matrix has size {}, expected {n_classes}",
                self.transitions.size()
            )));
        }
        self.transitions
            .validate_rates("Susceptibility transition matrix")?;

        for class in 0..n_classes {
            let row = self.transitions.get_row(class);
            let outflow: f64 = row
                .iter()
                .enumerate()
                .filter(|(to, _)| *to != class)
                .map(|(_, rate)| rate)
                .sum();
            let diagonal = row[class];
            if diagonal != 0. && (diagonal + outflow).abs() > GENERATOR_TOLERANCE {
                return Err(VgsimError::ConfigurationError(format!(
                    "Susceptibility transition row {class} has diagonal {diagonal}, expected 0 or {}",
                    -outflow
                )));
            }
        }

        Ok(())
    }
}

impl Default for SusceptibilityModel {
    fn default() -> Self {
        Self {
            classes: vec![SusceptibilityClass {
                multiplier: 1.,
                recovery_class: 0,
            }],
            transitions: SquareMatrix::zeros(1),
        }
    }
}
