//! Settings module.

use super::populations::PopulationModel;
use super::rates::RateModel;
use crate::errors::VgsimError;

use serde::{Deserialize, Serialize};
use std::fs;

/// Upper edges of the default sample-fraction bins.
pub const DEFAULT_FRACTION_BINS: [f64; 9] = [0.3, 0.6, 0.9, 1.2, 1.5, 1.8, 2.1, 2.4, 2.7];

/// Everything a run needs, in a form that can be stored next to its output and replayed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    pub rate_model: RateModel,
    #[serde(default)]
    pub population_model: PopulationModel,
    pub iterations: usize,
    pub sample_size: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub tracked_site: usize,
    #[serde(default = "default_fraction_bins")]
    pub fraction_bins: Vec<f64>,
}

fn default_fraction_bins() -> Vec<f64> {
    DEFAULT_FRACTION_BINS.to_vec()
}

#[derive(Debug)]
pub enum SettingsError {
    IoError(std::io::Error),
    YamlError(serde_yaml::Error),
    InvalidSettings(VgsimError),
}

impl std::error::Error for SettingsError {}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::IoError(error) => write!(formatter, "IO error: {}", error),
            SettingsError::YamlError(error) => write!(formatter, "YAML error: {}", error),
            SettingsError::InvalidSettings(error) => write!(formatter, "{}", error),
        }
    }
}

impl std::fmt::Display for Settings {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut output = vec![];
        self.write(&mut output).map_err(|_| std::fmt::Error)?;
        write!(
            formatter,
            "{}",
            String::from_utf8(output).map_err(|_| std::fmt::Error)?
        )
    }
}

impl Settings {
    /// Check the models and their consistency with each other.
    pub fn validate(&self) -> Result<(), VgsimError> {
        self.rate_model.validate()?;
        self.population_model.validate()?;

        let n_populations = self.population_model.n_populations();
        if self.rate_model.n_population_rates() > n_populations {
            return Err(VgsimError::ConfigurationError(format!(
                "Rates are given for {} populations, but only {n_populations} exist",
                self.rate_model.n_population_rates()
            )));
        }

        let n_sites = self.rate_model.mutation_model().n_sites();
        if self.tracked_site >= n_sites {
            return Err(VgsimError::ConfigurationError(format!(
                "Tracked site {} is outside of the {n_sites} simulated sites",
                self.tracked_site
            )));
        }

        if self.fraction_bins.iter().any(|edge| !edge.is_finite()) {
            return Err(VgsimError::ConfigurationError(
                "Sample fraction bins must be finite".to_string(),
            ));
        }

        Ok(())
    }

    pub fn write(&self, writer: &mut dyn std::io::Write) -> Result<(), SettingsError> {
        serde_yaml::to_writer(writer, self).map_err(SettingsError::YamlError)
    }

    pub fn read(reader: &mut dyn std::io::Read) -> Result<Settings, SettingsError> {
        let settings: Settings = serde_yaml::from_reader(reader).map_err(SettingsError::YamlError)?;
        settings.validate().map_err(SettingsError::InvalidSettings)?;
        Ok(settings)
    }

    pub fn write_to_file(&self, filename: &str) -> Result<(), SettingsError> {
        let file = fs::File::create(filename).map_err(SettingsError::IoError)?;
        let mut writer = std::io::BufWriter::new(file);
        self.write(&mut writer)
    }

    pub fn read_from_file(filename: &str) -> Result<Settings, SettingsError> {
        let file = fs::File::open(filename).map_err(SettingsError::IoError)?;
        let mut reader = std::io::BufReader::new(file);
        Self::read(&mut reader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::{
        LockdownConfig, MutationModel, PopulationConfig, Rates, SquareMatrix,
    };
    use serial_test::serial;

    fn settings() -> Settings {
        Settings {
            rate_model: RateModel::from_rates(Rates::new(2., 1., 0.1, 0.2))
                .unwrap()
                .with_mutation_model(MutationModel::uniform(4))
                .unwrap(),
            population_model: PopulationModel::new(
                vec![
                    PopulationConfig::new(10_000, 5).with_lockdown(LockdownConfig {
                        contact_density: 0.2,
                        sampling_multiplier: 2.,
                        start: 0.01,
                        end: 0.005,
                    }),
                    PopulationConfig::new(5_000, 0),
                ],
                SquareMatrix::from_vec(vec![vec![0., 0.05], vec![0.05, 0.]]).unwrap(),
            )
            .unwrap(),
            iterations: 1000,
            sample_size: 100,
            seed: Some(42),
            tracked_site: 3,
            fraction_bins: DEFAULT_FRACTION_BINS.to_vec(),
        }
    }

    #[test]
    fn read_write() {
        let settings = settings();
        let mut output = vec![];
        settings.write(&mut output).unwrap();
        let settings2 = Settings::read(&mut &output[..]).unwrap();
        assert_eq!(settings, settings2);
    }

    #[test]
    #[serial]
    fn read_write_file() {
        let tmp_dir = std::env::temp_dir().join("vgsim_test_settings.yaml");
        let path = tmp_dir.to_str().unwrap();
        let settings = settings();
        settings.write_to_file(path).unwrap();
        let read_settings = Settings::read_from_file(path).unwrap();
        assert_eq!(read_settings, settings);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn reject_tracked_site_out_of_range() {
        let mut settings = settings();
        settings.tracked_site = 4;
        assert!(settings.validate().is_err());

        let mut output = vec![];
        settings.write(&mut output).unwrap();
        assert!(matches!(
            Settings::read(&mut &output[..]),
            Err(SettingsError::InvalidSettings(_))
        ));
    }
}
