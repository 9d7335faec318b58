//! Readers for the CSV tables that describe a simulation setup.

use std::fs::File;
use std::io::{BufReader, Read};

use serde::Deserialize;

use crate::config::{
    LockdownConfig, PopulationConfig, Rates, SquareMatrix, SusceptibilityClass,
};
use crate::errors::{Result, VgsimError};

pub trait TableIO: Sized {
    /// Parse a table from any reader, naming `source` in error messages.
    fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self>;

    fn read(path: &str) -> Result<Self> {
        let file = File::open(path)
            .map_err(|err| VgsimError::ReadError(format!("Failed to open {path}: {err}")))?;
        Self::from_reader(BufReader::new(file), path)
    }
}

fn parse_error(source: &str, err: csv::Error) -> VgsimError {
    VgsimError::ReadError(format!("Failed to parse record in {source}: {err}"))
}

/// Default rates and the rates of individual populations.
#[derive(Debug, Clone, PartialEq)]
pub struct RateTable {
    pub rates: Rates,
    pub population_rates: Vec<Option<Rates>>,
}

#[derive(Debug, Deserialize)]
struct RateRecord {
    population: Option<usize>,
    birth: f64,
    death: f64,
    sampling: f64,
    mutation: f64,
}

impl TableIO for RateTable {
    /// The row without a population holds the default rates. Without such a row
    /// population 0 provides them.
    fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut default = None;
        let mut population_rates: Vec<Option<Rates>> = Vec::new();

        for record in reader.deserialize() {
            let record: RateRecord = record.map_err(|err| parse_error(source, err))?;
            let rates = Rates::new(record.birth, record.death, record.sampling, record.mutation);
            let slot = match record.population {
                None => &mut default,
                Some(population) => {
                    if population >= population_rates.len() {
                        population_rates.resize(population + 1, None);
                    }
                    &mut population_rates[population]
                }
            };
            if slot.replace(rates).is_some() {
                return Err(VgsimError::ConfigurationError(format!(
                    "Duplicate rates for population {:?} in {source}",
                    record.population
                )));
            }
        }

        let rates = default
            .or_else(|| population_rates.first().copied().flatten())
            .ok_or_else(|| VgsimError::ReadError(format!("No default rates in {source}")))?;
        Ok(Self {
            rates,
            population_rates,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PopulationRecord {
    size: u64,
    infected: u64,
    contact_density: Option<f64>,
    sampling_multiplier: Option<f64>,
    lockdown_contact_density: Option<f64>,
    lockdown_sampling_multiplier: Option<f64>,
    lockdown_start: Option<f64>,
    lockdown_end: Option<f64>,
}

impl TableIO for Vec<PopulationConfig> {
    fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut populations = Vec::new();

        for (index, record) in reader.deserialize().enumerate() {
            let record: PopulationRecord = record.map_err(|err| parse_error(source, err))?;
            let mut population = PopulationConfig::new(record.size, record.infected);
            population.contact_density = record.contact_density.unwrap_or(1.);
            population.sampling_multiplier = record.sampling_multiplier.unwrap_or(1.);

            match (
                record.lockdown_contact_density,
                record.lockdown_sampling_multiplier,
                record.lockdown_start,
                record.lockdown_end,
            ) {
                (None, None, None, None) => {}
                (Some(contact_density), Some(sampling_multiplier), Some(start), Some(end)) => {
                    population = population.with_lockdown(LockdownConfig {
                        contact_density,
                        sampling_multiplier,
                        start,
                        end,
                    });
                }
                _ => {
                    return Err(VgsimError::ReadError(format!(
                        "Incomplete lockdown of population {index} in {source}"
                    )));
                }
            }
            populations.push(population);
        }
        Ok(populations)
    }
}

impl TableIO for Vec<SusceptibilityClass> {
    fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        reader
            .deserialize()
            .map(|record| record.map_err(|err| parse_error(source, err)))
            .collect()
    }
}

impl TableIO for SquareMatrix<f64> {
    /// Headerless table with one matrix row per line.
    fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let rows = reader
            .deserialize()
            .map(|record| record.map_err(|err| parse_error(source, err)))
            .collect::<Result<Vec<Vec<f64>>>>()?;
        SquareMatrix::from_vec(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_table() {
        let content = "population,birth,death,sampling,mutation\n\
                       ,2,1,0.1,0.5\n\
                       1,3,1,0.2,0.5\n";
        let table = RateTable::from_reader(&mut content.as_bytes(), "rates").unwrap();
        assert_eq!(table.rates, Rates::new(2., 1., 0.1, 0.5));
        assert_eq!(
            table.population_rates,
            vec![None, Some(Rates::new(3., 1., 0.2, 0.5))]
        );
    }

    #[test]
    fn rate_table_without_default_row() {
        let content = "population,birth,death,sampling,mutation\n0,2,1,0.1,0.5\n";
        let table = RateTable::from_reader(&mut content.as_bytes(), "rates").unwrap();
        assert_eq!(table.rates.birth, 2.);

        let duplicate = "population,birth,death,sampling,mutation\n,1,1,1,1\n,2,1,1,1\n";
        assert!(matches!(
            RateTable::from_reader(&mut duplicate.as_bytes(), "rates"),
            Err(VgsimError::ConfigurationError(_))
        ));

        let empty = "population,birth,death,sampling,mutation\n";
        assert!(matches!(
            RateTable::from_reader(&mut empty.as_bytes(), "rates"),
            Err(VgsimError::ReadError(_))
        ));
    }

    #[test]
    fn population_table() {
        let content = "size,infected,contact_density,sampling_multiplier,lockdown_contact_density,lockdown_sampling_multiplier,lockdown_start,lockdown_end\n\
                       1000,5,1,1,0.1,2,0.1,0.05\n\
                       500,0,,,,,,\n";
        let populations =
            Vec::<PopulationConfig>::from_reader(&mut content.as_bytes(), "populations").unwrap();
        assert_eq!(populations.len(), 2);
        assert_eq!(populations[0].lockdown.map(|l| l.start), Some(0.1));
        assert_eq!(populations[1], PopulationConfig::new(500, 0));

        let incomplete = "size,infected,lockdown_start\n100,1,0.5\n";
        assert!(Vec::<PopulationConfig>::from_reader(&mut incomplete.as_bytes(), "p").is_err());
    }

    #[test]
    fn matrix_table() {
        let content = "0,0.05\n0.05,0\n";
        let matrix = SquareMatrix::<f64>::from_reader(&mut content.as_bytes(), "migration").unwrap();
        assert_eq!(matrix.size(), 2);
        assert_eq!(*matrix.get(0, 1), 0.05);

        let ragged = "0,1\n1\n";
        assert!(SquareMatrix::<f64>::from_reader(&mut ragged.as_bytes(), "migration").is_err());
    }

    #[test]
    fn susceptibility_table() {
        let content = "multiplier,recovery_class\n1,1\n0.5,1\n";
        let classes =
            Vec::<SusceptibilityClass>::from_reader(&mut content.as_bytes(), "suscep").unwrap();
        assert_eq!(classes.len(), 2);
        assert_eq!(classes[1].multiplier, 0.5);
        assert_eq!(classes[0].recovery_class, 1);
    }
}
