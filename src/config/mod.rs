//! Configuration data structures for simulation setups.

mod matrix;
mod populations;
mod rates;
mod settings;
mod susceptibility;

pub use matrix::SquareMatrix;
pub use populations::{DEFAULT_POPULATION_SIZE, LockdownConfig, PopulationConfig, PopulationModel};
pub use rates::{MutationModel, RateModel, Rates};
pub use settings::{DEFAULT_FRACTION_BINS, Settings, SettingsError};
pub use susceptibility::{SusceptibilityClass, SusceptibilityModel};
