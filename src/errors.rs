//! All errors that can occur in the vgsim library.
//!
//! Extinction of the epidemic and degenerate trees are not errors: they are
//! reported through `Termination` and through empty results respectively.

use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub enum VgsimError {
    /// Malformed rates, population, migration or susceptibility input.
    ConfigurationError(String),
    /// The event log or a flat tree encoding violates an ancestry invariant.
    TreeConsistencyError(String),
    ReadError(String),
    WriteError(String),
}

pub type Result<T> = std::result::Result<T, VgsimError>;

impl fmt::Display for VgsimError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VgsimError::ConfigurationError(message) => {
                write!(f, "ConfigurationError: {}", message)
            }
            VgsimError::TreeConsistencyError(message) => {
                write!(f, "TreeConsistencyError: {}", message)
            }
            VgsimError::ReadError(message) => write!(f, "ReadError: {}", message),
            VgsimError::WriteError(message) => write!(f, "WriteError: {}", message),
        }
    }
}

impl std::error::Error for VgsimError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let error = VgsimError::ConfigurationError("negative birth rate".to_string());
        assert_eq!(error.to_string(), "ConfigurationError: negative birth rate");
    }
}
