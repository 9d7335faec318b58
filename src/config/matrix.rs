use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::{Result, VgsimError};

/// Row-major square matrix, used for migration and susceptibility-transition rates.
#[derive(Clone, Debug, PartialEq)]
pub struct SquareMatrix<T> {
    matrix: Vec<T>,
    size: usize,
}

impl<T: Clone> SquareMatrix<T> {
    pub fn from_vec(rows: Vec<Vec<T>>) -> Result<Self> {
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != rows.len()) {
            return Err(VgsimError::ConfigurationError(format!(
                "Matrix is not square: row {index} has {} entries, expected {}",
                row.len(),
                rows.len()
            )));
        }

        let size = rows.len();
        let matrix = rows.into_iter().flatten().collect();
        Ok(Self { matrix, size })
    }

    pub fn filled(size: usize, value: T) -> Self {
        Self {
            matrix: vec![value; size * size],
            size,
        }
    }

    pub fn to_rows(&self) -> Vec<Vec<T>> {
        self.matrix
            .chunks(self.size.max(1))
            .map(|row| row.to_vec())
            .collect()
    }
}

impl<T> SquareMatrix<T> {
    pub fn get(&self, row: usize, col: usize) -> &T {
        &self.matrix[row * self.size + col]
    }

    pub fn get_row(&self, row: usize) -> &[T] {
        let begin = row * self.size;
        let end = begin + self.size;
        &self.matrix[begin..end]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        self.matrix
            .iter()
            .enumerate()
            .map(|(index, value)| (index / self.size, index % self.size, value))
    }
}

impl SquareMatrix<f64> {
    pub fn zeros(size: usize) -> Self {
        Self::filled(size, 0.)
    }

    /// Off-diagonal entries must be finite and non-negative.
    pub fn validate_rates(&self, name: &str) -> Result<()> {
        for (row, col, value) in self.iter() {
            if row != col && !(value.is_finite() && *value >= 0.) {
                return Err(VgsimError::ConfigurationError(format!(
                    "{name} has invalid rate {value} at ({row}, {col})"
                )));
            }
        }
        Ok(())
    }
}

impl<T: Serialize + Clone> Serialize for SquareMatrix<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let rows = self.to_rows();
        let mut seq = serializer.serialize_seq(Some(rows.len()))?;
        for row in &rows {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}

impl<'de, T: Deserialize<'de> + Clone> Deserialize<'de> for SquareMatrix<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let rows: Vec<Vec<T>> = Vec::<Vec<T>>::deserialize(deserializer)?;
        Self::from_vec(rows).map_err(|e| serde::de::Error::custom(format!("{}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_access() {
        let matrix = SquareMatrix::from_vec(vec![vec![1., 2.], vec![3., 4.]]).unwrap();
        assert_eq!(matrix.size(), 2);
        assert_eq!(*matrix.get(1, 0), 3.);
        assert_eq!(matrix.get_row(0), &[1., 2.]);
        assert_eq!(matrix.to_rows(), vec![vec![1., 2.], vec![3., 4.]]);
    }

    #[test]
    fn reject_non_square() {
        let matrix = SquareMatrix::from_vec(vec![vec![1., 2.], vec![3.]]);
        assert!(matches!(matrix, Err(VgsimError::ConfigurationError(_))));
    }

    #[test]
    fn reject_negative_rates() {
        let matrix = SquareMatrix::from_vec(vec![vec![0., -0.1], vec![0.2, 0.]]).unwrap();
        assert!(matrix.validate_rates("migration").is_err());

        // diagonal entries are not rates
        let matrix = SquareMatrix::from_vec(vec![vec![-0.3, 0.3], vec![0.2, -0.2]]).unwrap();
        assert!(matrix.validate_rates("transition").is_ok());
    }

    #[test]
    fn yaml_round_trip() {
        let matrix = SquareMatrix::from_vec(vec![vec![0., 0.05], vec![0.05, 0.]]).unwrap();
        let yaml = serde_yaml::to_string(&matrix).unwrap();
        let read: SquareMatrix<f64> = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(read, matrix);

        let broken: std::result::Result<SquareMatrix<f64>, _> =
            serde_yaml::from_str("[[1.0, 2.0], [3.0]]");
        assert!(broken.is_err());
    }
}
