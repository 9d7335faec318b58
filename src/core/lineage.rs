//! Lineage records of the ancestry arena.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Index of a lineage in the ancestry arena.
///
/// Ids are handed out in creation order, so a parent always has a smaller id than its
/// children.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    From,
    Into,
    Serialize,
    Deserialize,
)]
pub struct LineageId(pub usize);

impl LineageId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fate {
    Alive,
    Died,
    Sampled,
}

/// One infected host and the line of transmission running through it.
#[derive(Debug, Clone, PartialEq)]
pub struct Lineage {
    pub id: LineageId,
    pub parent: Option<LineageId>,
    pub population: usize,
    pub class: usize,
    pub birth_time: f64,
    pub end_time: Option<f64>,
    pub fate: Fate,
}

impl Lineage {
    pub fn founder(id: LineageId, population: usize, class: usize, time: f64) -> Self {
        Self {
            id,
            parent: None,
            population,
            class,
            birth_time: time,
            end_time: None,
            fate: Fate::Alive,
        }
    }

    pub fn descendant(
        id: LineageId,
        parent: LineageId,
        population: usize,
        class: usize,
        time: f64,
    ) -> Self {
        Self {
            id,
            parent: Some(parent),
            population,
            class,
            birth_time: time,
            end_time: None,
            fate: Fate::Alive,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.fate == Fate::Alive
    }

    pub fn is_sampled(&self) -> bool {
        self.fate == Fate::Sampled
    }

    pub fn is_founder(&self) -> bool {
        self.parent.is_none()
    }

    /// End the lineage. Terminated lineages are never modified again.
    pub fn terminate(&mut self, time: f64, fate: Fate) {
        debug_assert!(self.is_alive(), "lineage {} terminated twice", self.id);
        self.end_time = Some(time);
        self.fate = fate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminate() {
        let mut lineage = Lineage::descendant(LineageId(3), LineageId(1), 0, 0, 0.5);
        assert!(lineage.is_alive());
        assert!(!lineage.is_founder());
        lineage.terminate(1.5, Fate::Sampled);
        assert!(lineage.is_sampled());
        assert_eq!(lineage.end_time, Some(1.5));
    }

    #[test]
    fn display_id() {
        assert_eq!(LineageId(12).to_string(), "12");
        assert_eq!(usize::from(LineageId(7)), 7);
    }
}
