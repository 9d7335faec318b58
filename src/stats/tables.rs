//! Time-keyed summary tables of a dismembered genealogy.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

/// Point in simulation time, totally ordered to serve as a table key.
#[derive(Debug, Clone, Copy, Display, From, Into, Serialize, Deserialize)]
pub struct Time(pub f64);

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    pub samples: usize,
    pub coalescences: usize,
}

/// Samples and coalescences of one sub-tree by the time they happen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    pub origin: f64,
    pub counts: BTreeMap<Time, EventCounts>,
}

impl EventTable {
    pub fn new(origin: f64) -> Self {
        Self {
            origin,
            counts: BTreeMap::new(),
        }
    }

    pub fn add_samples(&mut self, time: f64, samples: usize) {
        self.counts.entry(Time(time)).or_default().samples += samples;
    }

    pub fn add_coalescences(&mut self, time: f64, coalescences: usize) {
        self.counts.entry(Time(time)).or_default().coalescences += coalescences;
    }

    pub fn get(&self, time: f64) -> Option<&EventCounts> {
        self.counts.get(&Time(time))
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &EventCounts)> {
        self.counts.iter().map(|(time, counts)| (time.0, counts))
    }

    pub fn samples(&self) -> usize {
        self.counts.values().map(|counts| counts.samples).sum()
    }

    pub fn coalescences(&self) -> usize {
        self.counts.values().map(|counts| counts.coalescences).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FractionBin {
    pub functional: usize,
    pub total: usize,
}

impl FractionBin {
    /// Fraction of functional samples, or `-1` for a bin without samples.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return -1.;
        }
        self.functional as f64 / self.total as f64
    }
}

/// Fraction of functional samples per time bin, keyed by the upper bin edge.
///
/// The first bin is open towards the past. Bins are half-open intervals
/// `[lower, upper)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleFractionTable {
    bins: BTreeMap<Time, FractionBin>,
}

impl SampleFractionTable {
    /// Empty bins for the given edges, which are sorted and deduplicated.
    pub fn with_edges(edges: &[f64]) -> Self {
        Self {
            bins: edges
                .iter()
                .map(|edge| (Time(*edge), FractionBin::default()))
                .collect(),
        }
    }

    /// Count a sample taken at `time`. Samples at or after the last edge are ignored.
    pub fn add_sample(&mut self, time: f64, functional: bool) {
        if let Some((_, bin)) = self.bins.range_mut(Time(time)..).find(|(upper, _)| time < upper.0) {
            bin.total += 1;
            if functional {
                bin.functional += 1;
            }
        }
    }

    pub fn fraction(&self, upper: f64) -> Option<f64> {
        self.bins.get(&Time(upper)).map(FractionBin::fraction)
    }

    pub fn bin(&self, upper: f64) -> Option<&FractionBin> {
        self.bins.get(&Time(upper))
    }

    /// `(upper edge, fraction)` pairs in time order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.bins.iter().map(|(upper, bin)| (upper.0, bin.fraction()))
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_order() {
        let mut times = vec![Time(2.), Time(-1.), Time(0.5)];
        times.sort();
        assert_eq!(times, vec![Time(-1.), Time(0.5), Time(2.)]);
        assert_eq!(Time(1.5).to_string(), "1.5");
    }

    #[test]
    fn event_table_accumulates() {
        let mut table = EventTable::new(0.);
        table.add_samples(1., 1);
        table.add_samples(1., 1);
        table.add_coalescences(0.5, 2);
        assert_eq!(
            table.get(1.),
            Some(&EventCounts {
                samples: 2,
                coalescences: 0
            })
        );
        assert_eq!(table.samples(), 2);
        assert_eq!(table.coalescences(), 2);
        assert_eq!(table.iter().next().map(|(time, _)| time), Some(0.5));
    }

    #[test]
    fn fraction_bins() {
        let mut table = SampleFractionTable::with_edges(&[1., 2., 3.]);
        table.add_sample(0.2, true);
        table.add_sample(1., false);
        table.add_sample(1.5, true);
        table.add_sample(3., true);
        assert_eq!(table.fraction(1.), Some(1.));
        assert_eq!(table.fraction(2.), Some(0.5));
        // empty bins are marked and the sample at the last edge is not counted
        assert_eq!(table.fraction(3.), Some(-1.));
        assert_eq!(table.fraction(4.), None);
        assert_eq!(
            table.iter().collect::<Vec<_>>(),
            vec![(1., 1.), (2., 0.5), (3., -1.)]
        );
    }
}
