//! Summary statistics of simulated genealogies

pub mod dismember;
pub mod tables;

pub use dismember::{Forest, SubTree, Tag, TreeDismember};
pub use tables::{EventCounts, EventTable, FractionBin, SampleFractionTable, Time};
