//! This module contains the core datatypes of the library.

mod ancestry;
mod mutations;

pub mod events;
pub mod genealogy;
pub mod lineage;
pub mod lockdown;
pub mod population;

pub use ancestry::Ancestry;
pub use events::{Event, EventKind, EventLog, Founder};
pub use genealogy::{FlatGenealogy, Genealogy, Mutation, Node, NodeId};
pub use lineage::{Fate, Lineage, LineageId};
pub use lockdown::{LockdownPolicy, Regime, RegimeMultipliers};
pub use mutations::poisson_mutations;
pub use population::{Compartment, CompartmentCounters, PopulationState};
