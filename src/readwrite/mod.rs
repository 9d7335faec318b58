//! IO traits for reading simulation setups and writing simulation results.

mod dismember;
mod events;
mod genealogy;
mod tables;

pub use dismember::{SampleFractionIO, write_event_tables, write_event_tables_to};
pub use events::EventLogIO;
pub use genealogy::GenealogyIO;
pub use tables::{RateTable, TableIO};
