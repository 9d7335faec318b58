use std::io::Write;

use serde::Serialize;

use super::genealogy::create;
use crate::core::{EventKind, EventLog};
use crate::errors::{Result, VgsimError};

pub trait EventLogIO {
    fn write_to<W: Write>(&self, writer: W) -> Result<()>;

    fn write(&self, path: &str) -> Result<()> {
        log::info!("Writing event log to {path}");
        self.write_to(create(path)?)
    }
}

#[derive(Debug, Serialize)]
struct EventRecord {
    time: f64,
    event: &'static str,
    lineage: usize,
    child: Option<usize>,
    population: Option<usize>,
    class: Option<usize>,
}

impl EventLogIO for EventLog {
    /// One row per event. Columns that do not apply to an event stay empty.
    fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        let write_error =
            |err: csv::Error| VgsimError::WriteError(format!("Failed to write event log: {err}"));

        for event in self.iter() {
            let (population, class) = match event.kind {
                EventKind::Birth { class, .. } => (None, Some(class)),
                EventKind::Migration { target, class, .. } => (Some(target), Some(class)),
                EventKind::SusceptibilityTransition { class, .. } => (None, Some(class)),
                EventKind::Death { .. } | EventKind::Sampling { .. } => (None, None),
            };
            writer
                .serialize(EventRecord {
                    time: event.time,
                    event: event.kind.name(),
                    lineage: event.kind.source().index(),
                    child: event.kind.child().map(|child| child.index()),
                    population,
                    class,
                })
                .map_err(write_error)?;
        }
        writer
            .flush()
            .map_err(|err| VgsimError::WriteError(format!("Failed to write event log: {err}")))
    }
}
