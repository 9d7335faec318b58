use std::io::Write;

use super::genealogy::create;
use crate::errors::{Result, VgsimError};
use crate::stats::{EventTable, SampleFractionTable, Tag};

fn write_error(err: csv::Error) -> VgsimError {
    VgsimError::WriteError(format!("Failed to write table: {err}"))
}

/// Write the event tables of both forests as `forest,tree,time,samples,coalescences`.
pub fn write_event_tables_to<W: Write>(
    writer: W,
    functional: &[EventTable],
    neutral: &[EventTable],
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer
        .write_record(["forest", "tree", "time", "samples", "coalescences"])
        .map_err(write_error)?;
    for (tag, tables) in [(Tag::Functional, functional), (Tag::Neutral, neutral)] {
        for (tree, table) in tables.iter().enumerate() {
            for (time, counts) in table.iter() {
                writer
                    .write_record(&[
                        tag.to_string(),
                        tree.to_string(),
                        time.to_string(),
                        counts.samples.to_string(),
                        counts.coalescences.to_string(),
                    ])
                    .map_err(write_error)?;
            }
        }
    }
    writer.flush().map_err(|err| write_error(err.into()))
}

pub fn write_event_tables(
    path: &str,
    functional: &[EventTable],
    neutral: &[EventTable],
) -> Result<()> {
    log::info!("Writing event tables to {path}");
    write_event_tables_to(create(path)?, functional, neutral)
}

pub trait SampleFractionIO {
    fn write_to<W: Write>(&self, writer: W) -> Result<()>;

    fn write(&self, path: &str) -> Result<()> {
        log::info!("Writing sample fractions to {path}");
        self.write_to(create(path)?)
    }
}

impl SampleFractionIO for SampleFractionTable {
    fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer
            .write_record(["bin_upper", "fraction"])
            .map_err(write_error)?;
        for (upper, fraction) in self.iter() {
            writer
                .write_record(&[upper.to_string(), fraction.to_string()])
                .map_err(write_error)?;
        }
        writer.flush().map_err(|err| write_error(err.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_tables_csv() {
        let mut functional = EventTable::new(0.5);
        functional.add_samples(2., 1);
        functional.add_coalescences(1., 1);
        let mut neutral = EventTable::new(0.);
        neutral.add_samples(3., 2);

        let mut buffer = Vec::new();
        write_event_tables_to(&mut buffer, &[functional], &[neutral]).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "forest,tree,time,samples,coalescences\n\
             functional,0,1,0,1\n\
             functional,0,2,1,0\n\
             neutral,0,3,2,0\n"
        );
    }

    #[test]
    fn sample_fraction_csv() {
        let mut table = SampleFractionTable::with_edges(&[0.3, 0.6]);
        table.add_sample(0.1, true);
        let mut buffer = Vec::new();
        table.write_to(&mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "bin_upper,fraction\n0.3,1\n0.6,-1\n"
        );
    }
}
