use std::fs::File;
use std::io::{BufWriter, Write};

use crate::core::Genealogy;
use crate::errors::{Result, VgsimError};

pub trait GenealogyIO {
    fn write_newick_to<W: Write>(&self, writer: W) -> Result<()>;
    fn write_mutations_to<W: Write>(&self, writer: W) -> Result<()>;

    fn write_newick(&self, path: &str) -> Result<()> {
        log::info!("Writing genealogy to {path}");
        self.write_newick_to(create(path)?)
    }

    fn write_mutations(&self, path: &str) -> Result<()> {
        log::info!("Writing mutations to {path}");
        self.write_mutations_to(create(path)?)
    }
}

pub(crate) fn create(path: &str) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .map_err(|err| VgsimError::WriteError(format!("Failed to create {path}: {err}")))?;
    Ok(BufWriter::new(file))
}

impl GenealogyIO for Genealogy {
    fn write_newick_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", self.to_newick())
            .and_then(|_| writer.flush())
            .map_err(|err| VgsimError::WriteError(format!("Failed to write newick: {err}")))
    }

    /// Tab separated table of all mutations with the node below their edge.
    fn write_mutations_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);
        let write_error =
            |err: csv::Error| VgsimError::WriteError(format!("Failed to write mutations: {err}"));

        writer
            .write_record(["node", "site", "ancestral", "derived", "time"])
            .map_err(write_error)?;
        for mutation in self.mutations() {
            writer
                .write_record(&[
                    mutation.node.to_string(),
                    mutation.site.to_string(),
                    mutation.ancestral.to_string(),
                    mutation.derived.to_string(),
                    mutation.time.to_string(),
                ])
                .map_err(write_error)?;
        }
        writer
            .flush()
            .map_err(|err| VgsimError::WriteError(format!("Failed to write mutations: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FlatGenealogy, LineageId, Mutation};
    use crate::encoding::Nucleotide;
    use serial_test::serial;

    fn genealogy() -> Genealogy {
        Genealogy::from_flat(&FlatGenealogy {
            parents: vec![2, 2, -1],
            times: vec![2., 1.5, 1.],
            populations: vec![0, 0, 0],
            labels: vec![LineageId(3), LineageId(5)],
            mutations: vec![Mutation {
                node: 0,
                site: 2,
                ancestral: Nucleotide::A,
                derived: Nucleotide::T,
                time: 1.25,
            }],
            origin: 0.,
        })
        .unwrap()
    }

    #[test]
    fn newick_to_writer() {
        let mut buffer = Vec::new();
        genealogy().write_newick_to(&mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "(3:1,5:0.5):1;\n");
    }

    #[test]
    fn mutations_to_writer() {
        let mut buffer = Vec::new();
        genealogy().write_mutations_to(&mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "node\tsite\tancestral\tderived\ttime\n0\t2\tA\tT\t1.25\n"
        );
    }

    #[test]
    #[serial]
    fn newick_to_file() {
        let path = std::env::temp_dir().join("vgsim_test_genealogy.nwk");
        let path = path.to_str().unwrap();
        genealogy().write_newick(path).unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.trim_end(), "(3:1,5:0.5):1;");
        std::fs::remove_file(path).unwrap();
    }
}
