//! Mutation assignment along the edges of a genealogy.
//!
//! Mutations fall on every edge as a Poisson process whose intensity is the
//! mutation rate of the population below the edge. Sequences start from the
//! reference nucleotide at every site and each mutation substitutes the
//! current nucleotide of its site, so the ancestral state of a mutation is
//! whatever its ancestors left behind.

use rand::Rng;
use rand::distr::weighted::WeightedIndex;
use rand_distr::{Distribution, Poisson};

use super::genealogy::{Genealogy, Mutation, NodeId};
use crate::config::{MutationModel, RateModel};
use crate::encoding::Nucleotide;
use crate::errors::{Result, VgsimError};

/// Draw the mutations of a single edge.
///
/// Returns `(offset, site)` pairs sorted by their offset from the start of the
/// edge.
pub fn poisson_mutations<R: Rng + ?Sized>(
    edge_length: f64,
    rate: f64,
    sites: &WeightedIndex<f64>,
    rng: &mut R,
) -> Vec<(f64, usize)> {
    let intensity = edge_length * rate;
    if intensity <= 0. || !intensity.is_finite() {
        return Vec::new();
    }
    let count = match Poisson::new(intensity) {
        Ok(poisson) => poisson.sample(rng) as usize,
        Err(_) => return Vec::new(),
    };

    let mut mutations: Vec<(f64, usize)> = (0..count)
        .map(|_| (rng.random::<f64>() * edge_length, sites.sample(rng)))
        .collect();
    mutations.sort_by(|a, b| a.0.total_cmp(&b.0));
    mutations
}

struct Substitutions {
    sites: WeightedIndex<f64>,
    rows: Vec<WeightedIndex<f64>>,
}

impl Substitutions {
    fn new(model: &MutationModel) -> Result<Self> {
        let sites = WeightedIndex::new(&model.site_weights).map_err(|err| {
            VgsimError::ConfigurationError(format!("Invalid site weights: {err}"))
        })?;
        let rows = model
            .substitution_matrix
            .iter()
            .enumerate()
            .map(|(from, row)| {
                let mut row = *row;
                row[from] = 0.;
                WeightedIndex::new(row).map_err(|err| {
                    VgsimError::ConfigurationError(format!(
                        "Invalid substitution weights: {err}"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sites, rows })
    }

    fn derive<R: Rng + ?Sized>(&self, ancestral: Nucleotide, rng: &mut R) -> Nucleotide {
        let index = self.rows[ancestral.index()].sample(rng);
        Nucleotide::from_index(index).unwrap_or(Nucleotide::REFERENCE)
    }
}

enum Visit {
    Enter(NodeId),
    Leave(usize),
}

impl Genealogy {
    /// Place mutations on all edges, replacing any previous assignment.
    ///
    /// Mutations are listed in depth-first order of their edges and by time
    /// within an edge.
    pub fn assign_mutations<R: Rng + ?Sized>(
        &mut self,
        rate_model: &RateModel,
        rng: &mut R,
    ) -> Result<()> {
        let model = rate_model.mutation_model();
        let substitutions = Substitutions::new(model)?;

        let mut sequence = vec![Nucleotide::REFERENCE; model.n_sites()];
        let mut undo: Vec<(usize, Nucleotide)> = Vec::new();
        let mut mutations: Vec<Mutation> = Vec::new();

        let mut stack: Vec<Visit> = self.root().into_iter().map(Visit::Enter).collect();
        while let Some(visit) = stack.pop() {
            let node = match visit {
                Visit::Enter(node) => node,
                Visit::Leave(mark) => {
                    while undo.len() > mark {
                        if let Some((site, nucleotide)) = undo.pop() {
                            sequence[site] = nucleotide;
                        }
                    }
                    continue;
                }
            };

            let start = self.edge_start(node);
            let rate = rate_model.rates(self.node(node).population).mutation;
            stack.push(Visit::Leave(undo.len()));

            for (offset, site) in
                poisson_mutations(self.branch_length(node), rate, &substitutions.sites, rng)
            {
                let ancestral = sequence[site];
                let derived = substitutions.derive(ancestral, rng);
                undo.push((site, ancestral));
                sequence[site] = derived;
                mutations.push(Mutation {
                    node,
                    site,
                    ancestral,
                    derived,
                    time: start + offset,
                });
            }

            stack.extend(self.node(node).children.iter().rev().map(|c| Visit::Enter(*c)));
        }

        log::debug!("Assigned {} mutations", mutations.len());
        self.set_mutations(mutations);
        Ok(())
    }
}
