//! Decomposition of a genealogy into functional and neutral sub-trees.
//!
//! Walking from the root, the genealogy is cut on every edge that carries a
//! mutation at the tracked site while the path above it carries none. The part
//! below such an edge forms a functional sub-tree, the parts without the
//! mutation form neutral sub-trees. Tracked mutations inside a functional
//! sub-tree do not cut it again.

use std::fmt;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::tables::{EventTable, SampleFractionTable};
use crate::core::{Genealogy, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    Functional,
    Neutral,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Functional => write!(f, "functional"),
            Tag::Neutral => write!(f, "neutral"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubTree {
    pub tag: Tag,
    /// Time at which the sub-tree starts, either the origin of the genealogy
    /// or the time of the tracked mutation.
    pub origin: f64,
    pub root: NodeId,
    /// Every node above a sample of the sub-tree, in preorder, with the number
    /// of its children that lead to a sample of the sub-tree.
    pub nodes: Vec<(NodeId, usize)>,
    pub leaves: Vec<NodeId>,
}

impl SubTree {
    fn new(tag: Tag, origin: f64, root: NodeId) -> Self {
        Self {
            tag,
            origin,
            root,
            nodes: Vec::new(),
            leaves: Vec::new(),
        }
    }

    /// Sample and coalescence counts of the sub-tree by time.
    ///
    /// A node with `k` children in the sub-tree counts `k - 1` coalescences.
    pub fn event_table(&self, genealogy: &Genealogy) -> EventTable {
        let mut table = EventTable::new(self.origin);
        for &(node, children) in self.nodes.iter() {
            let time = genealogy.node(node).time;
            if genealogy.node(node).is_leaf() {
                table.add_samples(time, 1);
            }
            if children > 1 {
                table.add_coalescences(time, children - 1);
            }
        }
        table
    }
}

pub type Forest = Vec<SubTree>;

pub struct TreeDismember<'a> {
    genealogy: &'a Genealogy,
    tracked_site: usize,
    functional: Forest,
    neutral: Forest,
}

impl<'a> TreeDismember<'a> {
    pub fn new(genealogy: &'a Genealogy, tracked_site: usize) -> Self {
        let mut dismember = Self {
            genealogy,
            tracked_site,
            functional: Vec::new(),
            neutral: Vec::new(),
        };
        dismember.split();
        dismember
    }

    pub fn tracked_site(&self) -> usize {
        self.tracked_site
    }

    /// The functional and the neutral forest.
    pub fn dismember(&self) -> (&[SubTree], &[SubTree]) {
        (&self.functional, &self.neutral)
    }

    /// One event table per sub-tree of the functional and of the neutral forest.
    pub fn event_tables(&self) -> (Vec<EventTable>, Vec<EventTable>) {
        (
            event_tables(&self.functional, self.genealogy),
            event_tables(&self.neutral, self.genealogy),
        )
    }

    /// Fraction of functional samples in each time bin.
    pub fn sample_fraction_table(&self, bin_edges: &[f64]) -> SampleFractionTable {
        let mut table = SampleFractionTable::with_edges(bin_edges);
        for (forest, functional) in [(&self.functional, true), (&self.neutral, false)] {
            for tree in forest.iter() {
                for leaf in tree.leaves.iter() {
                    table.add_sample(self.genealogy.node(*leaf).time, functional);
                }
            }
        }
        table
    }

    /// Time of the first tracked mutation on the edge above each node.
    fn tracked_mutations(&self) -> Vec<Option<f64>> {
        let mut first: Vec<Option<f64>> = vec![None; self.genealogy.len()];
        for mutation in self.genealogy.mutations() {
            if mutation.site != self.tracked_site {
                continue;
            }
            let time = first[mutation.node].get_or_insert(mutation.time);
            *time = time.min(mutation.time);
        }
        first
    }

    fn split(&mut self) {
        let Some(root) = self.genealogy.root() else {
            return;
        };

        let tracked = self.tracked_mutations();
        let mut trees = vec![match tracked[root] {
            Some(time) => SubTree::new(Tag::Functional, time, root),
            None => SubTree::new(Tag::Neutral, self.genealogy.origin(), root),
        }];

        let mut membership: Vec<usize> = vec![0; self.genealogy.len()];
        let mut stack: Vec<NodeId> = vec![root];
        while let Some(node) = stack.pop() {
            let tree = membership[node];
            for &child in self.genealogy.node(node).children.iter() {
                let cut = match trees[tree].tag {
                    Tag::Neutral => tracked[child],
                    Tag::Functional => None,
                };
                membership[child] = match cut {
                    Some(time) => {
                        trees.push(SubTree::new(Tag::Functional, time, child));
                        trees.len() - 1
                    }
                    None => tree,
                };
                stack.push(child);
            }
        }

        // A child counts only if a sample of the same sub-tree lies below it.
        let order = self.genealogy.postorder();
        let mut sampled = vec![false; self.genealogy.len()];
        let mut in_tree = vec![0; self.genealogy.len()];
        for &node in order.iter() {
            let tree = membership[node];
            in_tree[node] = self
                .genealogy
                .node(node)
                .children
                .iter()
                .filter(|&&child| membership[child] == tree && sampled[child])
                .count();
            sampled[node] = self.genealogy.node(node).is_leaf() || in_tree[node] > 0;
        }
        for &node in order.iter().rev().filter(|&&node| sampled[node]) {
            let tree = &mut trees[membership[node]];
            tree.nodes.push((node, in_tree[node]));
            if self.genealogy.node(node).is_leaf() {
                tree.leaves.push(node);
            }
        }

        for mut tree in trees.into_iter().filter(|tree| !tree.leaves.is_empty()) {
            tree.leaves.sort_unstable();
            match tree.tag {
                Tag::Functional => self.functional.push(tree),
                Tag::Neutral => self.neutral.push(tree),
            }
        }
        log::debug!(
            "Dismembered genealogy into {} functional and {} neutral sub-trees",
            self.functional.len(),
            self.neutral.len()
        );
    }
}

#[cfg(feature = "parallel")]
fn event_tables(forest: &[SubTree], genealogy: &Genealogy) -> Vec<EventTable> {
    forest
        .par_iter()
        .map(|tree| tree.event_table(genealogy))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn event_tables(forest: &[SubTree], genealogy: &Genealogy) -> Vec<EventTable> {
    forest
        .iter()
        .map(|tree| tree.event_table(genealogy))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FlatGenealogy, LineageId, Mutation};
    use crate::encoding::Nucleotide;
    use crate::config::{PopulationModel, RateModel, Rates};
    use crate::simulation::Simulation;
    use crate::stats::tables::EventCounts;

    fn mutation(node: NodeId, site: usize, time: f64) -> Mutation {
        Mutation {
            node,
            site,
            ancestral: Nucleotide::A,
            derived: Nucleotide::C,
            time,
        }
    }

    // leaves 0 (t=2), 1 (t=3), 2 (t=3); node 3 joins 0 and 1 at t=1; root 4 at t=0.5
    fn genealogy(mutations: Vec<Mutation>) -> Genealogy {
        Genealogy::from_flat(&FlatGenealogy {
            parents: vec![3, 3, 4, 4, -1],
            times: vec![2., 3., 3., 1., 0.5],
            populations: vec![0; 5],
            labels: vec![LineageId(1), LineageId(2), LineageId(4)],
            mutations,
            origin: 0.,
        })
        .unwrap()
    }

    fn leaves(forest: &[SubTree]) -> Vec<NodeId> {
        let mut leaves: Vec<NodeId> = forest.iter().flat_map(|t| t.leaves.clone()).collect();
        leaves.sort_unstable();
        leaves
    }

    #[test]
    fn cut_below_mutation() {
        let genealogy = genealogy(vec![mutation(3, 0, 0.75), mutation(2, 1, 1.)]);
        let dismember = TreeDismember::new(&genealogy, 0);
        let (functional, neutral) = dismember.dismember();

        assert_eq!(functional.len(), 1);
        assert_eq!(functional[0].root, 3);
        assert_eq!(functional[0].origin, 0.75);
        assert_eq!(functional[0].leaves, vec![0, 1]);
        assert_eq!(neutral.len(), 1);
        assert_eq!(neutral[0].root, 4);
        assert_eq!(neutral[0].leaves, vec![2]);

        let (functional_tables, neutral_tables) = dismember.event_tables();
        assert_eq!(
            functional_tables[0].get(1.),
            Some(&EventCounts {
                samples: 0,
                coalescences: 1
            })
        );
        assert_eq!(functional_tables[0].samples(), 2);
        assert_eq!(neutral_tables[0].coalescences(), 0);
        assert_eq!(neutral_tables[0].samples(), 1);

        let fractions = dismember.sample_fraction_table(&[1.5, 2.5, 3.5]);
        assert_eq!(
            fractions.iter().collect::<Vec<_>>(),
            vec![(1.5, -1.), (2.5, 1.), (3.5, 0.5)]
        );
        let truncated = dismember.sample_fraction_table(&[2.5]);
        assert_eq!(truncated.iter().collect::<Vec<_>>(), vec![(2.5, 1.)]);
    }

    #[test]
    fn nested_mutations_do_not_cut() {
        let genealogy = genealogy(vec![mutation(3, 0, 0.75), mutation(0, 0, 1.5)]);
        let dismember = TreeDismember::new(&genealogy, 0);
        let (functional, neutral) = dismember.dismember();
        assert_eq!(functional.len(), 1);
        assert_eq!(neutral.len(), 1);
    }

    #[test]
    fn leafless_neutral_tree_is_dropped() {
        let genealogy = genealogy(vec![mutation(3, 0, 0.75), mutation(2, 0, 2.)]);
        let dismember = TreeDismember::new(&genealogy, 0);
        let (functional, neutral) = dismember.dismember();
        assert_eq!(functional.len(), 2);
        assert!(neutral.is_empty());
        assert_eq!(leaves(functional), vec![0, 1, 2]);
    }

    #[test]
    fn root_edge_mutation() {
        let genealogy = genealogy(vec![mutation(4, 0, 0.25)]);
        let dismember = TreeDismember::new(&genealogy, 0);
        let (functional, neutral) = dismember.dismember();
        assert_eq!(functional.len(), 1);
        assert_eq!(functional[0].origin, 0.25);
        assert!(neutral.is_empty());
        let (tables, _) = dismember.event_tables();
        // two coalescences at the root and node 3
        assert_eq!(tables[0].coalescences(), 2);
    }

    #[test]
    fn without_mutations() {
        let genealogy = genealogy(Vec::new());
        let dismember = TreeDismember::new(&genealogy, 0);
        let (functional, neutral) = dismember.dismember();
        assert!(functional.is_empty());
        assert_eq!(neutral.len(), 1);
        assert_eq!(leaves(neutral), vec![0, 1, 2]);
        assert_eq!(neutral[0].nodes.len(), 5);
    }

    #[test]
    fn empty_genealogy() {
        let genealogy = Genealogy::empty();
        let dismember = TreeDismember::new(&genealogy, 0);
        let (functional, neutral) = dismember.dismember();
        assert!(functional.is_empty() && neutral.is_empty());
        let (functional_tables, neutral_tables) = dismember.event_tables();
        assert!(functional_tables.is_empty() && neutral_tables.is_empty());
        let fractions = dismember.sample_fraction_table(&[0.3, 0.6]);
        assert!(fractions.iter().all(|(_, fraction)| fraction == -1.));
        assert_eq!(fractions.len(), 2);
    }

    #[test]
    fn branches_ending_in_cuts_do_not_coalesce() {
        // leaves 0 (t=3), 1 (t=2), 2 (t=2.5); node 3 joins 1 and 2 at t=1; root 4 at t=0.5
        let genealogy = Genealogy::from_flat(&FlatGenealogy {
            parents: vec![4, 3, 3, 4, -1],
            times: vec![3., 2., 2.5, 1., 0.5],
            populations: vec![0; 5],
            labels: vec![LineageId(0), LineageId(1), LineageId(2)],
            mutations: vec![mutation(1, 0, 1.5), mutation(2, 0, 1.2)],
            origin: 0.,
        })
        .unwrap();
        let dismember = TreeDismember::new(&genealogy, 0);
        let (functional, neutral) = dismember.dismember();

        assert_eq!(functional.len(), 2);
        assert_eq!(leaves(functional), vec![1, 2]);
        assert_eq!(neutral.len(), 1);
        assert_eq!(neutral[0].leaves, vec![0]);
        assert_eq!(neutral[0].nodes, vec![(4, 1), (0, 0)]);

        let (functional_tables, neutral_tables) = dismember.event_tables();
        assert!(functional_tables.iter().all(|t| t.coalescences() == 0));
        assert_eq!(neutral_tables[0].samples(), 1);
        assert_eq!(neutral_tables[0].coalescences(), 0);
        assert_eq!(neutral_tables[0].get(1.), None);
    }

    #[test]
    fn coalescences_of_simulated_forests() {
        let rate_model = RateModel::from_rates(Rates::new(2., 0.5, 0.5, 0.5)).unwrap();
        for seed in 0..50 {
            let mut simulation =
                Simulation::new(rate_model.clone(), PopulationModel::single(1), seed).unwrap();
            simulation.simulate(500, 30);
            let genealogy = simulation.get_genealogy().unwrap();
            let dismember = TreeDismember::new(&genealogy, 0);
            let (functional, neutral) = dismember.dismember();
            let (functional_tables, neutral_tables) = dismember.event_tables();

            // every sub-tree is a tree over its samples
            let trees = functional.len() + neutral.len();
            let coalescences: usize = functional_tables
                .iter()
                .chain(neutral_tables.iter())
                .map(|table| table.coalescences())
                .sum();
            assert_eq!(coalescences + trees, genealogy.n_leaves(), "seed {seed}");
            for (tree, table) in functional
                .iter()
                .chain(neutral.iter())
                .zip(functional_tables.iter().chain(neutral_tables.iter()))
            {
                assert_eq!(table.coalescences() + 1, tree.leaves.len(), "seed {seed}");
            }
        }
    }

    fn single_leaf(mutations: Vec<Mutation>) -> Genealogy {
        Genealogy::from_flat(&FlatGenealogy {
            parents: vec![-1],
            times: vec![2.],
            populations: vec![0],
            labels: vec![LineageId(0)],
            mutations,
            origin: 0.,
        })
        .unwrap()
    }

    #[test]
    fn single_leaf_without_mutation() {
        let genealogy = single_leaf(Vec::new());
        let dismember = TreeDismember::new(&genealogy, 0);
        let (functional, neutral) = dismember.dismember();
        assert!(functional.is_empty());
        assert_eq!(neutral.len(), 1);
        assert_eq!(neutral[0].root, 0);
        assert_eq!(neutral[0].origin, 0.);
        assert_eq!(neutral[0].nodes, vec![(0, 0)]);
        assert_eq!(neutral[0].leaves, vec![0]);

        let (functional_tables, neutral_tables) = dismember.event_tables();
        assert!(functional_tables.is_empty());
        assert_eq!(
            neutral_tables[0].iter().collect::<Vec<_>>(),
            vec![(
                2.,
                &EventCounts {
                    samples: 1,
                    coalescences: 0
                }
            )]
        );

        let fractions = dismember.sample_fraction_table(&[1., 3.]);
        assert_eq!(fractions.iter().collect::<Vec<_>>(), vec![(1., -1.), (3., 0.)]);
    }

    #[test]
    fn single_leaf_with_root_edge_mutation() {
        let genealogy = single_leaf(vec![mutation(0, 0, 1.)]);
        let dismember = TreeDismember::new(&genealogy, 0);
        let (functional, neutral) = dismember.dismember();
        assert!(neutral.is_empty());
        assert_eq!(functional.len(), 1);
        assert_eq!(functional[0].origin, 1.);
        assert_eq!(functional[0].leaves, vec![0]);

        let (functional_tables, neutral_tables) = dismember.event_tables();
        assert!(neutral_tables.is_empty());
        assert_eq!(functional_tables[0].origin, 1.);
        assert_eq!(functional_tables[0].samples(), 1);
        assert_eq!(functional_tables[0].coalescences(), 0);

        let fractions = dismember.sample_fraction_table(&[1., 3.]);
        assert_eq!(fractions.iter().collect::<Vec<_>>(), vec![(1., -1.), (3., 1.)]);
    }
}
