//! The genealogy of the sampled lineages.
//!
//! A `Genealogy` is a rooted tree stored as a node arena. Leaves come first and
//! occupy node ids `0..n_leaves`, one per sampled lineage in lineage id order.
//! Every node except the root has a parent with a time not larger than its own.
//! The edge above a node is identified with the node itself: mutations carry
//! the id of the node below the edge they occur on. The root edge starts at the
//! origin of the genealogy.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::lineage::LineageId;
use crate::encoding::Nucleotide;
use crate::errors::{Result, VgsimError};

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub children: SmallVec<[NodeId; 2]>,
    pub time: f64,
    pub population: usize,
    /// Sampled lineage of a leaf.
    pub label: Option<LineageId>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub node: NodeId,
    pub site: usize,
    pub ancestral: Nucleotide,
    pub derived: Nucleotide,
    pub time: f64,
}

/// Array encoding of a genealogy.
///
/// `parents` holds the parent index of each node and `-1` for the root. The
/// first `labels.len()` nodes are the leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatGenealogy {
    pub parents: Vec<i64>,
    pub times: Vec<f64>,
    pub populations: Vec<usize>,
    pub labels: Vec<LineageId>,
    pub mutations: Vec<Mutation>,
    pub origin: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Genealogy {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    n_leaves: usize,
    origin: f64,
    mutations: Vec<Mutation>,
}

impl Genealogy {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        mut nodes: Vec<Node>,
        root: Option<NodeId>,
        n_leaves: usize,
        origin: f64,
    ) -> Self {
        for node in nodes.iter_mut() {
            node.children.sort_unstable();
        }
        Self {
            nodes,
            root,
            n_leaves,
            origin,
            mutations: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn n_leaves(&self) -> usize {
        self.n_leaves
    }

    pub fn leaves(&self) -> std::ops::Range<NodeId> {
        0..self.n_leaves
    }

    pub fn origin(&self) -> f64 {
        self.origin
    }

    pub fn labels(&self) -> Vec<LineageId> {
        self.nodes[..self.n_leaves]
            .iter()
            .filter_map(|node| node.label)
            .collect()
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub(crate) fn set_mutations(&mut self, mutations: Vec<Mutation>) {
        self.mutations = mutations;
    }

    /// Time at which the edge above `id` starts.
    pub fn edge_start(&self, id: NodeId) -> f64 {
        match self.nodes[id].parent {
            Some(parent) => self.nodes[parent].time,
            None => self.origin,
        }
    }

    pub fn branch_length(&self, id: NodeId) -> f64 {
        self.nodes[id].time - self.edge_start(id)
    }

    /// Nodes in depth-first order with every parent before its children.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }

    /// Nodes with every child before its parent.
    pub fn postorder(&self) -> Vec<NodeId> {
        let mut order = self.preorder();
        order.reverse();
        order
    }

    /// Number of edges whose endpoints lie in different populations.
    pub fn cross_population_edges(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| {
                node.parent
                    .is_some_and(|parent| self.nodes[parent].population != node.population)
            })
            .count()
    }

    /// Newick representation with leaves labeled by their lineage id.
    pub fn to_newick(&self) -> String {
        let Some(root) = self.root else {
            return ";".to_string();
        };

        let mut subtrees: Vec<Option<String>> = vec![None; self.nodes.len()];
        for id in self.postorder() {
            let node = &self.nodes[id];
            let branch = self.branch_length(id);
            let subtree = if node.is_leaf() {
                let label = node.label.map(|l| l.to_string()).unwrap_or_default();
                format!("{label}:{branch}")
            } else {
                let descendants = node
                    .children
                    .iter()
                    .filter_map(|child| subtrees[*child].take())
                    .collect::<Vec<String>>()
                    .join(",");
                format!("({descendants}):{branch}")
            };
            subtrees[id] = Some(subtree);
        }

        let tree = subtrees[root].take().unwrap_or_default();
        format!("{tree};")
    }

    pub fn to_flat(&self) -> FlatGenealogy {
        FlatGenealogy {
            parents: self
                .nodes
                .iter()
                .map(|node| node.parent.map_or(-1, |parent| parent as i64))
                .collect(),
            times: self.nodes.iter().map(|node| node.time).collect(),
            populations: self.nodes.iter().map(|node| node.population).collect(),
            labels: self.labels(),
            mutations: self.mutations.clone(),
            origin: self.origin,
        }
    }

    /// Rebuild a genealogy from its flat encoding.
    ///
    /// Fails if the encoding does not describe a single rooted tree whose leaves
    /// are exactly the labeled prefix of the nodes.
    pub fn from_flat(flat: &FlatGenealogy) -> Result<Self> {
        let n = flat.parents.len();
        if flat.times.len() != n || flat.populations.len() != n || flat.labels.len() > n {
            return Err(inconsistent("node arrays differ in length"));
        }
        if n == 0 {
            return Ok(Self {
                origin: flat.origin,
                ..Self::default()
            });
        }

        let mut nodes: Vec<Node> = (0..n)
            .map(|id| Node {
                parent: None,
                children: SmallVec::new(),
                time: flat.times[id],
                population: flat.populations[id],
                label: flat.labels.get(id).copied(),
            })
            .collect();

        let mut root = None;
        for (id, &parent) in flat.parents.iter().enumerate() {
            if parent == -1 {
                if root.replace(id).is_some() {
                    return Err(inconsistent("more than one root"));
                }
                continue;
            }
            let parent = usize::try_from(parent)
                .ok()
                .filter(|parent| *parent < n && *parent != id)
                .ok_or_else(|| inconsistent(&format!("invalid parent {parent} of node {id}")))?;
            if flat.times[parent] > flat.times[id] {
                return Err(inconsistent(&format!("node {id} is older than its parent")));
            }
            nodes[id].parent = Some(parent);
            nodes[parent].children.push(id);
        }
        let root = root.ok_or_else(|| inconsistent("no root"))?;

        let genealogy = Self {
            nodes,
            root: Some(root),
            n_leaves: flat.labels.len(),
            origin: flat.origin,
            mutations: flat.mutations.clone(),
        };

        // a cycle detaches its nodes from the root
        if genealogy.preorder().len() != n {
            return Err(inconsistent("nodes unreachable from the root"));
        }
        for (id, node) in genealogy.nodes.iter().enumerate() {
            if node.is_leaf() != (id < genealogy.n_leaves) {
                return Err(inconsistent(&format!(
                    "leaves must be the first {} nodes",
                    genealogy.n_leaves
                )));
            }
        }
        if let Some(mutation) = genealogy.mutations.iter().find(|m| m.node >= n) {
            return Err(inconsistent(&format!(
                "mutation on unknown node {}",
                mutation.node
            )));
        }
        Ok(genealogy)
    }
}

fn inconsistent(message: &str) -> VgsimError {
    VgsimError::TreeConsistencyError(format!("Invalid flat genealogy: {message}"))
}
