//! This module contains the Ancestry arena and the genealogy reconstruction.
//!
//! The Ancestry replays an event log into one record per lineage, indexed by
//! lineage id. From these records the genealogy of the sampled lineages is
//! reconstructed: every lineage that has sampled descendants contributes one
//! coalescence node per kept child, placed at the birth time of that child.

use smallvec::SmallVec;

use super::events::{EventKind, EventLog};
use super::genealogy::{Genealogy, Node, NodeId};
use super::lineage::{Fate, Lineage, LineageId};
use crate::errors::{Result, VgsimError};

#[derive(Debug, Clone, Default)]
pub struct Ancestry {
    lineages: Vec<Lineage>,
    founders: Vec<LineageId>,
    offspring: Vec<Vec<LineageId>>,
}

impl Ancestry {
    /// Replay an event log into the lineage arena.
    ///
    /// Fails if an event refers to an unknown or terminated lineage, if a new
    /// lineage does not receive the next free id or if time runs backwards.
    pub fn from_log(log: &EventLog) -> Result<Self> {
        let mut ancestry = Self::default();

        for founder in log.founders() {
            ancestry.check_next_id(founder.lineage)?;
            ancestry.lineages.push(Lineage::founder(
                founder.lineage,
                founder.population,
                founder.class,
                0.,
            ));
            ancestry.offspring.push(Vec::new());
            ancestry.founders.push(founder.lineage);
        }

        let mut last_time = 0.;
        for event in log.iter() {
            if event.time < last_time {
                return Err(VgsimError::TreeConsistencyError(format!(
                    "{event} happens before the previous event at {last_time}"
                )));
            }
            last_time = event.time;

            match event.kind {
                EventKind::Birth {
                    parent,
                    child,
                    class,
                } => {
                    let population = ancestry.alive(parent)?.population;
                    ancestry.add_child(parent, child, population, class, event.time)?;
                }
                EventKind::Migration {
                    parent,
                    child,
                    target,
                    class,
                } => {
                    ancestry.alive(parent)?;
                    ancestry.add_child(parent, child, target, class, event.time)?;
                }
                EventKind::Death { lineage } => {
                    ancestry.alive(lineage)?;
                    ancestry.lineages[lineage.index()].terminate(event.time, Fate::Died);
                }
                EventKind::Sampling { lineage } => {
                    ancestry.alive(lineage)?;
                    ancestry.lineages[lineage.index()].terminate(event.time, Fate::Sampled);
                }
                EventKind::SusceptibilityTransition { lineage, class } => {
                    ancestry.alive(lineage)?;
                    ancestry.lineages[lineage.index()].class = class;
                }
            }
        }

        Ok(ancestry)
    }

    pub fn lineages(&self) -> &[Lineage] {
        &self.lineages
    }

    pub fn lineage(&self, id: LineageId) -> Option<&Lineage> {
        self.lineages.get(id.index())
    }

    pub fn founders(&self) -> &[LineageId] {
        &self.founders
    }

    pub fn len(&self) -> usize {
        self.lineages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lineages.is_empty()
    }

    pub fn sampled(&self) -> Vec<LineageId> {
        self.lineages
            .iter()
            .filter(|lineage| lineage.is_sampled())
            .map(|lineage| lineage.id)
            .collect()
    }

    /// Flag every lineage that is sampled or has a sampled descendant.
    pub fn relevant(&self) -> Vec<bool> {
        let mut relevant = vec![false; self.lineages.len()];
        // children always have larger ids than their parents
        for lineage in self.lineages.iter().rev() {
            if lineage.is_sampled() {
                relevant[lineage.id.index()] = true;
            }
            if relevant[lineage.id.index()] {
                if let Some(parent) = lineage.parent {
                    relevant[parent.index()] = true;
                }
            }
        }
        relevant
    }

    /// Reconstruct the genealogy of all sampled lineages.
    ///
    /// The genealogy has no mutations yet. If more than one founder has sampled
    /// descendants, their subtrees are joined by a root at time zero.
    pub fn build_genealogy(&self) -> Genealogy {
        let relevant = self.relevant();
        let mut nodes: Vec<Node> = Vec::new();
        let mut top: Vec<Option<NodeId>> = vec![None; self.lineages.len()];

        for lineage in self.lineages.iter().filter(|lineage| lineage.is_sampled()) {
            top[lineage.id.index()] = Some(nodes.len());
            nodes.push(Node {
                parent: None,
                children: SmallVec::new(),
                time: lineage.end_time.unwrap_or(lineage.birth_time),
                population: lineage.population,
                label: Some(lineage.id),
            });
        }
        let n_leaves = nodes.len();
        if n_leaves == 0 {
            return Genealogy::empty();
        }

        for lineage in self.lineages.iter().rev() {
            let id = lineage.id.index();
            if !relevant[id] {
                continue;
            }
            let mut current = top[id];
            for child in self.offspring[id].iter().rev() {
                let Some(child_top) = top[child.index()] else {
                    continue;
                };
                current = match current {
                    None => Some(child_top),
                    Some(below) => Some(join(
                        &mut nodes,
                        [below, child_top],
                        self.lineages[child.index()].birth_time,
                        lineage.population,
                    )),
                };
            }
            top[id] = current;
        }

        let tops: Vec<(NodeId, usize)> = self
            .founders
            .iter()
            .filter_map(|founder| {
                let population = self.lineages[founder.index()].population;
                top[founder.index()].map(|node| (node, population))
            })
            .collect();

        let root = match tops.as_slice() {
            [(node, _)] => *node,
            [(_, population), ..] => {
                let population = *population;
                let root = nodes.len();
                nodes.push(Node {
                    parent: None,
                    children: tops.iter().map(|(node, _)| *node).collect(),
                    time: 0.,
                    population,
                    label: None,
                });
                for (node, _) in tops.iter() {
                    nodes[*node].parent = Some(root);
                }
                root
            }
            [] => unreachable!("sampled lineages descend from a founder"),
        };

        log::debug!(
            "Reconstructed genealogy with {} leaves and {} nodes",
            n_leaves,
            nodes.len()
        );
        Genealogy::from_parts(nodes, Some(root), n_leaves, 0.)
    }

    fn check_next_id(&self, id: LineageId) -> Result<()> {
        if id.index() != self.lineages.len() {
            return Err(VgsimError::TreeConsistencyError(format!(
                "Lineage {id} created out of sequence, expected id {}",
                self.lineages.len()
            )));
        }
        Ok(())
    }

    fn alive(&self, id: LineageId) -> Result<&Lineage> {
        match self.lineages.get(id.index()) {
            Some(lineage) if lineage.is_alive() => Ok(lineage),
            Some(_) => Err(VgsimError::TreeConsistencyError(format!(
                "Lineage {id} is referenced after it was terminated"
            ))),
            None => Err(VgsimError::TreeConsistencyError(format!(
                "Lineage {id} is referenced before it was created"
            ))),
        }
    }

    fn add_child(
        &mut self,
        parent: LineageId,
        child: LineageId,
        population: usize,
        class: usize,
        time: f64,
    ) -> Result<()> {
        self.check_next_id(child)?;
        self.lineages
            .push(Lineage::descendant(child, parent, population, class, time));
        self.offspring.push(Vec::new());
        self.offspring[parent.index()].push(child);
        Ok(())
    }
}

fn join(nodes: &mut Vec<Node>, children: [NodeId; 2], time: f64, population: usize) -> NodeId {
    let id = nodes.len();
    for child in children {
        nodes[child].parent = Some(id);
    }
    nodes.push(Node {
        parent: None,
        children: SmallVec::from_buf(children),
        time,
        population,
        label: None,
    });
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{Event, Founder};

    fn founder(id: usize, population: usize) -> Founder {
        Founder {
            lineage: LineageId(id),
            population,
            class: 0,
        }
    }

    fn birth(time: f64, parent: usize, child: usize) -> Event {
        Event {
            time,
            kind: EventKind::Birth {
                parent: LineageId(parent),
                child: LineageId(child),
                class: 0,
            },
        }
    }

    fn sampling(time: f64, lineage: usize) -> Event {
        Event {
            time,
            kind: EventKind::Sampling {
                lineage: LineageId(lineage),
            },
        }
    }

    fn death(time: f64, lineage: usize) -> Event {
        Event {
            time,
            kind: EventKind::Death {
                lineage: LineageId(lineage),
            },
        }
    }

    #[test]
    fn reconstruct_tree() {
        // 0 infects 1 at 0.5 and 2 at 1.0, 1 infects 3 at 1.5, 2 dies
        let log = EventLog::from_events(
            vec![founder(0, 0)],
            vec![
                birth(0.5, 0, 1),
                birth(1.0, 0, 2),
                birth(1.5, 1, 3),
                death(2.0, 2),
                sampling(2.5, 3),
                sampling(3.0, 1),
                sampling(4.0, 0),
            ],
        );
        let ancestry = Ancestry::from_log(&log).unwrap();
        assert_eq!(ancestry.relevant(), vec![true, true, false, true]);

        let genealogy = ancestry.build_genealogy();
        assert_eq!(genealogy.n_leaves(), 3);
        assert_eq!(
            genealogy.labels(),
            vec![LineageId(0), LineageId(1), LineageId(3)]
        );
        // a coalescence at 1.5 on lineage 1 and one at 0.5 on lineage 0
        assert_eq!(genealogy.len(), 5);
        assert_eq!(
            genealogy.to_newick(),
            "(0:3.5,(1:1.5,3:1):1):0.5;"
        );
    }

    #[test]
    fn single_sample() {
        let log = EventLog::from_events(
            vec![founder(0, 0)],
            vec![birth(0.5, 0, 1), death(1.0, 0), sampling(2.0, 1)],
        );
        let genealogy = Ancestry::from_log(&log).unwrap().build_genealogy();
        assert_eq!(genealogy.len(), 1);
        assert_eq!(genealogy.to_newick(), "1:2;");
    }

    #[test]
    fn no_samples() {
        let log = EventLog::from_events(vec![founder(0, 0)], vec![death(1.0, 0)]);
        let genealogy = Ancestry::from_log(&log).unwrap().build_genealogy();
        assert!(genealogy.is_empty());
        assert_eq!(genealogy.to_newick(), ";");
    }

    #[test]
    fn founders_joined_at_origin() {
        let log = EventLog::from_events(
            vec![founder(0, 1), founder(1, 0)],
            vec![sampling(1.0, 1), sampling(2.0, 0)],
        );
        let genealogy = Ancestry::from_log(&log).unwrap().build_genealogy();
        let root = genealogy.root().unwrap();
        assert_eq!(genealogy.node(root).time, 0.);
        assert_eq!(genealogy.node(root).population, 1);
        assert_eq!(genealogy.to_newick(), "(0:2,1:1):0;");
    }

    #[test]
    fn inconsistent_logs() {
        let dead_parent = EventLog::from_events(
            vec![founder(0, 0)],
            vec![death(1.0, 0), birth(2.0, 0, 1)],
        );
        assert!(matches!(
            Ancestry::from_log(&dead_parent),
            Err(VgsimError::TreeConsistencyError(_))
        ));

        let unknown = EventLog::from_events(vec![founder(0, 0)], vec![sampling(1.0, 4)]);
        assert!(Ancestry::from_log(&unknown).is_err());

        let skipped_id =
            EventLog::from_events(vec![founder(0, 0)], vec![birth(1.0, 0, 2)]);
        assert!(Ancestry::from_log(&skipped_id).is_err());

        let backwards = EventLog::from_events(
            vec![founder(0, 0)],
            vec![birth(1.0, 0, 1), sampling(0.5, 1)],
        );
        assert!(Ancestry::from_log(&backwards).is_err());
    }

    #[test]
    fn migration_sets_population() {
        let log = EventLog::from_events(
            vec![founder(0, 0)],
            vec![
                Event {
                    time: 1.0,
                    kind: EventKind::Migration {
                        parent: LineageId(0),
                        child: LineageId(1),
                        target: 1,
                        class: 0,
                    },
                },
                sampling(2.0, 1),
                sampling(3.0, 0),
            ],
        );
        let genealogy = Ancestry::from_log(&log).unwrap().build_genealogy();
        assert_eq!(genealogy.node(1).population, 1);
        assert_eq!(genealogy.cross_population_edges(), 1);
    }
}
