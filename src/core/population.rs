//! Population module
//!
//! The population module contains the `PopulationState`, the mutable state the simulation
//! engine advances. It is a set of `Compartment`s, one per host population, together with
//! the migration rates between them. Each compartment keeps its susceptible hosts as counts
//! per susceptibility class and its infected hosts as the ids of the lineages infecting them,
//! such that a uniformly random infected host can be drawn in constant time.
//!

use super::lineage::LineageId;
use super::lockdown::{LockdownPolicy, Regime, RegimeMultipliers};
use crate::config::{PopulationModel, SquareMatrix, SusceptibilityModel};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompartmentCounters {
    pub births: usize,
    pub deaths: usize,
    pub samples: usize,
    pub migrations_out: usize,
    pub migrations_in: usize,
    pub transitions: usize,
}

#[derive(Debug, Clone)]
pub struct Compartment {
    size: u64,
    susceptible: Vec<u64>,
    live: Vec<Vec<LineageId>>,
    lockdown: LockdownPolicy,
    counters: CompartmentCounters,
}

impl Compartment {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn susceptible(&self, class: usize) -> u64 {
        self.susceptible[class]
    }

    pub fn infected(&self) -> u64 {
        self.live.iter().map(|lineages| lineages.len() as u64).sum()
    }

    pub fn infected_in_class(&self, class: usize) -> u64 {
        self.live[class].len() as u64
    }

    pub fn live(&self, class: usize) -> &[LineageId] {
        &self.live[class]
    }

    /// Susceptible hosts weighted by the multiplier of their class.
    pub fn weighted_susceptible(&self, susceptibility: &SusceptibilityModel) -> f64 {
        self.susceptible
            .iter()
            .enumerate()
            .map(|(class, &count)| susceptibility.multiplier(class) * count as f64)
            .sum()
    }

    /// Probability that a contact of an infected host reaches a host that can be infected.
    pub fn susceptible_fraction(&self, susceptibility: &SusceptibilityModel) -> f64 {
        self.weighted_susceptible(susceptibility) / self.size as f64
    }

    pub fn regime(&self) -> Regime {
        self.lockdown.regime()
    }

    pub fn multipliers(&self) -> RegimeMultipliers {
        self.lockdown.multipliers()
    }

    pub fn lockdown(&self) -> &LockdownPolicy {
        &self.lockdown
    }

    pub fn counters(&self) -> &CompartmentCounters {
        &self.counters
    }

    /// Find the infected host with the given index, counting through all classes.
    pub fn nth_live(&self, mut index: usize) -> Option<(usize, LineageId)> {
        for (class, lineages) in self.live.iter().enumerate() {
            if index < lineages.len() {
                return Some((class, lineages[index]));
            }
            index -= lineages.len();
        }
        None
    }

    fn update_lockdown(&mut self) -> Option<Regime> {
        let infected = self.infected();
        self.lockdown.update(infected, self.size)
    }
}

/// Owned state of all host populations.
#[derive(Debug, Clone)]
pub struct PopulationState {
    compartments: Vec<Compartment>,
    migration: SquareMatrix<f64>,
    // position of each live lineage in its compartment's live list
    slots: Vec<usize>,
}

impl PopulationState {
    /// Create the state with all hosts susceptible in class 0, except for the infected ones,
    /// which are registered later through `infect_founder`.
    pub fn new(population_model: &PopulationModel, n_classes: usize) -> Self {
        let compartments = population_model
            .populations
            .iter()
            .map(|config| {
                let mut susceptible = vec![0; n_classes];
                susceptible[0] = config.size;
                Compartment {
                    size: config.size,
                    susceptible,
                    live: vec![Vec::new(); n_classes],
                    lockdown: LockdownPolicy::new(config),
                    counters: CompartmentCounters::default(),
                }
            })
            .collect();
        Self {
            compartments,
            migration: population_model.migration.clone(),
            slots: Vec::new(),
        }
    }

    pub fn compartments(&self) -> &[Compartment] {
        &self.compartments
    }

    pub fn compartment(&self, population: usize) -> &Compartment {
        &self.compartments[population]
    }

    pub fn n_populations(&self) -> usize {
        self.compartments.len()
    }

    pub fn migration_rate(&self, source: usize, target: usize) -> f64 {
        if source == target {
            return 0.;
        }
        *self.migration.get(source, target)
    }

    pub fn infected(&self) -> u64 {
        self.compartments.iter().map(|c| c.infected()).sum()
    }

    pub fn is_extinct(&self) -> bool {
        self.compartments.iter().all(|c| c.infected() == 0)
    }

    /// Every host is either susceptible or infected, in every compartment.
    pub fn hosts_conserved(&self) -> bool {
        self.compartments
            .iter()
            .all(|c| c.susceptible.iter().sum::<u64>() + c.infected() == c.size)
    }

    pub fn infect_founder(&mut self, population: usize, class: usize, lineage: LineageId) {
        self.infect(population, class, lineage);
    }

    pub fn birth(&mut self, population: usize, class: usize, child: LineageId) {
        self.infect(population, class, child);
        self.compartments[population].counters.births += 1;
    }

    pub fn migration(&mut self, source: usize, target: usize, class: usize, child: LineageId) {
        self.infect(target, class, child);
        self.compartments[source].counters.migrations_out += 1;
        self.compartments[target].counters.migrations_in += 1;
    }

    pub fn death(
        &mut self,
        population: usize,
        class: usize,
        lineage: LineageId,
        susceptibility: &SusceptibilityModel,
    ) {
        self.recover(population, class, lineage, susceptibility);
        self.compartments[population].counters.deaths += 1;
    }

    pub fn sampling(
        &mut self,
        population: usize,
        class: usize,
        lineage: LineageId,
        susceptibility: &SusceptibilityModel,
    ) {
        self.recover(population, class, lineage, susceptibility);
        self.compartments[population].counters.samples += 1;
    }

    pub fn transition(&mut self, population: usize, from: usize, to: usize, lineage: LineageId) {
        self.remove_live(population, from, lineage);
        self.insert_live(population, to, lineage);
        self.compartments[population].counters.transitions += 1;
    }

    /// Re-evaluate the lockdown policy of a population after its infected count changed.
    pub fn update_lockdown(&mut self, population: usize) -> Option<Regime> {
        self.compartments[population].update_lockdown()
    }

    fn infect(&mut self, population: usize, class: usize, lineage: LineageId) {
        let compartment = &mut self.compartments[population];
        debug_assert!(compartment.susceptible[class] > 0);
        compartment.susceptible[class] -= 1;
        self.insert_live(population, class, lineage);
    }

    fn recover(
        &mut self,
        population: usize,
        class: usize,
        lineage: LineageId,
        susceptibility: &SusceptibilityModel,
    ) {
        self.remove_live(population, class, lineage);
        let recovery_class = susceptibility.recovery_class(class);
        self.compartments[population].susceptible[recovery_class] += 1;
    }

    fn insert_live(&mut self, population: usize, class: usize, lineage: LineageId) {
        let live = &mut self.compartments[population].live[class];
        if lineage.index() >= self.slots.len() {
            self.slots.resize(lineage.index() + 1, 0);
        }
        self.slots[lineage.index()] = live.len();
        live.push(lineage);
    }

    fn remove_live(&mut self, population: usize, class: usize, lineage: LineageId) {
        let live = &mut self.compartments[population].live[class];
        let slot = self.slots[lineage.index()];
        debug_assert_eq!(live[slot], lineage);
        live.swap_remove(slot);
        if let Some(&moved) = live.get(slot) {
            self.slots[moved.index()] = slot;
        }
    }
}
