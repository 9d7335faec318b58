//! Stochastic birth-death simulation of structured host populations.
//!
//! The `Simulation` owns the population state, the event log and the random
//! number generator of a run. Every step draws the time to the next event from
//! the aggregate rate of all event categories and picks the category in
//! proportion to its rate.

use std::fmt;

use indicatif::ProgressBar;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Exp;

use crate::config::{PopulationModel, RateModel};
use crate::core::{
    Ancestry, Event, EventKind, EventLog, Founder, Genealogy, LineageId, PopulationState, Regime,
};
use crate::errors::{Result, VgsimError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    IterationLimit,
    SampleTarget,
    Extinction,
    /// Lineages are alive but no event can happen anymore.
    Stalled,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::IterationLimit => write!(f, "iteration limit"),
            Termination::SampleTarget => write!(f, "sample target"),
            Termination::Extinction => write!(f, "extinction"),
            Termination::Stalled => write!(f, "stalled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationOutcome {
    pub termination: Termination,
    pub events: usize,
    pub samples: usize,
    pub time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LockdownSwitch {
    pub time: f64,
    pub population: usize,
    pub regime: Regime,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Category {
    Birth(usize),
    Death(usize),
    Sampling(usize),
    Migration { source: usize, target: usize },
    Transition { population: usize, from: usize, to: usize },
}

pub struct Simulation {
    rate_model: RateModel,
    state: PopulationState,
    log: EventLog,
    rng: StdRng,
    seed: u64,
    time: f64,
    next_lineage: usize,
    samples: usize,
    categories: Vec<Category>,
    rates: Vec<f64>,
    class_weights: Vec<f64>,
    lockdown_history: Vec<LockdownSwitch>,
    termination: Option<Termination>,
}

impl Simulation {
    /// Set up a run with all founders alive at time zero.
    ///
    /// Founders are infected hosts of susceptibility class 0 and receive the
    /// first lineage ids, population by population.
    pub fn new(rate_model: RateModel, population_model: PopulationModel, seed: u64) -> Result<Self> {
        rate_model.validate()?;
        population_model.validate()?;
        if rate_model.n_population_rates() > population_model.n_populations() {
            return Err(VgsimError::ConfigurationError(format!(
                "Rates are given for {} populations but only {} populations exist",
                rate_model.n_population_rates(),
                population_model.n_populations()
            )));
        }

        let susceptibility = rate_model.susceptibility();
        let n_classes = susceptibility.n_classes();
        let n_populations = population_model.n_populations();
        let mut state = PopulationState::new(&population_model, n_classes);

        let mut founders = Vec::new();
        for (population, config) in population_model.populations.iter().enumerate() {
            for _ in 0..config.infected {
                let lineage = LineageId(founders.len());
                state.infect_founder(population, 0, lineage);
                founders.push(Founder {
                    lineage,
                    population,
                    class: 0,
                });
            }
        }

        let mut categories = Vec::new();
        for population in 0..n_populations {
            categories.push(Category::Birth(population));
            categories.push(Category::Death(population));
            categories.push(Category::Sampling(population));
        }
        for source in 0..n_populations {
            for target in 0..n_populations {
                if state.migration_rate(source, target) > 0. {
                    categories.push(Category::Migration { source, target });
                }
            }
        }
        for population in 0..n_populations {
            for from in 0..n_classes {
                for to in 0..n_classes {
                    if susceptibility.transition_rate(from, to) > 0. {
                        categories.push(Category::Transition {
                            population,
                            from,
                            to,
                        });
                    }
                }
            }
        }

        let mut simulation = Self {
            rate_model,
            state,
            next_lineage: founders.len(),
            log: EventLog::new(founders),
            rng: StdRng::seed_from_u64(seed),
            seed,
            time: 0.,
            samples: 0,
            rates: vec![0.; categories.len()],
            categories,
            class_weights: vec![0.; n_classes],
            lockdown_history: Vec::new(),
            termination: None,
        };
        for population in 0..n_populations {
            simulation.update_lockdown(population);
        }
        Ok(simulation)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn state(&self) -> &PopulationState {
        &self.state
    }

    pub fn rate_model(&self) -> &RateModel {
        &self.rate_model
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn lockdown_history(&self) -> &[LockdownSwitch] {
        &self.lockdown_history
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// Run until the log holds `iterations` events, `sample_size` lineages are
    /// sampled or no further event can happen.
    pub fn simulate(&mut self, iterations: usize, sample_size: usize) -> SimulationOutcome {
        self.run(iterations, sample_size, None)
    }

    pub fn simulate_with_progress(
        &mut self,
        iterations: usize,
        sample_size: usize,
        progress: &ProgressBar,
    ) -> SimulationOutcome {
        self.run(iterations, sample_size, Some(progress))
    }

    fn run(
        &mut self,
        iterations: usize,
        sample_size: usize,
        progress: Option<&ProgressBar>,
    ) -> SimulationOutcome {
        let termination = loop {
            if let Some(termination) = self.step(iterations, sample_size) {
                break termination;
            }
            if let Some(bar) = progress {
                bar.set_position(self.log.len() as u64);
            }
        };

        self.termination = Some(termination);
        log::info!(
            "Simulation stopped by {termination} at time {} after {} events with {} samples",
            self.time,
            self.log.len(),
            self.samples
        );
        if let Some(bar) = progress {
            bar.set_position(self.log.len() as u64);
            bar.set_message(format!("{termination}"));
        }

        SimulationOutcome {
            termination,
            events: self.log.len(),
            samples: self.samples,
            time: self.time,
        }
    }

    /// Apply the next event, or report why the run has to stop.
    pub(crate) fn step(&mut self, iterations: usize, sample_size: usize) -> Option<Termination> {
        if self.samples >= sample_size {
            return Some(Termination::SampleTarget);
        }
        if self.log.len() >= iterations {
            return Some(Termination::IterationLimit);
        }
        if self.state.is_extinct() {
            return Some(Termination::Extinction);
        }

        self.update_rates();
        let total: f64 = self.rates.iter().sum();
        if total <= 0. || !total.is_finite() {
            return Some(Termination::Stalled);
        }
        let waiting = match Exp::new(total) {
            Ok(exp) => exp.sample(&mut self.rng),
            Err(_) => return Some(Termination::Stalled),
        };
        let target = self.rng.random::<f64>() * total;
        let Some(category) = choose_category(&self.rates, target) else {
            return Some(Termination::Stalled);
        };

        self.time += waiting;
        self.apply(self.categories[category]);
        None
    }

    fn update_rates(&mut self) {
        let susceptibility = self.rate_model.susceptibility();
        for (rate, category) in self.rates.iter_mut().zip(self.categories.iter()) {
            *rate = match *category {
                Category::Birth(population) => {
                    let compartment = self.state.compartment(population);
                    self.rate_model.rates(population).birth
                        * compartment.multipliers().contact_density
                        * compartment.infected() as f64
                        * compartment.susceptible_fraction(susceptibility)
                }
                Category::Death(population) => {
                    self.rate_model.rates(population).death
                        * self.state.compartment(population).infected() as f64
                }
                Category::Sampling(population) => {
                    let compartment = self.state.compartment(population);
                    self.rate_model.rates(population).sampling
                        * compartment.multipliers().sampling_multiplier
                        * compartment.infected() as f64
                }
                Category::Migration { source, target } => {
                    self.state.migration_rate(source, target)
                        * self.state.compartment(source).infected() as f64
                        * self
                            .state
                            .compartment(target)
                            .susceptible_fraction(susceptibility)
                }
                Category::Transition {
                    population,
                    from,
                    to,
                } => {
                    susceptibility.transition_rate(from, to)
                        * self.state.compartment(population).infected_in_class(from) as f64
                }
            };
        }
    }

    fn apply(&mut self, category: Category) {
        let kind = match category {
            Category::Birth(population) => {
                let (_, parent) = self.random_live(population);
                let class = self.infected_class(population);
                let child = self.new_lineage();
                self.state.birth(population, class, child);
                EventKind::Birth {
                    parent,
                    child,
                    class,
                }
            }
            Category::Migration { source, target } => {
                let (_, parent) = self.random_live(source);
                let class = self.infected_class(target);
                let child = self.new_lineage();
                self.state.migration(source, target, class, child);
                EventKind::Migration {
                    parent,
                    child,
                    target,
                    class,
                }
            }
            Category::Death(population) => {
                let (class, lineage) = self.random_live(population);
                self.state.death(
                    population,
                    class,
                    lineage,
                    self.rate_model.susceptibility(),
                );
                EventKind::Death { lineage }
            }
            Category::Sampling(population) => {
                let (class, lineage) = self.random_live(population);
                self.state.sampling(
                    population,
                    class,
                    lineage,
                    self.rate_model.susceptibility(),
                );
                self.samples += 1;
                EventKind::Sampling { lineage }
            }
            Category::Transition {
                population,
                from,
                to,
            } => {
                let live = self.state.compartment(population).live(from);
                let lineage = live[self.rng.random_range(0..live.len())];
                self.state.transition(population, from, to, lineage);
                EventKind::SusceptibilityTransition { lineage, class: to }
            }
        };

        let event = Event {
            time: self.time,
            kind,
        };
        log::trace!("{event}");
        self.log.push(event);

        match category {
            Category::Birth(population)
            | Category::Death(population)
            | Category::Sampling(population) => self.update_lockdown(population),
            Category::Migration { target, .. } => self.update_lockdown(target),
            Category::Transition { .. } => {}
        }
    }

    /// Uniformly drawn live lineage of a population with its class.
    ///
    /// Only called for categories with a positive rate, which requires a live
    /// lineage in the population.
    fn random_live(&mut self, population: usize) -> (usize, LineageId) {
        let compartment = self.state.compartment(population);
        let index = self.rng.random_range(0..compartment.infected() as usize);
        match compartment.nth_live(index) {
            Some(live) => live,
            None => unreachable!("population {population} has no live lineage"),
        }
    }

    /// Susceptibility class of a newly infected host of a population.
    fn infected_class(&mut self, population: usize) -> usize {
        let susceptibility = self.rate_model.susceptibility();
        let compartment = self.state.compartment(population);
        for (class, weight) in self.class_weights.iter_mut().enumerate() {
            *weight = susceptibility.multiplier(class) * compartment.susceptible(class) as f64;
        }
        let total: f64 = self.class_weights.iter().sum();
        let target = self.rng.random::<f64>() * total;
        choose_category(&self.class_weights, target).unwrap_or(0)
    }

    fn new_lineage(&mut self) -> LineageId {
        let lineage = LineageId(self.next_lineage);
        self.next_lineage += 1;
        lineage
    }

    fn update_lockdown(&mut self, population: usize) {
        if let Some(regime) = self.state.update_lockdown(population) {
            log::info!(
                "Population {population} switches to {regime} regime at time {}",
                self.time
            );
            self.lockdown_history.push(LockdownSwitch {
                time: self.time,
                population,
                regime,
            });
        }
    }

    /// Reconstruct the genealogy of the sampled lineages and place mutations on it.
    ///
    /// Mutations are drawn from the generator of the simulation, such that a
    /// seed determines both the epidemic and its genealogy. The generator
    /// advances on every call: the tree is the same each time, but the
    /// mutations of a second call differ from those of the first.
    pub fn get_genealogy(&mut self) -> Result<Genealogy> {
        let ancestry = Ancestry::from_log(&self.log)?;
        let mut genealogy = ancestry.build_genealogy();
        genealogy.assign_mutations(&self.rate_model, &mut self.rng)?;
        Ok(genealogy)
    }

    pub fn summary(&self) -> SimulationSummary {
        SimulationSummary {
            seed: self.seed,
            termination: self.termination,
            time: self.time,
            events: self.log.len(),
            samples: self.samples,
            populations: self
                .state
                .compartments()
                .iter()
                .map(|compartment| PopulationSummary {
                    size: compartment.size(),
                    infected: compartment.infected(),
                    births: compartment.counters().births,
                    deaths: compartment.counters().deaths,
                    samples: compartment.counters().samples,
                    migrations_out: compartment.counters().migrations_out,
                    migrations_in: compartment.counters().migrations_in,
                    transitions: compartment.counters().transitions,
                    regime: compartment.regime(),
                    switches: compartment.lockdown().switches(),
                })
                .collect(),
        }
    }
}

/// Index of the category whose share of the cumulative rate contains `target`.
///
/// Categories with zero rate are never chosen. A target at or beyond the total
/// picks the last category with a positive rate.
pub fn choose_category(rates: &[f64], target: f64) -> Option<usize> {
    let mut cumulative = 0.;
    let mut last_positive = None;
    for (index, rate) in rates.iter().enumerate() {
        if *rate <= 0. {
            continue;
        }
        cumulative += rate;
        last_positive = Some(index);
        if target < cumulative {
            return Some(index);
        }
    }
    last_positive
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopulationSummary {
    pub size: u64,
    pub infected: u64,
    pub births: usize,
    pub deaths: usize,
    pub samples: usize,
    pub migrations_out: usize,
    pub migrations_in: usize,
    pub transitions: usize,
    pub regime: Regime,
    pub switches: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSummary {
    pub seed: u64,
    pub termination: Option<Termination>,
    pub time: f64,
    pub events: usize,
    pub samples: usize,
    pub populations: Vec<PopulationSummary>,
}

impl fmt::Display for SimulationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let termination = self
            .termination
            .map_or("not run".to_string(), |t| t.to_string());
        writeln!(f, "seed: {}", self.seed)?;
        writeln!(f, "termination: {termination}")?;
        writeln!(f, "time: {}", self.time)?;
        writeln!(f, "events: {}", self.events)?;
        writeln!(f, "samples: {}", self.samples)?;
        for (index, population) in self.populations.iter().enumerate() {
            writeln!(
                f,
                "population {index}: size={} infected={} births={} deaths={} samples={} \
                 migrations_out={} migrations_in={} transitions={} regime={} switches={}",
                population.size,
                population.infected,
                population.births,
                population.deaths,
                population.samples,
                population.migrations_out,
                population.migrations_in,
                population.transitions,
                population.regime,
                population.switches,
            )?;
        }
        Ok(())
    }
}
