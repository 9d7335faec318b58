use anyhow::Result;

use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::args::Args;
use crate::config::{
    DEFAULT_FRACTION_BINS, MutationModel, PopulationConfig, PopulationModel, RateModel, Settings,
    SquareMatrix, SusceptibilityClass, SusceptibilityModel,
};
use crate::errors::VgsimError;
use crate::readwrite::{
    EventLogIO, GenealogyIO, RateTable, SampleFractionIO, TableIO, write_event_tables,
};
use crate::simulation::{Simulation, SimulationSummary};
use crate::stats::TreeDismember;

pub struct Runner {
    args: Args,
    settings: Settings,
}

impl Runner {
    pub fn new(args: Args) -> Result<Runner> {
        Self::setup_logger(&args);
        #[cfg(feature = "parallel")]
        Self::setup_rayon(&args);

        let mut settings = match &args.settings {
            Some(path) => Self::load_settings(path)?,
            None => Self::settings_from_tables(&args)?,
        };
        if args.seed.is_some() {
            settings.seed = args.seed;
        }
        log::info!("Loaded settings\n{}", settings);

        Ok(Runner { args, settings })
    }

    pub fn start(&mut self) -> Result<()> {
        let seed = *self.settings.seed.get_or_insert_with(rand::random::<u64>);
        log::info!("Using seed {seed}");

        fs::create_dir_all(&self.args.outdir)?;
        self.settings
            .write_to_file(&self.output_path(&self.args.name, "settings.yaml"))?;

        let start = Instant::now();
        let summaries = self.run_replicates(seed)?;
        for summary in summaries.iter() {
            println!("{summary}");
        }
        log::info!(
            "Finished {} replicates in {:.2?}",
            summaries.len(),
            start.elapsed()
        );
        Ok(())
    }

    /// Setup logging level and file
    fn setup_logger(args: &Args) {
        let log_level = match args.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        simple_logging::log_to_file(args.log_file.as_str(), log_level).unwrap_or_else(|_| {
            eprintln!("Unable to open log file.");
            std::process::exit(1);
        });
    }

    /// Setup rayon thread pool
    #[cfg(feature = "parallel")]
    fn setup_rayon(args: &Args) {
        if let Some(n_threads) = args.threads {
            println!("Setting number of threads to {}.", n_threads);
            rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build_global()
                .unwrap_or_else(|_| {
                    eprintln!("Unable to set number of threads.");
                    std::process::exit(1);
                });
        }
    }

    /// Load settings from file
    fn load_settings(path: &str) -> Result<Settings> {
        let settings: Settings = Settings::read_from_file(path)?;
        Ok(settings)
    }

    /// Assemble settings from the model tables given on the command line.
    fn settings_from_tables(args: &Args) -> Result<Settings> {
        let rates_path = args.rates.as_deref().ok_or_else(|| {
            VgsimError::ConfigurationError("No rate table given".to_string())
        })?;
        let rate_table = RateTable::read(rates_path)?;

        let susceptibility = match (&args.susceptibility, &args.suscep_transition) {
            (Some(classes), transitions) => {
                let classes = Vec::<SusceptibilityClass>::read(classes)?;
                let transitions = transitions
                    .as_deref()
                    .map(SquareMatrix::<f64>::read)
                    .transpose()?;
                SusceptibilityModel::new(classes, transitions)?
            }
            (None, Some(_)) => {
                return Err(VgsimError::ConfigurationError(
                    "Susceptibility transitions need susceptibility classes".to_string(),
                )
                .into());
            }
            (None, None) => SusceptibilityModel::default(),
        };

        let rate_model = RateModel::new(
            rate_table.rates,
            rate_table.population_rates,
            MutationModel::uniform(args.sites),
            susceptibility,
        )?;

        let population_model = match args.population_model.as_deref() {
            Some([populations, migration]) => PopulationModel::new(
                Vec::<PopulationConfig>::read(populations)?,
                SquareMatrix::<f64>::read(migration)?,
            )?,
            Some(_) => {
                return Err(VgsimError::ConfigurationError(
                    "Population model needs a population table and a migration matrix"
                        .to_string(),
                )
                .into());
            }
            None => PopulationModel::single(1),
        };

        let settings = Settings {
            rate_model,
            population_model,
            iterations: args.iterations,
            sample_size: args.sample_size.unwrap_or(args.iterations),
            seed: args.seed,
            tracked_site: args.tracked_site,
            fraction_bins: args
                .fraction_bins
                .clone()
                .unwrap_or_else(|| DEFAULT_FRACTION_BINS.to_vec()),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn output_path(&self, name: &str, extension: &str) -> String {
        Path::new(&self.args.outdir)
            .join(format!("{name}.{extension}"))
            .to_string_lossy()
            .into_owned()
    }

    fn replicate_name(&self, replicate: usize) -> String {
        match self.args.replicates {
            1 => self.args.name.clone(),
            _ => format!("{}_{replicate}", self.args.name),
        }
    }

    fn progress_bar(&self) -> Option<ProgressBar> {
        if self.args.disable_progress_bar || self.args.replicates > 1 {
            return None;
        }
        let bar = ProgressBar::new(self.settings.iterations as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "[{bar:40}] {pos:>7}/{len:7} [{elapsed_precise} / {duration_precise}] {msg}",
                )
                .ok()?
                .progress_chars("=> "),
        );
        Some(bar)
    }

    #[cfg(feature = "parallel")]
    fn run_replicates(&self, seed: u64) -> Result<Vec<SimulationSummary>> {
        (0..self.args.replicates)
            .into_par_iter()
            .map(|replicate| self.run_replicate(replicate, seed.wrapping_add(replicate as u64)))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn run_replicates(&self, seed: u64) -> Result<Vec<SimulationSummary>> {
        (0..self.args.replicates)
            .map(|replicate| self.run_replicate(replicate, seed.wrapping_add(replicate as u64)))
            .collect()
    }

    fn run_replicate(&self, replicate: usize, seed: u64) -> Result<SimulationSummary> {
        let name = self.replicate_name(replicate);
        let start = Instant::now();
        log::info!("Starting replicate {replicate} with seed {seed}");

        let mut simulation = Simulation::new(
            self.settings.rate_model.clone(),
            self.settings.population_model.clone(),
            seed,
        )?;
        match self.progress_bar() {
            Some(bar) => {
                simulation.simulate_with_progress(
                    self.settings.iterations,
                    self.settings.sample_size,
                    &bar,
                );
                bar.finish();
            }
            None => {
                simulation.simulate(self.settings.iterations, self.settings.sample_size);
            }
        }
        log::info!(
            "Simulated replicate {replicate} in {:.2?}",
            start.elapsed()
        );

        let summary = simulation.summary();
        log::info!("Summary of replicate {replicate}\n{summary}");

        if self.args.write_events {
            simulation
                .log()
                .write(&self.output_path(&name, "events.csv"))?;
        }

        if !(self.args.create_newick || self.args.write_mutations || self.args.tree_dismember) {
            return Ok(summary);
        }

        let genealogy = simulation.get_genealogy()?;
        log::info!(
            "Genealogy of replicate {replicate} has {} leaves, {} mutations and {} cross-population edges",
            genealogy.n_leaves(),
            genealogy.mutations().len(),
            genealogy.cross_population_edges()
        );
        if self.args.create_newick {
            genealogy.write_newick(&self.output_path(&name, "nwk"))?;
        }
        if self.args.write_mutations {
            genealogy.write_mutations(&self.output_path(&name, "mutations.tsv"))?;
        }

        if self.args.tree_dismember {
            let dismember = TreeDismember::new(&genealogy, self.settings.tracked_site);
            let (functional, neutral) = dismember.dismember();
            log::info!(
                "Dismembered into {} functional and {} neutral sub-trees",
                functional.len(),
                neutral.len()
            );

            let (functional_tables, neutral_tables) = dismember.event_tables();
            write_event_tables(
                &self.output_path(&name, "event_tables.csv"),
                &functional_tables,
                &neutral_tables,
            )?;

            let fractions = dismember.sample_fraction_table(&self.settings.fraction_bins);
            log::debug!(
                "Sample fractions: {}",
                fractions
                    .iter()
                    .map(|(upper, fraction)| format!("{upper}:{fraction}"))
                    .join(", ")
            );
            fractions.write(&self.output_path(&name, "sample_fraction.csv"))?;
        }

        Ok(summary)
    }
}
