use clap::Parser;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = None,
    name = "vgsim",
)]
pub struct Args {
    /// Path to rate table (CSV with columns population,birth,death,sampling,mutation).
    #[clap(required_unless_present = "settings")]
    pub rates: Option<String>,

    /// Path to settings (YAML) of a previous run, replacing all model tables.
    #[clap(long)]
    pub settings: Option<String>,

    /// Maximal number of events to simulate.
    #[clap(short, long, default_value_t = 1000)]
    pub iterations: usize,

    /// Number of samples after which the simulation stops [default: iterations].
    #[clap(short, long)]
    pub sample_size: Option<usize>,

    /// Paths to population table and migration matrix (both CSV).
    #[clap(long, num_args = 2, value_names = ["POPULATIONS", "MIGRATION"])]
    pub population_model: Option<Vec<String>>,

    /// Path to susceptibility classes (CSV with columns multiplier,recovery_class).
    #[clap(long)]
    pub susceptibility: Option<String>,

    /// Path to susceptibility transition matrix (CSV).
    #[clap(long)]
    pub suscep_transition: Option<String>,

    /// Seed of the random number generator [default: random].
    #[clap(long)]
    pub seed: Option<u64>,

    /// Number of simulated genome sites.
    #[clap(long, default_value_t = 1)]
    pub sites: usize,

    /// Site whose mutations mark functional lineages.
    #[clap(long, default_value_t = 0)]
    pub tracked_site: usize,

    /// Upper edges of the sample fraction bins.
    #[clap(long, value_delimiter = ',', num_args = 1..)]
    pub fraction_bins: Option<Vec<f64>>,

    /// Write the genealogy in newick format.
    #[clap(long)]
    pub create_newick: bool,

    /// Write the mutations of the genealogy.
    #[clap(long)]
    pub write_mutations: bool,

    /// Write the event log.
    #[clap(long)]
    pub write_events: bool,

    /// Dismember the genealogy and write event tables and sample fractions.
    #[clap(long)]
    pub tree_dismember: bool,

    /// Number of independent replicates with consecutive seeds.
    #[clap(long, default_value_t = 1)]
    pub replicates: usize,

    /// Number of threads for parallel replicates.
    #[clap(long)]
    pub threads: Option<usize>,

    /// Output directory.
    #[clap(long, default_value = ".")]
    pub outdir: String,

    /// Prefix of output files.
    #[clap(long, default_value = "vgsim")]
    pub name: String,

    /// Path to log file.
    #[clap(long, default_value = "vgsim.log")]
    pub log_file: String,

    /// Verbosity of the log.
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable progress bar.
    #[clap(long)]
    pub disable_progress_bar: bool,
}
