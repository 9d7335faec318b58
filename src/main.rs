use anyhow::Result;
use clap::Parser;

use vgsim::args::Args;
use vgsim::runner::Runner;

fn main() -> Result<()> {
    let args = Args::parse();
    let mut runner = Runner::new(args)?;
    runner.start()
}
