use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "enduro",
    about = "A time-discrete endurance race simulator with strategic decisions"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging
    #[clap(short, long)]
    pub debug: bool,

    /// Simulate in real time instead of as fast as possible
    #[clap(short, long)]
    pub realtime: bool,

    /// Answer decisions on the console instead of using the autopilot
    #[clap(short, long)]
    pub interactive: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set path to the race parameter file (JSON)
    #[clap(short, long)]
    pub parfile_path: PathBuf,

    /// Set real-time factor (only relevant in real-time mode)
    #[clap(short = 'f', long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set simulation timestep size in seconds, should be in the range [0.001, 1.0]
    #[clap(short, long, default_value = "0.1")]
    pub timestep_size: f64,

    /// Override the random seed of the parameter file
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Write the lap and race time tables to this text file
    #[clap(short, long)]
    pub output_path: Option<PathBuf>,

    /// Export the lap times as CSV to this file
    #[clap(short = 'c', long)]
    pub csv_path: Option<PathBuf>,
}
