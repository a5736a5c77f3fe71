use clap::{Args, Parser, Subcommand};
use locex_experiment::{RunConfig, TrialOrder};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "locex")]
#[command(about = "Spatial-audio localization experiments")]
#[command(version)]
pub struct Cli {
    /// Config file (default: <config dir>/locex/config.toml)
    #[arg(long, global = true, env = "LOCEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend base URL, e.g. http://localhost:8080/api
    #[arg(long, global = true, env = "LOCEX_API_URL")]
    pub api_url: Option<String>,

    #[arg(long, global = true, env = "LOCEX_USERNAME")]
    pub username: Option<String>,

    #[arg(long, global = true, env = "LOCEX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run an experiment in the stage window
    Run(RunArgs),
    /// Check or establish a backend session
    Auth {
        #[command(subcommand)]
        action: AuthCommand,
    },
    /// Manage experiments
    Experiments {
        #[command(subcommand)]
        action: ExperimentCommand,
    },
    /// Manage audio samples
    Samples {
        #[command(subcommand)]
        action: SampleCommand,
    },
    /// Inspect and export stored results
    Results {
        #[command(subcommand)]
        action: ResultCommand,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    pub experiment_id: String,

    /// Reveal the true direction after each answer
    #[arg(long)]
    pub training: bool,

    /// Name recorded with the results (default: the signed-in user)
    #[arg(long)]
    pub user: Option<String>,

    /// Ask for confirmation before the first trial
    #[arg(long)]
    pub pre_roll: bool,

    /// Present samples in random order
    #[arg(long)]
    pub shuffle: bool,

    /// Seed for a reproducible shuffle (implies --shuffle)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run without opening an audio device
    #[arg(long)]
    pub no_audio: bool,

    /// Open a regular window instead of fullscreen
    #[arg(long)]
    pub windowed: bool,
}

impl RunArgs {
    /// Flags only ever switch options on; the config file supplies the rest.
    pub fn apply(&self, config: &mut RunConfig) {
        if self.training {
            config.training_mode = true;
        }
        if self.pre_roll {
            config.pre_roll = true;
        }
        if self.seed.is_some() {
            config.order = TrialOrder::Shuffled { seed: self.seed };
        } else if self.shuffle {
            config.order = TrialOrder::Shuffled { seed: None };
        }
    }
}

#[derive(Debug, PartialEq, Subcommand)]
pub enum AuthCommand {
    /// Show who the backend thinks we are
    Status,
    /// Sign in with --username/--password
    Login,
    /// End the backend session
    Logout,
}

#[derive(Debug, Subcommand)]
pub enum ExperimentCommand {
    List,
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        name: String,
        /// Sample ids in trial order
        #[arg(long = "sample", required = true)]
        samples: Vec<String>,
        #[arg(long)]
        public: bool,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SampleCommand {
    List,
    Upload {
        #[arg(long)]
        name: String,
        #[arg(long, allow_negative_numbers = true)]
        azimuth: f32,
        #[arg(long, allow_negative_numbers = true)]
        elevation: f32,
        file: PathBuf,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ResultCommand {
    /// Print stored runs with sample names
    Show { id: String },
    /// Write the delimited results file
    Export {
        id: String,
        #[arg(long, default_value = "experiment_results.txt")]
        out: PathBuf,
    },
}
