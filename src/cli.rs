use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding config.yaml
    /// (default: $VSPACE_BASE_PATH or ~/.local/share/vspace)
    #[clap(long, global = true)]
    pub config_dir: Option<PathBuf>,

    /// Directory with embedding files, overrides config and $VSPACE_DATA_DIR
    #[clap(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[clap(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Load every space and serve queries over HTTP
    Serve {
        /// Address to bind, overrides config
        #[clap(short, long)]
        listen: Option<String>,
    },

    /// List loaded spaces
    Spaces {},

    /// Complete a token prefix
    Typeahead {
        space: String,
        q: String,
    },

    /// Nearest neighbours of a token, laid out in 2-D
    Nearest {
        space: String,
        q: String,

        /// Number of neighbours
        #[clap(short)]
        n: Option<usize>,
    },

    /// Lay out the given tokens in 2-D
    Dist {
        space: String,

        #[clap(required = true)]
        q: Vec<String>,
    },

    /// Nearest neighbours of a token with similarity scores
    Sim {
        space: String,
        q: String,

        /// Number of neighbours
        #[clap(short)]
        n: Option<usize>,
    },

    /// Similarity of every token after the first to the first one
    SimMultiple {
        space: String,

        #[clap(required = true)]
        q: Vec<String>,
    },

    /// Similarity of a token to randomly sampled tokens
    SimRandom {
        space: String,
        q: String,

        /// Sample size
        #[clap(short)]
        n: Option<usize>,

        /// Seed for a reproducible sample
        #[clap(long)]
        seed: Option<u64>,
    },

    /// Randomly sampled tokens
    Random {
        space: String,

        /// Sample size
        #[clap(short)]
        n: Option<usize>,

        /// Seed for a reproducible sample
        #[clap(long)]
        seed: Option<u64>,
    },
}
