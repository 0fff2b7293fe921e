use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::consts::START_FEN;

#[derive(Parser, Debug)]
#[command(name = env!("CARGO_PKG_NAME"), version = env!("TANDEM_VERSION"), about = env!("CARGO_PKG_DESCRIPTION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search a position and print the best move
    Search {
        /// FEN string for the position
        #[arg(short, long, default_value = START_FEN)]
        fen: String,
        /// Maximum search depth
        #[arg(short, long)]
        depth: Option<u8>,
        /// Time budget in milliseconds
        #[arg(short, long)]
        time: Option<u64>,
        /// Node budget
        #[arg(short, long)]
        nodes: Option<u64>,
        /// Number of search threads, overrides the config file
        #[arg(short = 'j', long)]
        threads: Option<usize>,
        /// Hash size in MB, overrides the config file
        #[arg(long)]
        hash: Option<usize>,
        /// TOML file with a search configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Log search internals at debug level
        #[arg(short, long, default_value = "false")]
        verbose: bool,
    },

    /// Run perft on a position
    Perft {
        /// FEN string for the position
        #[arg(short, long, default_value = START_FEN)]
        fen: String,
        #[arg(short, long, default_value = "5")]
        depth: u8,
        /// Print the node count below every root move
        #[arg(long, default_value = "false")]
        divide: bool,
    },

    /// Search a fixed set of positions and report nodes and speed
    Bench {
        #[arg(short, long, default_value = "8")]
        depth: u8,
        #[arg(short = 'j', long, default_value = "1")]
        threads: usize,
        #[arg(long, default_value = "64")]
        hash: usize,
    },
}
