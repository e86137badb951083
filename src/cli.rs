use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the action space of a grammar
    Actions {
        #[command(flatten)]
        grammar: GrammarArgs,

        /// Print the action space as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the action sequence that derives each text
    Convert {
        #[command(flatten)]
        grammar: GrammarArgs,

        /// Texts to convert
        #[arg(required = true, value_name = "TEXT")]
        texts: Vec<String>,

        /// Print one JSON object per text
        #[arg(long)]
        json: bool,
    },

    /// Print random legal derivations
    Sample {
        #[command(flatten)]
        grammar: GrammarArgs,

        /// Amount to generate (default: 1)
        #[arg(short = 'n', long, value_name = "AMOUNT")]
        amount: Option<u32>,

        /// Give up on a derivation after this many actions
        #[arg(long, value_name = "STEPS", default_value_t = 200)]
        max_steps: usize,

        /// Seed for reproducible samples
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Args)]
pub struct GrammarArgs {
    /// File containing the grammar
    pub file: PathBuf,

    /// Start symbol (default: first in the file)
    #[arg(short, long, value_name = "SYMBOL")]
    pub start: Option<String>,

    /// JSON file mapping each table to its columns
    #[arg(short, long, value_name = "FILE")]
    pub tables: Option<PathBuf>,

    /// String value to add to the grammar
    #[arg(long = "string", value_name = "VALUE")]
    pub strings: Vec<String>,

    /// Number value to add to the grammar
    #[arg(long = "number", value_name = "VALUE")]
    pub numbers: Vec<String>,

    /// Sort added values instead of keeping them in the order given
    #[arg(long)]
    pub sorted: bool,

    /// Also offer the numbers 0 and 1 when the grammar has numbers
    #[arg(long)]
    pub default_numbers: bool,
}
