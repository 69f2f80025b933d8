//! qupath command-line interface
//!
//! Builds swap-purification scheme trees for a repeater path, runs the
//! greedy purification solver and evaluates single operations.
//!
//! ```text
//! qupath tree     --config path.yaml [--strategy st_opt] [--scores] [--dot]
//! qupath solve    --config path.yaml [--target 0.95] [--json]
//! qupath compare  --fids 0.95,0.9,0.97
//! qupath ops      purify 0.9 0.9 --representation werner --hardware low
//! qupath presets
//! ```

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::{Parser, Subcommand};
use console::style;

mod commands;
mod config;
mod logging;

use commands::{PathArgs, compare, ops, presets, solve, tree};

/// qupath - entanglement distribution planning for quantum repeater paths
#[derive(Parser)]
#[command(name = "qupath")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the initial scheme tree and print it
    Tree {
        #[command(flatten)]
        path: PathArgs,

        /// Override the build strategy (linked, balanced, st_opt)
        #[arg(short, long)]
        strategy: Option<String>,

        /// Compute gradients and efficiency scores for every node
        #[arg(long)]
        scores: bool,

        /// Print the tree in Graphviz DOT format instead of text
        #[arg(long)]
        dot: bool,
    },

    /// Purify greedily until the target fidelity is reached
    Solve {
        #[command(flatten)]
        path: PathArgs,

        /// Override the target end-to-end fidelity
        #[arg(short, long)]
        target: Option<f64>,

        /// Override the purification budget
        #[arg(long)]
        max_purifications: Option<usize>,

        /// Print the allocation as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare the build strategies on one path
    Compare {
        #[command(flatten)]
        path: PathArgs,
    },

    /// Evaluate a single swap or purify
    Ops {
        /// Operation (swap, purify)
        op: String,

        /// First operand fidelity
        f1: f64,

        /// Second operand fidelity
        f2: f64,

        /// Entanglement representation (dephased, werner)
        #[arg(short, long, default_value = "werner")]
        representation: String,

        /// Hardware preset (perfect, high, medium, low)
        #[arg(long, default_value = "perfect")]
        hardware: String,
    },

    /// List the hardware presets
    Presets,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Tree {
            path,
            strategy,
            scores,
            dot,
        } => tree::execute(&path, cli.verbose, strategy.as_deref(), scores, dot),

        Commands::Solve {
            path,
            target,
            max_purifications,
            json,
        } => solve::execute(&path, cli.verbose, target, max_purifications, json),

        Commands::Compare { path } => compare::execute(&path, cli.verbose),

        Commands::Ops {
            op,
            f1,
            f2,
            representation,
            hardware,
        } => logging::init_default(cli.verbose)
            .and_then(|()| ops::execute(&op, f1, f2, &representation, &hardware)),

        Commands::Presets => {
            presets::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
