//! Compare command implementation.

use anyhow::Result;
use console::style;
use qupath_tree::BuildStrategy;

use super::PathArgs;
use super::common::{load_config, new_spst};

/// Execute the compare command: build the path with every strategy.
pub fn execute(args: &PathArgs, verbose: u8) -> Result<()> {
    let config = load_config(args, verbose)?;
    let costs = config.costs();

    println!(
        "{} {} links",
        style("Strategy comparison:").bold(),
        config.path.len()
    );
    println!();
    println!(
        "  {:<10} {:>10} {:>12} {:>8}",
        "strategy", "fidelity", "cost", "height"
    );
    for strategy in BuildStrategy::IMPLEMENTED {
        let mut spst = new_spst(&config)?;
        let root = spst.build(strategy, costs.as_deref())?;
        let (fidelity, cost) = spst.root_state()?;
        println!(
            "  {:<10} {:>10.6} {:>12.4} {:>8}",
            strategy.name(),
            fidelity,
            cost,
            spst.tree().height(root)
        );
    }
    Ok(())
}
