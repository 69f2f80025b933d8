//! Tree command implementation.

use anyhow::Result;
use console::style;
use qupath_tree::{BuildStrategy, Spst};
use tracing::info;

use super::PathArgs;
use super::common::{load_config, new_spst};

/// Execute the tree command.
pub fn execute(
    args: &PathArgs,
    verbose: u8,
    strategy: Option<&str>,
    scores: bool,
    dot: bool,
) -> Result<()> {
    let mut config = load_config(args, verbose)?;
    if let Some(s) = strategy {
        config.build.strategy = s.parse()?;
    }

    let mut spst = new_spst(&config)?;
    let costs = config.costs();
    let root = spst.build(config.build.strategy, costs.as_deref())?;
    info!(strategy = %config.build.strategy, links = spst.edges().len(), "Tree built");

    if scores {
        spst.grad_root()?;
        spst.calc_efficiency(root)?;
    }

    if dot {
        print!("{}", spst.tree().to_dot(root));
        return Ok(());
    }

    print_summary(&spst, config.build.strategy)?;
    println!();
    print!("{spst}");

    if scores {
        println!();
        print_scores(&spst)?;
    }
    Ok(())
}

fn print_summary(spst: &Spst, strategy: BuildStrategy) -> Result<()> {
    let (fidelity, cost) = spst.root_state()?;
    println!(
        "{} {} links, strategy {}",
        style("Scheme tree:").bold(),
        spst.edges().len(),
        style(strategy).cyan()
    );
    println!("  fidelity  {}", style(format!("{fidelity:.6}")).green());
    println!("  cost      {cost:.4}");
    Ok(())
}

fn print_scores(spst: &Spst) -> Result<()> {
    let root = spst.root_index()?;
    println!(
        "  {:<8} {:<10} {:>10} {:>12} {:>12} {:>12}",
        "node", "edge", "fidelity", "grad f", "efficiency", "adjusted"
    );
    for i in spst.tree().preorder(root) {
        let node = spst.node(i)?;
        println!(
            "  {:<8} {:<10} {:>10.6} {:>12.6} {:>12.6} {:>12.6}",
            format!("{}{}", node.op().map_or('L', |op| op.tag()), node.id),
            node.edge.to_string(),
            node.fidelity,
            node.grad.fidelity,
            node.efficiency,
            node.adjusted_efficiency
        );
    }
    Ok(())
}
