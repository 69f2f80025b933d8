//! Solve command implementation.

use anyhow::Result;
use console::style;
use qupath_phys::{Cost, ExpCost, NodeId};
use qupath_tree::{PathSolver, TreeSolver, alloc};
use serde::Serialize;
use tracing::info;

use super::PathArgs;
use super::common::{load_config, new_spst};

/// One row of the allocation report.
#[derive(Debug, Serialize)]
struct AllocationRow {
    from: NodeId,
    to: NodeId,
    pairs: Cost,
    expected_attempts: ExpCost,
}

/// Allocation report printed with `--json`.
#[derive(Debug, Serialize)]
struct Report {
    fidelity: f64,
    cost: f64,
    purifications: usize,
    links: Vec<AllocationRow>,
}

/// Execute the solve command.
pub fn execute(
    args: &PathArgs,
    verbose: u8,
    target: Option<f64>,
    max_purifications: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut config = load_config(args, verbose)?;
    if let Some(t) = target {
        config.solver.target_fidelity = t;
    }
    if let Some(m) = max_purifications {
        config.solver.max_purifications = m;
    }
    config.validate()?;

    let mut solver = TreeSolver::new(new_spst(&config)?, config.solver_config());
    if let Some(costs) = config.costs() {
        solver = solver.with_costs(costs);
    }
    let expected = solver.solve()?;
    let spst = solver.spst();
    let pairs = spst.allocation()?;
    let (fidelity, cost) = spst.root_state()?;
    info!(
        purifications = solver.purifications(),
        fidelity, cost, "Solver finished"
    );

    let report = Report {
        fidelity,
        cost,
        purifications: solver.purifications(),
        links: expected
            .iter()
            .map(|(edge, &attempts)| AllocationRow {
                from: edge.start(),
                to: edge.end(),
                pairs: pairs.get(edge).copied().unwrap_or(0),
                expected_attempts: attempts,
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} fidelity {} after {} purifications",
        style("Solved:").green().bold(),
        style(format!("{fidelity:.6}")).green(),
        report.purifications
    );
    println!();
    println!("  {:<10} {:>8} {:>16}", "link", "pairs", "exp. attempts");
    for row in &report.links {
        println!(
            "  {:<10} {:>8} {:>16.4}",
            format!("{}-{}", row.from, row.to),
            row.pairs,
            row.expected_attempts
        );
    }
    println!(
        "  {:<10} {:>8} {:>16.4}",
        "total",
        alloc::total_pairs(&pairs),
        alloc::total_expected(&expected)
    );
    Ok(())
}
