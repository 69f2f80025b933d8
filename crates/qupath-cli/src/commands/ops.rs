//! Ops command implementation.

use anyhow::Result;
use console::style;
use qupath_phys::{EntType, Gate, HardwarePreset, OpKind, Side};

/// Execute the ops command: evaluate one operation and its gradients.
pub fn execute(op: &str, f1: f64, f2: f64, representation: &str, hardware: &str) -> Result<()> {
    let op: OpKind = op.parse()?;
    let ent: EntType = representation.parse()?;
    let preset: HardwarePreset = hardware.parse()?;
    for f in [f1, f2] {
        if !(f > 0.0 && f <= 1.0) {
            anyhow::bail!("fidelity {f} is outside (0, 1]");
        }
    }
    let gate = Gate::new(ent, preset.profile())?;

    let (fidelity, prob) = gate.apply(op, f1, f2);
    println!(
        "{} {op}({f1}, {f2}) with {ent} states on {preset} hardware",
        style("Operation:").bold()
    );
    println!("  fidelity     {}", style(format!("{fidelity:.9}")).green());
    println!("  probability  {prob:.9}");
    println!();
    println!("  {:<6} {:>14} {:>14} {:>14}", "side", "d fid", "d cost/count", "d cost/fid");
    for side in [Side::Left, Side::Right] {
        let g = gate.op_grad(op, f1, f2, 1.0, 1.0, side);
        println!(
            "  {:<6} {:>14.6} {:>14.6} {:>14.6}",
            side.to_string(),
            g.fidelity,
            g.cost_count,
            g.cost_fidelity
        );
    }
    Ok(())
}
