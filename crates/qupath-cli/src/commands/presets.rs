//! Presets command implementation.

use console::style;
use qupath_phys::HardwarePreset;

/// Execute the presets command.
pub fn execute() {
    println!("{}", style("Hardware presets").cyan().bold());
    println!();
    println!(
        "  {:<10} {:>8} {:>8} {:>8} {:>8}",
        "name", "1q", "2q", "bsm", "swap"
    );
    for preset in HardwarePreset::ALL {
        let hw = preset.profile();
        println!(
            "  {} {:>8} {:>8} {:>8} {:>8}",
            style(format!("{:<10}", preset.name())).yellow(),
            hw.accuracy_1q(),
            hw.accuracy_2q(),
            hw.accuracy_bsm(),
            hw.prob_swap()
        );
    }
}
