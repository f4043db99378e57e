//! `corebench check` and `corebench models`.
//!
//! `check` loads and resolves the configuration and constructs the model
//! once, so bad windows, budgets, and model arguments are reported without
//! running a simulation.

use corebench_sim::models;

use crate::run::{build_dut, load_bench_config};
use crate::{CheckArgs, GlobalArgs};

/// Runs the `corebench check` command.
pub fn run(args: &CheckArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let (bench, base_dir) = load_bench_config(global)?;
    let config = corebench_config::resolve(&bench, &base_dir)?;
    let mut dut = build_dut(&bench, args.model.as_deref(), &args.dut_args)?;
    dut.finalize();

    if !global.quiet {
        let window = match config.reset_window {
            Some(w) => format!("[{}, {}) on {} edge", w.start(), w.end(), config.reset_edge),
            None => "held asserted".to_string(),
        };
        eprintln!("   Model:  {}", dut.name());
        eprintln!("   Budget: {} ticks", config.max_ticks);
        eprintln!("   Reset:  {window}");
        if let Some(path) = &config.trace.vcd_path {
            eprintln!("   Trace:  {}", path.display());
        }
        eprintln!("   Configuration OK");
    }
    Ok(0)
}

/// Prints the built-in models, one per line.
pub fn list_models() {
    for name in models::MODEL_NAMES {
        if let Some(factory) = models::factory(name) {
            println!("{:<10} {}", factory.name(), factory.description());
        }
    }
}
