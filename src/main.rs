use std::time::Duration;

use anyhow::Result;
use bess_dispatch::config::Config;
use bess_dispatch::data::CsvPriceAdapter;
use bess_dispatch::output::CsvOutputSink;
use bess_dispatch::scheduler::DispatchScheduler;
use bess_dispatch::telemetry::init_tracing;
use tracing::info;

fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load()?;
    anyhow::ensure!(
        cfg.data.input_dir.exists(),
        "input path does not exist: {}",
        cfg.data.input_dir.display()
    );

    let adapter = CsvPriceAdapter::new(
        &cfg.data.input_dir,
        &cfg.data.energy_file,
        &cfg.data.regulation_file,
    );
    let sink = CsvOutputSink::new(&cfg.output.output_dir);
    let mut scheduler = DispatchScheduler::new(
        adapter,
        sink,
        cfg.battery.clone(),
        cfg.solver.formulation,
        Duration::from_secs(cfg.solver.solve_budget_seconds),
    );

    info!(
        months = ?cfg.run.months,
        initial_soc = cfg.run.initial_soc,
        "starting dispatch run"
    );
    let summary = scheduler.run(&cfg.run.months, cfg.run.initial_soc)?;
    info!(
        days = summary.days_solved,
        total_revenue = summary.total_revenue,
        cycles = ?summary.monthly_cycles,
        "dispatch run complete"
    );
    Ok(())
}
