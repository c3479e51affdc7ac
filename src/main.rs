use std::env;
use std::path::Path;
use std::process;

use log::{info, LevelFilter};
use simple_logger::SimpleLogger;

use csma_sim::{SimConfig, SimRunner};

fn main() {
    let args: Vec<String> = env::args().collect();

    // With no scenario argument the built-in defaults run; anything else is
    // a YAML scenario path.
    let config = match args.get(1) {
        Some(path) => SimConfig::load(Path::new(path)).unwrap_or_else(|e| {
            eprintln!("{}: {}", path, e);
            process::exit(1);
        }),
        None => SimConfig::default(),
    };

    let level = if config.verbose {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init().unwrap();

    info!("starting");
    info!(
        "protocol: {}, nodes: {}, slots: {}, simulations: {}",
        config.protocol, config.node_count, config.time_slot_count, config.simulation_count
    );

    let runner = SimRunner::new(config);
    info!("seed: {}", runner.seed());

    let report = runner.run();

    for run in &report.runs {
        run.log();
    }
    report.log_overall();

    info!("done");
}
