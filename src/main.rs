use anyhow::Context;
use clap::Parser;
use tracing::info;

use darkgen::app::{self, RunOutcome};
use darkgen::camera::{AsiSdk, CameraProvider, SimulatedCamera, SimulatedSdk};
use darkgen::capture::Interrupt;
use darkgen::config::{Args, RunConfig};
use darkgen::logger;

fn execute<P: CameraProvider>(provider: &P, config: &RunConfig, interrupt: &Interrupt) -> anyhow::Result<()> {
    let outcome = app::run(provider, config, interrupt, |estimate| {
        println!("{estimate}");
        if config.verbose {
            for line in estimate.detail_lines() {
                println!("{line}");
            }
        }
    })?;

    match outcome {
        RunOutcome::NoCamera => println!("No cameras detected!"),
        RunOutcome::SelectionRequired(names) => {
            println!("Multiple cameras detected, select one with --camera:");
            for (index, name) in names.iter().enumerate() {
                println!("  {index}: {name}");
            }
        }
        RunOutcome::Info(report) => println!("{report}"),
        RunOutcome::MissingBitDepth => println!("ERROR: Must specify a bit depth of 8, 16, or 24."),
        RunOutcome::Completed(report) => {
            info!(files = report.files.len(), "Files written");
            println!("\nExposure sequence complete");
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init(args.verbose);

    info!("Starting darkgen...");
    let config = args.run_config();
    let interrupt = Interrupt::install();

    if args.simulate {
        let sdk = SimulatedSdk::single(SimulatedCamera::mono("Simulated Camera"));
        execute(&sdk, &config, &interrupt)
    } else {
        let sdk = AsiSdk::load(&args.library)
            .with_context(|| format!("loading {}", args.library.display()))?;
        execute(&sdk, &config, &interrupt)
    }
}
