use std::process;
use std::sync::Arc;

use clap::Parser;
use ez_decimator::cli::commands::Cli;
use ez_decimator::utils::parallel::init_thread_pool;
use ez_decimator::utils::reporting::Reporter;
use ez_decimator::{BatchJob, ConsoleSink, Resampler, SymphoniaCodec};

fn main() {
    let cli = Cli::parse();

    let level = if cli.options.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    process::exit(run(cli));
}

fn run(cli: Cli) -> i32 {
    let spec = match cli.command.job_spec(cli.options.extensions.as_deref()) {
        Ok(spec) => spec,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let depth = match cli.options.depth() {
        Ok(depth) => depth,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    init_thread_pool(cli.options.threads);

    let codec = SymphoniaCodec::new(depth);
    let resampler = Resampler::new(cli.command.quality());

    println!("=== EZ Decimator ===");
    println!("Input directory: {}", spec.input_dir.display());
    println!("Output directory: {}", spec.output_dir.display());
    match spec.mode.target_rate() {
        Some(rate) => println!("Mode: resample to {} Hz ({:?} quality)", rate, resampler.quality()),
        None => println!("Mode: {:?}", spec.mode),
    }
    println!("Output depth: {}-bit\n", codec.depth().bits());

    let job = BatchJob::new(codec, resampler);
    let handle = match job.spawn(spec, Arc::new(ConsoleSink)) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Error starting worker: {}", e);
            return 1;
        }
    };

    let outcome = match handle.join() {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if let Some(report_path) = &cli.options.report {
        match Reporter::new().write_batch_report(&outcome, report_path) {
            Ok(_) => println!("Report saved to: {}", report_path.display()),
            Err(e) => eprintln!("Error generating report: {}", e),
        }
    }

    if outcome.total == 0 {
        1
    } else if outcome.is_clean() {
        0
    } else {
        2
    }
}
