use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info};
use utrex_annotate_rs::{ConfigError, RunStatus};

use args::Args;
use pipeline::Interrupted;

mod args;
mod cache;
mod logging;
mod pipeline;
mod preprocess;

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = logging::init(&args.log_dir) {
        eprintln!("{err:#}");
        return ExitCode::from(1);
    }

    let start = Instant::now();
    match pipeline::run(&args) {
        Ok(RunStatus::Complete) => {
            info!("utrex finished successfully in {:.1?}", start.elapsed());
            ExitCode::SUCCESS
        }
        Ok(RunStatus::Incomplete) => {
            error!("utrex finished, but the output is incomplete");
            ExitCode::from(2)
        }
        Ok(RunStatus::Interrupted) => {
            error!("User interrupted processing. Aborting.");
            ExitCode::from(130)
        }
        Err(err) if err.downcast_ref::<Interrupted>().is_some() => {
            error!("User interrupted processing. Aborting.");
            ExitCode::from(130)
        }
        Err(err) => {
            match err.downcast_ref::<ConfigError>() {
                Some(config) => error!("Invalid arguments: {config}. Aborting."),
                None => error!("{err:?}"),
            }
            ExitCode::from(1)
        }
    }
}
