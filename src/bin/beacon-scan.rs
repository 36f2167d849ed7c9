use clap::Parser;
use log::{error, info};
use beacon_scan::{init_logging, run};
use beacon_scan::cli::args::Args;
use beacon_scan::error::{AppRunError, ConfigError};

fn main() -> Result<(), AppRunError> {
    let args = Args::parse();

    if let Err(err) = init_logging(args.verbose) {
        eprintln!("{}", err);
    }
    info!(concat!("beacon-scan ", env!("CARGO_PKG_VERSION")));

    match run(args) {
        Err(AppRunError::ConfigError { source: ConfigError::CanNotLock { .. } }) => {
            eprintln!("beacon-scan is already running with this config file");
            Ok(())
        },
        Err(err) => {
            error!("Unexpected error: {}", err);
            Err(err)
        },
        Ok(_) => Ok(()),
    }
}
