use std::env;
use std::io::{self, BufReader};
use log::info;

use crate::cli::app::App;
use crate::cli::args::{Args, Command};
use crate::config::io::ConfigIO;
use crate::error::AppRunError;
use crate::scan::bluetooth::BluetoothCapability;
use crate::store::file::{get_local_data_path, FileStore};

pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod export;
pub mod scan;
pub mod store;

pub fn init_logging(verbose: bool) -> Result<(), AppRunError> {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime::format_rfc3339(std::time::SystemTime::now()),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        // btleplug is chatty on debug
        .level_for("btleplug", log::LevelFilter::Info)
        .chain(std::io::stderr());

    if let Ok(log_file) = env::var("LOG_FILE") {
        dispatch = dispatch.chain(
            fern::log_file(log_file).map_err(|source| AppRunError::LogFile { source })?
        );
    }

    dispatch.apply()?;
    Ok(())
}

async fn run_command(args: Args) -> Result<(), AppRunError> {
    let mut config_io = match &args.config {
        Some(path) => ConfigIO::open_sync(path)?,
        None => ConfigIO::new_sync()?,
    };
    let mut config_locker = config_io.locker()?;
    let _lock_guard = config_locker.lock()?;

    let config = config_io.read_or_create().await?;
    let data_directory = match &config.data_directory {
        Some(directory) => directory.clone(),
        None => get_local_data_path()?,
    };
    let store = FileStore::new_sync(data_directory)?;

    let app = App::open(config, store).await;
    let mut out = io::stdout();

    let result = match args.command {
        Command::Scan { duration } => {
            let capability = BluetoothCapability::new().await;
            let interrupt = async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    log::warn!("Failed to listen for Ctrl-C: {}", err);
                    std::future::pending::<()>().await;
                }
            };
            app.scan(capability, duration, interrupt, &mut out).await
        },
        Command::List => app.list(&mut out),
        Command::Clear { yes } => app.clear(yes, &mut BufReader::new(io::stdin()), &mut out),
        Command::Export { output, open } => app.export(output, open, &mut out).await,
    };

    app.close().await;
    info!("Done");
    result
}

pub fn run(args: Args) -> Result<(), AppRunError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|source| AppRunError::Runtime { source })?;

    runtime.block_on(run_command(args))
}
