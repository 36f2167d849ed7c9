use std::path::PathBuf;
use std::time::Duration;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version)]
#[command(about = "Discovers nearby Bluetooth LE devices and keeps track of their latest signal strength.\n\nExample: beacon-scan scan --duration 30s", long_about = None)]
pub struct Args {
    /// Also log debug messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of the default one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Scan for devices until interrupted with Ctrl-C, or until the duration has passed
    Scan {
        /// For example "30s" or "5min". Overrides `scanDuration` of the config file.
        #[arg(short, long, value_parser = humantime::parse_duration)]
        duration: Option<Duration>,
    },

    /// Show all known devices, strongest signal first
    List,

    /// Forget all known devices
    Clear {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Write all known devices to a csv file
    Export {
        /// Directory to write the file to. Overrides `exportDirectory` of the config file.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Open the file with the default application afterwards
        #[arg(long)]
        open: bool,
    },
}
