use std::future::{pending, Future};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

use crate::cli::render::{device_count_text, render_table, status_text};
use crate::config::types::Config;
use crate::device::constants::POLL_DELAY;
use crate::device::registry::DeviceRegistry;
use crate::error::{AppRunError, ExportError};
use crate::export::csv::CSV_MIME_TYPE;
use crate::export::file::{export_registry, open_export};
use crate::scan::capability::ScanCapability;
use crate::scan::controller::{ScanController, ScanStatus};
use crate::store::BlobStore;
use crate::store::snapshot::{snapshot_writer_task, SnapshotStore};

/// The registry loaded from persistence, plus the task that keeps persistence up to date.
pub struct App {
    config: Config,
    registry: DeviceRegistry,
    snapshot_writer: JoinHandle<()>,
}

impl App {
    pub async fn open<S: BlobStore>(config: Config, store: S) -> App {
        let snapshots = SnapshotStore::new(store, config.snapshot_key.clone());
        let registry = snapshots.load().await;
        let snapshot_writer = snapshot_writer_task(snapshots, registry.clone());

        App { config, registry, snapshot_writer }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Waits until all registry changes are persisted.
    pub async fn close(self) {
        self.registry.detach_persistence();

        if let Err(err) = self.snapshot_writer.await {
            error!("Snapshot writer task failed: {:?}", err);
        }
    }

    /// Scans until `interrupt` resolves, the duration passes or the platform ends the scan.
    pub async fn scan<C, I>(
        &self,
        capability: C,
        duration: Option<Duration>,
        interrupt: I,
        out: &mut impl Write,
    ) -> Result<(), AppRunError>
    where
        C: ScanCapability,
        I: Future<Output = ()>,
    {
        let duration = match duration {
            Some(duration) => Some(duration),
            None => self.config.scan_duration()?,
        };

        let mut controller = ScanController::new(capability, self.registry.clone());

        if let Err(err) = controller.start().await {
            writeln!(out, "Error: {}", err)?;
            return Ok(());
        }

        // output errors end the watch loop, the session is stopped either way
        let watched = async {
            match duration {
                Some(duration) => writeln!(out, "{} for {}, press Ctrl-C to stop", status_text(controller.status()), humantime::format_duration(duration))?,
                None => writeln!(out, "{} press Ctrl-C to stop", status_text(controller.status()))?,
            }

            let deadline = async {
                match duration {
                    Some(duration) => sleep(duration).await,
                    None => pending::<()>().await,
                }
            };
            tokio::pin!(deadline);
            tokio::pin!(interrupt);

            let mut ticker = interval(Duration::from_millis(POLL_DELAY));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            'mainloop: loop {
                tokio::select! {
                    _ = &mut interrupt => {
                        info!("Interrupted");
                        break 'mainloop;
                    },
                    _ = &mut deadline => {
                        info!("Scan duration has passed");
                        break 'mainloop;
                    },
                    _ = ticker.tick() => {
                        if controller.poll_session().await == ScanStatus::Idle {
                            break 'mainloop;
                        }
                        writeln!(out, "{}", device_count_text(self.registry.count()))?;
                    },
                }
            }

            Ok::<(), AppRunError>(())
        }.await;

        controller.stop().await;
        watched?;
        if let Some(err) = controller.last_error() {
            writeln!(out, "Error: {}", err)?;
        }

        write!(out, "{}", render_table(&self.registry.snapshot()))?;
        Ok(())
    }

    pub fn list(&self, out: &mut impl Write) -> Result<(), AppRunError> {
        write!(out, "{}", render_table(&self.registry.snapshot()))?;
        Ok(())
    }

    pub fn clear(&self, confirmed: bool, input: &mut impl BufRead, out: &mut impl Write) -> Result<(), AppRunError> {
        let count = self.registry.count();
        if count == 0 {
            writeln!(out, "No devices to clear.")?;
            return Ok(());
        }

        if !confirmed {
            write!(out, "Are you sure you want to clear all {}? [y/N] ", device_count_text(count).trim_end_matches(" found"))?;
            out.flush()?;

            let mut answer = String::new();
            input.read_line(&mut answer)?;
            if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
                writeln!(out, "Nothing was cleared.")?;
                return Ok(());
            }
        }

        self.registry.clear();
        writeln!(out, "Cleared {}.", device_count_text(count).trim_end_matches(" found"))?;
        Ok(())
    }

    pub async fn export(&self, output: Option<PathBuf>, open: bool, out: &mut impl Write) -> Result<(), AppRunError> {
        let directory = output
            .or_else(|| self.config.export_directory.clone())
            .unwrap_or_else(|| PathBuf::from("."));

        let path = match export_registry(&self.registry, &directory).await {
            Ok(path) => path,
            Err(ExportError::NothingToExport) => {
                writeln!(out, "{}", ExportError::NothingToExport)?;
                return Ok(());
            },
            Err(err) => return Err(err.into()),
        };

        writeln!(out, "Exported {} to {} ({})", device_count_text(self.registry.count()).trim_end_matches(" found"), path.to_string_lossy(), CSV_MIME_TYPE)?;

        if open {
            if let Err(err) = open_export(&path).await {
                warn!("{}", err);
                writeln!(out, "Error: {}", err)?;
            }
        }

        Ok(())
    }
}
