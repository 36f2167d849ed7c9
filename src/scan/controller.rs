use std::time::SystemTime;
use futures::StreamExt;
use futures::channel::mpsc::Receiver;
use log::{debug, error, info, warn};
use tokio::runtime::Handle;
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::registry::DeviceRegistry;
use crate::error::ScanError;
use crate::scan::capability::{ContinuousScan, ScanCapability, ScanEvent, ScanSubscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Idle,
    Scanning,
}

// Consumes the platform's events and merges them into the registry. Resolves to the platform
// error if the platform ended the scan, or None if the task was cancelled.
fn forward_events_task(
    cancel: CancellationToken,
    mut events: Receiver<ScanEvent>,
    registry: DeviceRegistry,
) -> JoinHandle<Option<ScanError>> {
    spawn(async move {
        'mainloop: loop {
            tokio::select! {
                // cancellation must win over queued events
                biased;

                _ = cancel.cancelled() => {
                    break 'mainloop None;
                },
                event = events.next() => match event {
                    Some(ScanEvent::Advertisement(advertisement)) => {
                        match advertisement.into_observation(SystemTime::now()) {
                            Some(observation) => registry.merge(observation),
                            None => debug!("Ignoring advertisement without a device id"),
                        }
                    },
                    Some(ScanEvent::Failed(err)) => {
                        warn!("Platform ended the scan: {}", err);
                        break 'mainloop Some(err);
                    },
                    None => {
                        warn!("Platform closed the advertisement stream");
                        break 'mainloop Some(ScanError::UnknownCapabilityError {
                            message: "the advertisement stream ended unexpectedly".to_string(),
                        });
                    },
                },
            }
        }
    })
}

struct ActiveSession<S: ScanSubscription> {
    // taken by close(), or by drop() when the session is dropped while running
    subscription: Option<S>,
    // cancelling this deregisters the event consumer
    cancel: CancellationToken,
    forwarder: JoinHandle<Option<ScanError>>,
}

impl<S: ScanSubscription> ActiveSession<S> {
    fn has_ended(&self) -> bool {
        self.forwarder.is_finished()
    }

    // Once this returns the registry receives no more events from this session.
    async fn close(mut self) -> Option<ScanError> {
        self.cancel.cancel();

        let platform_error = match (&mut self.forwarder).await {
            Ok(platform_error) => platform_error,
            Err(err) => {
                error!("Event forwarding task failed: {:?}", err);
                Some(ScanError::UnknownCapabilityError { message: err.to_string() })
            },
        };

        if let Some(subscription) = self.subscription.take() {
            subscription.cancel().await;
        }
        platform_error
    }
}

impl<S: ScanSubscription> Drop for ActiveSession<S> {
    fn drop(&mut self) {
        // the forwarder checks the token before every event, so nothing is merged after this
        self.cancel.cancel();

        let Some(subscription) = self.subscription.take() else {
            return;
        };

        warn!("Scan session dropped while running, stopping the platform scan in the background");
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(subscription.cancel());
            },
            Err(err) => error!("Can not stop the platform scan, no async runtime: {}", err),
        }
    }
}

/// Owns the scan session: `Idle --start--> Scanning --stop--> Idle`.
///
/// Commands are expected from a single control context, advertisement events are handled on a
/// separate task that only ever touches the registry.
pub struct ScanController<C: ScanCapability> {
    capability: C,
    registry: DeviceRegistry,
    session: Option<ActiveSession<C::Subscription>>,
    last_error: Option<ScanError>,
}

impl<C: ScanCapability> ScanController<C> {
    pub fn new(capability: C, registry: DeviceRegistry) -> Self {
        ScanController {
            capability,
            registry,
            session: None,
            last_error: None,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn status(&self) -> ScanStatus {
        match self.session {
            Some(_) => ScanStatus::Scanning,
            None => ScanStatus::Idle,
        }
    }

    /// The condition to show to the user, cleared by the next `start`.
    pub fn last_error(&self) -> Option<&ScanError> {
        self.last_error.as_ref()
    }

    /// Starts continuous scanning. Does nothing if a scan is already running.
    ///
    /// When the platform can only select a single device, the selection prompt is shown and
    /// `ScanError::DegradedModeNotice` is returned. The selected device is not added to the
    /// registry and the controller stays idle.
    pub async fn start(&mut self) -> Result<(), ScanError> {
        if self.poll_session().await == ScanStatus::Scanning {
            debug!("Scan already running");
            return Ok(());
        }

        self.last_error = None;

        match self.open_session().await {
            Ok(session) => {
                info!("Scanning for devices...");
                self.session = Some(session);
                Ok(())
            },
            Err(err) => {
                warn!("Failed to start scanning: {:?}", err);
                self.last_error = Some(err.clone());
                Err(err)
            },
        }
    }

    async fn open_session(&self) -> Result<ActiveSession<C::Subscription>, ScanError> {
        if !self.capability.is_available().await {
            return Err(ScanError::CapabilityUnavailable);
        }

        if !self.capability.supports_continuous_scan() {
            info!("Continuous scanning not available, falling back to single device selection");
            let selection = self.capability.request_single_device_selection().await?;
            info!("Selected device {}", selection.device_id);
            return Err(ScanError::DegradedModeNotice);
        }

        let ContinuousScan { subscription, events } = self.capability.request_continuous_scan().await?;
        let cancel = CancellationToken::new();
        let forwarder = forward_events_task(cancel.clone(), events, self.registry.clone());

        Ok(ActiveSession { subscription: Some(subscription), cancel, forwarder })
    }

    /// Stops scanning. Once this returns no event of the stopped scan reaches the registry.
    /// Does nothing if idle.
    pub async fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            debug!("Not scanning, nothing to stop");
            return;
        };

        if let Some(platform_error) = session.close().await {
            self.last_error = Some(platform_error);
        }
        info!("Scan stopped");
    }

    /// Moves to `Idle` if the platform ended the scan on its own, recording its error.
    pub async fn poll_session(&mut self) -> ScanStatus {
        let ended = self.session.as_ref().map_or(false, |session| session.has_ended());

        if ended {
            if let Some(session) = self.session.take() {
                self.last_error = session.close().await;
                info!("Scan ended by the platform");
            }
        }

        self.status()
    }
}
