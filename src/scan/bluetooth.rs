use std::pin::Pin;
use futures::{SinkExt, Stream, StreamExt};
use futures::channel::mpsc::{channel, Sender};
use btleplug::api::{BDAddr, Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use log::{debug, info, warn};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::device::constants::EVENT_BUFFER;
use crate::device::types::Advertisement;
use crate::error::ScanError;
use crate::scan::capability::{ContinuousScan, ScanCapability, ScanEvent, ScanSubscription};

type CentralEvents = Pin<Box<dyn Stream<Item = CentralEvent> + Send>>;

// The address is the stable identifier users recognize. Some platforms (macOS) hide it, in
// which case the platform's own peripheral id is used.
fn device_id(id: &PeripheralId, address: BDAddr) -> String {
    if address != BDAddr::from([0u8; 6]) {
        address.to_string()
    } else {
        format!("{:?}", id)
    }
}

async fn read_advertisement(adapter: &Adapter, id: &PeripheralId) -> Result<Option<Advertisement>, btleplug::Error> {
    let peripheral = adapter.peripheral(id).await?;

    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    Ok(Some(Advertisement {
        device_id: device_id(id, properties.address),
        name: properties.local_name,
        signal_strength: properties.rssi,
        transmit_power: properties.tx_power_level,
    }))
}

// Multiple adapters are not managed, the first one the platform reports is used.
async fn first_adapter(manager: &Manager) -> Result<Adapter, ScanError> {
    let adapters = manager.adapters().await?;
    let adapter = adapters.into_iter().next().ok_or(ScanError::CapabilityUnavailable)?;
    info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
    Ok(adapter)
}

fn advertisement_pump_task(
    cancel: CancellationToken,
    adapter: Adapter,
    mut central_events: CentralEvents,
    mut sender: Sender<ScanEvent>,
) -> JoinHandle<()> {
    spawn(async move {
        'mainloop: loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break 'mainloop;
                },
                event = central_events.next() => match event {
                    Some(CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id)) => {
                        match read_advertisement(&adapter, &id).await {
                            Ok(Some(advertisement)) => {
                                if sender.send(ScanEvent::Advertisement(advertisement)).await.is_err() {
                                    debug!("Advertisement consumer is gone");
                                    break 'mainloop;
                                }
                            },
                            Ok(None) => debug!("Peripheral {:?} has no properties", id),
                            Err(err) => warn!("Could not query peripheral for properties: {:?}", err),
                        }
                    },
                    Some(_) => {},
                    None => {
                        warn!("Adapter stopped delivering events");
                        let failure = ScanError::UnknownCapabilityError {
                            message: "the Bluetooth adapter stopped delivering events".to_string(),
                        };
                        // the consumer might already be gone, there is nobody else to tell
                        let _ = sender.send(ScanEvent::Failed(failure)).await;
                        break 'mainloop;
                    },
                },
            }
        }
    })
}

pub struct BluetoothSubscription {
    adapter: Adapter,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
}

impl ScanSubscription for BluetoothSubscription {
    async fn cancel(self) {
        self.cancel.cancel();

        if let Err(err) = self.pump.await {
            warn!("Advertisement pump task failed: {:?}", err);
        }

        if let Err(err) = self.adapter.stop_scan().await {
            warn!("Failed to stop scanning: {:?}", err);
        }
    }
}

/// Scanning through the host's Bluetooth LE adapter.
pub struct BluetoothCapability {
    // None if the platform's bluetooth api could not be initialized
    manager: Option<Manager>,
}

impl BluetoothCapability {
    pub async fn new() -> Self {
        let manager = match Manager::new().await {
            Ok(manager) => Some(manager),
            Err(err) => {
                warn!("Bluetooth is not available: {:?}", err);
                None
            },
        };

        BluetoothCapability { manager }
    }

    async fn start_scanning(&self) -> Result<(Adapter, CentralEvents), ScanError> {
        let manager = self.manager.as_ref().ok_or(ScanError::CapabilityUnavailable)?;
        let adapter = first_adapter(manager).await?;

        // subscribe before scanning so that no discovery is missed
        let central_events = adapter.events().await?;
        adapter.start_scan(ScanFilter::default()).await?;

        Ok((adapter, central_events))
    }
}

impl ScanCapability for BluetoothCapability {
    type Subscription = BluetoothSubscription;

    async fn is_available(&self) -> bool {
        let Some(manager) = &self.manager else {
            return false;
        };

        match manager.adapters().await {
            Ok(adapters) => !adapters.is_empty(),
            Err(err) => {
                warn!("Failed to list Bluetooth adapters: {:?}", err);
                false
            },
        }
    }

    fn supports_continuous_scan(&self) -> bool {
        true
    }

    async fn request_continuous_scan(&self) -> Result<ContinuousScan<BluetoothSubscription>, ScanError> {
        let (adapter, central_events) = self.start_scanning().await?;
        let (sender, events) = channel::<ScanEvent>(EVENT_BUFFER);
        let cancel = CancellationToken::new();
        let pump = advertisement_pump_task(cancel.clone(), adapter.clone(), central_events, sender);

        Ok(ContinuousScan {
            subscription: BluetoothSubscription { adapter, cancel, pump },
            events,
        })
    }

    // There is no selection prompt on desktop platforms, the first device that is discovered is
    // the selection.
    async fn request_single_device_selection(&self) -> Result<Advertisement, ScanError> {
        let (adapter, mut central_events) = self.start_scanning().await?;

        let selection = loop {
            match central_events.next().await {
                Some(CentralEvent::DeviceDiscovered(id)) => {
                    match read_advertisement(&adapter, &id).await {
                        Ok(Some(advertisement)) => break Ok(advertisement),
                        Ok(None) => debug!("Peripheral {:?} has no properties", id),
                        Err(err) => warn!("Could not query peripheral for properties: {:?}", err),
                    }
                },
                Some(_) => {},
                None => break Err(ScanError::UserCancelled),
            }
        };

        if let Err(err) = adapter.stop_scan().await {
            warn!("Failed to stop scanning: {:?}", err);
        }

        selection
    }
}
