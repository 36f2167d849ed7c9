use std::future::Future;
use futures::channel::mpsc::Receiver;

use crate::device::types::Advertisement;
use crate::error::ScanError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    Advertisement(Advertisement),
    /// The platform stopped scanning on its own. No further events follow.
    Failed(ScanError),
}

/// A running continuous scan, returned by `ScanCapability::request_continuous_scan`.
pub struct ContinuousScan<S> {
    pub subscription: S,
    /// Advertisements are pushed here by the platform until the subscription is cancelled.
    pub events: Receiver<ScanEvent>,
}

pub trait ScanSubscription: Send + 'static {
    /// Stops the platform scan.
    fn cancel(self) -> impl Future<Output = ()> + Send;
}

/// The platform's ability to scan for advertising devices.
pub trait ScanCapability: Send + Sync + 'static {
    type Subscription: ScanSubscription;

    /// `false` if the host has no usable scanning hardware or api.
    fn is_available(&self) -> impl Future<Output = bool> + Send;

    /// `false` if only `request_single_device_selection` can be used.
    fn supports_continuous_scan(&self) -> bool;

    fn request_continuous_scan(
        &self,
    ) -> impl Future<Output = Result<ContinuousScan<Self::Subscription>, ScanError>> + Send;

    /// May wait for the user to pick a device. A dismissed prompt gives `ScanError::UserCancelled`.
    fn request_single_device_selection(&self) -> impl Future<Output = Result<Advertisement, ScanError>> + Send;
}
