use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use futures::SinkExt;
use futures::channel::mpsc::{channel, Sender};

use crate::device::constants::EVENT_BUFFER;
use crate::device::types::Advertisement;
use crate::error::ScanError;
use crate::scan::capability::{ContinuousScan, ScanCapability, ScanEvent, ScanSubscription};

#[derive(Debug, Clone)]
pub enum FakeMode {
    Unavailable,
    Continuous,
    /// continuous scanning is supported, but the request fails
    Rejected(ScanError),
    /// only single device selection is supported, with this outcome
    SingleSelection(Result<Advertisement, ScanError>),
}

struct FakeState {
    mode: FakeMode,
    sender: Option<Sender<ScanEvent>>,
    started: usize,
}

/// A scan capability driven by the test. Clones share their state.
#[derive(Clone)]
pub struct FakeCapability {
    state: Arc<Mutex<FakeState>>,
    cancelled: Arc<AtomicUsize>,
}

impl FakeCapability {
    pub fn new(mode: FakeMode) -> Self {
        FakeCapability {
            state: Arc::new(Mutex::new(FakeState { mode, sender: None, started: 0 })),
            cancelled: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_mode(&self, mode: FakeMode) {
        self.state.lock().unwrap().mode = mode;
    }

    fn mode(&self) -> FakeMode {
        self.state.lock().unwrap().mode.clone()
    }

    async fn push(&self, event: ScanEvent) {
        let sender = self.state.lock().unwrap().sender.clone();

        if let Some(mut sender) = sender {
            // fails once the controller deregistered, like a platform that keeps firing
            let _ = sender.send(event).await;
        }
    }

    pub async fn advertise(&self, advertisement: Advertisement) {
        self.push(ScanEvent::Advertisement(advertisement)).await;
    }

    pub async fn fail(&self, error: ScanError) {
        self.push(ScanEvent::Failed(error)).await;
    }

    pub fn started_subscriptions(&self) -> usize {
        self.state.lock().unwrap().started
    }

    pub fn cancelled_subscriptions(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub struct FakeSubscription {
    cancelled: Arc<AtomicUsize>,
}

impl ScanSubscription for FakeSubscription {
    async fn cancel(self) {
        self.cancelled.fetch_add(1, Ordering::SeqCst);
    }
}

impl ScanCapability for FakeCapability {
    type Subscription = FakeSubscription;

    async fn is_available(&self) -> bool {
        !matches!(self.mode(), FakeMode::Unavailable)
    }

    fn supports_continuous_scan(&self) -> bool {
        !matches!(self.mode(), FakeMode::SingleSelection(_))
    }

    async fn request_continuous_scan(&self) -> Result<ContinuousScan<FakeSubscription>, ScanError> {
        if let FakeMode::Rejected(err) = self.mode() {
            return Err(err);
        }

        let (sender, events) = channel::<ScanEvent>(EVENT_BUFFER);
        let mut state = self.state.lock().unwrap();
        state.sender = Some(sender);
        state.started += 1;

        Ok(ContinuousScan {
            subscription: FakeSubscription { cancelled: self.cancelled.clone() },
            events,
        })
    }

    async fn request_single_device_selection(&self) -> Result<Advertisement, ScanError> {
        match self.mode() {
            FakeMode::SingleSelection(outcome) => outcome,
            _ => Err(ScanError::UnknownCapabilityError { message: "no selection prompt".to_string() }),
        }
    }
}
