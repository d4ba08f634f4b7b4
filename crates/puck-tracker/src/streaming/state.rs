use crate::messages::{ControlMessage, Status};
use puck_detection::{HsvRange, RgbImage};
use crossbeam_channel::Sender;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};

/// Single-slot "latest value wins" channel.
///
/// Publishing never blocks and overwrites whatever the consumers have not
/// read yet.
#[derive(Debug)]
pub struct Hub<T> {
    tx: Arc<watch::Sender<Option<T>>>,
}

impl<T> Clone for Hub<T> {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl<T> Default for Hub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Hub<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<T>> {
        self.tx.subscribe()
    }

    pub fn publish(&self, value: T) {
        self.tx.send_replace(Some(value));
    }
}

impl<T: Clone> Hub<T> {
    pub fn latest(&self) -> Option<T> {
        self.tx.borrow().clone()
    }
}

/// Annotated visualization frames.
pub type FrameHub = Hub<Arc<RgbImage>>;

pub type StatusHub = Hub<Status>;

#[derive(Clone)]
pub struct AppState {
    pub frames: FrameHub,
    pub status: StatusHub,
    pub commands: Sender<ControlMessage>,
    /// Last puck range pushed through the dashboard.
    pub puck_range: Arc<RwLock<HsvRange>>,
}

impl AppState {
    pub fn new(
        frames: FrameHub,
        status: StatusHub,
        commands: Sender<ControlMessage>,
        puck_range: HsvRange,
    ) -> Self {
        Self {
            frames,
            status,
            commands,
            puck_range: Arc::new(RwLock::new(puck_range)),
        }
    }
}
