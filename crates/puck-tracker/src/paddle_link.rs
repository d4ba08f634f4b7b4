use puck_prediction::PaddleCommand;
use crossbeam_channel::{Sender, TrySendError};

/// Outbound path to the paddle controller.
pub trait PaddleLink {
    /// Hands off one set-point without blocking the tracking loop.
    fn send(&mut self, command: PaddleCommand);
}

/// Forwards commands over a bounded channel, dropping them when it is full.
pub struct ChannelPaddleLink {
    tx: Sender<PaddleCommand>,
}

impl ChannelPaddleLink {
    pub fn new(tx: Sender<PaddleCommand>) -> Self {
        Self { tx }
    }
}

impl PaddleLink for ChannelPaddleLink {
    fn send(&mut self, command: PaddleCommand) {
        match self.tx.try_send(command) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::warn!("paddle queue full, command dropped"),
            Err(TrySendError::Disconnected(_)) => tracing::warn!("paddle link disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn full_channel_drops_without_blocking() {
        let (tx, rx) = bounded(1);
        let mut link = ChannelPaddleLink::new(tx);
        let a = PaddleCommand { x_mm: 1.0, y_mm: 0.0 };
        let b = PaddleCommand { x_mm: 2.0, y_mm: 0.0 };
        link.send(a);
        link.send(b);
        assert_eq!(rx.try_recv().unwrap(), a);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disconnected_receiver_is_not_fatal() {
        let (tx, rx) = bounded(1);
        drop(rx);
        let mut link = ChannelPaddleLink::new(tx);
        link.send(PaddleCommand { x_mm: 1.0, y_mm: 0.0 });
    }
}
