use flume::{Receiver, RecvTimeoutError, SendError, Sender, TrySendError};
use std::time::Duration;

/// Outcome of a bounded wait on a [`LatestReceiver`].
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    /// A message was pending; it is always the most recent one sent.
    Received(T),
    /// Nothing arrived before the deadline.
    Timeout,
    /// Every sender is gone; nothing more will arrive.
    Disconnected,
}

/// Sending end of a last-write-wins channel.
///
/// The channel holds at most one value. Sending never blocks: a value still
/// pending when the next one arrives is discarded, so memory stays bounded
/// even when nobody polls.
pub struct LatestSender<T> {
    tx: Sender<T>,
    // Used only to evict the pending value
    slot: Receiver<T>,
}

/// Receiving end of a last-write-wins channel.
pub struct LatestReceiver<T> {
    rx: Receiver<T>,
}

/// Create a last-write-wins channel.
pub fn latest_channel<T>() -> (LatestSender<T>, LatestReceiver<T>) {
    let (tx, rx) = flume::bounded(1);
    let sender = LatestSender {
        tx,
        slot: rx.clone(),
    };
    (sender, LatestReceiver { rx })
}

impl<T> LatestSender<T> {
    /// Replace the pending value. Fails once the receiver is dropped.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        // The eviction handle keeps one receiver alive on our side
        if self.tx.receiver_count() <= 1 {
            return Err(SendError(value));
        }

        let mut value = value;
        loop {
            match self.tx.try_send(value) {
                Ok(()) => return Ok(()),
                Err(TrySendError::Full(rejected)) => {
                    let _ = self.slot.try_recv();
                    value = rejected;
                }
                Err(TrySendError::Disconnected(rejected)) => return Err(SendError(rejected)),
            }
        }
    }

    /// Number of values waiting to be polled, never more than one.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

impl<T> LatestReceiver<T> {
    pub fn poll(&self, timeout: Duration) -> PollOutcome<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(first) => PollOutcome::Received(self.rx.try_iter().last().unwrap_or(first)),
            Err(RecvTimeoutError::Timeout) => PollOutcome::Timeout,
            Err(RecvTimeoutError::Disconnected) => PollOutcome::Disconnected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_timeout_is_bounded() {
        let (_tx, rx) = latest_channel::<u32>();
        let started = Instant::now();

        assert_eq!(rx.poll(Duration::from_millis(2)), PollOutcome::Timeout);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_burst_keeps_latest() {
        let (tx, rx) = latest_channel();
        for i in 0..5 {
            tx.send(i).unwrap();
        }

        assert_eq!(rx.poll(Duration::from_millis(2)), PollOutcome::Received(4));
        assert_eq!(rx.poll(Duration::from_millis(2)), PollOutcome::Timeout);
    }

    #[test]
    fn test_unpolled_channel_holds_one_value() {
        let (tx, rx) = latest_channel();
        for i in 0..100_000u32 {
            tx.send(i).unwrap();
            assert!(tx.pending() <= 1);
        }

        assert_eq!(tx.pending(), 1);
        assert_eq!(rx.poll(Duration::from_millis(2)), PollOutcome::Received(99_999));
        assert_eq!(tx.pending(), 0);
    }

    #[test]
    fn test_send_fails_after_receiver_dropped() {
        let (tx, rx) = latest_channel();
        drop(rx);
        assert!(tx.send(7u32).is_err());
    }

    #[test]
    fn test_dropped_sender_reports_disconnect() {
        let (tx, rx) = latest_channel::<u32>();
        drop(tx);
        assert_eq!(rx.poll(Duration::from_millis(2)), PollOutcome::Disconnected);
    }

    #[test]
    fn test_message_from_other_thread() {
        let (tx, rx) = latest_channel();
        let handle = std::thread::spawn(move || tx.send(42u32).unwrap());
        handle.join().unwrap();

        assert_eq!(rx.poll(Duration::from_millis(50)), PollOutcome::Received(42));
    }
}
