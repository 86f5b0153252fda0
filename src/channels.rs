//! Channels connecting the pipeline threads.
//!
//! - Frames: capacity 1, newest wins. The publisher evicts the stale frame
//!   itself so the consumer never sees a backlog. Because the publisher
//!   also holds a receiver, consumer loss is tracked with a flag set when
//!   the subscriber drops.
//! - Actions and feedback: unbounded FIFO.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded, unbounded};

use crate::actions::{ActionRequest, Feedback};
use crate::collaborators::Frame;
use crate::error::{GarudaError, Result};

/// Publishing side of the latest-frame channel.
#[derive(Clone)]
pub struct FramePublisher {
    tx: Sender<Frame>,
    // Kept to evict the stale frame when the slot is full
    evict: Receiver<Frame>,
    consumer_gone: Arc<AtomicBool>,
}

impl FramePublisher {
    /// Publish a frame, replacing any frame not yet consumed.
    ///
    /// Returns true when an older frame was discarded, `ChannelClosed` once
    /// the subscriber is gone.
    pub fn publish(&self, frame: Frame) -> Result<bool> {
        if self.consumer_gone.load(Ordering::Acquire) {
            return Err(GarudaError::ChannelClosed("frame"));
        }
        let mut pending = frame;
        let mut dropped = false;
        loop {
            match self.tx.try_send(pending) {
                Ok(()) => return Ok(dropped),
                Err(TrySendError::Full(back)) => {
                    dropped |= self.evict.try_recv().is_ok();
                    pending = back;
                }
                Err(TrySendError::Disconnected(_)) => {
                    return Err(GarudaError::ChannelClosed("frame"));
                }
            }
        }
    }
}

/// Consuming side of the latest-frame channel.
pub struct FrameSubscriber {
    rx: Receiver<Frame>,
    consumer_gone: Arc<AtomicBool>,
}

impl Drop for FrameSubscriber {
    fn drop(&mut self) {
        self.consumer_gone.store(true, Ordering::Release);
        // Release the stale frame held in the slot
        while self.rx.try_recv().is_ok() {}
    }
}

impl FrameSubscriber {
    /// Wait up to `timeout` for the newest frame.
    ///
    /// `Ok(None)` on timeout; an error once every publisher is gone.
    pub fn next(&self, timeout: Duration) -> Result<Option<Frame>> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(GarudaError::ChannelClosed("frame")),
        }
    }

    /// Take the frame waiting in the slot, if any.
    pub fn latest(&self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}

pub fn frame_channel() -> (FramePublisher, FrameSubscriber) {
    let (tx, rx) = bounded(1);
    let consumer_gone = Arc::new(AtomicBool::new(false));
    (
        FramePublisher {
            tx,
            evict: rx.clone(),
            consumer_gone: Arc::clone(&consumer_gone),
        },
        FrameSubscriber { rx, consumer_gone },
    )
}

pub fn action_channel() -> (Sender<ActionRequest>, Receiver<ActionRequest>) {
    unbounded()
}

pub fn feedback_channel() -> (Sender<Feedback>, Receiver<Feedback>) {
    unbounded()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{Action, FeedbackStatus};
    use crate::geometry::Position;
    use std::time::Instant;

    fn frame(id: u64) -> Frame {
        Frame {
            id,
            width: 4,
            height: 4,
            pixels: Arc::from(Vec::new()),
            position: Position::ZERO,
            heading: 0.0,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_second_publish_replaces_first() {
        let (publisher, subscriber) = frame_channel();

        assert!(!publisher.publish(frame(1)).unwrap());
        assert!(publisher.publish(frame(2)).unwrap());

        let seen = subscriber.next(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(seen.id, 2);
        assert!(subscriber.latest().is_none());
    }

    #[test]
    fn test_subscriber_times_out_then_reports_closed() {
        let (publisher, subscriber) = frame_channel();
        assert!(subscriber.next(Duration::from_millis(5)).unwrap().is_none());

        drop(publisher);
        assert!(matches!(
            subscriber.next(Duration::from_millis(5)),
            Err(GarudaError::ChannelClosed("frame"))
        ));
    }

    #[test]
    fn test_publish_reports_closed_after_subscriber_drop() {
        let (publisher, subscriber) = frame_channel();
        let other = publisher.clone();
        assert!(!publisher.publish(frame(1)).unwrap());

        drop(subscriber);
        assert!(matches!(
            publisher.publish(frame(2)),
            Err(GarudaError::ChannelClosed("frame"))
        ));
        assert!(matches!(
            other.publish(frame(3)),
            Err(GarudaError::ChannelClosed("frame"))
        ));
    }

    #[test]
    fn test_action_and_feedback_are_fifo() {
        let (action_tx, action_rx) = action_channel();
        let (feedback_tx, feedback_rx) = feedback_channel();

        for (seq, action) in [(1, Action::MoveTo), (2, Action::Broadcast), (3, Action::Drop)] {
            action_tx.send(ActionRequest { seq, action }).unwrap();
            feedback_tx
                .send(Feedback {
                    seq,
                    action,
                    status: FeedbackStatus::Completed,
                    message: String::new(),
                })
                .unwrap();
        }

        let actions: Vec<u64> = action_rx.try_iter().map(|r| r.seq).collect();
        let feedback: Vec<u64> = feedback_rx.try_iter().map(|f| f.seq).collect();
        assert_eq!(actions, vec![1, 2, 3]);
        assert_eq!(feedback, vec![1, 2, 3]);
    }
}
