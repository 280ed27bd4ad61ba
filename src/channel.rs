//! Bounded frame channel.
//!
//! Carries `ResultPacket`s from the capture worker to the display loop
//! through a fixed-capacity queue. When the consumer falls behind, the
//! channel drops its oldest packet to make room: the display always holds
//! the most recent results, and memory stays bounded. Delivery is in
//! production order, never duplicated, but not loss-free.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::detect::{Detection, Summary};
use crate::frame::Frame;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 5;

/// The unit of transfer from worker to display: one annotated frame in
/// display order plus its detection results. Consumed exactly once.
#[derive(Debug)]
pub struct ResultPacket {
    pub frame: Frame,
    pub detections: Vec<Detection>,
    pub summary: Summary,
}

/// Outcome of a non-blocking push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// Packet enqueued without displacing anything.
    Delivered,
    /// Channel was full; the oldest queued packet was evicted to make room.
    DroppedOldest,
    /// Consumer endpoint is gone.
    Disconnected,
}

/// Outcome of a blocking pop.
#[derive(Debug)]
pub enum PopResult {
    Packet(ResultPacket),
    /// Nothing arrived within the timeout. Expected when the producer is
    /// slow or still connecting; not an error.
    Empty,
    /// Producer endpoint is gone and the queue is drained.
    Disconnected,
}

/// Producer endpoint. Single producer: the capture worker.
pub struct FrameSender {
    tx: Sender<ResultPacket>,
    // Receiver clone used only to evict the oldest packet when full. It
    // keeps the crossbeam channel open, so consumer liveness is tracked
    // separately through `consumer`.
    evict_rx: Receiver<ResultPacket>,
    consumer: Weak<()>,
    dropped: AtomicU64,
}

/// Consumer endpoint. Single consumer: the display loop.
#[derive(Debug)]
pub struct FrameReceiver {
    rx: Receiver<ResultPacket>,
    _alive: Arc<()>,
}

/// Create a bounded frame channel of the given capacity.
pub fn frame_channel(capacity: usize) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    let alive = Arc::new(());
    let sender = FrameSender {
        tx,
        evict_rx: rx.clone(),
        consumer: Arc::downgrade(&alive),
        dropped: AtomicU64::new(0),
    };
    (sender, FrameReceiver { rx, _alive: alive })
}

impl FrameSender {
    /// Push without blocking. When the channel is at capacity the oldest
    /// packet is discarded so the queue keeps the most recent results.
    pub fn push(&self, packet: ResultPacket) -> PushOutcome {
        if self.consumer.upgrade().is_none() {
            return PushOutcome::Disconnected;
        }
        let mut evicted = false;
        let mut packet = packet;
        loop {
            match self.tx.try_send(packet) {
                Ok(()) => {
                    return if evicted {
                        PushOutcome::DroppedOldest
                    } else {
                        PushOutcome::Delivered
                    };
                }
                Err(TrySendError::Full(returned)) => {
                    // Evict the head; the concurrent consumer may beat us
                    // to it, which is just as good.
                    if self.evict_rx.try_recv().is_ok() {
                        evicted = true;
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    packet = returned;
                }
                Err(TrySendError::Disconnected(_)) => return PushOutcome::Disconnected,
            }
        }
    }

    /// Total packets evicted due to backpressure.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl FrameReceiver {
    /// Block up to `timeout` for the next packet.
    pub fn pop(&self, timeout: Duration) -> PopResult {
        match self.rx.recv_timeout(timeout) {
            Ok(packet) => PopResult::Packet(packet),
            Err(RecvTimeoutError::Timeout) => PopResult::Empty,
            Err(RecvTimeoutError::Disconnected) => PopResult::Disconnected,
        }
    }
}
