//! Per-link transport state: outbound message queue plus reassembly.

use std::collections::VecDeque;

use super::error::TransportError;
use super::rx::Reassembler;
use super::tx::Segmenter;
use crate::link::LinkRoute;

/// Side effect requested by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportAction {
    /// A complete message for the upper layer.
    Deliver(Vec<u8>),
    /// The oldest queued message was fully sent.
    SendSuccess,
    /// The oldest queued message failed; its remaining segments were dropped.
    SendFailure,
    /// Segments that no longer occupy the transmit budget.
    Release(usize),
}

/// Transport layer for one logical link.
///
/// Messages are segmented lazily: only one segment is handed to the link
/// layer at a time, and the next is produced after the link reports the
/// previous one done.
#[derive(Debug)]
pub struct TransportLayer {
    route: LinkRoute,
    max_message_size: usize,
    capacity: usize,
    queue: VecDeque<Segmenter>,
    in_flight: bool,
    rx: Reassembler,
    up: bool,
}

impl TransportLayer {
    /// Create a transport layer carrying `capacity` data bytes per segment.
    pub fn new(route: LinkRoute, capacity: usize, max_message_size: usize) -> Self {
        Self {
            route,
            max_message_size,
            capacity,
            queue: VecDeque::new(),
            in_flight: false,
            rx: Reassembler::new(max_message_size),
            up: false,
        }
    }

    /// Number of segments a message of `len` bytes needs.
    pub fn segments_for(&self, len: usize) -> usize {
        Segmenter::segment_count(len, self.capacity)
    }

    /// Check that a message of `len` bytes can be sent.
    pub fn check_message(&self, len: usize) -> Result<(), TransportError> {
        if len == 0 {
            return Err(TransportError::EmptyMessage);
        }
        if len > self.max_message_size {
            return Err(TransportError::MessageTooLarge {
                size: len,
                max: self.max_message_size,
            });
        }
        Ok(())
    }

    /// Queue a message for segmentation.
    pub fn send(&mut self, message: Vec<u8>) -> Result<(), TransportError> {
        self.check_message(message.len())?;
        self.queue.push_back(Segmenter::new(message, self.capacity));
        Ok(())
    }

    /// Messages queued or in progress.
    pub fn pending_messages(&self) -> usize {
        self.queue.len()
    }

    /// True when the lower layer is up.
    pub fn is_up(&self) -> bool {
        self.up
    }

    /// Produce the next segment for the link layer, if one may be sent now.
    pub fn poll_segment(&mut self) -> Option<Vec<u8>> {
        if !self.up || self.in_flight {
            return None;
        }
        let segment = self.queue.front_mut()?.next()?;
        self.in_flight = true;
        Some(segment)
    }

    /// The link finished with the segment returned by [`poll_segment`](Self::poll_segment).
    pub fn on_send_result(&mut self, success: bool, out: &mut Vec<TransportAction>) {
        if !self.in_flight {
            tracing::debug!(route = %self.route, "send result with no segment in flight");
            return;
        }
        self.in_flight = false;
        out.push(TransportAction::Release(1));

        if success {
            if self.queue.front().is_some_and(Segmenter::is_done) {
                self.queue.pop_front();
                out.push(TransportAction::SendSuccess);
            }
        } else if let Some(message) = self.queue.pop_front() {
            tracing::debug!(
                route = %self.route,
                dropped = message.remaining(),
                "segment failed, abandoning message"
            );
            Self::release(message.remaining(), out);
            out.push(TransportAction::SendFailure);
        }
    }

    /// Feed a link payload received for this route.
    pub fn on_receive(&mut self, segment: &[u8], out: &mut Vec<TransportAction>) {
        match self.rx.push(segment) {
            Ok(Some(message)) => out.push(TransportAction::Deliver(message)),
            Ok(None) => {}
            Err(e) => tracing::debug!(route = %self.route, error = %e, "segment discarded"),
        }
    }

    /// The link layer can carry data.
    pub fn on_lower_layer_up(&mut self) {
        self.up = true;
    }

    /// The link layer went down: fail everything queued and reset reassembly.
    pub fn on_lower_layer_down(&mut self, out: &mut Vec<TransportAction>) {
        self.up = false;
        self.rx.reset();
        let in_flight = std::mem::take(&mut self.in_flight);
        for (i, message) in self.queue.drain(..).enumerate() {
            let outstanding = usize::from(i == 0 && in_flight);
            Self::release(message.remaining() + outstanding, out);
            out.push(TransportAction::SendFailure);
        }
    }

    fn release(count: usize, out: &mut Vec<TransportAction>) {
        if count > 0 {
            out.push(TransportAction::Release(count));
        }
    }
}
