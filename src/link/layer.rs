//! Per-link data-link state machine.
//!
//! [`LinkLayer`] performs no I/O. Every input (a frame from the router, a
//! segment from the transport layer, a write completion, a timer expiry)
//! appends [`LinkAction`]s that the router executes on the executor.
//!
//! Each station plays both roles of the link protocol:
//!
//! - the **primary** side initiates transactions (user data, link reset) and,
//!   in confirmed mode, waits for the peer's ACK with retries;
//! - the **secondary** side answers the peer's primary frames and tracks the
//!   expected frame count bit to discard duplicates.

use std::time::Duration;

use thiserror::Error;

use super::config::{LinkConfig, LinkRoute};
use super::frame::{LinkFrame, LinkFunction};

/// Side effect requested by the link layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Queue a frame on the physical channel.
    Transmit(LinkFrame),
    /// Pass received user data to the transport layer.
    Deliver(Vec<u8>),
    /// (Re)start this link's confirmation timer.
    StartTimer(Duration),
    /// Cancel this link's confirmation timer.
    CancelTimer,
    /// The segment handed to [`LinkLayer::send`] completed.
    SendResult(bool),
    /// The link can now carry user data.
    LowerLayerUp,
    /// The link can no longer carry user data.
    LowerLayerDown,
}

/// Errors returned to the transport layer by [`LinkLayer::send`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// A primary transaction is already outstanding.
    #[error("link busy")]
    Busy,

    /// The lower layer is not up.
    #[error("link down")]
    Down,

    /// Segment larger than the configured max payload.
    #[error("segment of {0} bytes exceeds max payload")]
    TooLarge(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Primary {
    Idle,
    /// Unconfirmed user data is queued; completes when written.
    SendingUnconfirmed,
    /// RESET_LINK_STATES sent; `pending` is user data to send once reset.
    ResetWait {
        retries: u32,
        pending: Option<Vec<u8>>,
        written: bool,
    },
    /// Initial reset failed; waiting one timeout before trying again.
    ResetBackoff,
    /// CONFIRMED_USER_DATA sent; waiting for ACK.
    ConfirmWait {
        retries: u32,
        segment: Vec<u8>,
        written: bool,
    },
}

/// Data-link state machine for one logical link.
#[derive(Debug)]
pub struct LinkLayer {
    config: LinkConfig,
    channel_open: bool,
    up: bool,
    primary: Primary,
    /// Primary side: the peer's secondary has been reset by us.
    link_reset: bool,
    /// Primary side: FCB for the next confirmed frame.
    next_fcb: bool,
    /// Secondary side: the peer has reset us.
    secondary_reset: bool,
    /// Secondary side: FCB expected on the next confirmed frame.
    expected_fcb: bool,
}

impl LinkLayer {
    /// Create a link layer. The configuration should already be validated.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            channel_open: false,
            up: false,
            primary: Primary::Idle,
            link_reset: false,
            next_fcb: false,
            secondary_reset: false,
            expected_fcb: false,
        }
    }

    /// This link's configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Route under which this link receives.
    pub fn route(&self) -> LinkRoute {
        self.config.route()
    }

    /// True once the channel is open and, in confirmed mode, the initial link
    /// reset has been acknowledged.
    pub fn is_lower_layer_up(&self) -> bool {
        self.up
    }

    /// True when a segment can be handed to [`send`](Self::send).
    pub fn is_ready(&self) -> bool {
        self.up && self.primary == Primary::Idle
    }

    /// The physical channel opened.
    pub fn on_lower_layer_up(&mut self, out: &mut Vec<LinkAction>) {
        if self.channel_open {
            return;
        }
        self.channel_open = true;
        if self.config.use_confirms {
            tracing::debug!(route = %self.route(), "channel open, resetting link");
            self.begin_reset(None, out);
        } else {
            self.up = true;
            out.push(LinkAction::LowerLayerUp);
        }
    }

    /// The physical channel closed.
    pub fn on_lower_layer_down(&mut self, out: &mut Vec<LinkAction>) {
        if !self.channel_open {
            return;
        }
        self.channel_open = false;
        if !matches!(self.primary, Primary::Idle | Primary::SendingUnconfirmed) {
            out.push(LinkAction::CancelTimer);
        }
        self.primary = Primary::Idle;
        self.link_reset = false;
        self.secondary_reset = false;
        if self.up {
            self.up = false;
            out.push(LinkAction::LowerLayerDown);
        }
    }

    /// Start sending one transport segment.
    pub fn send(&mut self, segment: Vec<u8>, out: &mut Vec<LinkAction>) -> Result<(), LinkError> {
        if !self.up {
            return Err(LinkError::Down);
        }
        if self.primary != Primary::Idle {
            return Err(LinkError::Busy);
        }
        if segment.len() > self.config.max_payload {
            return Err(LinkError::TooLarge(segment.len()));
        }

        if !self.config.use_confirms {
            out.push(LinkAction::Transmit(
                self.primary_frame(LinkFunction::UnconfirmedUserData, segment),
            ));
            self.primary = Primary::SendingUnconfirmed;
        } else if self.link_reset {
            self.send_confirmed(self.config.num_retry, segment, out);
        } else {
            self.begin_reset(Some(segment), out);
        }
        Ok(())
    }

    /// The router finished writing (or failed to write) our last primary frame.
    pub fn on_transmit_complete(&mut self, success: bool, out: &mut Vec<LinkAction>) {
        match &mut self.primary {
            Primary::SendingUnconfirmed => {
                self.primary = Primary::Idle;
                out.push(LinkAction::SendResult(success));
            }
            Primary::ResetWait { written, .. } | Primary::ConfirmWait { written, .. }
                if !*written =>
            {
                if success {
                    *written = true;
                    out.push(LinkAction::StartTimer(self.config.timeout));
                } else {
                    let had_data = !matches!(self.primary, Primary::ResetWait { pending: None, .. });
                    self.primary = Primary::Idle;
                    if had_data {
                        out.push(LinkAction::SendResult(false));
                    }
                }
            }
            // An ACK beat the write completion, or the channel went down.
            _ => {}
        }
    }

    /// The confirmation timer fired.
    pub fn on_timeout(&mut self, out: &mut Vec<LinkAction>) {
        match std::mem::replace(&mut self.primary, Primary::Idle) {
            Primary::ResetWait {
                retries,
                pending,
                written: true,
            } => {
                tracing::debug!(route = %self.route(), retries, "link reset timed out");
                self.retry_reset(retries, pending, out);
            }
            Primary::ConfirmWait {
                retries,
                segment,
                written: true,
            } => {
                tracing::debug!(route = %self.route(), retries, "confirmed user data timed out");
                if retries > 0 {
                    self.send_confirmed(retries - 1, segment, out);
                } else {
                    self.fail_confirmed(out);
                }
            }
            Primary::ResetBackoff => self.begin_reset(None, out),
            other => self.primary = other,
        }
    }

    /// Process a frame routed to this link.
    ///
    /// Frames that fail validation are dropped silently (logged at debug).
    pub fn on_frame(&mut self, frame: &LinkFrame, out: &mut Vec<LinkAction>) {
        if let Err(reason) = self.validate(frame) {
            tracing::debug!(route = %self.route(), reason, "dropping frame");
            return;
        }
        if frame.header.function.is_primary() {
            self.on_primary_frame(frame, out);
        } else {
            self.on_secondary_frame(frame.header.function, out);
        }
    }

    fn validate(&self, frame: &LinkFrame) -> Result<(), &'static str> {
        let header = &frame.header;
        if header.dir == self.config.role.dir() {
            return Err("frame sent in our own direction");
        }
        if header.destination != self.config.local_addr {
            return Err("unknown destination");
        }
        if header.source != self.config.remote_addr {
            return Err("unknown source");
        }
        if frame.payload.len() > self.config.max_payload {
            return Err("payload exceeds max payload");
        }
        if header.function.carries_user_data() == frame.payload.is_empty() {
            return Err("user data length does not match function");
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Secondary side: answering the peer's primary frames
    // -------------------------------------------------------------------------

    fn on_primary_frame(&mut self, frame: &LinkFrame, out: &mut Vec<LinkAction>) {
        let fcb = frame.header.fcb;
        match frame.header.function {
            LinkFunction::ResetLinkStates => {
                self.secondary_reset = true;
                self.expected_fcb = true;
                out.push(self.ack());
            }
            LinkFunction::TestLinkStates => {
                if self.secondary_reset {
                    if fcb == self.expected_fcb {
                        self.expected_fcb = !self.expected_fcb;
                    }
                    out.push(self.ack());
                } else {
                    tracing::debug!(route = %self.route(), "test link states ignored: secondary not reset");
                }
            }
            LinkFunction::ConfirmedUserData => {
                if !self.secondary_reset {
                    tracing::debug!(route = %self.route(), "confirmed user data ignored: secondary not reset");
                    return;
                }
                out.push(self.ack());
                if fcb == self.expected_fcb {
                    self.expected_fcb = !self.expected_fcb;
                    out.push(LinkAction::Deliver(frame.payload.clone()));
                } else {
                    tracing::debug!(route = %self.route(), "duplicate confirmed user data acknowledged");
                }
            }
            LinkFunction::UnconfirmedUserData => {
                out.push(LinkAction::Deliver(frame.payload.clone()));
            }
            LinkFunction::RequestLinkStatus => {
                out.push(LinkAction::Transmit(
                    self.secondary_frame(LinkFunction::LinkStatus),
                ));
            }
            // Secondary functions are routed to on_secondary_frame.
            LinkFunction::Ack
            | LinkFunction::Nack
            | LinkFunction::LinkStatus
            | LinkFunction::NotSupported => {}
        }
    }

    // -------------------------------------------------------------------------
    // Primary side: handling the peer's answers
    // -------------------------------------------------------------------------

    fn on_secondary_frame(&mut self, function: LinkFunction, out: &mut Vec<LinkAction>) {
        match (function, std::mem::replace(&mut self.primary, Primary::Idle)) {
            (LinkFunction::Ack, Primary::ResetWait { pending, .. }) => {
                out.push(LinkAction::CancelTimer);
                self.link_reset = true;
                self.next_fcb = true;
                if !self.up {
                    tracing::debug!(route = %self.route(), "link reset acknowledged");
                    self.up = true;
                    out.push(LinkAction::LowerLayerUp);
                }
                if let Some(segment) = pending {
                    self.send_confirmed(self.config.num_retry, segment, out);
                }
            }
            (LinkFunction::Ack, Primary::ConfirmWait { .. }) => {
                out.push(LinkAction::CancelTimer);
                self.next_fcb = !self.next_fcb;
                out.push(LinkAction::SendResult(true));
            }
            (LinkFunction::Nack, Primary::ResetWait { retries, pending, .. }) => {
                out.push(LinkAction::CancelTimer);
                self.retry_reset(retries, pending, out);
            }
            (LinkFunction::Nack, Primary::ConfirmWait { retries, segment, .. }) => {
                // The peer lost its link state; reset it before retrying.
                out.push(LinkAction::CancelTimer);
                self.link_reset = false;
                if retries > 0 {
                    self.primary = Primary::ResetWait {
                        retries: retries - 1,
                        pending: Some(segment),
                        written: false,
                    };
                    out.push(LinkAction::Transmit(
                        self.primary_frame(LinkFunction::ResetLinkStates, Vec::new()),
                    ));
                } else {
                    self.fail_confirmed(out);
                }
            }
            (function, state) => {
                tracing::debug!(route = %self.route(), ?function, "unexpected secondary frame");
                self.primary = state;
            }
        }
    }

    fn begin_reset(&mut self, pending: Option<Vec<u8>>, out: &mut Vec<LinkAction>) {
        self.primary = Primary::ResetWait {
            retries: self.config.num_retry,
            pending,
            written: false,
        };
        out.push(LinkAction::Transmit(
            self.primary_frame(LinkFunction::ResetLinkStates, Vec::new()),
        ));
    }

    fn retry_reset(&mut self, retries: u32, pending: Option<Vec<u8>>, out: &mut Vec<LinkAction>) {
        if retries > 0 {
            self.primary = Primary::ResetWait {
                retries: retries - 1,
                pending,
                written: false,
            };
            out.push(LinkAction::Transmit(
                self.primary_frame(LinkFunction::ResetLinkStates, Vec::new()),
            ));
            return;
        }

        tracing::warn!(route = %self.route(), "link reset retries exhausted");
        self.primary = Primary::Idle;
        if pending.is_some() {
            out.push(LinkAction::SendResult(false));
        }
        if !self.up {
            // Keep trying to bring the link up.
            self.primary = Primary::ResetBackoff;
            out.push(LinkAction::StartTimer(self.config.timeout));
        }
    }

    fn send_confirmed(&mut self, retries: u32, segment: Vec<u8>, out: &mut Vec<LinkAction>) {
        let frame = LinkFrame::primary(
            LinkFunction::ConfirmedUserData,
            self.config.role.dir(),
            self.next_fcb,
            self.config.remote_addr,
            self.config.local_addr,
            segment.clone(),
        );
        out.push(LinkAction::Transmit(frame));
        self.primary = Primary::ConfirmWait {
            retries,
            segment,
            written: false,
        };
    }

    fn fail_confirmed(&mut self, out: &mut Vec<LinkAction>) {
        tracing::warn!(route = %self.route(), "confirmed user data retries exhausted");
        self.primary = Primary::Idle;
        self.link_reset = false;
        out.push(LinkAction::SendResult(false));
    }

    fn primary_frame(&self, function: LinkFunction, payload: Vec<u8>) -> LinkFrame {
        LinkFrame::primary(
            function,
            self.config.role.dir(),
            false,
            self.config.remote_addr,
            self.config.local_addr,
            payload,
        )
    }

    fn secondary_frame(&self, function: LinkFunction) -> LinkFrame {
        LinkFrame::secondary(
            function,
            self.config.role.dir(),
            self.config.remote_addr,
            self.config.local_addr,
        )
    }

    fn ack(&self) -> LinkAction {
        LinkAction::Transmit(self.secondary_frame(LinkFunction::Ack))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkRole;

    const MASTER: u16 = 1;
    const OUTSTATION: u16 = 1024;

    fn master(confirms: bool) -> LinkLayer {
        LinkLayer::new(LinkConfig::new(LinkRole::Master, MASTER, OUTSTATION).with_confirms(confirms))
    }

    fn outstation(confirms: bool) -> LinkLayer {
        LinkLayer::new(
            LinkConfig::new(LinkRole::Outstation, OUTSTATION, MASTER).with_confirms(confirms),
        )
    }

    fn transmitted(actions: &[LinkAction]) -> Vec<LinkFrame> {
        actions
            .iter()
            .filter_map(|a| match a {
                LinkAction::Transmit(f) => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    fn from_outstation(function: LinkFunction) -> LinkFrame {
        LinkFrame::secondary(function, false, MASTER, OUTSTATION)
    }

    fn up(link: &mut LinkLayer) -> Vec<LinkAction> {
        let mut out = Vec::new();
        link.on_lower_layer_up(&mut out);
        out
    }

    /// Bring a confirmed-mode master through its initial reset.
    fn confirmed_master_up() -> LinkLayer {
        let mut link = master(true);
        up(&mut link);
        let mut out = Vec::new();
        link.on_transmit_complete(true, &mut out);
        link.on_frame(&from_outstation(LinkFunction::Ack), &mut out);
        assert!(link.is_lower_layer_up());
        link
    }

    #[test]
    fn test_unconfirmed_up_immediately() {
        let mut link = master(false);
        assert!(!link.is_lower_layer_up());
        assert_eq!(up(&mut link), vec![LinkAction::LowerLayerUp]);
        assert!(link.is_ready());
    }

    #[test]
    fn test_unconfirmed_send_completes_on_write() {
        let mut link = master(false);
        up(&mut link);

        let mut out = Vec::new();
        link.send(vec![0xC0, 0x01], &mut out).unwrap();
        let frames = transmitted(&out);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.function, LinkFunction::UnconfirmedUserData);
        assert_eq!(frames[0].header.destination, OUTSTATION);
        assert_eq!(frames[0].header.source, MASTER);
        assert!(frames[0].header.dir);

        assert_eq!(link.send(vec![1], &mut out), Err(LinkError::Busy));

        let mut out = Vec::new();
        link.on_transmit_complete(true, &mut out);
        assert_eq!(out, vec![LinkAction::SendResult(true)]);
        assert!(link.is_ready());
    }

    #[test]
    fn test_send_while_down_rejected() {
        let mut link = master(false);
        let mut out = Vec::new();
        assert_eq!(link.send(vec![1], &mut out), Err(LinkError::Down));
        assert!(out.is_empty());
    }

    #[test]
    fn test_confirmed_mode_resets_before_up() {
        let mut link = master(true);
        let out = up(&mut link);
        let frames = transmitted(&out);
        assert_eq!(frames[0].header.function, LinkFunction::ResetLinkStates);
        assert!(!link.is_lower_layer_up());

        let mut out = Vec::new();
        link.on_transmit_complete(true, &mut out);
        assert_eq!(out, vec![LinkAction::StartTimer(Duration::from_secs(1))]);

        let mut out = Vec::new();
        link.on_frame(&from_outstation(LinkFunction::Ack), &mut out);
        assert_eq!(out, vec![LinkAction::CancelTimer, LinkAction::LowerLayerUp]);
        assert!(link.is_ready());
    }

    #[test]
    fn test_confirmed_fcb_alternates() {
        let mut link = confirmed_master_up();
        let mut fcbs = Vec::new();

        for _ in 0..3 {
            let mut out = Vec::new();
            link.send(vec![0xAA], &mut out).unwrap();
            let frame = transmitted(&out).remove(0);
            assert_eq!(frame.header.function, LinkFunction::ConfirmedUserData);
            assert!(frame.header.fcv_dfc);
            fcbs.push(frame.header.fcb);

            let mut out = Vec::new();
            link.on_transmit_complete(true, &mut out);
            link.on_frame(&from_outstation(LinkFunction::Ack), &mut out);
            assert!(out.contains(&LinkAction::SendResult(true)));
        }
        assert_eq!(fcbs, vec![true, false, true]);
    }

    #[test]
    fn test_confirmed_retry_then_fail() {
        let mut link = LinkLayer::new(
            LinkConfig::new(LinkRole::Master, MASTER, OUTSTATION)
                .with_confirms(true)
                .with_num_retry(1),
        );
        up(&mut link);
        let mut out = Vec::new();
        link.on_transmit_complete(true, &mut out);
        link.on_frame(&from_outstation(LinkFunction::Ack), &mut out);

        let mut out = Vec::new();
        link.send(vec![0x01], &mut out).unwrap();
        let first = transmitted(&out).remove(0);
        link.on_transmit_complete(true, &mut out);

        // First timeout retransmits with the same FCB.
        let mut out = Vec::new();
        link.on_timeout(&mut out);
        let retry = transmitted(&out).remove(0);
        assert_eq!(retry, first);

        // Second timeout exhausts retries.
        let mut out = Vec::new();
        link.on_transmit_complete(true, &mut out);
        link.on_timeout(&mut out);
        assert!(out.contains(&LinkAction::SendResult(false)));
        assert!(link.is_ready());

        // The next send re-runs the reset handshake first.
        let mut out = Vec::new();
        link.send(vec![0x02], &mut out).unwrap();
        assert_eq!(
            transmitted(&out)[0].header.function,
            LinkFunction::ResetLinkStates
        );
    }

    #[test]
    fn test_initial_reset_keeps_retrying() {
        let mut link = LinkLayer::new(
            LinkConfig::new(LinkRole::Master, MASTER, OUTSTATION)
                .with_confirms(true)
                .with_num_retry(0),
        );
        up(&mut link);
        let mut out = Vec::new();
        link.on_transmit_complete(true, &mut out);

        let mut out = Vec::new();
        link.on_timeout(&mut out);
        assert_eq!(out, vec![LinkAction::StartTimer(Duration::from_secs(1))]);
        assert!(!link.is_lower_layer_up());

        let mut out = Vec::new();
        link.on_timeout(&mut out);
        assert_eq!(
            transmitted(&out)[0].header.function,
            LinkFunction::ResetLinkStates
        );
    }

    #[test]
    fn test_secondary_confirmed_data_and_duplicates() {
        let mut link = outstation(false);
        up(&mut link);

        let data = |fcb| {
            LinkFrame::primary(
                LinkFunction::ConfirmedUserData,
                true,
                fcb,
                OUTSTATION,
                MASTER,
                vec![0x42],
            )
        };

        // Ignored before reset.
        let mut out = Vec::new();
        link.on_frame(&data(true), &mut out);
        assert!(out.is_empty());

        let reset = LinkFrame::primary(
            LinkFunction::ResetLinkStates,
            true,
            false,
            OUTSTATION,
            MASTER,
            vec![],
        );
        let mut out = Vec::new();
        link.on_frame(&reset, &mut out);
        assert_eq!(transmitted(&out)[0].header.function, LinkFunction::Ack);
        assert!(!transmitted(&out)[0].header.dir);

        let mut out = Vec::new();
        link.on_frame(&data(true), &mut out);
        assert!(out.contains(&LinkAction::Deliver(vec![0x42])));

        // Same FCB again is a retransmission: ACK without delivering.
        let mut out = Vec::new();
        link.on_frame(&data(true), &mut out);
        assert_eq!(transmitted(&out).len(), 1);
        assert!(!out.iter().any(|a| matches!(a, LinkAction::Deliver(_))));

        let mut out = Vec::new();
        link.on_frame(&data(false), &mut out);
        assert!(out.contains(&LinkAction::Deliver(vec![0x42])));
    }

    #[test]
    fn test_request_link_status() {
        let mut link = outstation(false);
        up(&mut link);
        let request = LinkFrame::primary(
            LinkFunction::RequestLinkStatus,
            true,
            false,
            OUTSTATION,
            MASTER,
            vec![],
        );
        let mut out = Vec::new();
        link.on_frame(&request, &mut out);
        assert_eq!(
            transmitted(&out)[0].header.function,
            LinkFunction::LinkStatus
        );
    }

    #[test]
    fn test_misaddressed_frames_dropped() {
        let mut link = outstation(false);
        up(&mut link);

        let frames = [
            // Wrong destination.
            LinkFrame::primary(LinkFunction::UnconfirmedUserData, true, false, 7, MASTER, vec![1]),
            // Wrong source.
            LinkFrame::primary(LinkFunction::UnconfirmedUserData, true, false, OUTSTATION, 9, vec![1]),
            // Sent in the outstation's own direction.
            LinkFrame::primary(LinkFunction::UnconfirmedUserData, false, false, OUTSTATION, MASTER, vec![1]),
            // User data function without data.
            LinkFrame::primary(LinkFunction::UnconfirmedUserData, true, false, OUTSTATION, MASTER, vec![]),
        ];
        for frame in &frames {
            let mut out = Vec::new();
            link.on_frame(frame, &mut out);
            assert!(out.is_empty(), "accepted {frame:?}");
        }
    }

    #[test]
    fn test_oversized_payload_dropped() {
        let mut link = LinkLayer::new(
            LinkConfig::new(LinkRole::Outstation, OUTSTATION, MASTER).with_max_payload(16),
        );
        up(&mut link);
        let frame = LinkFrame::primary(
            LinkFunction::UnconfirmedUserData,
            true,
            false,
            OUTSTATION,
            MASTER,
            vec![0; 17],
        );
        let mut out = Vec::new();
        link.on_frame(&frame, &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_nack_triggers_reset_and_resend() {
        let mut link = confirmed_master_up();
        let mut out = Vec::new();
        link.send(vec![0x07], &mut out).unwrap();
        link.on_transmit_complete(true, &mut out);

        let mut out = Vec::new();
        link.on_frame(&from_outstation(LinkFunction::Nack), &mut out);
        assert_eq!(
            transmitted(&out)[0].header.function,
            LinkFunction::ResetLinkStates
        );

        let mut out = Vec::new();
        link.on_transmit_complete(true, &mut out);
        link.on_frame(&from_outstation(LinkFunction::Ack), &mut out);
        let resent = transmitted(&out);
        assert_eq!(resent[0].header.function, LinkFunction::ConfirmedUserData);
        assert_eq!(resent[0].payload, vec![0x07]);
    }

    #[test]
    fn test_channel_down_resets_state() {
        let mut link = confirmed_master_up();
        let mut out = Vec::new();
        link.send(vec![0x01], &mut out).unwrap();

        let mut out = Vec::new();
        link.on_lower_layer_down(&mut out);
        assert_eq!(out, vec![LinkAction::CancelTimer, LinkAction::LowerLayerDown]);
        assert!(!link.is_lower_layer_up());

        // Coming back up runs the reset handshake again.
        let out = up(&mut link);
        assert_eq!(
            transmitted(&out)[0].header.function,
            LinkFunction::ResetLinkStates
        );
    }
}
