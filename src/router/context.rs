//! One registered link: its link and transport state plus the upper layer.

use std::fmt;
use std::sync::Arc;

use crate::core::UpperLayer;
use crate::executor::TimerHandle;
use crate::link::{LinkConfig, LinkLayer};
use crate::transport::TransportLayer;

pub(crate) struct Context {
    pub(crate) link: LinkLayer,
    pub(crate) transport: TransportLayer,
    pub(crate) upper: Arc<dyn UpperLayer>,
    pub(crate) timer: Option<TimerHandle>,
}

impl Context {
    pub(crate) fn new(config: LinkConfig, max_message_size: usize, upper: Arc<dyn UpperLayer>) -> Self {
        let transport =
            TransportLayer::new(config.route(), config.segment_capacity(), max_message_size);
        Self {
            link: LinkLayer::new(config),
            transport,
            upper,
            timer: None,
        }
    }

    pub(crate) fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }

    pub(crate) fn upcall(&self, kind: UpcallKind) -> Upcall {
        Upcall::new(Arc::clone(&self.upper), kind)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("link", &self.link)
            .field("transport", &self.transport)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub(crate) enum UpcallKind {
    Receive(Vec<u8>),
    Up,
    Down,
    SendSuccess,
    SendFailure,
}

/// A call into an upper layer, made once router state is unlocked.
pub(crate) struct Upcall {
    upper: Arc<dyn UpperLayer>,
    kind: UpcallKind,
}

impl Upcall {
    pub(crate) fn new(upper: Arc<dyn UpperLayer>, kind: UpcallKind) -> Self {
        Self { upper, kind }
    }

    pub(crate) fn invoke(self) {
        match self.kind {
            UpcallKind::Receive(message) => self.upper.on_receive(&message),
            UpcallKind::Up => self.upper.on_lower_layer_up(),
            UpcallKind::Down => self.upper.on_lower_layer_down(),
            UpcallKind::SendSuccess => self.upper.on_send_success(),
            UpcallKind::SendFailure => self.upper.on_send_failure(),
        }
    }
}
