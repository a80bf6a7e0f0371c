//! Router: one physical channel shared by many logical links.
//!
//! ```text
//!   LinkHandle::send ──post──▶ ┌──────────────── executor task ───────────────┐
//!                              │ TransportLayer ─segment─▶ LinkLayer ─frame─▶ │
//!   reader task ─────post────▶ │   ▲ deliver          ▲ on_frame    tx queue  │ ──▶ writer task
//!   writer task ─────post────▶ │   └──── RouteTable ──┘             (1 in flight)
//!   link timers ─────post────▶ └──────────────────────────────────────────────┘
//! ```
//!
//! All router state sits behind one mutex. Executor tasks take it to run the
//! layers; the public methods take it for their checks and post any follow-up
//! work while still holding it, so tasks are queued in lock order. Calls into
//! upper layers are collected while the lock is held and made after it is
//! released, always from an executor task.

mod budget;
mod channel;
mod config;
mod context;
mod io;
mod table;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use channel::loopback_channel;
#[cfg(feature = "tcp")]
pub use channel::connect_tcp;
pub use config::RouterConfig;
pub use table::LinkId;

use budget::TxBudget;
use context::{Context, Upcall, UpcallKind};
use table::RouteTable;

use crate::core::{ConfigError, StackError, StackResult, UpperLayer};
use crate::executor::Executor;
use crate::link::{LinkAction, LinkConfig, LinkFrame, LinkRoute};
use crate::transport::TransportAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No channel attached.
    Idle,
    /// Reading and writing a channel.
    Running,
    /// Terminal.
    Shutdown,
}

#[derive(Debug)]
struct Outbound {
    link: LinkId,
    bytes: Vec<u8>,
    /// Report completion to the link layer (primary frames only).
    primary: bool,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    link: LinkId,
    primary: bool,
}

/// Frames waiting for the channel, at most one of them being written.
#[derive(Debug, Default)]
struct TxPath {
    queue: VecDeque<Outbound>,
    in_flight: Option<InFlight>,
    writer: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

impl TxPath {
    fn enqueue(&mut self, link: LinkId, frame: &LinkFrame) {
        match frame.encode() {
            Ok(bytes) => {
                tracing::trace!(
                    %link,
                    function = ?frame.header.function,
                    len = bytes.len(),
                    "tx frame queued"
                );
                self.queue.push_back(Outbound {
                    link,
                    bytes,
                    primary: frame.header.function.is_primary(),
                });
            }
            Err(e) => tracing::error!(%link, error = %e, "link layer produced an unencodable frame"),
        }
    }

    /// Hand the next frame to the writer if the channel is free.
    fn start_write(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        let Some(writer) = &self.writer else {
            return;
        };
        let Some(next) = self.queue.pop_front() else {
            return;
        };
        if writer.send(next.bytes).is_err() {
            tracing::warn!(link = %next.link, "writer task gone, frame dropped");
            return;
        }
        self.in_flight = Some(InFlight {
            link: next.link,
            primary: next.primary,
        });
    }

    fn drop_link(&mut self, link: LinkId) {
        self.queue.retain(|frame| frame.link != link);
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.in_flight = None;
        self.writer = None;
    }
}

/// Background tasks serving one channel. Aborted when replaced or dropped.
#[derive(Debug)]
struct IoTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Drop for IoTasks {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[derive(Debug)]
struct RouterInner {
    phase: Phase,
    /// Incremented per channel; events from older channels are ignored.
    epoch: u64,
    table: RouteTable<Context>,
    tx: TxPath,
    io: Option<IoTasks>,
}

#[derive(Debug)]
pub(crate) struct RouterShared {
    me: Weak<RouterShared>,
    executor: Executor,
    config: RouterConfig,
    budget: TxBudget,
    inner: Mutex<RouterInner>,
}

/// Owns a physical channel and the links multiplexed over it.
///
/// Cheap to clone; clones refer to the same router.
#[derive(Debug, Clone)]
pub struct Router {
    shared: Arc<RouterShared>,
}

impl Router {
    /// Create an idle router scheduling its work on `executor`.
    pub fn new(executor: Executor, config: RouterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let shared = Arc::new_cyclic(|me| RouterShared {
            me: me.clone(),
            executor,
            budget: TxBudget::new(config.tx_queue_depth),
            config,
            inner: Mutex::new(RouterInner {
                phase: Phase::Idle,
                epoch: 0,
                table: RouteTable::default(),
                tx: TxPath::default(),
                io: None,
            }),
        });
        Ok(Self { shared })
    }

    /// Router configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.shared.config
    }

    /// Executor the router schedules on.
    pub fn executor(&self) -> &Executor {
        &self.shared.executor
    }

    /// Register a link under its route.
    ///
    /// Fails if the configuration is invalid or the route is taken. A link
    /// added while the channel is running is brought up on the executor.
    pub fn add_context(
        &self,
        config: LinkConfig,
        upper: Arc<dyn UpperLayer>,
    ) -> Result<LinkId, ConfigError> {
        config.validate()?;
        let route = config.route();
        let context = Context::new(config, self.shared.config.max_message_size, upper);

        let mut inner = self.shared.lock();
        let id = inner.table.insert(route, context)?;
        tracing::debug!(%id, %route, "link registered");

        if inner.phase == Phase::Running {
            let epoch = inner.epoch;
            let weak = self.shared.me.clone();
            self.shared.executor.post(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.open_links(epoch, Some(id));
                }
            });
        }
        Ok(id)
    }

    /// Unregister a link. Frames for its route are no longer dispatched.
    ///
    /// Its queued messages fail and, if it was up, its upper layer sees the
    /// lower layer go down; both are reported from a task on the executor,
    /// after any work already posted for the link. Returns `false` if the id
    /// is unknown.
    pub fn remove_context(&self, id: LinkId) -> bool {
        let mut inner = self.shared.lock();
        let Some(mut context) = inner.table.remove(id) else {
            return false;
        };
        inner.tx.drop_link(id);

        let shared = Arc::clone(&self.shared);
        self.shared.executor.post(move || {
            let mut calls = Vec::new();
            shared.take_down(&mut context, &mut calls);
            calls.into_iter().for_each(Upcall::invoke);
        });
        tracing::debug!(%id, "link removed");
        true
    }

    /// Start reading and writing `channel`.
    ///
    /// Spawns the reader and writer tasks, so it must be called from within
    /// a tokio runtime. Every registered link is brought up on the executor.
    /// The router returns to idle when the channel closes and may then be
    /// started again with a new channel.
    pub fn start<T>(&self, channel: T) -> StackResult<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let mut inner = self.shared.lock();
        match inner.phase {
            Phase::Running => return Err(StackError::AlreadyStarted),
            Phase::Shutdown => return Err(StackError::ShutDown),
            Phase::Idle => {}
        }

        inner.epoch += 1;
        let epoch = inner.epoch;

        // Queue the open before any reader event so links come up first.
        let weak = self.shared.me.clone();
        self.shared.executor.post(move || {
            if let Some(shared) = weak.upgrade() {
                shared.open_links(epoch, None);
            }
        });

        let (read_half, write_half) = tokio::io::split(channel);
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let reader = tokio::spawn(io::read_loop(
            read_half,
            self.shared.me.clone(),
            epoch,
            self.shared.config.read_buffer_size,
        ));
        let writer = tokio::spawn(io::write_loop(
            write_half,
            frames_rx,
            self.shared.me.clone(),
            epoch,
        ));

        inner.tx.writer = Some(frames_tx);
        inner.io = Some(IoTasks { reader, writer });
        inner.phase = Phase::Running;
        tracing::info!(epoch, links = inner.table.len(), "router started");
        Ok(())
    }

    /// Stop the channel and bring every link down. Idempotent.
    ///
    /// I/O stops and sends are refused before this returns. The lower-layer
    /// down reports and queued-message failures follow as one executor task,
    /// after any work already posted; no frame, timer or message is
    /// dispatched to a registered context after that task.
    pub fn shutdown(&self) {
        let mut inner = self.shared.lock();
        if inner.phase == Phase::Shutdown {
            return;
        }
        inner.phase = Phase::Shutdown;
        inner.io = None;
        inner.tx.clear();

        let shared = Arc::clone(&self.shared);
        self.shared.executor.post(move || {
            shared.with_inner(|inner, calls| shared.take_down_all(inner, calls));
        });
        tracing::info!("router shut down");
    }

    /// Check if a channel is attached.
    pub fn is_running(&self) -> bool {
        self.shared.lock().phase == Phase::Running
    }

    /// Check if [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        self.shared.lock().phase == Phase::Shutdown
    }

    /// Ids of the registered links, in registration order.
    pub fn link_ids(&self) -> Vec<LinkId> {
        self.shared.lock().table.ids()
    }

    /// Route of a registered link.
    pub fn route_of(&self, id: LinkId) -> Option<LinkRoute> {
        self.shared.lock().table.route_of(id)
    }

    /// True once the link can carry user data.
    pub fn is_lower_layer_up(&self, id: LinkId) -> bool {
        self.shared
            .lock()
            .table
            .get(id)
            .is_some_and(|context| context.link.is_lower_layer_up())
    }

    /// Segments accepted and not yet completed, across all links.
    pub fn pending_segments(&self) -> usize {
        self.shared.budget.used()
    }

    /// Queue an application message on a link.
    ///
    /// Size and budget checks happen here; segmentation and transmission
    /// happen later on the executor. Completion is reported through
    /// [`UpperLayer::on_send_success`] / [`UpperLayer::on_send_failure`].
    pub fn send(&self, id: LinkId, message: Vec<u8>) -> StackResult<()> {
        // Posted under the lock so the message task is ordered before any
        // teardown a concurrent shutdown or removal posts.
        let inner = self.shared.lock();
        match inner.phase {
            Phase::Idle => return Err(StackError::NotStarted),
            Phase::Shutdown => return Err(StackError::ShutDown),
            Phase::Running => {}
        }
        let context = inner.table.get(id).ok_or(StackError::UnknownLink)?;
        context.transport.check_message(message.len())?;
        let segments = context.transport.segments_for(message.len());

        if !self.shared.budget.try_reserve(segments) {
            tracing::debug!(%id, segments, "transmit queue full");
            return Err(StackError::TxQueueFull {
                depth: self.shared.budget.depth(),
            });
        }

        let upper = Arc::clone(&context.upper);
        let weak = self.shared.me.clone();
        self.shared.executor.post(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_message(id, upper, message, segments);
            }
        });
        Ok(())
    }
}

impl RouterShared {
    fn lock(&self) -> MutexGuard<'_, RouterInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `f` under the lock, then make the upcalls it collected.
    fn with_inner<F>(&self, f: F)
    where
        F: FnOnce(&mut RouterInner, &mut Vec<Upcall>),
    {
        let mut calls = Vec::new();
        {
            let mut inner = self.lock();
            f(&mut inner, &mut calls);
        }
        calls.into_iter().for_each(Upcall::invoke);
    }

    // -------------------------------------------------------------------------
    // Executor task entry points
    // -------------------------------------------------------------------------

    fn open_links(&self, epoch: u64, only: Option<LinkId>) {
        self.with_inner(|inner, calls| {
            if inner.phase != Phase::Running || inner.epoch != epoch {
                return;
            }
            let ids = match only {
                Some(id) => vec![id],
                None => inner.table.ids(),
            };
            for id in ids {
                let mut actions = Vec::new();
                if let Some(context) = inner.table.get_mut(id) {
                    context.link.on_lower_layer_up(&mut actions);
                }
                self.drive(inner, id, actions, calls);
            }
        });
    }

    fn on_frame(&self, epoch: u64, frame: LinkFrame) {
        self.with_inner(|inner, calls| {
            if inner.phase != Phase::Running || inner.epoch != epoch {
                return;
            }
            let route = LinkRoute::inbound(frame.header.source, frame.header.destination);
            let Some(id) = inner.table.lookup(route) else {
                tracing::debug!(%route, "no link for route, frame dropped");
                return;
            };
            let mut actions = Vec::new();
            if let Some(context) = inner.table.get_mut(id) {
                context.link.on_frame(&frame, &mut actions);
            }
            self.drive(inner, id, actions, calls);
        });
    }

    fn on_write_complete(&self, epoch: u64, result: std::io::Result<()>) {
        self.with_inner(|inner, calls| {
            if inner.phase != Phase::Running || inner.epoch != epoch {
                return;
            }
            let success = result.is_ok();
            if let Some(done) = inner.tx.in_flight.take() {
                if done.primary {
                    let mut actions = Vec::new();
                    if let Some(context) = inner.table.get_mut(done.link) {
                        context.link.on_transmit_complete(success, &mut actions);
                    }
                    self.drive(inner, done.link, actions, calls);
                }
            }
            match result {
                Ok(()) => inner.tx.start_write(),
                Err(e) => self.close_channel(inner, &e.to_string(), calls),
            }
        });
    }

    fn on_channel_closed(&self, epoch: u64, reason: &str) {
        self.with_inner(|inner, calls| {
            if inner.phase == Phase::Running && inner.epoch == epoch {
                self.close_channel(inner, reason, calls);
            }
        });
    }

    fn on_timeout(&self, id: LinkId) {
        self.with_inner(|inner, calls| {
            if inner.phase != Phase::Running {
                return;
            }
            let mut actions = Vec::new();
            if let Some(context) = inner.table.get_mut(id) {
                context.timer = None;
                context.link.on_timeout(&mut actions);
            }
            self.drive(inner, id, actions, calls);
        });
    }

    fn on_message(
        &self,
        id: LinkId,
        upper: Arc<dyn UpperLayer>,
        message: Vec<u8>,
        segments: usize,
    ) {
        self.with_inner(|inner, calls| {
            let running = inner.phase == Phase::Running;
            let Some(context) = inner.table.get_mut(id) else {
                // Removed after the message was accepted.
                self.budget.release(segments);
                calls.push(Upcall::new(upper, UpcallKind::SendFailure));
                return;
            };
            if !running {
                self.budget.release(segments);
                calls.push(context.upcall(UpcallKind::SendFailure));
                return;
            }
            if let Err(e) = context.transport.send(message) {
                tracing::warn!(%id, error = %e, "message rejected after acceptance");
                self.budget.release(segments);
                calls.push(context.upcall(UpcallKind::SendFailure));
                return;
            }
            self.drive(inner, id, Vec::new(), calls);
        });
    }

    // -------------------------------------------------------------------------
    // Layer plumbing
    // -------------------------------------------------------------------------

    /// Execute link actions for one context, feeding the transport layer and
    /// pumping its next segment until nothing more can happen.
    fn drive(
        &self,
        inner: &mut RouterInner,
        id: LinkId,
        actions: Vec<LinkAction>,
        calls: &mut Vec<Upcall>,
    ) {
        let RouterInner { table, tx, .. } = inner;
        let Some(context) = table.get_mut(id) else {
            return;
        };

        let mut pending: VecDeque<LinkAction> = actions.into();
        loop {
            while let Some(action) = pending.pop_front() {
                match action {
                    LinkAction::Transmit(frame) => tx.enqueue(id, &frame),
                    LinkAction::Deliver(payload) => {
                        let mut out = Vec::new();
                        context.transport.on_receive(&payload, &mut out);
                        self.apply_transport(context, out, calls);
                    }
                    LinkAction::StartTimer(delay) => self.arm_timer(context, id, delay),
                    LinkAction::CancelTimer => context.cancel_timer(),
                    LinkAction::SendResult(success) => {
                        let mut out = Vec::new();
                        context.transport.on_send_result(success, &mut out);
                        self.apply_transport(context, out, calls);
                    }
                    LinkAction::LowerLayerUp => {
                        tracing::info!(%id, route = %context.link.route(), "link up");
                        context.transport.on_lower_layer_up();
                        calls.push(context.upcall(UpcallKind::Up));
                    }
                    LinkAction::LowerLayerDown => {
                        tracing::info!(%id, route = %context.link.route(), "link down");
                        let mut out = Vec::new();
                        context.transport.on_lower_layer_down(&mut out);
                        self.apply_transport(context, out, calls);
                        calls.push(context.upcall(UpcallKind::Down));
                    }
                }
            }

            if !context.link.is_ready() {
                break;
            }
            let Some(segment) = context.transport.poll_segment() else {
                break;
            };
            let mut out = Vec::new();
            match context.link.send(segment, &mut out) {
                Ok(()) => pending.extend(out),
                Err(e) => {
                    tracing::warn!(%id, error = %e, "link refused segment");
                    let mut out = Vec::new();
                    context.transport.on_send_result(false, &mut out);
                    self.apply_transport(context, out, calls);
                }
            }
        }

        tx.start_write();
    }

    fn apply_transport(
        &self,
        context: &Context,
        actions: Vec<TransportAction>,
        calls: &mut Vec<Upcall>,
    ) {
        for action in actions {
            match action {
                TransportAction::Deliver(message) => {
                    calls.push(context.upcall(UpcallKind::Receive(message)));
                }
                TransportAction::SendSuccess => calls.push(context.upcall(UpcallKind::SendSuccess)),
                TransportAction::SendFailure => calls.push(context.upcall(UpcallKind::SendFailure)),
                TransportAction::Release(units) => self.budget.release(units),
            }
        }
    }

    fn arm_timer(&self, context: &mut Context, id: LinkId, delay: Duration) {
        context.cancel_timer();
        let weak = self.me.clone();
        context.timer = Some(self.executor.start(delay, move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_timeout(id);
            }
        }));
    }

    /// Reset a context's link and transport as if its channel closed.
    fn take_down(&self, context: &mut Context, calls: &mut Vec<Upcall>) {
        let was_up = context.link.is_lower_layer_up();
        context.cancel_timer();

        // Link actions here are only the timer cancel and the down report.
        let mut link_actions = Vec::new();
        context.link.on_lower_layer_down(&mut link_actions);

        let mut out = Vec::new();
        context.transport.on_lower_layer_down(&mut out);
        self.apply_transport(context, out, calls);
        if was_up {
            calls.push(context.upcall(UpcallKind::Down));
        }
    }

    fn take_down_all(&self, inner: &mut RouterInner, calls: &mut Vec<Upcall>) {
        for id in inner.table.ids() {
            if let Some(context) = inner.table.get_mut(id) {
                self.take_down(context, calls);
            }
        }
    }

    fn close_channel(&self, inner: &mut RouterInner, reason: &str, calls: &mut Vec<Upcall>) {
        tracing::warn!(reason, "channel closed");
        inner.phase = Phase::Idle;
        inner.io = None;
        inner.tx.clear();
        self.take_down_all(inner, calls);
    }
}
