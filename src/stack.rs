//! Stack assembly and per-link handles.
//!
//! [`StackBuilder`] wires every link before anything runs: configurations are
//! validated and routes checked for duplicates as they are added, so a
//! [`Stack`] that builds can always start. Wiring is fixed afterwards except
//! for [`Stack::remove_link`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use dnp3_link::prelude::*;
//!
//! struct Printer;
//!
//! impl UpperLayer for Printer {
//!     fn on_receive(&self, message: &[u8]) {
//!         println!("received {} bytes", message.len());
//!     }
//! }
//!
//! # async fn run() -> Result<(), StackError> {
//! let executor = Executor::new();
//! let _executor_loop = executor.spawn();
//!
//! let mut builder = StackBuilder::new(executor);
//! let master = builder.add_link(LinkConfig::new(LinkRole::Master, 1, 1024), Arc::new(Printer))?;
//! let stack = builder.build()?;
//!
//! stack.start(loopback_channel(4096))?;
//! stack.link(master).ok_or(StackError::UnknownLink)?.send(vec![0xC0, 0x01])?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::core::{ConfigError, StackError, StackResult, UpperLayer};
use crate::executor::Executor;
use crate::link::{LinkConfig, LinkRoute};
use crate::router::{LinkId, Router, RouterConfig};

/// Collects link configurations and builds a [`Stack`].
pub struct StackBuilder {
    executor: Executor,
    config: RouterConfig,
    links: Vec<(LinkConfig, Arc<dyn UpperLayer>)>,
}

impl StackBuilder {
    /// Start building a stack that schedules on `executor`.
    pub fn new(executor: Executor) -> Self {
        Self {
            executor,
            config: RouterConfig::default(),
            links: Vec::new(),
        }
    }

    /// Replace the router configuration.
    pub fn router_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound on segments accepted and not yet completed.
    pub fn tx_queue_depth(mut self, depth: usize) -> Self {
        self.config.tx_queue_depth = depth;
        self
    }

    /// Largest application message in either direction.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Register a link and the upper layer that consumes its messages.
    ///
    /// Fails immediately on an invalid configuration or a route already
    /// added to this builder.
    pub fn add_link(
        &mut self,
        config: LinkConfig,
        upper: Arc<dyn UpperLayer>,
    ) -> Result<LinkId, ConfigError> {
        config.validate()?;
        let route = config.route();
        if self.links.iter().any(|(existing, _)| existing.route() == route) {
            return Err(ConfigError::DuplicateRoute(route));
        }
        self.links.push((config, upper));
        Ok(LinkId::from_index(self.links.len() - 1))
    }

    /// Create the stack. Fails only on an invalid router configuration.
    pub fn build(self) -> Result<Stack, ConfigError> {
        let router = Router::new(self.executor, self.config)?;
        for (index, (config, upper)) in self.links.into_iter().enumerate() {
            let id = router.add_context(config, upper)?;
            debug_assert_eq!(id.index(), index);
        }
        Ok(Stack { router })
    }
}

/// An assembled stack: one router and its links.
#[derive(Debug, Clone)]
pub struct Stack {
    router: Router,
}

impl Stack {
    /// Handle for sending on a link, or `None` if it was removed.
    pub fn link(&self, id: LinkId) -> Option<LinkHandle> {
        let route = self.router.route_of(id)?;
        Some(LinkHandle {
            router: self.router.clone(),
            id,
            route,
        })
    }

    /// Ids of the registered links, in registration order.
    pub fn links(&self) -> Vec<LinkId> {
        self.router.link_ids()
    }

    /// Attach a physical channel and bring the links up.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<T>(&self, channel: T) -> StackResult<()>
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.router.start(channel)
    }

    /// Stop the channel and bring every link down. Idempotent.
    pub fn shutdown(&self) {
        self.router.shutdown();
    }

    /// Unregister a link.
    pub fn remove_link(&self, id: LinkId) -> StackResult<()> {
        if self.router.remove_context(id) {
            Ok(())
        } else {
            Err(StackError::UnknownLink)
        }
    }

    /// Check if a channel is attached.
    pub fn is_running(&self) -> bool {
        self.router.is_running()
    }

    /// The underlying router.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Executor the stack schedules on.
    pub fn executor(&self) -> &Executor {
        self.router.executor()
    }
}

/// Sends application messages on one link.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    router: Router,
    id: LinkId,
    route: LinkRoute,
}

impl LinkHandle {
    /// Queue a message. See [`Router::send`] for the checks made here.
    pub fn send(&self, message: Vec<u8>) -> StackResult<()> {
        self.router.send(self.id, message)
    }

    /// True once the link can carry user data.
    pub fn is_lower_layer_up(&self) -> bool {
        self.router.is_lower_layer_up(self.id)
    }

    /// Route this link receives under.
    pub fn route(&self) -> LinkRoute {
        self.route
    }

    /// Id of this link.
    pub fn id(&self) -> LinkId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkRole;

    struct Sink;

    impl UpperLayer for Sink {
        fn on_receive(&self, _message: &[u8]) {}
    }

    fn builder() -> StackBuilder {
        StackBuilder::new(Executor::new())
    }

    #[test]
    fn test_duplicate_route_rejected_at_add() {
        let mut b = builder();
        b.add_link(LinkConfig::new(LinkRole::Master, 1, 1024), Arc::new(Sink))
            .unwrap();
        let err = b
            .add_link(LinkConfig::new(LinkRole::Outstation, 1, 1024), Arc::new(Sink))
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateRoute(LinkRoute::new(1024, 1)));
    }

    #[test]
    fn test_invalid_link_rejected_at_add() {
        let mut b = builder();
        let err = b
            .add_link(LinkConfig::new(LinkRole::Master, 0xFFFF, 1), Arc::new(Sink))
            .unwrap_err();
        assert_eq!(err, ConfigError::ReservedAddress(0xFFFF));
    }

    #[test]
    fn test_zero_depth_rejected_at_build() {
        let err = builder().tx_queue_depth(0).build().unwrap_err();
        assert_eq!(err, ConfigError::ZeroQueueDepth);
    }

    #[test]
    fn test_ids_resolve_after_build() {
        let mut b = builder();
        let a = b
            .add_link(LinkConfig::new(LinkRole::Master, 1, 1024), Arc::new(Sink))
            .unwrap();
        let o = b
            .add_link(LinkConfig::new(LinkRole::Outstation, 1024, 1), Arc::new(Sink))
            .unwrap();
        let stack = b.build().unwrap();

        assert_eq!(stack.links(), vec![a, o]);
        assert_eq!(stack.link(a).unwrap().route(), LinkRoute::new(1024, 1));
        assert_eq!(stack.link(o).unwrap().route(), LinkRoute::new(1, 1024));
        assert!(!stack.link(a).unwrap().is_lower_layer_up());
    }

    #[test]
    fn test_send_before_start() {
        let mut b = builder();
        let a = b
            .add_link(LinkConfig::new(LinkRole::Master, 1, 1024), Arc::new(Sink))
            .unwrap();
        let stack = b.build().unwrap();
        let err = stack.link(a).unwrap().send(vec![1]).unwrap_err();
        assert!(matches!(err, StackError::NotStarted));
    }

    #[test]
    fn test_remove_link() {
        let mut b = builder();
        let a = b
            .add_link(LinkConfig::new(LinkRole::Master, 1, 1024), Arc::new(Sink))
            .unwrap();
        let stack = b.build().unwrap();
        let handle = stack.link(a).unwrap();

        stack.remove_link(a).unwrap();
        assert!(stack.link(a).is_none());
        assert!(matches!(stack.remove_link(a), Err(StackError::UnknownLink)));
        assert!(!handle.is_lower_layer_up());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let stack = builder().build().unwrap();
        stack.shutdown();
        stack.shutdown();
        assert!(stack.router().is_shut_down());
    }
}
