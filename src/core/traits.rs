//! The interface between the stack and the application layer above it.

/// Consumer of fully reassembled messages for one logical link.
///
/// Every method is invoked from a task on the stack's
/// [`Executor`](crate::executor::Executor), one call at a time and never
/// while stack state is locked, so implementations may call back into the
/// stack (for example [`LinkHandle::send`](crate::stack::LinkHandle::send)).
///
/// # Example
///
/// ```
/// use std::sync::Mutex;
/// use dnp3_link::core::UpperLayer;
///
/// #[derive(Default)]
/// struct Collector {
///     messages: Mutex<Vec<Vec<u8>>>,
/// }
///
/// impl UpperLayer for Collector {
///     fn on_receive(&self, message: &[u8]) {
///         self.messages.lock().unwrap().push(message.to_vec());
///     }
/// }
/// ```
pub trait UpperLayer: Send + Sync + 'static {
    /// A complete message arrived.
    ///
    /// Only messages whose every segment arrived intact and in order are
    /// delivered. Corrupt or partial messages are never observed here.
    fn on_receive(&self, message: &[u8]);

    /// The link below is ready to carry traffic.
    fn on_lower_layer_up(&self) {}

    /// The link below went away (channel closed or stack shut down).
    fn on_lower_layer_down(&self) {}

    /// Every segment of a sent message was delivered to the link.
    fn on_send_success(&self) {}

    /// A sent message could not be delivered.
    fn on_send_failure(&self) {}
}
