/// The host game loop's side of the bridge, seen only through this trait.
/// The gateway calls it for events the host world needs to observe.
pub trait HostBridge {
    /// A chat line arrived from a connected client. `message` is the raw
    /// text as typed; implementations add their own sender prefixing.
    fn broadcast_chat(&self, username: &str, message: &str);
}

/// Stand-in bridge used when no host engine is attached. Chat goes to the
/// log and nowhere else.
pub struct LogBridge;

impl HostBridge for LogBridge {
    fn broadcast_chat(&self, username: &str, message: &str) {
        tracing::info!("<{username}> {message}");
    }
}
