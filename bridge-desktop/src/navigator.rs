//! Navigator that forwards redirects to the host UI loop

use bridge_traits::navigation::Navigator;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Sends every hard redirect over an unbounded channel.
///
/// The receiving half belongs to the host's UI loop, which performs the actual
/// reload. Sending never blocks, so it is safe to call from any task.
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelNavigator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn hard_redirect(&self, path: &str) {
        info!(path, "Hard redirect requested");
        if self.tx.send(path.to_string()).is_err() {
            warn!(path, "Redirect dropped: host receiver is gone");
        }
    }
}
