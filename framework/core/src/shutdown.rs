use tokio::sync::watch::{channel, Receiver, Sender};

/// Broadcast a shutdown signal to any number of listeners.
///
/// Handles are cheap to clone and any clone can trigger the shutdown. Listeners created after the
/// signal has been sent will still see it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<bool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: channel(false).0,
        }
    }

    pub fn shutdown(&self) {
        // send_replace updates the value even when nobody is subscribed yet, so listeners created
        // after the signal still observe it.
        self.sender.send_replace(true);
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Receiver<bool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<bool>) -> Self {
        Self { receiver }
    }

    /// Point in time check whether the shutdown signal has been sent. If this returns true then
    /// work should be stopped so that the session can shut down.
    pub fn should_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for the shutdown signal. Safe to race against other futures in a `select!` so that the
    /// signal can cancel work in progress.
    pub async fn wait_for_shutdown(&mut self) {
        loop {
            if *self.receiver.borrow_and_update() {
                return;
            }
            if self.receiver.changed().await.is_err() {
                // The handle was dropped without signalling, treat that as a shutdown.
                return;
            }
        }
    }
}
