use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
}

/// Publish/subscribe channel for user-facing notices. Handles are cheap to
/// clone; each subscriber receives every notice published after it
/// subscribed.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }

    pub fn publish(&self, level: Level, message: impl Into<String>) {
        let notice = Notice { level, message: message.into() };
        // No subscribers is fine; the notice is simply dropped.
        if self.sender.send(notice).is_err() {
            debug!("notice published with no subscribers");
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(Level::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(Level::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.publish(Level::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(Level::Error, message);
    }

    /// Publishes an outcome as success or error.
    pub fn outcome(&self, outcome: &crate::models::Outcome) {
        let level = if outcome.success { Level::Success } else { Level::Error };
        self.publish(level, outcome.message.clone());
    }
}

/// Everything queued for `receiver` right now, without waiting.
pub fn drain(receiver: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    loop {
        match receiver.try_recv() {
            Ok(notice) => notices.push(notice),
            Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                debug!(skipped, "notice subscriber lagged");
            }
            Err(_) => break,
        }
    }
    notices
}
