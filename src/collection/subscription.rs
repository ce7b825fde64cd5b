use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::db::ChangeEvent;

/// Handle to a live feed opened by `subscribe` or `subscribe_to_doc`.
///
/// The feed keeps running until [`Subscription::unsubscribe`] is called
/// or the feed fails. Dropping the handle does not stop it.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }

    /// Releases the feed. No callback runs after this returns, except one
    /// already executing.
    pub fn unsubscribe(self) {
        self.task.abort();
    }

    /// Whether the feed is still delivering.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Waits for the next change relevant to a feed.
///
/// Returns `false` once no further changes can arrive. A lagging
/// receiver counts as a change so the feed re-reads instead of dying.
pub(crate) async fn next_change(
    changes: &mut broadcast::Receiver<ChangeEvent>,
    doc_id: Option<&str>,
) -> bool {
    loop {
        match changes.recv().await {
            Ok(event) => match doc_id {
                Some(id) if !event.touches(id) => continue,
                _ => return true,
            },
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Feed lagged behind by {} change(s)", skipped);
                return true;
            }
            Err(RecvError::Closed) => return false,
        }
    }
}
