//! Progress events streamed to the caller while a pipeline runs

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

/// Receiving end is owned by the caller; a dropped receiver is not an error.
pub type ProgressSender<T> = UnboundedSender<T>;

/// Emitted after every exported chunk
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExportProgress {
    pub percent: f64,
    pub rows_processed: u64,
    pub total_rows: u64,
}

/// Emitted after every written batch
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ImportProgress {
    pub percent: f64,
    pub rows_imported: u64,
    pub rows_failed: u64,
    pub rows_processed: u64,
    pub total_rows: u64,
}

pub(crate) fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        (done * 100) as f64 / total as f64
    }
}

pub(crate) fn send<T>(sender: Option<&ProgressSender<T>>, event: T) {
    if let Some(sender) = sender {
        if sender.send(event).is_err() {
            tracing::trace!("progress receiver dropped");
        }
    }
}
