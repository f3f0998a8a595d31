//! Process-wide knowledge source for grounded question-answering.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

/// Holds the text of the most recently ingested document.
///
/// The source is replaced wholesale; readers take a snapshot `Arc` so an
/// in-flight question keeps seeing the document it started with even if a
/// concurrent upload swaps the text underneath it. No partial-document
/// state is ever observable.
#[derive(Default)]
pub struct KnowledgeStore {
    text: RwLock<Option<Arc<str>>>,
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active document with new text.
    pub async fn replace(&self, text: String) {
        let chars = text.chars().count();
        let mut guard = self.text.write().await;
        *guard = Some(Arc::from(text.as_str()));
        info!(chars, "Knowledge source replaced");
    }

    /// Snapshot of the current document, if any.
    pub async fn snapshot(&self) -> Option<Arc<str>> {
        self.text.read().await.clone()
    }

    /// Whether no document has been ingested yet.
    pub async fn is_empty(&self) -> bool {
        self.text.read().await.is_none()
    }

    /// Drop the active document.
    pub async fn clear(&self) {
        *self.text.write().await = None;
    }
}
