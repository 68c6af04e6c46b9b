//! Processing queue and in-flight fingerprint guard
//!
//! Both structures are shared between the event loop and the workers. Each
//! has one lock, held only for a push, pop, insert or remove.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tally_domain::{Fingerprint, SourceDocument};
use tokio::sync::Notify;

/// FIFO of documents waiting for a worker
#[derive(Debug, Default)]
pub struct ProcessingQueue {
    items: Mutex<VecDeque<SourceDocument>>,
    notify: Notify,
    closed: AtomicBool,
}

impl ProcessingQueue {
    /// Create an open, empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<SourceDocument>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a document
    ///
    /// Returns the document back if the queue is closed.
    pub fn push(&self, document: SourceDocument) -> Result<(), SourceDocument> {
        if self.is_closed() {
            return Err(document);
        }
        self.items().push_back(document);
        self.notify.notify_one();
        Ok(())
    }

    /// Wait for the next document
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn pop(&self) -> Option<SourceDocument> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(document) = self.items().pop_front() {
                return Some(document);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }

    /// Stop accepting documents and wake idle workers
    ///
    /// Documents already queued are still handed out.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Accept documents again after a `close`
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of waiting documents
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Whether no document is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fingerprints of documents queued or being processed
#[derive(Debug, Default)]
pub struct InFlight {
    fingerprints: Mutex<HashSet<Fingerprint>>,
}

impl InFlight {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self) -> MutexGuard<'_, HashSet<Fingerprint>> {
        self.fingerprints.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a fingerprint; `false` if it was already present
    pub fn try_claim(&self, fingerprint: Fingerprint) -> bool {
        self.set().insert(fingerprint)
    }

    /// Forget a fingerprint
    pub fn release(&self, fingerprint: &Fingerprint) {
        self.set().remove(fingerprint);
    }

    /// Whether the fingerprint is claimed
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.set().contains(fingerprint)
    }

    /// Number of claimed fingerprints
    pub fn len(&self) -> usize {
        self.set().len()
    }

    /// Whether nothing is claimed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    fn doc(name: &str) -> SourceDocument {
        SourceDocument::new(PathBuf::from("/in").join(name))
    }

    fn fingerprint(name: &str, size: u64) -> Fingerprint {
        Fingerprint {
            path: PathBuf::from("/in").join(name),
            size,
            modified: None,
        }
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let queue = ProcessingQueue::new();
        queue.push(doc("a.jpg")).unwrap();
        queue.push(doc("b.jpg")).unwrap();

        assert_eq!(queue.pop().await.unwrap().file_name(), "a.jpg");
        assert_eq!(queue.pop().await.unwrap().file_name(), "b.jpg");
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(ProcessingQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push(doc("late.pdf")).unwrap();

        let popped = tokio::time::timeout(Duration::from_secs(2), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped.unwrap().file_name(), "late.pdf");
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let queue = ProcessingQueue::new();
        queue.push(doc("a.jpg")).unwrap();
        queue.close();

        assert!(queue.push(doc("b.jpg")).is_err());
        assert!(queue.pop().await.is_some());
        assert!(queue.pop().await.is_none());

        queue.reopen();
        assert!(queue.push(doc("c.jpg")).is_ok());
    }

    #[tokio::test]
    async fn test_close_wakes_idle_consumer() {
        let queue = Arc::new(ProcessingQueue::new());
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.close();

        let popped = tokio::time::timeout(Duration::from_secs(2), consumer)
            .await
            .unwrap()
            .unwrap();
        assert!(popped.is_none());
    }

    #[test]
    fn test_in_flight_claims_once() {
        let in_flight = InFlight::new();
        assert!(in_flight.try_claim(fingerprint("a.jpg", 10)));
        assert!(!in_flight.try_claim(fingerprint("a.jpg", 10)));
        // Same path rewritten with new content is a new document
        assert!(in_flight.try_claim(fingerprint("a.jpg", 11)));

        in_flight.release(&fingerprint("a.jpg", 10));
        assert!(!in_flight.contains(&fingerprint("a.jpg", 10)));
        assert_eq!(in_flight.len(), 1);
    }
}
