//! Frontier for managing discovered-but-unprocessed URLs
//!
//! This module handles:
//! - FIFO queue management for URLs to crawl
//! - Deduplication against the visited store and this run's enqueued set
//! - Global concurrency limiting via a semaphore
//! - Quiescence detection (queue empty and nothing in flight)
//! - Draining (no admission once closed)

use crate::state::VisitedStore;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use url::Url;

/// A URL queued for fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// The normalized URL to fetch
    pub url: Url,

    /// Link distance from the start URLs (start URLs are depth 0)
    pub depth: u32,

    /// Index of the rule whose link led here; `None` for start URLs
    pub origin_rule: Option<usize>,
}

impl FrontierEntry {
    /// A depth-0 entry with no originating rule
    pub fn seed(url: Url) -> Self {
        Self {
            url,
            depth: 0,
            origin_rule: None,
        }
    }
}

/// A dequeued entry holding one in-flight slot
///
/// Dropping it frees the slot and wakes suspended dequeuers, so a task keeps
/// it alive until every link it discovered has been enqueued.
pub struct ScheduledFetch {
    /// The URL to fetch
    pub entry: FrontierEntry,

    _permit: Option<OwnedSemaphorePermit>,
    frontier: Arc<Frontier>,
}

impl Drop for ScheduledFetch {
    fn drop(&mut self) {
        self._permit.take();
        {
            let mut state = self.frontier.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
        }
        self.frontier.notify.notify_waiters();
    }
}

#[derive(Default)]
struct FrontierState {
    queue: VecDeque<FrontierEntry>,
    enqueued: HashSet<String>,
    in_flight: usize,
    closed: bool,
}

/// Frontier manages the work queue and in-flight limit
///
/// The frontier coordinates:
/// - Global concurrency limits (max fetch tasks in flight)
/// - At-most-once admission per URL per run, never for visited URLs
/// - Wake-ups for dequeuers waiting on new work or free slots
pub struct Frontier {
    state: Mutex<FrontierState>,
    semaphore: Arc<Semaphore>,
    notify: Notify,
    visited: Arc<VisitedStore>,
    max_depth: Option<u32>,
}

impl Frontier {
    /// Creates a new frontier
    ///
    /// # Arguments
    ///
    /// * `concurrency` - Maximum number of entries in flight at once
    /// * `max_depth` - Entries deeper than this are rejected
    /// * `visited` - URLs from earlier runs that must never be admitted
    pub fn new(concurrency: usize, max_depth: Option<u32>, visited: Arc<VisitedStore>) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            notify: Notify::new(),
            visited,
            max_depth,
        }
    }

    /// Adds an entry to the back of the queue
    ///
    /// # Returns
    ///
    /// `false` (and nothing is queued) if the URL is already visited, was
    /// already enqueued this run, is deeper than the max depth, or the
    /// frontier is draining
    pub fn enqueue(&self, entry: FrontierEntry) -> bool {
        if let Some(max_depth) = self.max_depth {
            if entry.depth > max_depth {
                tracing::trace!("Depth {} exceeds max for {}", entry.depth, entry.url);
                return false;
            }
        }

        let key = entry.url.as_str().to_string();
        if self.visited.contains(&key) {
            return false;
        }

        {
            let mut state = self.lock();
            if state.closed || state.enqueued.contains(&key) {
                return false;
            }
            state.enqueued.insert(key);
            state.queue.push_back(entry);
        }

        self.notify.notify_waiters();
        true
    }

    /// Takes the next entry once an in-flight slot is free
    ///
    /// Suspends while the queue is empty but work is still in flight, or while
    /// the concurrency cap is reached.
    ///
    /// # Returns
    ///
    /// * `Some(ScheduledFetch)` - An entry that's ready to fetch
    /// * `None` - The crawl is quiescent or the frontier is draining
    pub async fn dequeue(self: &Arc<Self>) -> Option<ScheduledFetch> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before inspecting state so a wake-up in between is not lost
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return None;
                }
                if state.queue.is_empty() && state.in_flight == 0 {
                    return None;
                }

                if !state.queue.is_empty() {
                    if let Ok(permit) = self.semaphore.clone().try_acquire_owned() {
                        if let Some(entry) = state.queue.pop_front() {
                            state.in_flight += 1;
                            return Some(ScheduledFetch {
                                entry,
                                _permit: Some(permit),
                                frontier: Arc::clone(self),
                            });
                        }
                    }
                }
            }

            notified.await;
        }
    }

    /// Stops admission; pending entries are discarded and dequeuers return `None`
    pub fn close(&self) {
        {
            let mut state = self.lock();
            if !state.closed {
                tracing::debug!(
                    "Frontier closed with {} queued and {} in flight",
                    state.queue.len(),
                    state.in_flight
                );
            }
            state.closed = true;
            state.queue.clear();
        }
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Returns the number of queued (not in flight) entries
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    fn lock(&self) -> MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_frontier(
        concurrency: usize,
        max_depth: Option<u32>,
    ) -> (Arc<Frontier>, Arc<VisitedStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let visited = Arc::new(VisitedStore::open(dir.path().join("visited.txt")).unwrap());
        let frontier = Arc::new(Frontier::new(concurrency, max_depth, visited.clone()));
        (frontier, visited, dir)
    }

    fn entry(path: &str, depth: u32) -> FrontierEntry {
        FrontierEntry {
            url: Url::parse(&format!("https://site.example{}", path)).unwrap(),
            depth,
            origin_rule: Some(0),
        }
    }

    #[test]
    fn test_enqueue_deduplicates() {
        let (frontier, _visited, _dir) = create_test_frontier(4, None);

        assert!(frontier.enqueue(entry("/a", 1)));
        assert!(!frontier.enqueue(entry("/a", 2)));
        assert!(frontier.enqueue(entry("/b", 1)));
        assert_eq!(frontier.len(), 2);
    }

    #[test]
    fn test_enqueue_rejects_visited() {
        let (frontier, visited, _dir) = create_test_frontier(4, None);
        visited.mark_visited("https://site.example/a").unwrap();

        assert!(!frontier.enqueue(entry("/a", 1)));
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_enqueue_respects_max_depth() {
        let (frontier, _visited, _dir) = create_test_frontier(4, Some(1));

        assert!(frontier.enqueue(entry("/shallow", 1)));
        assert!(!frontier.enqueue(entry("/deep", 2)));
    }

    #[test]
    fn test_enqueue_rejected_after_close() {
        let (frontier, _visited, _dir) = create_test_frontier(4, None);
        frontier.close();

        assert!(!frontier.enqueue(entry("/a", 0)));
        assert!(frontier.is_closed());
    }

    #[tokio::test]
    async fn test_dequeue_is_fifo() {
        let (frontier, _visited, _dir) = create_test_frontier(4, None);
        frontier.enqueue(entry("/first", 0));
        frontier.enqueue(entry("/second", 0));

        let a = frontier.dequeue().await.unwrap();
        let b = frontier.dequeue().await.unwrap();
        assert_eq!(a.entry.url.path(), "/first");
        assert_eq!(b.entry.url.path(), "/second");
        assert_eq!(frontier.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_dequeue_empty_frontier_is_quiescent() {
        let (frontier, _visited, _dir) = create_test_frontier(4, None);
        assert!(frontier.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_fetch_releases_slot() {
        let (frontier, _visited, _dir) = create_test_frontier(1, None);
        frontier.enqueue(entry("/a", 0));
        frontier.enqueue(entry("/b", 0));

        let first = frontier.dequeue().await.unwrap();
        assert_eq!(frontier.in_flight(), 1);

        // The cap is reached, so the second dequeue must wait for the first slot
        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.dequeue().await.map(|f| f.entry.url.clone()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.unwrap().path(), "/b");
    }

    #[tokio::test]
    async fn test_waits_for_in_flight_work_before_quiescence() {
        let (frontier, _visited, _dir) = create_test_frontier(2, None);
        frontier.enqueue(entry("/index", 0));
        let index = frontier.dequeue().await.unwrap();

        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.dequeue().await.map(|f| f.entry.url.clone()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // In-flight work discovers a link before releasing its slot
        frontier.enqueue(entry("/article/1", 1));
        drop(index);

        let next = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(next.unwrap().path(), "/article/1");
        assert!(frontier.dequeue().await.is_none());
    }

    #[tokio::test]
    async fn test_close_wakes_dequeuers() {
        let (frontier, _visited, _dir) = create_test_frontier(2, None);
        frontier.enqueue(entry("/a", 0));
        let _held = frontier.dequeue().await.unwrap();

        let waiter = {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.dequeue().await.is_none() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        frontier.close();

        let got_none = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(got_none);
    }
}
