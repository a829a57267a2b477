use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use twinpipe_frame::{MessageWriter, StreamMessage, WriteError};

use crate::entry::LogEntry;
use crate::level::LogLevel;
use crate::logger::Logger;

/// Broadcasts log records to a dynamic set of stream writers.
///
/// Writers are keyed by a caller-chosen id. Delivery is best effort: a writer
/// that fails once is removed, and one writer failing never affects delivery
/// to the others. There is no ordering guarantee across writers.
pub struct LogFanoutDispatcher {
    writers: RwLock<HashMap<String, Arc<dyn MessageWriter>>>,
    min_level: LogLevel,
    disposed: AtomicBool,
}

impl Default for LogFanoutDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl LogFanoutDispatcher {
    /// A dispatcher accepting every level except `None`.
    pub fn new() -> Self {
        Self::with_min_level(LogLevel::Trace)
    }

    pub fn with_min_level(min_level: LogLevel) -> Self {
        Self {
            writers: RwLock::new(HashMap::new()),
            min_level,
            disposed: AtomicBool::new(false),
        }
    }

    /// Add a writer under `id`. Returns `false` if the id is already taken.
    pub fn register(&self, id: impl Into<String>, writer: Arc<dyn MessageWriter>) -> bool {
        if self.is_disposed() {
            return false;
        }
        let id = id.into();
        let inserted = match self.writers.write().entry(id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(writer);
                true
            }
        };
        if inserted {
            debug!(id = %id, "log writer registered");
        }
        inserted
    }

    /// Remove the writer under `id`. Returns `false` if there was none.
    pub fn unregister(&self, id: &str) -> bool {
        self.writers.write().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.writers.read().contains_key(id)
    }

    /// Number of registered writers.
    pub fn len(&self) -> usize {
        self.writers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.read().is_empty()
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    /// Whether a record of `level` would be delivered.
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level >= self.min_level && !self.is_disposed()
    }

    /// Deliver one record. Returns the number of writers that accepted it.
    pub fn log(&self, entry: &LogEntry) -> usize {
        if !self.is_enabled(entry.level) {
            return 0;
        }
        let Some(kind) = entry.level.message_type() else {
            return 0;
        };
        self.dispatch(&StreamMessage::new(kind, entry.render()))
    }

    /// Send `message` to every registered writer, evicting the ones that fail.
    ///
    /// Returns the number of writers that accepted the message.
    pub fn dispatch(&self, message: &StreamMessage) -> usize {
        if self.is_disposed() {
            return 0;
        }

        let snapshot: Vec<(String, Arc<dyn MessageWriter>)> = self
            .writers
            .read()
            .iter()
            .map(|(id, writer)| (id.clone(), Arc::clone(writer)))
            .collect();

        let mut delivered = 0;
        for (id, writer) in snapshot {
            match guarded_write(writer.as_ref(), message) {
                Ok(()) => delivered += 1,
                Err(err) => {
                    self.evict(&id, &writer);
                    debug!(id = %id, error = %err, "log writer evicted");
                }
            }
        }
        delivered
    }

    /// A logger whose records all carry `category`.
    pub fn logger(self: &Arc<Self>, category: impl Into<String>) -> Logger {
        Logger::new(Arc::clone(self), category)
    }

    /// Stop dispatching and drop every registered writer. Idempotent.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.writers.write().clear();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    // Only remove the entry if it still holds the writer that failed; the id
    // may have been re-registered with a fresh writer in the meantime.
    fn evict(&self, id: &str, failed: &Arc<dyn MessageWriter>) {
        let mut writers = self.writers.write();
        if writers
            .get(id)
            .is_some_and(|current| Arc::ptr_eq(current, failed))
        {
            writers.remove(id);
        }
    }
}

/// A panicking writer counts as a failed one.
fn guarded_write(writer: &dyn MessageWriter, message: &StreamMessage) -> Result<(), WriteError> {
    catch_unwind(AssertUnwindSafe(|| writer.write(message))).unwrap_or_else(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "writer panicked".to_string());
        Err(WriteError::Failed(reason))
    })
}

impl std::fmt::Debug for LogFanoutDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogFanoutDispatcher")
            .field("writers", &self.len())
            .field("min_level", &self.min_level)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use parking_lot::Mutex;
    use twinpipe_frame::{MessageType, WriteError};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<StreamMessage>>,
    }

    impl MessageWriter for Recorder {
        fn write(&self, message: &StreamMessage) -> Result<(), WriteError> {
            self.seen.lock().push(message.clone());
            Ok(())
        }
    }

    struct Failing {
        calls: AtomicUsize,
        error: WriteError,
    }

    impl Failing {
        fn new(error: WriteError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                error,
            }
        }
    }

    impl MessageWriter for Failing {
        fn write(&self, _message: &StreamMessage) -> Result<(), WriteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(self.error.clone())
        }
    }

    #[test]
    fn register_is_idempotent_per_id() {
        let dispatcher = LogFanoutDispatcher::new();
        assert!(dispatcher.register("a", Arc::new(Recorder::default())));
        assert!(!dispatcher.register("a", Arc::new(Recorder::default())));
        assert!(dispatcher.contains("a"));
        assert_eq!(dispatcher.len(), 1);

        assert!(dispatcher.unregister("a"));
        assert!(!dispatcher.unregister("a"));
        assert!(!dispatcher.contains("a"));
        assert!(dispatcher.is_empty());
    }

    #[test]
    fn fanout_isolates_failing_writers() {
        let dispatcher = LogFanoutDispatcher::new();
        let good = Arc::new(Recorder::default());
        let closed = Arc::new(Failing::new(WriteError::Closed));
        let broken = Arc::new(Failing::new(WriteError::Failed("boom".into())));
        dispatcher.register("good", good.clone());
        dispatcher.register("closed", closed.clone());
        dispatcher.register("broken", broken.clone());

        assert_eq!(dispatcher.dispatch(&StreamMessage::info("first")), 1);
        assert!(dispatcher.contains("good"));
        assert!(!dispatcher.contains("closed"));
        assert!(!dispatcher.contains("broken"));

        // Evicted after exactly one failure, never retried.
        assert_eq!(dispatcher.dispatch(&StreamMessage::info("second")), 1);
        assert_eq!(closed.calls.load(Ordering::SeqCst), 1);
        assert_eq!(broken.calls.load(Ordering::SeqCst), 1);

        let seen = good.seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|m| !m.finished));
    }

    struct Panicking;

    impl MessageWriter for Panicking {
        fn write(&self, _message: &StreamMessage) -> Result<(), WriteError> {
            panic!("writer blew up");
        }
    }

    #[test]
    fn panicking_writer_is_evicted_without_affecting_others() {
        let dispatcher = LogFanoutDispatcher::new();
        let good = Arc::new(Recorder::default());
        let closed = Arc::new(Failing::new(WriteError::Closed));
        dispatcher.register("closed", closed.clone());
        dispatcher.register("panicking", Arc::new(Panicking));
        dispatcher.register("good", good.clone());

        assert_eq!(dispatcher.dispatch(&StreamMessage::info("first")), 1);
        assert!(!dispatcher.contains("panicking"));
        assert!(!dispatcher.contains("closed"));
        assert!(dispatcher.contains("good"));

        assert_eq!(dispatcher.dispatch(&StreamMessage::info("second")), 1);
        assert_eq!(closed.calls.load(Ordering::SeqCst), 1);
        assert_eq!(good.seen.lock().len(), 2);
    }

    #[test]
    fn eviction_keeps_reregistered_writer() {
        let dispatcher = LogFanoutDispatcher::new();
        let failing: Arc<dyn MessageWriter> = Arc::new(Failing::new(WriteError::Closed));
        let fresh: Arc<dyn MessageWriter> = Arc::new(Recorder::default());
        dispatcher.register("session", Arc::clone(&failing));

        dispatcher.unregister("session");
        dispatcher.register("session", Arc::clone(&fresh));
        dispatcher.evict("session", &failing);
        assert!(dispatcher.contains("session"));

        dispatcher.evict("session", &fresh);
        assert!(!dispatcher.contains("session"));
    }

    #[test]
    fn log_maps_level_and_renders_content() {
        let dispatcher = LogFanoutDispatcher::new();
        let recorder = Arc::new(Recorder::default());
        dispatcher.register("r", recorder.clone());

        let entry = LogEntry::new(LogLevel::Critical, "db", "connection lost").with_exception("timeout");
        assert_eq!(dispatcher.log(&entry), 1);
        assert_eq!(dispatcher.log(&LogEntry::new(LogLevel::None, "db", "ignored")), 0);

        let seen = recorder.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, MessageType::Error);
        assert!(seen[0].content.ends_with("[crit] db: connection lost\ntimeout"));
    }

    #[test]
    fn min_level_filters_records() {
        let dispatcher = LogFanoutDispatcher::with_min_level(LogLevel::Warning);
        let recorder = Arc::new(Recorder::default());
        dispatcher.register("r", recorder.clone());

        assert!(!dispatcher.is_enabled(LogLevel::Information));
        assert!(dispatcher.is_enabled(LogLevel::Error));
        assert_eq!(dispatcher.log(&LogEntry::new(LogLevel::Debug, "c", "quiet")), 0);
        assert_eq!(dispatcher.log(&LogEntry::new(LogLevel::Warning, "c", "loud")), 1);
        assert_eq!(recorder.seen.lock().len(), 1);
    }

    #[test]
    fn dispose_makes_dispatch_a_noop() {
        let dispatcher = LogFanoutDispatcher::new();
        let recorder = Arc::new(Recorder::default());
        dispatcher.register("r", recorder.clone());

        dispatcher.dispose();
        dispatcher.dispose();
        assert!(dispatcher.is_disposed());
        assert!(dispatcher.is_empty());
        assert_eq!(dispatcher.dispatch(&StreamMessage::info("late")), 0);
        assert!(!dispatcher.register("r2", recorder.clone()));
        assert!(!dispatcher.is_enabled(LogLevel::Error));
        assert!(recorder.seen.lock().is_empty());
    }

    #[test]
    fn concurrent_dispatch_and_registration() {
        let dispatcher = Arc::new(LogFanoutDispatcher::new());
        let recorder = Arc::new(Recorder::default());
        dispatcher.register("steady", recorder.clone());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let dispatcher = Arc::clone(&dispatcher);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let id = format!("t{t}-{i}");
                        dispatcher.register(id.clone(), Arc::new(Recorder::default()));
                        dispatcher.dispatch(&StreamMessage::info(id.clone()));
                        dispatcher.unregister(&id);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(recorder.seen.lock().len(), 200);
        assert_eq!(dispatcher.len(), 1);
    }
}
