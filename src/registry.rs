use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::error::ConfigError;
use crate::manager::{IngestManager, ManagerConfig, DEFAULT_TIMEOUT};

struct Registered {
    manager: Arc<IngestManager>,
    refs: usize,
}

/// Process-scoped table of live [`IngestManager`]s keyed by name.
///
/// Create one at host startup and hand it to every pipeline that needs a
/// manager. Creation, reference counting and removal all happen under one
/// lock, so a release can never stop a manager that a concurrent
/// `get_or_create` has just handed out.
#[derive(Default)]
pub struct ManagerRegistry {
    managers: Mutex<HashMap<String, Registered>>,
    created: AtomicUsize,
}

impl ManagerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the live manager registered as `name`, creating it from
    /// `config` on first use, and take a reference to it.
    ///
    /// A later call with the same name and a different config gets the
    /// existing manager; the config of the first call stays in effect and a
    /// warning is logged.
    pub fn get_or_create(&self, name: &str, config: ManagerConfig) -> Result<Arc<IngestManager>, ConfigError> {
        self.get_or_create_with_timeout(name, config, DEFAULT_TIMEOUT)
    }

    /// Same as [`get_or_create`](Self::get_or_create), with the timeout used
    /// if the manager has to be created.
    pub fn get_or_create_with_timeout(
        &self,
        name: &str,
        config: ManagerConfig,
        timeout: Duration,
    ) -> Result<Arc<IngestManager>, ConfigError> {
        // Creation runs under the table lock so that exactly one manager is
        // ever built per live name. First requests for unrelated names wait
        // on each other; that only happens during start-up.
        let mut managers = self.managers.lock();
        match managers.entry(name.to_string()) {
            Entry::Occupied(mut o) => {
                let registered = o.get_mut();
                if *registered.manager.config() != config {
                    tracing::warn!(
                        manager = name,
                        existing = %registered.manager.config(),
                        requested = %config,
                        "ingest manager already exists with a different config, keeping the existing one"
                    );
                }
                registered.refs += 1;
                Ok(Arc::clone(&registered.manager))
            }
            Entry::Vacant(v) => {
                let manager = Arc::new(IngestManager::with_timeout(name, config, timeout)?);
                self.created.fetch_add(1, Ordering::Relaxed);
                v.insert(Registered {
                    manager: Arc::clone(&manager),
                    refs: 1,
                });
                Ok(manager)
            }
        }
    }

    /// Live manager registered as `name`, without taking a reference.
    pub fn get(&self, name: &str) -> Option<Arc<IngestManager>> {
        self.managers.lock().get(name).map(|r| Arc::clone(&r.manager))
    }

    /// Drop one reference to `name`. The last reference stops the manager
    /// within `timeout` and removes it.
    ///
    /// **Returns**
    /// - `true` while other references remain, or when the final stop
    ///   released the client cleanly.
    /// - `false` for unknown names or an unclean stop.
    pub fn release(&self, name: &str, timeout: Duration) -> bool {
        let released = {
            let mut managers = self.managers.lock();
            let Some(registered) = managers.get_mut(name) else {
                return false;
            };
            registered.refs -= 1;
            if registered.refs > 0 {
                return true;
            }
            managers.remove(name)
        };

        // Unregistered already, so a concurrent get_or_create builds a fresh
        // manager instead of receiving this one.
        match released {
            Some(registered) => registered.manager.stop(timeout),
            None => false,
        }
    }

    /// Stop and remove every remaining manager, all within one overall
    /// `timeout`. Called at host shutdown and when the registry is dropped.
    ///
    /// Returns `true` if every manager stopped cleanly before the deadline.
    /// Managers reached after the deadline are still stopped, without
    /// waiting for their in-flight requests.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let drained: Vec<Registered> = self.managers.lock().drain().map(|(_, r)| r).collect();

        let mut clean = true;
        for registered in drained {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let stopped = registered.manager.stop(remaining);
            tracing::debug!(manager = registered.manager.name(), stopped, ?remaining, "ingest manager shut down");
            clean &= stopped;
        }
        clean
    }

    pub fn len(&self) -> usize {
        self.managers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of managers this registry has constructed so far.
    pub fn managers_created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

impl Drop for ManagerRegistry {
    fn drop(&mut self) {
        self.shutdown(DEFAULT_TIMEOUT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerState;
    use crate::tls::TlsPolicy;
    use std::sync::Barrier;
    use std::thread;
    use tracing_test::traced_test;

    fn config(token: &str) -> ManagerConfig {
        ManagerConfig::new("https://ingest.example.com/api/v2/logs/ingest", token, TlsPolicy::Validate).unwrap()
    }

    #[test]
    fn concurrent_first_requests_create_one_manager() {
        let registry = ManagerRegistry::new();
        let barrier = Barrier::new(100);

        let managers: Vec<Arc<IngestManager>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..100)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        registry.get_or_create("m", config("token")).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(registry.managers_created(), 1);
        assert_eq!(registry.len(), 1);
        assert!(managers.iter().all(|m| Arc::ptr_eq(m, &managers[0])));
    }

    #[traced_test]
    #[test]
    fn first_config_wins_for_a_name() {
        let registry = ManagerRegistry::new();
        let first = registry.get_or_create("m", config("first")).unwrap();
        let second = registry.get_or_create("m", config("second")).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.config().token(), "first");
        assert!(logs_contain("already exists with a different config"));
        assert!(!logs_contain("second"));
    }

    #[test]
    fn last_release_stops_and_removes() {
        let registry = ManagerRegistry::new();
        let manager = registry.get_or_create("m", config("token")).unwrap();
        registry.get_or_create("m", config("token")).unwrap();

        assert!(registry.release("m", Duration::from_secs(1)));
        assert_eq!(manager.state(), ManagerState::Active);
        assert_eq!(registry.len(), 1);

        assert!(registry.release("m", Duration::from_secs(1)));
        assert_eq!(manager.state(), ManagerState::Stopped);
        assert!(registry.get("m").is_none());
        assert!(!registry.release("m", Duration::from_secs(1)));
    }

    #[test]
    fn recreated_after_release() {
        let registry = ManagerRegistry::new();
        let first = registry.get_or_create("m", config("token")).unwrap();
        registry.release("m", Duration::from_secs(1));

        let second = registry.get_or_create("m", config("token")).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(registry.managers_created(), 2);
    }

    #[test]
    fn shutdown_stops_everything() {
        let registry = ManagerRegistry::new();
        let a = registry.get_or_create("a", config("token")).unwrap();
        let b = registry.get_or_create("b", config("token")).unwrap();

        assert!(registry.shutdown(Duration::from_secs(1)));
        assert!(registry.is_empty());
        assert_eq!(a.state(), ManagerState::Stopped);
        assert_eq!(b.state(), ManagerState::Stopped);
    }

    #[test]
    fn shutdown_shares_one_deadline() {
        let registry = ManagerRegistry::new();
        let managers: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|name| registry.get_or_create(name, config("token")).unwrap())
            .collect();

        let started = Instant::now();
        registry.shutdown(Duration::ZERO);

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(registry.is_empty());
        assert!(managers.iter().all(|m| m.state() == ManagerState::Stopped));
    }
}
