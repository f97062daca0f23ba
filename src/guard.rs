//! Keeps the pipeline from ingesting its own diagnostics.
//!
//! Everything this crate logs carries a target under [`NAMESPACE`]. Such
//! records are never forwarded. A thread is marked as emitting while the
//! layer forwards a record on it, and for its whole life when it belongs to
//! a manager's runtime. Events raised on an emitting thread, whatever their
//! target, are dropped by the layer, and the warning about a skipped record
//! is only raised for events that arrive from outside the pipeline.

use std::cell::Cell;

/// Target prefix of every event logged by this crate.
pub const NAMESPACE: &str = "tracing_log_ingest";

thread_local! {
    static EMITTING: Cell<bool> = const { Cell::new(false) };
}

/// True when `source` belongs to this crate.
pub fn is_own_source(source: &str) -> bool {
    source.starts_with(NAMESPACE)
}

/// True while the current thread is inside an [`EmitScope`].
pub fn is_emitting() -> bool {
    EMITTING.with(Cell::get)
}

/// Marks the current thread as emitting for the rest of its life. Used as
/// the `on_thread_start` hook of transport threads.
pub fn mark_thread_emitting() {
    EMITTING.with(|flag| flag.set(true));
}

/// Marks the current thread as emitting until dropped.
///
/// Scopes nest; only the outermost one clears the flag.
pub struct EmitScope {
    outer: bool,
}

impl EmitScope {
    pub fn enter() -> Self {
        let outer = EMITTING.with(|flag| flag.replace(true));
        EmitScope { outer }
    }
}

impl Drop for EmitScope {
    fn drop(&mut self) {
        EMITTING.with(|flag| flag.set(self.outer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scopes_nest() {
        assert!(!is_emitting());
        {
            let _outer = EmitScope::enter();
            {
                let _inner = EmitScope::enter();
                assert!(is_emitting());
            }
            assert!(is_emitting());
        }
        assert!(!is_emitting());
    }

    #[test]
    fn marked_threads_stay_emitting() {
        let marked = std::thread::spawn(|| {
            mark_thread_emitting();
            drop(EmitScope::enter());
            is_emitting()
        })
        .join()
        .unwrap();
        assert!(marked);
        assert!(!is_emitting());
    }

    #[test]
    fn namespace_matches_module_targets() {
        assert!(is_own_source(module_path!()));
        assert!(!is_own_source("my_app::handler"));
    }
}
