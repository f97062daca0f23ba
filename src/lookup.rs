//! Placeholder substitution for attribute values.
//!
//! Templates use `${key}` for record context values and `${prefix:key}` for
//! named lookups. `${key:-fallback}` supplies a default and `$${` renders a
//! literal `${`. Anything that cannot be resolved is left exactly as written,
//! so substitution never fails.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::record::LogRecord;

/// A source of values for `${prefix:key}` placeholders.
pub trait Lookup: Send + Sync {
    /// Return the value for `key`, or `None` when this lookup has nothing.
    fn lookup(&self, record: &LogRecord, key: &str) -> Option<String>;
}

/// Values taken from the record context (span and event fields).
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextLookup;

impl Lookup for ContextLookup {
    fn lookup(&self, record: &LogRecord, key: &str) -> Option<String> {
        record.context.get(key).cloned()
    }
}

/// Values taken from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvLookup;

impl Lookup for EnvLookup {
    fn lookup(&self, _record: &LogRecord, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Trace correlation identifiers recorded as context fields by
/// OpenTelemetry-aware instrumentation.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenTelemetryLookup;

impl OpenTelemetryLookup {
    pub const KEYS: [&'static str; 3] = ["trace_id", "span_id", "trace_flags"];
}

impl Lookup for OpenTelemetryLookup {
    fn lookup(&self, record: &LogRecord, key: &str) -> Option<String> {
        if Self::KEYS.contains(&key) {
            record.context.get(key).cloned()
        } else {
            None
        }
    }
}

/// Resolves placeholders in templates against a record.
#[derive(Clone)]
pub struct Substitutor {
    lookups: HashMap<String, Arc<dyn Lookup>>,
}

impl Default for Substitutor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Substitutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefixes: Vec<&str> = self.lookups.keys().map(String::as_str).collect();
        prefixes.sort_unstable();
        f.debug_struct("Substitutor").field("prefixes", &prefixes).finish()
    }
}

impl Substitutor {
    /// Substitutor with the `ctx`, `env` and `otel` lookups registered.
    pub fn new() -> Self {
        Substitutor {
            lookups: HashMap::new(),
        }
        .with_lookup("ctx", ContextLookup)
        .with_lookup("env", EnvLookup)
        .with_lookup("otel", OpenTelemetryLookup)
    }

    /// Register `lookup` under `prefix`, replacing any previous one.
    pub fn with_lookup(mut self, prefix: impl Into<String>, lookup: impl Lookup + 'static) -> Self {
        self.lookups.insert(prefix.into(), Arc::new(lookup));
        self
    }

    pub fn replace(&self, record: &LogRecord, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("${") {
            if start > 0 && rest.as_bytes()[start - 1] == b'$' {
                out.push_str(&rest[..start - 1]);
                out.push_str("${");
                rest = &rest[start + 2..];
                continue;
            }

            out.push_str(&rest[..start]);
            let body = &rest[start + 2..];
            let Some(end) = body.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };

            let variable = &body[..end];
            match self.resolve_variable(record, variable) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push_str("${");
                    out.push_str(variable);
                    out.push('}');
                }
            }
            rest = &body[end + 1..];
        }

        out.push_str(rest);
        out
    }

    fn resolve_variable(&self, record: &LogRecord, variable: &str) -> Option<String> {
        let (name, default) = match variable.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (variable, None),
        };

        let value = match name.split_once(':') {
            Some((prefix, key)) => match self.lookups.get(prefix) {
                Some(lookup) => lookup.lookup(record, key),
                None => record.context.get(name).cloned(),
            },
            None => record.context.get(name).cloned(),
        };

        value.or_else(|| default.map(str::to_owned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    fn record() -> LogRecord {
        LogRecord::new(Level::INFO, "app", "hello")
            .with_context("eval", "eval")
            .with_context("trace_id", "4bf92f3577b34da6a3ce929d0e0e4736")
            .with_context("user", "alice")
    }

    #[test]
    fn replaces_context_keys() {
        let s = Substitutor::new();
        assert_eq!(s.replace(&record(), "${eval}"), "eval");
        assert_eq!(s.replace(&record(), "user=${user};"), "user=alice;");
        assert_eq!(s.replace(&record(), "${ctx:user}"), "alice");
    }

    #[test]
    fn unresolved_placeholders_pass_through() {
        let s = Substitutor::new();
        assert_eq!(s.replace(&record(), "${missing}"), "${missing}");
        assert_eq!(s.replace(&record(), "a ${user"), "a ${user");
        assert_eq!(s.replace(&record(), "${nope:user}"), "${nope:user}");
    }

    #[test]
    fn defaults_and_escapes() {
        let s = Substitutor::new();
        assert_eq!(s.replace(&record(), "${missing:-n/a}"), "n/a");
        assert_eq!(s.replace(&record(), "${user:-n/a}"), "alice");
        assert_eq!(s.replace(&record(), "$${user}"), "${user}");
    }

    #[test]
    fn otel_lookup_only_exposes_trace_keys() {
        let s = Substitutor::new();
        assert_eq!(
            s.replace(&record(), "${otel:trace_id}"),
            "4bf92f3577b34da6a3ce929d0e0e4736"
        );
        assert_eq!(s.replace(&record(), "${otel:user}"), "${otel:user}");
    }

    #[test]
    fn custom_lookup_is_consulted_by_prefix() {
        struct Upper;
        impl Lookup for Upper {
            fn lookup(&self, _record: &LogRecord, key: &str) -> Option<String> {
                Some(key.to_ascii_uppercase())
            }
        }

        let s = Substitutor::new().with_lookup("up", Upper);
        assert_eq!(s.replace(&record(), "${up:host}-${user}"), "HOST-alice");
    }
}
